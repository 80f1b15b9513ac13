use crate::common::{path, project, USER_KT};
use kt_patcher::imports::list_imports;
use kt_patcher::ts::validator::validate_strict;
use kt_patcher::{Modification, ModificationResult, RepositoryError};

fn add(target: &str, import: &str) -> Modification {
    Modification::AddImport {
        target_path: path(target),
        import_path: import.into(),
    }
}

fn remove(target: &str, import: &str) -> Modification {
    Modification::RemoveImport {
        target_path: path(target),
        import_path: import.into(),
    }
}

#[test]
fn add_import_is_idempotent() {
    let (_dir, repo) = project(&[("src/User.kt", USER_KT)]);

    let first = repo.apply_modification(add("file:src/User.kt", "kotlin.math.min"));
    let second = repo.apply_modification(add("file:src/User.kt", "kotlin.math.min"));

    assert!(matches!(
        first,
        ModificationResult::Success {
            already_present: false,
            ..
        }
    ));
    assert!(matches!(
        second,
        ModificationResult::Success {
            already_present: true,
            ..
        }
    ));

    let text = repo.file_text("src/User.kt").unwrap();
    assert_eq!(text.matches("import kotlin.math.min").count(), 1);
    assert!(text.contains("import kotlin.math.max\nimport kotlin.math.min\n\n/**"));
}

#[test]
fn element_target_uses_its_file() {
    let (_dir, repo) = project(&[("src/User.kt", USER_KT)]);
    let result = repo.apply_modification(add("file:src/User.kt/class[User]", "java.util.UUID"));
    match result {
        ModificationResult::Success { affected_path, .. } => {
            assert_eq!(affected_path, path("file:src/User.kt"));
        }
        other => panic!("add failed: {other:?}"),
    }
}

#[test]
fn import_block_is_synthesized_after_package() {
    let (_dir, repo) = project(&[("A.kt", "package demo\n\nclass A\n")]);
    assert!(repo
        .apply_modification(add("file:A.kt", "java.time.Instant"))
        .is_success());
    assert_eq!(
        repo.file_text("A.kt").unwrap(),
        "package demo\n\nimport java.time.Instant\n\nclass A\n"
    );
}

#[test]
fn remove_import_round_trip() {
    let (_dir, repo) = project(&[("src/User.kt", USER_KT)]);

    assert!(repo
        .apply_modification(remove("file:src/User.kt", "kotlin.math.max"))
        .is_success());
    let text = repo.file_text("src/User.kt").unwrap();
    assert!(list_imports(&text).unwrap().is_empty());
    assert!(text.starts_with("package demo\n\n/** A user"));

    let missing = repo.apply_modification(remove("file:src/User.kt", "kotlin.math.max"));
    assert!(matches!(
        missing.error(),
        Some(RepositoryError::InvalidOperation(_))
    ));
}

#[test]
fn empty_import_path_is_rejected() {
    let (_dir, repo) = project(&[("src/User.kt", USER_KT)]);
    let result = repo.apply_modification(add("file:src/User.kt", "  "));
    assert!(matches!(result.error(), Some(RepositoryError::Validation(_))));
    assert_eq!(repo.file_text("src/User.kt").unwrap(), USER_KT);
}

#[test]
fn missing_file_is_not_found() {
    let (_dir, repo) = project(&[]);
    let result = repo.apply_modification(add("file:Nope.kt", "a.B"));
    assert!(matches!(result.error(), Some(RepositoryError::NotFound { .. })));
}

#[test]
fn import_block_goes_after_file_annotations() {
    let (_dir, repo) = project(&[("B.kt", "@file:JvmName(\"Bx\")\n\nclass B\n")]);

    let result = repo.apply_modification(add("file:B.kt", "a.b.C"));
    assert!(result.is_success(), "{result:?}");

    let text = repo.file_text("B.kt").unwrap();
    assert_eq!(text, "@file:JvmName(\"Bx\")\n\nimport a.b.C\n\nclass B\n");
    assert!(validate_strict(&text).is_ok());
    assert!(repo.exists(&path("file:B.kt/class[B]")));
}
