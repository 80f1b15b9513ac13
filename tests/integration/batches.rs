use crate::common::{path, project, write, USER_KT};
use kt_patcher::config::load_batch;
use kt_patcher::{ElementKind, InsertPosition, Modification, RepositoryError};

#[test]
fn one_result_per_item_in_order() {
    let (_dir, repo) = project(&[("src/User.kt", USER_KT)]);
    let user = path("file:src/User.kt/class[User]");

    let results = repo.apply_modifications(vec![
        Modification::CreateElement {
            target_path: user.clone(),
            kind: ElementKind::Property,
            content: "val email: String = \"\"".into(),
            position: InsertPosition::FirstChild,
        },
        Modification::DeleteElement {
            target_path: path("file:src/User.kt/class[User]/function[missing]"),
        },
        Modification::CreateElement {
            target_path: user.clone(),
            kind: ElementKind::Function,
            content: "fun email() = email".into(),
            position: InsertPosition::LastChild,
        },
    ]);

    assert_eq!(results.len(), 3);
    assert!(results[0].is_success(), "{:?}", results[0]);
    assert!(matches!(
        results[1].error(),
        Some(RepositoryError::NotFound { .. })
    ));
    assert!(results[2].is_success(), "{:?}", results[2]);
    assert_eq!(results[1].modification().type_name(), "delete_element");

    assert!(repo.exists(&path("file:src/User.kt/class[User]/property[email]")));
    assert!(repo.exists(&path("file:src/User.kt/class[User]/function[email]")));
}

#[test]
fn later_failure_keeps_earlier_success() {
    let (_dir, repo) = project(&[("A.kt", "class A {\n    fun a() = 1\n}\n")]);

    let results = repo.apply_modifications(vec![
        Modification::ReplaceElement {
            target_path: path("file:A.kt/class[A]/function[a]"),
            content: "fun a() = 2".into(),
        },
        Modification::ReplaceElement {
            target_path: path("file:A.kt/class[A]/function[a]"),
            content: "fun (((".into(),
        },
    ]);

    assert!(results[0].is_success());
    assert!(!results[1].is_success());
    assert!(repo.file_text("A.kt").unwrap().contains("fun a() = 2"));
}

#[test]
fn batch_file_applies() {
    let (dir, repo) = project(&[("src/User.kt", USER_KT)]);
    write(
        dir.path(),
        "edits/01-user.toml",
        r#"
[[modifications]]
type = "add_import"
target_path = "file:src/User.kt"
import_path = "java.util.UUID"

[[modifications]]
type = "create_element"
target_path = "file:src/User.kt/class[User]"
kind = "val"
content = "val id: UUID = UUID.randomUUID()"
position = "FIRST_CHILD"

[[modifications]]
type = "delete_element"
target_path = "file:src/User.kt/enum[Role]/enum_entry[GUEST]"
"#,
    );

    let batch = load_batch(dir.path().join("edits/01-user.toml")).unwrap();
    let results = repo.apply_modifications(batch.modifications);
    assert!(results.iter().all(|r| r.is_success()), "{results:?}");

    let text = repo.file_text("src/User.kt").unwrap();
    assert!(text.contains("import java.util.UUID"));
    assert!(text.contains("    val id: UUID = UUID.randomUUID()\n    val age: Int = 0"));
    assert!(!repo.exists(&path("file:src/User.kt/enum[Role]/enum_entry[GUEST]")));
    assert!(repo.exists(&path("file:src/User.kt/enum[Role]/enum_entry[ADMIN]")));
}
