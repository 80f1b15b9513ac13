use crate::common::{path, project, USER_KT};
use kt_patcher::{
    ElementKind, InsertPosition, Modification, ModificationResult, RepositoryError, Segment,
};
use std::fs;

const SIMPLE_USER: &str = "class User {\n    fun greet(): String = \"hi\"\n}\n";

#[test]
fn replace_then_delete_greet() {
    let (dir, repo) = project(&[("User.kt", SIMPLE_USER)]);
    let greet = path("file:User.kt/class[User]/function[greet]");

    let result = repo.apply_modification(Modification::ReplaceElement {
        target_path: greet.clone(),
        content: "fun greet(): String = \"hello\"".into(),
    });
    match &result {
        ModificationResult::Success {
            affected_path,
            result_content,
            ..
        } => {
            assert_eq!(affected_path, &greet);
            assert!(result_content.as_deref().unwrap().contains("\"hello\""));
        }
        other => panic!("replace failed: {other:?}"),
    }
    assert!(repo.exists(&greet));
    assert!(repo.get_element(&greet).unwrap().content.contains("\"hello\""));
    assert!(fs::read_to_string(dir.path().join("User.kt"))
        .unwrap()
        .contains("fun greet(): String = \"hello\""));

    let deleted = repo.apply_modification(Modification::DeleteElement {
        target_path: greet.clone(),
    });
    assert!(deleted.is_success());
    assert!(!repo.exists(&greet));
    assert!(matches!(
        repo.get_element(&greet),
        Err(RepositoryError::NotFound { .. })
    ));
}

#[test]
fn created_element_is_locatable() {
    let (_dir, repo) = project(&[("src/User.kt", USER_KT)]);
    let user = path("file:src/User.kt/class[User]");

    let result = repo.apply_modification(Modification::CreateElement {
        target_path: user.clone(),
        kind: ElementKind::Function,
        content: "fun describe(): String {\n    return \"$name ($age)\"\n}".into(),
        position: InsertPosition::LastChild,
    });
    let created = user.child(Segment::new(ElementKind::Function, "describe"));
    match result {
        ModificationResult::Success { affected_path, .. } => assert_eq!(affected_path, created),
        other => panic!("create failed: {other:?}"),
    }

    let snapshot = repo.get_element(&created).unwrap();
    assert_eq!(
        snapshot.content,
        "fun describe(): String {\n        return \"$name ($age)\"\n    }"
    );

    let names: Vec<_> = repo
        .get_element(&user)
        .unwrap()
        .children
        .into_iter()
        .filter_map(|c| c.name)
        .collect();
    assert_eq!(names.last().map(String::as_str), Some("describe"));
}

#[test]
fn sibling_positions_use_the_parent() {
    let (_dir, repo) = project(&[("src/User.kt", USER_KT)]);
    let greet = path("file:src/User.kt/class[User]/function[greet]");

    for (position, name) in [
        (InsertPosition::Before, "beforeGreet"),
        (InsertPosition::After, "afterGreet"),
    ] {
        let result = repo.apply_modification(Modification::CreateElement {
            target_path: greet.clone(),
            kind: ElementKind::Function,
            content: format!("fun {name}() = Unit"),
            position,
        });
        assert!(result.is_success(), "{result:?}");
    }

    let functions: Vec<_> = repo
        .find_elements(
            &path("file:src/User.kt/class[User]"),
            Some(ElementKind::Function),
            None,
        )
        .unwrap()
        .into_iter()
        .filter_map(|s| s.name)
        .collect();
    assert_eq!(functions, vec!["beforeGreet", "greet", "afterGreet", "older"]);
}

#[test]
fn create_rejects_wrong_kind_and_garbage() {
    let (_dir, repo) = project(&[("User.kt", SIMPLE_USER)]);
    let before = repo.file_text("User.kt").unwrap();

    let wrong_kind = repo.apply_modification(Modification::CreateElement {
        target_path: path("file:User.kt/class[User]"),
        kind: ElementKind::Property,
        content: "fun nope() = 1".into(),
        position: InsertPosition::LastChild,
    });
    assert!(matches!(wrong_kind.error(), Some(RepositoryError::Parse(_))));

    let two = repo.apply_modification(Modification::CreateElement {
        target_path: path("file:User.kt/class[User]"),
        kind: ElementKind::Function,
        content: "fun a() = 1\nfun b() = 2".into(),
        position: InsertPosition::LastChild,
    });
    assert!(matches!(two.error(), Some(RepositoryError::Parse(_))));

    assert_eq!(repo.file_text("User.kt").unwrap(), before);
}

#[test]
fn multi_declaration_replace_adds_siblings() {
    let (_dir, repo) = project(&[("src/User.kt", USER_KT)]);
    let greet = path("file:src/User.kt/class[User]/function[greet]");

    let result = repo.apply_modification(Modification::ReplaceElement {
        target_path: greet.clone(),
        content: "fun greet(): String = salutation()\n\nfun salutation(): String = \"hello\"\n\nfun farewell(): String = \"bye\"".into(),
    });
    assert!(result.is_success(), "{result:?}");
    assert!(repo.exists(&greet));
    assert!(repo
        .get_element(&greet)
        .unwrap()
        .content
        .contains("salutation()"));

    let names: Vec<_> = repo
        .get_element(&path("file:src/User.kt/class[User]"))
        .unwrap()
        .children
        .into_iter()
        .filter_map(|c| c.name)
        .collect();
    let at = names.iter().position(|n| n == "greet").unwrap();
    assert_eq!(names[at + 1], "salutation");
    assert_eq!(names[at + 2], "farewell");
    assert_eq!(names[at + 3], "older");
}

#[test]
fn replace_with_unparseable_content_fails() {
    let (_dir, repo) = project(&[("User.kt", SIMPLE_USER)]);
    let result = repo.apply_modification(Modification::ReplaceElement {
        target_path: path("file:User.kt/class[User]/function[greet]"),
        content: "fun (((".into(),
    });
    assert!(matches!(result.error(), Some(RepositoryError::Parse(_))));
    assert_eq!(repo.file_text("User.kt").unwrap(), SIMPLE_USER);
}

#[test]
fn delete_then_recreate() {
    let (_dir, repo) = project(&[("src/User.kt", USER_KT)]);
    let init = path("file:src/User.kt/class[User]/init");

    assert!(repo
        .apply_modification(Modification::DeleteElement {
            target_path: init.clone()
        })
        .is_success());
    assert!(!repo.exists(&init));

    let again = repo.apply_modification(Modification::DeleteElement {
        target_path: init.clone(),
    });
    assert!(matches!(again.error(), Some(RepositoryError::NotFound { .. })));

    let recreated = repo.apply_modification(Modification::CreateElement {
        target_path: path("file:src/User.kt/class[User]"),
        kind: ElementKind::Init,
        content: "init {\n    println(name)\n}".into(),
        position: InsertPosition::FirstChild,
    });
    assert!(recreated.is_success(), "{recreated:?}");
    assert!(repo.get_element(&init).unwrap().content.contains("println(name)"));
}

#[test]
fn file_lifecycle() {
    let (dir, repo) = project(&[]);
    let file = path("file:src/Config.kt");

    let created = repo.apply_modification(Modification::CreateFile {
        path: file.clone(),
        content: "package demo\n\nobject Config".into(),
    });
    assert!(created.is_success(), "{created:?}");
    assert_eq!(
        fs::read_to_string(dir.path().join("src/Config.kt")).unwrap(),
        "package demo\n\nobject Config\n"
    );

    let duplicate = repo.apply_modification(Modification::CreateFile {
        path: file.clone(),
        content: String::new(),
    });
    assert!(matches!(
        duplicate.error(),
        Some(RepositoryError::InvalidOperation(_))
    ));

    let replaced = repo.apply_modification(Modification::ReplaceFile {
        path: file.clone(),
        content: "package demo\n\nobject Settings\n".into(),
    });
    assert!(replaced.is_success());
    assert!(repo.exists(&path("file:src/Config.kt/object[Settings]")));
    assert!(!repo.exists(&path("file:src/Config.kt/object[Config]")));

    let deleted = repo.apply_modification(Modification::DeleteFile { path: file.clone() });
    assert!(deleted.is_success());
    assert!(!repo.exists(&file));
    assert!(!dir.path().join("src/Config.kt").exists());

    let missing = repo.apply_modification(Modification::DeleteFile { path: file });
    assert!(matches!(missing.error(), Some(RepositoryError::NotFound { .. })));
}

#[test]
fn file_operations_need_file_paths() {
    let (_dir, repo) = project(&[("User.kt", SIMPLE_USER)]);
    let result = repo.apply_modification(Modification::DeleteFile {
        path: path("file:User.kt/class[User]"),
    });
    assert!(matches!(
        result.error(),
        Some(RepositoryError::InvalidOperation(_))
    ));
    assert!(repo.exists(&path("file:User.kt/class[User]")));
}

#[test]
fn raw_string_contents_survive_insertion() {
    let (_dir, repo) = project(&[("User.kt", SIMPLE_USER)]);
    let sql = "fun sql() = \"\"\"\nSELECT *   \nFROM t\n\"\"\"";

    let created = repo.apply_modification(Modification::CreateElement {
        target_path: path("file:User.kt/class[User]"),
        kind: ElementKind::Function,
        content: sql.into(),
        position: InsertPosition::LastChild,
    });
    assert!(created.is_success(), "{created:?}");
    let target = path("file:User.kt/class[User]/function[sql]");
    assert_eq!(repo.get_element(&target).unwrap().content, sql);

    let replacement = "fun sql() = \"\"\"\n  SELECT id\n    FROM users  \n\"\"\".trimIndent()";
    let replaced = repo.apply_modification(Modification::ReplaceElement {
        target_path: target.clone(),
        content: replacement.into(),
    });
    assert!(replaced.is_success(), "{replaced:?}");
    assert_eq!(repo.get_element(&target).unwrap().content, replacement);
}

#[test]
fn unnamed_declarations_cannot_be_created() {
    let (_dir, repo) = project(&[("Pairs.kt", "val third = 3\n")]);
    let result = repo.apply_modification(Modification::CreateElement {
        target_path: path("file:Pairs.kt"),
        kind: ElementKind::Property,
        content: "val (first, second) = 1 to 2".into(),
        position: InsertPosition::LastChild,
    });
    assert!(matches!(
        result.error(),
        Some(RepositoryError::InvalidOperation(_))
    ));
    assert_eq!(repo.file_text("Pairs.kt").unwrap(), "val third = 3\n");
}
