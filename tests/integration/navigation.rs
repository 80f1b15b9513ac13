use crate::common::{path, project, USER_KT};
use kt_patcher::{ElementKind, ElementPath, RepositoryError};

#[test]
fn get_element_snapshot() {
    let (_dir, repo) = project(&[("src/User.kt", USER_KT)]);

    let user = repo.get_element(&path("file:src/User.kt/class[User]")).unwrap();
    assert_eq!(user.kind, ElementKind::Class);
    assert_eq!(user.name.as_deref(), Some("User"));
    assert!(user.content.starts_with("/** A user of the system. */"));
    assert_eq!(user.start_line, 5);

    let kinds: Vec<_> = user.children.iter().map(|c| c.kind).collect();
    assert_eq!(
        kinds,
        vec![
            ElementKind::Constructor,
            ElementKind::Property,
            ElementKind::Init,
            ElementKind::Function,
            ElementKind::Function,
            ElementKind::CompanionObject,
        ]
    );
    assert_eq!(
        user.children[0].path.to_string(),
        "file:src/User.kt/class[User]/constructor[primary]"
    );
}

#[test]
fn file_path_forms() {
    let (_dir, repo) = project(&[("src/User.kt", USER_KT)]);
    assert!(repo.exists(&path("file:src/User.kt")));
    assert!(repo.exists(&path("file:/src/User.kt")));
    assert!(repo.exists(&path("file:./src/User.kt/class[User]")));
    assert!(!repo.exists(&path("file:User.kt")));
}

#[test]
fn kind_is_part_of_the_match_key() {
    let (_dir, repo) = project(&[("src/User.kt", USER_KT)]);
    assert!(repo.exists(&path("file:src/User.kt/enum[Role]")));
    assert!(!repo.exists(&path("file:src/User.kt/class[Role]")));
    assert!(!repo.exists(&path("file:src/User.kt/interface[User]")));
    assert!(repo.exists(&path("file:src/User.kt/class[User]/companion_object")));
    assert!(!repo.exists(&path("file:src/User.kt/class[User]/object[Companion]")));
}

#[test]
fn synonyms_resolve_to_the_same_node() {
    let (_dir, repo) = project(&[("src/User.kt", USER_KT)]);
    let a = repo
        .get_element(&path("file:src/User.kt/class[User]/function[greet]"))
        .unwrap();
    let b = repo
        .get_element(&path("file:src/User.kt/CLASS[User]/fun[greet]"))
        .unwrap();
    assert_eq!(a, b);

    let age = repo
        .get_element(&path("file:src/User.kt/class[User]/val[age]"))
        .unwrap();
    assert_eq!(age.path.to_string(), "file:src/User.kt/class[User]/property[age]");
}

#[test]
fn find_elements_is_not_recursive() {
    let (_dir, repo) = project(&[("src/User.kt", USER_KT)]);
    let base = path("file:src/User.kt");

    let top: Vec<_> = repo
        .find_elements(&base, None, None)
        .unwrap()
        .into_iter()
        .filter_map(|s| s.name)
        .collect();
    assert_eq!(top, vec!["User", "Role"]);

    let functions = repo
        .find_elements(&base, Some(ElementKind::Function), None)
        .unwrap();
    assert!(functions.is_empty());

    let entries = repo
        .find_elements(&path("file:src/User.kt/enum[Role]"), None, Some("MIN"))
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name.as_deref(), Some("ADMIN"));
}

#[test]
fn missing_elements_are_not_found() {
    let (_dir, repo) = project(&[("src/User.kt", USER_KT)]);

    let err = repo
        .get_element(&path("file:src/User.kt/class[Usr]/function[greet]"))
        .unwrap_err();
    match err {
        RepositoryError::NotFound { path, suggestion } => {
            assert_eq!(path, "file:src/User.kt/class[Usr]/function[greet]");
            assert_eq!(suggestion.as_deref(), Some("file:src/User.kt/class[User]"));
        }
        other => panic!("expected NotFound, got {other:?}"),
    }

    assert!(matches!(
        repo.get_element(&path("file:src/Nope.kt")),
        Err(RepositoryError::NotFound { suggestion: None, .. })
    ));
}

#[test]
fn child_paths_always_parse() {
    let (_dir, repo) = project(&[(
        "Pairs.kt",
        "val (first, second) = 1 to 2\n\nval third = 3\n\nfun sum() = first + second + third\n",
    )]);

    let file = repo.get_element(&path("file:Pairs.kt")).unwrap();
    let names: Vec<_> = file.children.iter().filter_map(|c| c.name.as_deref()).collect();
    assert_eq!(names, vec!["third", "sum"]);
    for child in &file.children {
        let reparsed = ElementPath::parse(&child.path.to_string()).unwrap();
        assert_eq!(reparsed, child.path);
        assert!(repo.exists(&reparsed));
    }

    let listed = repo.find_elements(&path("file:Pairs.kt"), None, None).unwrap();
    assert_eq!(listed.len(), 2);
}
