use crate::common::{path, project_with, write};
use kt_patcher::config::load_workspace_config;
use kt_patcher::{EditorConfig, ElementKind, InsertPosition, Modification, RepositoryError, StructuralRepository};
use std::fs;
use tempfile::TempDir;

const A: &str = "class A {\n    fun a() = 1\n}\n";

#[test]
fn in_memory_workspace_leaves_disk_alone() {
    let config = EditorConfig {
        persist: false,
        ..EditorConfig::default()
    };
    let (dir, repo) = project_with(&[("A.kt", A)], &config);

    let result = repo.apply_modification(Modification::DeleteElement {
        target_path: path("file:A.kt/class[A]/function[a]"),
    });
    assert!(result.is_success());
    assert!(!repo.exists(&path("file:A.kt/class[A]/function[a]")));
    assert_eq!(fs::read_to_string(dir.path().join("A.kt")).unwrap(), A);
}

#[test]
fn workspace_config_controls_indentation() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "kt-patcher.toml", "indent = \"\\t\"\n");
    write(dir.path(), "A.kt", "class A {\n\tfun a() = 1\n}\n");

    let config = load_workspace_config(dir.path()).unwrap();
    assert_eq!(config.indent, "\t");
    let repo = StructuralRepository::open(dir.path(), &config).unwrap();

    let result = repo.apply_modification(Modification::CreateElement {
        target_path: path("file:A.kt/class[A]"),
        kind: ElementKind::Function,
        content: "fun b() {\n\treturn\n}".into(),
        position: InsertPosition::LastChild,
    });
    assert!(result.is_success(), "{result:?}");
    assert_eq!(
        fs::read_to_string(dir.path().join("A.kt")).unwrap(),
        "class A {\n\tfun a() = 1\n\n\tfun b() {\n\t\treturn\n\t}\n}\n"
    );
}

#[test]
fn guarded_directories_are_rejected() {
    let config = EditorConfig {
        forbidden_dirs: vec!["generated".into()],
        ..EditorConfig::default()
    };
    let (dir, repo) = project_with(&[("generated/Gen.kt", "class Gen\n")], &config);

    let result = repo.apply_modification(Modification::CreateFile {
        path: path("file:build/Out.kt"),
        content: "class Out".into(),
    });
    assert!(matches!(
        result.error(),
        Some(RepositoryError::InvalidOperation(_))
    ));
    assert!(!dir.path().join("build/Out.kt").exists());

    assert!(!repo.exists(&path("file:generated/Gen.kt")));

    let escape = repo.apply_modification(Modification::CreateFile {
        path: path("file:../Escape.kt"),
        content: "class Escape".into(),
    });
    assert!(!escape.is_success());
}
