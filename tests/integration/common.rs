use kt_patcher::{EditorConfig, ElementPath, StructuralRepository};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

pub const USER_KT: &str = r#"package demo

import kotlin.math.max

/** A user of the system. */
class User(val name: String) {
    val age: Int = 0

    init {
        require(name.isNotEmpty())
    }

    fun greet(): String = "hi"

    fun older(other: User): Int = max(age, other.age)

    companion object {
        const val DEFAULT = "anon"
    }
}

enum class Role {
    ADMIN,
    GUEST
}
"#;

/// Create a project with the given files and open a persisting repository on it.
pub fn project(files: &[(&str, &str)]) -> (TempDir, StructuralRepository) {
    project_with(files, &EditorConfig::default())
}

pub fn project_with(files: &[(&str, &str)], config: &EditorConfig) -> (TempDir, StructuralRepository) {
    let dir = TempDir::new().unwrap();
    for (name, text) in files {
        write(dir.path(), name, text);
    }
    let repo = StructuralRepository::open(dir.path(), config).unwrap();
    (dir, repo)
}

pub fn write(root: &Path, name: &str, text: &str) {
    let path = root.join(name);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, text).unwrap();
}

pub fn path(raw: &str) -> ElementPath {
    ElementPath::parse(raw).unwrap()
}
