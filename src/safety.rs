use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Build outputs and Gradle state, never edited.
const BUILD_DIRS: &[&str] = &["build", ".gradle"];

/// Dependency caches under the user's home directory.
const HOME_CACHES: &[&str] = &[".gradle", ".m2"];

/// Maps file names from element paths to workspace keys and keeps edits
/// inside the project.
///
/// Generators emit project-relative paths, absolute paths, and
/// project-relative paths with a leading `/`; all of them fold into one
/// `/`-separated key. Keys that climb out of the root, resolve through a
/// symlink to somewhere else, or land in a build or cache directory are
/// refused.
#[derive(Debug, Clone)]
pub struct WorkspaceGuard {
    root: PathBuf,
    /// Compared against the first component of a key
    forbidden_dirs: Vec<String>,
    /// Compared against canonical paths of existing files
    forbidden_trees: Vec<PathBuf>,
}

#[derive(Error, Debug)]
pub enum SafetyError {
    #[error("{} escapes the workspace at {}", .path.display(), .root.display())]
    Escapes { path: PathBuf, root: PathBuf },

    #[error("{} lies under {}, which is never edited", .path.display(), .dir.display())]
    Forbidden { path: PathBuf, dir: PathBuf },

    #[error("path does not name a file")]
    NoFile,

    #[error("cannot resolve path: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkspaceGuard {
    /// Guard `root`, which must exist; symlinks in it are resolved first.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, SafetyError> {
        let root = root.as_ref().canonicalize()?;
        let forbidden_trees = home::home_dir()
            .map(|home| {
                HOME_CACHES
                    .iter()
                    .filter_map(|dir| home.join(dir).canonicalize().ok())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            root,
            forbidden_dirs: BUILD_DIRS.iter().map(|d| d.to_string()).collect(),
            forbidden_trees,
        })
    }

    /// Also refuse keys whose first component is one of `dirs`.
    pub fn with_forbidden_dirs<I, S>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for dir in dirs {
            let dir = dir.into().trim_matches('/').to_string();
            if !dir.is_empty() && !self.forbidden_dirs.contains(&dir) {
                self.forbidden_dirs.push(dir);
            }
        }
        self
    }

    /// Also refuse files whose canonical path lies under `tree`.
    pub fn forbid_tree(mut self, tree: impl AsRef<Path>) -> Self {
        let tree = tree.as_ref();
        self.forbidden_trees
            .push(tree.canonicalize().unwrap_or_else(|_| tree.to_path_buf()));
        self
    }

    pub fn workspace_root(&self) -> &Path {
        &self.root
    }

    pub fn absolute(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    pub fn relative_key(&self, path: &str) -> Result<String, SafetyError> {
        let given = Path::new(path.trim());
        if given.as_os_str().is_empty() {
            return Err(SafetyError::NoFile);
        }

        // `/src/User.kt` is project-relative unless it really is under root
        let relative: PathBuf = match given.strip_prefix(&self.root) {
            Ok(inside) => inside.to_path_buf(),
            Err(_) => given
                .components()
                .filter(|c| !matches!(c, Component::RootDir | Component::Prefix(_)))
                .collect(),
        };

        let mut parts: Vec<String> = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
                Component::ParentDir if parts.pop().is_some() => {}
                Component::ParentDir => {
                    return Err(SafetyError::Escapes {
                        path: given.to_path_buf(),
                        root: self.root.clone(),
                    })
                }
                _ => {}
            }
        }

        let Some(first) = parts.first() else {
            return Err(SafetyError::NoFile);
        };
        if self.forbidden_dirs.contains(first) {
            return Err(SafetyError::Forbidden {
                path: given.to_path_buf(),
                dir: self.root.join(first),
            });
        }

        let key = parts.join("/");
        let on_disk = self.absolute(&key);
        if on_disk.exists() {
            self.check_resolved(&on_disk.canonicalize()?)?;
        }
        Ok(key)
    }

    fn check_resolved(&self, resolved: &Path) -> Result<(), SafetyError> {
        if !resolved.starts_with(&self.root) {
            return Err(SafetyError::Escapes {
                path: resolved.to_path_buf(),
                root: self.root.clone(),
            });
        }
        match self.forbidden_trees.iter().find(|t| resolved.starts_with(t)) {
            Some(tree) => Err(SafetyError::Forbidden {
                path: resolved.to_path_buf(),
                dir: tree.clone(),
            }),
            None => Ok(()),
        }
    }
}
