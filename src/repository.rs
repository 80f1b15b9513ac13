//! Structural repository: the public face of the editor.
//!
//! Reads resolve paths against the committed workspace under a shared
//! lock. Every [`Modification`] runs as its own write transaction on the
//! write queue, so a batch is applied item by item and a failing item never
//! undoes the ones before it.

use crate::config::EditorConfig;
use crate::format::{line_number, Reformatter};
use crate::imports::{self, ImportError, ImportOutcome};
use crate::mutator::{InsertPosition, Mutator};
use crate::navigator::{Navigator, Node};
use crate::path::{ElementKind, ElementPath, PathSyntaxError, Segment};
use crate::safety::WorkspaceGuard;
use crate::ts::TreeSitterError;
use crate::txn::{Transaction, TransactionError, WriteQueue};
use crate::workspace::{SourceTrees, Workspace, WorkspaceError};
use parking_lot::RwLock;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Minimum Jaro-Winkler similarity for a "did you mean" hint.
const SUGGESTION_THRESHOLD: f64 = 0.8;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error(transparent)]
    PathSyntax(#[from] PathSyntaxError),

    #[error("Not found: {path}{}", did_you_mean(.suggestion))]
    NotFound {
        path: String,
        suggestion: Option<String>,
    },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

fn did_you_mean(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(s) => format!(" (did you mean {s}?)"),
        None => String::new(),
    }
}

impl From<WorkspaceError> for RepositoryError {
    fn from(e: WorkspaceError) -> Self {
        match e {
            WorkspaceError::NotFound(file) => RepositoryError::NotFound {
                path: ElementPath::file(file).to_string(),
                suggestion: None,
            },
            WorkspaceError::AlreadyExists(_)
            | WorkspaceError::Safety(_)
            | WorkspaceError::SyntaxRegression(_) => {
                RepositoryError::InvalidOperation(e.to_string())
            }
            other => RepositoryError::Io(other.to_string()),
        }
    }
}

impl From<ImportError> for RepositoryError {
    fn from(e: ImportError) -> Self {
        match e {
            ImportError::MissingFile(file) => RepositoryError::NotFound {
                path: ElementPath::file(file).to_string(),
                suggestion: None,
            },
            ImportError::Scan(e) => RepositoryError::Io(format!("cannot read imports: {e}")),
            ImportError::Edit(e) => e.into(),
        }
    }
}

impl From<TransactionError> for RepositoryError {
    fn from(e: TransactionError) -> Self {
        RepositoryError::Io(e.to_string())
    }
}

impl From<TreeSitterError> for RepositoryError {
    fn from(e: TreeSitterError) -> Self {
        RepositoryError::Validation(e.to_string())
    }
}

/// One structural edit, as produced by the content generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Modification {
    CreateFile {
        path: ElementPath,
        #[serde(default)]
        content: String,
    },
    ReplaceFile {
        path: ElementPath,
        content: String,
    },
    DeleteFile {
        path: ElementPath,
    },
    CreateElement {
        target_path: ElementPath,
        kind: ElementKind,
        content: String,
        #[serde(default)]
        position: InsertPosition,
    },
    ReplaceElement {
        target_path: ElementPath,
        content: String,
    },
    DeleteElement {
        target_path: ElementPath,
    },
    AddImport {
        target_path: ElementPath,
        import_path: String,
    },
    RemoveImport {
        target_path: ElementPath,
        import_path: String,
    },
}

impl Modification {
    /// The path this modification addresses.
    pub fn target(&self) -> &ElementPath {
        match self {
            Modification::CreateFile { path, .. }
            | Modification::ReplaceFile { path, .. }
            | Modification::DeleteFile { path } => path,
            Modification::CreateElement { target_path, .. }
            | Modification::ReplaceElement { target_path, .. }
            | Modification::DeleteElement { target_path }
            | Modification::AddImport { target_path, .. }
            | Modification::RemoveImport { target_path, .. } => target_path,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Modification::CreateFile { .. } => "create_file",
            Modification::ReplaceFile { .. } => "replace_file",
            Modification::DeleteFile { .. } => "delete_file",
            Modification::CreateElement { .. } => "create_element",
            Modification::ReplaceElement { .. } => "replace_element",
            Modification::DeleteElement { .. } => "delete_element",
            Modification::AddImport { .. } => "add_import",
            Modification::RemoveImport { .. } => "remove_import",
        }
    }

    /// Transaction label, used for undo grouping in logs.
    pub fn label(&self) -> String {
        format!("{} {}", self.type_name(), self.target())
    }

    /// Shape checks that need no tree access.
    fn check(&self) -> Result<(), RepositoryError> {
        match self {
            Modification::CreateFile { path, .. }
            | Modification::ReplaceFile { path, .. }
            | Modification::DeleteFile { path }
                if !path.is_file() =>
            {
                Err(RepositoryError::InvalidOperation(format!(
                    "{} expects a file path, got {path}",
                    self.type_name()
                )))
            }
            Modification::CreateElement {
                target_path,
                position,
                ..
            } => {
                if position.is_sibling() && target_path.is_file() {
                    return Err(RepositoryError::InvalidOperation(format!(
                        "{position:?} needs a declaration target, got file {target_path}"
                    )));
                }
                let target_kind = target_path
                    .last_segment()
                    .map_or(ElementKind::File, |s| s.kind);
                if !position.is_sibling() && !target_kind.is_container() {
                    return Err(RepositoryError::InvalidOperation(format!(
                        "{target_kind} cannot contain declarations"
                    )));
                }
                Ok(())
            }
            Modification::DeleteElement { target_path } if target_path.is_file() => {
                Err(RepositoryError::InvalidOperation(format!(
                    "use delete_file to delete {target_path}"
                )))
            }
            Modification::AddImport { import_path, .. }
            | Modification::RemoveImport { import_path, .. }
                if imports::normalize_import(import_path).is_empty() =>
            {
                Err(RepositoryError::Validation("import path is empty".to_string()))
            }
            _ => Ok(()),
        }
    }
}

/// Outcome of one modification. Produced once per input, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModificationResult {
    Success {
        modification: Modification,
        affected_path: ElementPath,
        /// Text of the resulting node, or of the whole file for file-level
        /// edits. `None` after deletions.
        result_content: Option<String>,
        /// Set when the edit was a no-op because its effect was already there.
        already_present: bool,
    },
    Failure {
        modification: Modification,
        error: RepositoryError,
    },
}

impl ModificationResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ModificationResult::Success { .. })
    }

    pub fn modification(&self) -> &Modification {
        match self {
            ModificationResult::Success { modification, .. }
            | ModificationResult::Failure { modification, .. } => modification,
        }
    }

    pub fn error(&self) -> Option<&RepositoryError> {
        match self {
            ModificationResult::Failure { error, .. } => Some(error),
            ModificationResult::Success { .. } => None,
        }
    }
}

/// Owned copy of a node, safe to keep after the transaction that read it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ElementSnapshot {
    pub path: ElementPath,
    pub kind: ElementKind,
    pub name: Option<String>,
    pub content: String,
    pub byte_range: Range<usize>,
    /// 1-based.
    pub start_line: usize,
    pub end_line: usize,
    pub children: Vec<ChildSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChildSummary {
    pub kind: ElementKind,
    pub name: Option<String>,
    pub path: ElementPath,
}

struct Applied {
    path: ElementPath,
    content: Option<String>,
    already_present: bool,
}

impl Applied {
    fn new(path: ElementPath, content: Option<String>) -> Self {
        Self {
            path,
            content,
            already_present: false,
        }
    }
}

pub struct StructuralRepository {
    workspace: Arc<RwLock<Workspace>>,
    queue: WriteQueue,
    mutator: Mutator,
}

impl StructuralRepository {
    pub fn new(workspace: Workspace, reformatter: Arc<dyn Reformatter>) -> Result<Self, RepositoryError> {
        let workspace = Arc::new(RwLock::new(workspace));
        let queue = WriteQueue::new(Arc::clone(&workspace))
            .map_err(|e| RepositoryError::Io(format!("failed to start write worker: {e}")))?;
        Ok(Self {
            workspace,
            queue,
            mutator: Mutator::new(reformatter),
        })
    }

    /// Open the project at `root` with the given editor settings.
    pub fn open(root: impl AsRef<Path>, config: &EditorConfig) -> Result<Self, RepositoryError> {
        let guard = WorkspaceGuard::new(root)
            .map_err(WorkspaceError::from)?
            .with_forbidden_dirs(config.forbidden_dirs.iter().cloned());
        let workspace = Workspace::new(guard, config.persist);
        Self::new(workspace, Arc::new(config.reformatter()))
    }

    pub fn root(&self) -> std::path::PathBuf {
        self.workspace.read().root().to_path_buf()
    }

    /// Current committed text of `file`.
    pub fn file_text(&self, file: &str) -> Option<String> {
        let workspace = self.workspace.read();
        let key = workspace.resolve_key(file)?;
        workspace.document(&key).map(|doc| doc.text().to_string())
    }

    pub fn get_element(&self, path: &ElementPath) -> Result<ElementSnapshot, RepositoryError> {
        let workspace = self.workspace.read();
        let navigator = Navigator::new(&*workspace);
        let node = navigator
            .find_element(path)
            .ok_or_else(|| not_found(&navigator, path))?;
        snapshot(&navigator, &node)
            .ok_or_else(|| RepositoryError::Io(format!("failed to read {path}")))
    }

    /// Direct children of `base`, optionally filtered by kind and by a
    /// regular expression matched against the name.
    pub fn find_elements(
        &self,
        base: &ElementPath,
        kind: Option<ElementKind>,
        name_pattern: Option<&str>,
    ) -> Result<Vec<ElementSnapshot>, RepositoryError> {
        let pattern = name_pattern
            .map(Regex::new)
            .transpose()
            .map_err(|e| RepositoryError::Validation(format!("invalid name pattern: {e}")))?;

        let workspace = self.workspace.read();
        let navigator = Navigator::new(&*workspace);
        let parent = navigator
            .find_element(base)
            .ok_or_else(|| not_found(&navigator, base))?;

        Ok(navigator
            .children(&parent)
            .iter()
            .filter(|child| kind.map_or(true, |k| child.kind == k))
            .filter(|child| match (&pattern, child.name.as_deref()) {
                (None, _) => true,
                (Some(re), Some(name)) => re.is_match(name),
                (Some(_), None) => false,
            })
            .filter_map(|child| snapshot(&navigator, child))
            .collect())
    }

    pub fn exists(&self, path: &ElementPath) -> bool {
        let workspace = self.workspace.read();
        Navigator::new(&*workspace).find_element(path).is_some()
    }

    /// Heuristic check that `content` holds at least one declaration.
    pub fn validate_syntax(&self, content: &str) -> Result<(), RepositoryError> {
        Ok(crate::ts::validate_syntax(content)?)
    }

    pub fn apply_modification(&self, modification: Modification) -> ModificationResult {
        match self.run(&modification) {
            Ok(applied) => {
                info!(
                    kind = modification.type_name(),
                    path = %applied.path,
                    already_present = applied.already_present,
                    "modification applied"
                );
                ModificationResult::Success {
                    modification,
                    affected_path: applied.path,
                    result_content: applied.content,
                    already_present: applied.already_present,
                }
            }
            Err(error) => {
                warn!(
                    kind = modification.type_name(),
                    path = %modification.target(),
                    error = %error,
                    "modification failed"
                );
                ModificationResult::Failure {
                    modification,
                    error,
                }
            }
        }
    }

    /// Apply each modification in its own transaction, in order. Returns
    /// exactly one result per input.
    pub fn apply_modifications(&self, modifications: Vec<Modification>) -> Vec<ModificationResult> {
        modifications
            .into_iter()
            .map(|m| self.apply_modification(m))
            .collect()
    }

    fn run(&self, modification: &Modification) -> Result<Applied, RepositoryError> {
        modification.check()?;
        let mutator = self.mutator.clone();
        let owned = modification.clone();
        self.queue
            .submit(modification.label(), move |txn| execute(&mutator, txn, &owned))
            .wait()
    }
}

fn execute(
    mutator: &Mutator,
    txn: &mut Transaction<'_>,
    modification: &Modification,
) -> Result<Applied, RepositoryError> {
    match modification {
        Modification::CreateFile { path, content } => {
            let key = txn.key_for(path.file_path())?;
            let node = mutator.create_file(txn, &key, content)?;
            Ok(Applied::new(ElementPath::file(key), text_of(txn, &node)))
        }
        Modification::ReplaceFile { path, content } => {
            let file = resolve(txn, path)?;
            let node = mutator
                .replace_file_content(txn, &file, content)
                .ok_or_else(|| RepositoryError::Io(format!("failed to replace {path}")))?;
            Ok(Applied::new(ElementPath::file(node.file.clone()), text_of(txn, &node)))
        }
        Modification::DeleteFile { path } => {
            let key = txn.key_for(path.file_path())?;
            mutator.delete_file(txn, &key)?;
            Ok(Applied::new(ElementPath::file(key), None))
        }
        Modification::CreateElement {
            target_path,
            kind,
            content,
            position,
        } => {
            let target = resolve(txn, target_path)?;
            let node = mutator
                .add_element(txn, &target, content, *kind, *position)
                .ok_or_else(|| {
                    RepositoryError::Parse(format!(
                        "content is not a single {kind} declaration that fits at {target_path}"
                    ))
                })?;
            Ok(Applied::new(path_of(txn, &node)?, text_of(txn, &node)))
        }
        Modification::ReplaceElement {
            target_path,
            content,
        } => {
            let target = resolve(txn, target_path)?;
            let kind = target_path
                .last_segment()
                .map_or(ElementKind::File, |s| s.kind);
            let node = mutator
                .replace_element(txn, &target, content, kind)
                .ok_or_else(|| {
                    RepositoryError::Parse(format!(
                        "content does not parse as a replacement for {target_path}"
                    ))
                })?;
            Ok(Applied::new(path_of(txn, &node)?, text_of(txn, &node)))
        }
        Modification::DeleteElement { target_path } => {
            let target = resolve(txn, target_path)?;
            mutator.delete_element(txn, &target).ok_or_else(|| {
                RepositoryError::InvalidOperation(format!(
                    "deleting {target_path} would leave the file unparseable"
                ))
            })?;
            Ok(Applied::new(target_path.clone(), None))
        }
        Modification::AddImport {
            target_path,
            import_path,
        } => {
            let file = resolve_file(txn, target_path)?;
            let outcome = imports::add_import(txn, &file.file, import_path)?;
            Ok(Applied {
                path: ElementPath::file(file.file.clone()),
                content: current_text(txn, &file.file),
                already_present: outcome == ImportOutcome::AlreadyPresent,
            })
        }
        Modification::RemoveImport {
            target_path,
            import_path,
        } => {
            let file = resolve_file(txn, target_path)?;
            let removed = imports::remove_import(txn, &file.file, import_path)?;
            if !removed {
                return Err(RepositoryError::InvalidOperation(format!(
                    "import {import_path} not found in {}",
                    ElementPath::file(file.file.clone())
                )));
            }
            Ok(Applied::new(
                ElementPath::file(file.file.clone()),
                current_text(txn, &file.file),
            ))
        }
    }
}

fn resolve(txn: &Transaction<'_>, path: &ElementPath) -> Result<Node, RepositoryError> {
    let navigator = Navigator::new(txn);
    navigator
        .find_element(path)
        .ok_or_else(|| not_found(&navigator, path))
}

fn resolve_file(txn: &Transaction<'_>, path: &ElementPath) -> Result<Node, RepositoryError> {
    let navigator = Navigator::new(txn);
    navigator.find_file(path).ok_or_else(|| RepositoryError::NotFound {
        path: ElementPath::file(path.file_path()).to_string(),
        suggestion: None,
    })
}

fn path_of(txn: &Transaction<'_>, node: &Node) -> Result<ElementPath, RepositoryError> {
    Navigator::new(txn)
        .path_of(node)
        .ok_or_else(|| {
            RepositoryError::InvalidOperation(format!(
                "resulting declaration in {} has no name to address it by",
                node.file
            ))
        })
}

fn text_of(txn: &Transaction<'_>, node: &Node) -> Option<String> {
    Navigator::new(txn).text(node)
}

fn current_text(txn: &Transaction<'_>, key: &str) -> Option<String> {
    txn.document(key).map(|doc| doc.text().to_string())
}

/// Build a NotFound error, suggesting the closest name next to the first
/// segment that failed to resolve.
fn not_found<S: SourceTrees + ?Sized>(navigator: &Navigator<'_, S>, path: &ElementPath) -> RepositoryError {
    let suggestion = navigator.resolve_prefix(path).and_then(|(deepest, matched)| {
        let missing = path.segments().get(matched)?;
        let wanted = missing.name.as_deref()?;
        let parent_path = navigator.path_of(&deepest)?;

        navigator
            .children(&deepest)
            .into_iter()
            .filter_map(|child| {
                let name = child.name?;
                let score = strsim::jaro_winkler(wanted, &name);
                (score >= SUGGESTION_THRESHOLD).then_some((score, child.kind, name))
            })
            .max_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, kind, name)| parent_path.child(Segment::new(kind, name)).to_string())
    });

    RepositoryError::NotFound {
        path: path.to_string(),
        suggestion,
    }
}

fn snapshot<S: SourceTrees + ?Sized>(navigator: &Navigator<'_, S>, node: &Node) -> Option<ElementSnapshot> {
    let doc = navigator.document(node)?;
    let path = navigator.path_of(node)?;
    let content = doc.text().get(node.range.clone())?.to_string();

    let children = navigator
        .children(node)
        .into_iter()
        .filter_map(|child| {
            Some(ChildSummary {
                path: navigator.path_of(&child)?,
                kind: child.kind,
                name: child.name,
            })
        })
        .collect();

    Some(ElementSnapshot {
        path,
        kind: node.kind,
        name: node.name.clone(),
        content,
        byte_range: node.range.clone(),
        start_line: line_number(doc.text(), node.range.start),
        end_line: line_number(doc.text(), node.range.end),
        children,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::IndentReformatter;

    fn repository(files: &[(&str, &str)]) -> (tempfile::TempDir, StructuralRepository) {
        let dir = tempfile::tempdir().unwrap();
        for (name, text) in files {
            let path = dir.path().join(name);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, text).unwrap();
        }
        let guard = WorkspaceGuard::new(dir.path()).unwrap();
        let repo = StructuralRepository::new(
            Workspace::new(guard, false),
            Arc::new(IndentReformatter::default()),
        )
        .unwrap();
        (dir, repo)
    }

    fn path(raw: &str) -> ElementPath {
        ElementPath::parse(raw).unwrap()
    }

    #[test]
    fn modification_serde_shape() {
        let json = r#"{
            "type": "create_element",
            "target_path": "file:User.kt/class[User]",
            "kind": "fun",
            "content": "fun a() = 1",
            "position": "FIRST_CHILD"
        }"#;
        let m: Modification = serde_json::from_str(json).unwrap();
        assert_eq!(
            m,
            Modification::CreateElement {
                target_path: path("file:User.kt/class[User]"),
                kind: ElementKind::Function,
                content: "fun a() = 1".into(),
                position: InsertPosition::FirstChild,
            }
        );

        let delete: Modification =
            serde_json::from_str(r#"{"type":"delete_element","target_path":"file:A.kt/class[A]"}"#)
                .unwrap();
        assert_eq!(delete.type_name(), "delete_element");
    }

    #[test]
    fn snapshot_fields() {
        let (_dir, repo) = repository(&[(
            "User.kt",
            "class User {\n    fun greet(): String = \"hi\"\n}\n",
        )]);
        let user = repo.get_element(&path("file:User.kt/class[User]")).unwrap();
        assert_eq!(user.kind, ElementKind::Class);
        assert_eq!((user.start_line, user.end_line), (1, 3));
        assert_eq!(user.children.len(), 1);
        assert_eq!(
            user.children[0].path.to_string(),
            "file:User.kt/class[User]/function[greet]"
        );
    }

    #[test]
    fn not_found_suggests_close_name() {
        let (_dir, repo) = repository(&[("User.kt", "class User {\n    fun greet() = 1\n}\n")]);
        let err = repo
            .get_element(&path("file:User.kt/class[User]/function[gret]"))
            .unwrap_err();
        assert_eq!(
            err,
            RepositoryError::NotFound {
                path: "file:User.kt/class[User]/function[gret]".into(),
                suggestion: Some("file:User.kt/class[User]/function[greet]".into()),
            }
        );
        assert!(err.to_string().contains("did you mean"));
    }

    #[test]
    fn find_elements_filters_direct_children() {
        let (_dir, repo) = repository(&[(
            "A.kt",
            "class A {\n    val id = 1\n    fun getName() = \"\"\n    fun getAge() = 0\n    fun reset() {}\n    class Inner {\n        fun getDeep() = 0\n    }\n}\n",
        )]);
        let base = path("file:A.kt/class[A]");

        let getters = repo
            .find_elements(&base, Some(ElementKind::Function), Some("^get"))
            .unwrap();
        let names: Vec<_> = getters.iter().filter_map(|s| s.name.as_deref()).collect();
        assert_eq!(names, vec!["getName", "getAge"]);

        assert_eq!(repo.find_elements(&base, None, None).unwrap().len(), 5);
        assert!(matches!(
            repo.find_elements(&base, None, Some("(")),
            Err(RepositoryError::Validation(_))
        ));
        assert!(matches!(
            repo.find_elements(&path("file:A.kt/class[B]"), None, None),
            Err(RepositoryError::NotFound { .. })
        ));
    }

    #[test]
    fn shape_checks() {
        let (_dir, repo) = repository(&[("A.kt", "class A {\n    val x = 1\n}\n")]);

        let sibling_of_file = repo.apply_modification(Modification::CreateElement {
            target_path: path("file:A.kt"),
            kind: ElementKind::Function,
            content: "fun f() = 1".into(),
            position: InsertPosition::After,
        });
        assert!(matches!(
            sibling_of_file.error(),
            Some(RepositoryError::InvalidOperation(_))
        ));

        let into_property = repo.apply_modification(Modification::CreateElement {
            target_path: path("file:A.kt/class[A]/property[x]"),
            kind: ElementKind::Function,
            content: "fun f() = 1".into(),
            position: InsertPosition::LastChild,
        });
        assert!(matches!(
            into_property.error(),
            Some(RepositoryError::InvalidOperation(_))
        ));

        let delete_file_path = repo.apply_modification(Modification::DeleteElement {
            target_path: path("file:A.kt"),
        });
        assert!(matches!(
            delete_file_path.error(),
            Some(RepositoryError::InvalidOperation(_))
        ));
    }

    #[test]
    fn validate_syntax_reports_validation_error() {
        let (_dir, repo) = repository(&[]);
        assert!(repo.validate_syntax("").is_ok());
        assert!(repo.validate_syntax("fun ok() = 1").is_ok());
        assert!(matches!(
            repo.validate_syntax("just some words"),
            Err(RepositoryError::Validation(_))
        ));
    }
}
