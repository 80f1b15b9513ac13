//! In-memory document table over a project directory.
//!
//! The workspace stands in for the host editor's live PSI: each file is a
//! [`Document`] holding its text, a generation counter and a lazily built
//! declaration outline. Documents are loaded from disk on first access and
//! written back atomically when a transaction commits.

use crate::edit::atomic_write;
use crate::edit::EditError;
use crate::safety::{SafetyError, WorkspaceGuard};
use crate::ts::Outline;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum WorkspaceError {
    #[error(transparent)]
    Safety(#[from] SafetyError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("File already exists: {0}")]
    AlreadyExists(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("File is not valid UTF-8: {0}")]
    NotUtf8(String),

    #[error(transparent)]
    Edit(#[from] EditError),

    #[error("Edit would introduce syntax errors into {0}")]
    SyntaxRegression(String),
}

/// One source file as the editor sees it.
#[derive(Debug)]
pub struct Document {
    key: String,
    text: String,
    generation: u64,
    outline: OnceLock<Outline>,
}

impl Document {
    pub(crate) fn new(key: impl Into<String>, text: impl Into<String>, generation: u64) -> Self {
        Self {
            key: key.into(),
            text: text.into(),
            generation,
            outline: OnceLock::new(),
        }
    }

    /// Normalized project-relative path.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Changes on every text change. Node handles carry the generation they
    /// were resolved against.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Declaration outline, built on first use.
    pub fn outline(&self) -> &Outline {
        self.outline.get_or_init(|| match Outline::build(&self.text) {
            Ok(outline) => outline,
            Err(e) => {
                warn!(file = %self.key, error = %e, "outline build failed");
                Outline::root_only(self.text.len())
            }
        })
    }
}

/// Read access to live declaration trees, keyed by normalized file path.
///
/// Implemented by the committed [`Workspace`] and by in-flight
/// transactions, which see their own staged documents first.
pub trait SourceTrees {
    /// Normalize a project-relative or absolute-prefixed file path.
    fn resolve_key(&self, file: &str) -> Option<String>;

    /// The document stored under `key`, if the file exists.
    fn document(&self, key: &str) -> Option<Arc<Document>>;
}

/// Documents changed by one transaction. `None` marks a deletion.
pub(crate) type Staged = BTreeMap<String, Option<Arc<Document>>>;

#[derive(Debug)]
pub struct Workspace {
    guard: WorkspaceGuard,
    persist: bool,
    /// Loaded documents. `None` is a tombstone for a deleted file.
    documents: Mutex<HashMap<String, Option<Arc<Document>>>>,
    generation: AtomicU64,
}

impl Workspace {
    pub fn new(guard: WorkspaceGuard, persist: bool) -> Self {
        Self {
            guard,
            persist,
            documents: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(1),
        }
    }

    /// Open the directory at `root`, persisting committed changes to disk.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, WorkspaceError> {
        Ok(Self::new(WorkspaceGuard::new(root)?, true))
    }

    pub fn root(&self) -> &Path {
        self.guard.workspace_root()
    }

    pub fn key_for(&self, file: &str) -> Result<String, WorkspaceError> {
        Ok(self.guard.relative_key(file)?)
    }

    pub(crate) fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::Relaxed)
    }

    /// Load `key`, from the table or from disk.
    pub fn load(&self, key: &str) -> Result<Option<Arc<Document>>, WorkspaceError> {
        let mut documents = self.documents.lock();
        if let Some(entry) = documents.get(key) {
            return Ok(entry.clone());
        }

        let path = self.guard.absolute(key);
        if path.is_dir() {
            return Ok(None);
        }
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(WorkspaceError::Io { path, source }),
        };
        let text = String::from_utf8(bytes).map_err(|_| WorkspaceError::NotUtf8(key.to_string()))?;

        debug!(file = %key, bytes = text.len(), "loaded document");
        let doc = Arc::new(Document::new(key, text, self.next_generation()));
        documents.insert(key.to_string(), Some(Arc::clone(&doc)));
        Ok(Some(doc))
    }

    /// Publish staged documents, writing them through to disk when the
    /// workspace persists.
    pub(crate) fn commit(&mut self, label: &str, staged: Staged) -> Result<(), WorkspaceError> {
        if staged.is_empty() {
            return Ok(());
        }

        let files = staged.len();
        for (key, entry) in staged {
            if self.persist {
                let path = self.guard.absolute(&key);
                match &entry {
                    Some(doc) => atomic_write(&path, doc.text().as_bytes())
                        .map_err(|source| WorkspaceError::Io { path, source })?,
                    None => match fs::remove_file(&path) {
                        Ok(()) => {}
                        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                        Err(source) => return Err(WorkspaceError::Io { path, source }),
                    },
                }
            }
            self.documents.get_mut().insert(key, entry);
        }

        info!(label, files, "committed transaction");
        Ok(())
    }
}

impl SourceTrees for Workspace {
    fn resolve_key(&self, file: &str) -> Option<String> {
        match self.key_for(file) {
            Ok(key) => Some(key),
            Err(e) => {
                debug!(file, error = %e, "file path rejected");
                None
            }
        }
    }

    fn document(&self, key: &str) -> Option<Arc<Document>> {
        match self.load(key) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(file = %key, error = %e, "document unavailable");
                None
            }
        }
    }
}
