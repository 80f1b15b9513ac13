//! kt-patcher: path-addressable structural editing for Kotlin sources
//!
//! Declarations are addressed by [`ElementPath`]s such as
//! `file:src/User.kt/class[User]/function[greet]` and edited through a
//! [`StructuralRepository`], which resolves paths against tree-sitter
//! outlines and applies every change as a verified byte-span [`Edit`].
//!
//! # Architecture
//!
//! - [`path`]: the path grammar (parse, format, kinds and synonyms).
//! - [`navigator`]: resolves paths to live node handles.
//! - [`mutator`]: inserts, replaces and deletes declarations with
//!   format-preserving splices.
//! - [`imports`]: idempotent import directive management.
//! - [`repository`]: typed results and errors over all of the above, one
//!   write transaction per modification.
//!
//! # Safety
//!
//! - Edits verify their expected before-text before applying
//! - An edit that breaks a previously clean file is rolled back
//! - Atomic file writes (tempfile + fsync + rename)
//! - Workspace boundary enforcement
//! - Node handles go stale when their file changes
//!
//! # Example
//!
//! ```no_run
//! use kt_patcher::{ElementKind, ElementPath, EditorConfig, Modification, StructuralRepository};
//!
//! let repo = StructuralRepository::open("/path/to/project", &EditorConfig::default())?;
//! let result = repo.apply_modification(Modification::CreateElement {
//!     target_path: ElementPath::parse("file:src/User.kt/class[User]")?,
//!     kind: ElementKind::Function,
//!     content: "fun greet(): String = \"hi\"".to_string(),
//!     position: Default::default(),
//! });
//! assert!(result.is_success());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod edit;
pub mod format;
pub mod imports;
pub mod mutator;
pub mod navigator;
pub mod path;
pub mod pool;
pub mod repository;
pub mod safety;
pub mod ts;
pub mod txn;
pub mod workspace;

// Re-exports
pub use config::{
    load_batch, load_workspace_config, ConfigError, EditorConfig, ModificationBatch,
};
pub use edit::{Edit, EditError, EditResult, Expected};
pub use format::{IndentReformatter, Reformatter};
pub use imports::{ImportError, ImportOutcome};
pub use mutator::{InsertPosition, Mutator};
pub use navigator::{Navigator, Node};
pub use path::{ElementKind, ElementPath, PathSyntaxError, Segment};
pub use repository::{
    ChildSummary, ElementSnapshot, Modification, ModificationResult, RepositoryError,
    StructuralRepository,
};
pub use safety::{SafetyError, WorkspaceGuard};
pub use ts::{validate_syntax, TreeSitterError};
pub use txn::{Transaction, TransactionError, WriteQueue, WriteTicket};
pub use workspace::{Document, SourceTrees, Workspace, WorkspaceError};
