pub mod loader;
pub mod schema;

pub use loader::{
    load_batch, load_batch_from_str, load_from_path, load_from_str, load_workspace_config,
    BatchFormat, ConfigError, CONFIG_FILE_NAME,
};
pub use schema::{EditorConfig, ModificationBatch, ValidationError, ValidationIssue};
