use crate::config::schema::{EditorConfig, ModificationBatch, ValidationError};
use crate::repository::Modification;
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name of the editor config file at the workspace root.
pub const CONFIG_FILE_NAME: &str = "kt-patcher.toml";

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Toml {
        path: Option<PathBuf>,
        source: toml_edit::de::Error,
    },
    Json {
        path: Option<PathBuf>,
        source: serde_json::Error,
    },
    Validation {
        path: Option<PathBuf>,
        source: ValidationError,
    },
}

impl ConfigError {
    fn with_path(self, path: &Path) -> Self {
        let path = path.to_path_buf();
        match self {
            ConfigError::Io { .. } => self,
            ConfigError::Toml { path: None, source } => ConfigError::Toml {
                path: Some(path),
                source,
            },
            ConfigError::Json { path: None, source } => ConfigError::Json {
                path: Some(path),
                source,
            },
            ConfigError::Validation { path: None, source } => ConfigError::Validation {
                path: Some(path),
                source,
            },
            other => other,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "failed to read {}: {}", path.display(), source)
            }
            ConfigError::Toml { path, source } => match path {
                Some(path) => write!(f, "failed to parse TOML ({}): {}", path.display(), source),
                None => write!(f, "failed to parse TOML: {}", source),
            },
            ConfigError::Json { path, source } => match path {
                Some(path) => write!(f, "failed to parse JSON ({}): {}", path.display(), source),
                None => write!(f, "failed to parse JSON: {}", source),
            },
            ConfigError::Validation { path, source } => match path {
                Some(path) => write!(f, "invalid input ({}): {}", path.display(), source),
                None => write!(f, "invalid input: {}", source),
            },
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Toml { source, .. } => Some(source),
            ConfigError::Json { source, .. } => Some(source),
            ConfigError::Validation { source, .. } => Some(source),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchFormat {
    Toml,
    Json,
}

impl BatchFormat {
    /// `.json` files are JSON; everything else is read as TOML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => BatchFormat::Json,
            _ => BatchFormat::Toml,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonBatch {
    List(Vec<Modification>),
    Wrapped(ModificationBatch),
}

pub fn load_from_str(input: &str) -> Result<EditorConfig, ConfigError> {
    let config: EditorConfig = toml_edit::de::from_str(input)
        .map_err(|source| ConfigError::Toml { path: None, source })?;
    config
        .validate()
        .map_err(|source| ConfigError::Validation { path: None, source })?;
    Ok(config)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<EditorConfig, ConfigError> {
    let path = path.as_ref();
    let contents = read(path)?;
    load_from_str(&contents).map_err(|error| error.with_path(path))
}

/// Config for the workspace at `root`: its `kt-patcher.toml`, or defaults
/// when there is none.
pub fn load_workspace_config(root: impl AsRef<Path>) -> Result<EditorConfig, ConfigError> {
    let path = root.as_ref().join(CONFIG_FILE_NAME);
    if !path.is_file() {
        debug!(path = %path.display(), "no editor config, using defaults");
        return Ok(EditorConfig::default());
    }
    load_from_path(path)
}

pub fn load_batch_from_str(input: &str, format: BatchFormat) -> Result<ModificationBatch, ConfigError> {
    let batch = match format {
        BatchFormat::Toml => toml_edit::de::from_str(input)
            .map_err(|source| ConfigError::Toml { path: None, source })?,
        BatchFormat::Json => {
            match serde_json::from_str(input)
                .map_err(|source| ConfigError::Json { path: None, source })?
            {
                JsonBatch::List(modifications) => ModificationBatch { modifications },
                JsonBatch::Wrapped(batch) => batch,
            }
        }
    };
    batch
        .validate()
        .map_err(|source| ConfigError::Validation { path: None, source })?;
    Ok(batch)
}

pub fn load_batch(path: impl AsRef<Path>) -> Result<ModificationBatch, ConfigError> {
    let path = path.as_ref();
    let contents = read(path)?;
    load_batch_from_str(&contents, BatchFormat::from_path(path)).map_err(|error| error.with_path(path))
}

fn read(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}
