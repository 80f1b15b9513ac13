use crate::format::IndentReformatter;
use crate::repository::Modification;
use serde::Deserialize;
use std::fmt;

/// Editor settings, read from `kt-patcher.toml` at the workspace root.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct EditorConfig {
    /// One level of indentation.
    pub indent: String,
    /// Write committed edits back to disk.
    pub persist: bool,
    /// Put a blank line between inserted functions and classes.
    pub blank_line_between_members: bool,
    /// Extra workspace-relative directories that may not be edited.
    pub forbidden_dirs: Vec<String>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            indent: "    ".to_string(),
            persist: true,
            blank_line_between_members: true,
            forbidden_dirs: Vec::new(),
        }
    }
}

impl EditorConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.indent.is_empty() {
            issues.push(ValidationIssue::EmptyIndent);
        } else if self.indent.chars().any(|c| c != ' ' && c != '\t') {
            issues.push(ValidationIssue::NonWhitespaceIndent(self.indent.clone()));
        }

        for dir in &self.forbidden_dirs {
            if dir.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    index: None,
                    field: "forbidden_dirs",
                });
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }

    pub fn reformatter(&self) -> IndentReformatter {
        IndentReformatter::new(self.indent.clone(), self.blank_line_between_members)
    }
}

/// A list of modifications loaded from a batch file.
#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct ModificationBatch {
    #[serde(default)]
    pub modifications: Vec<Modification>,
}

impl ModificationBatch {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.modifications.is_empty() {
            issues.push(ValidationIssue::EmptyBatch);
        }

        for (index, modification) in self.modifications.iter().enumerate() {
            let missing = match modification {
                Modification::CreateElement { content, .. }
                | Modification::ReplaceElement { content, .. }
                    if content.trim().is_empty() =>
                {
                    Some("content")
                }
                Modification::AddImport { import_path, .. }
                | Modification::RemoveImport { import_path, .. }
                    if import_path.trim().is_empty() =>
                {
                    Some("import_path")
                }
                _ => None,
            };
            if let Some(field) = missing {
                issues.push(ValidationIssue::MissingField {
                    index: Some(index),
                    field,
                });
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    EmptyIndent,
    NonWhitespaceIndent(String),
    EmptyBatch,
    MissingField {
        /// Position of the offending modification in its batch.
        index: Option<usize>,
        field: &'static str,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::EmptyIndent => write!(f, "indent must not be empty"),
            ValidationIssue::NonWhitespaceIndent(indent) => {
                write!(f, "indent must be spaces or tabs, got {indent:?}")
            }
            ValidationIssue::EmptyBatch => write!(f, "batch contains no modifications"),
            ValidationIssue::MissingField { index, field } => match index {
                Some(i) => write!(f, "modification #{i} missing required field '{field}'"),
                None => write!(f, "empty value in '{field}'"),
            },
        }
    }
}
