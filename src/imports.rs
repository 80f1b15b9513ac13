//! Import directive management.
//!
//! Directives are located with tree-sitter queries over the file header.
//! Names are compared after whitespace normalization, so `a . b.C` and
//! `a.b.C` are the same import; `a.b.*` and `a.b.C as D` are matched as
//! written.

use crate::edit::Edit;
use crate::format::{line_end_inclusive, line_start, starts_line};
use crate::pool::with_parser;
use crate::ts::outline::trimmed_end;
use crate::ts::query::queries;
use crate::ts::{QueryEngine, TreeSitterError};
use crate::txn::Transaction;
use crate::workspace::{SourceTrees, WorkspaceError};
use std::ops::Range;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("File not found: {0}")]
    MissingFile(String),

    #[error("Cannot read the import header: {0}")]
    Scan(#[from] TreeSitterError),

    #[error(transparent)]
    Edit(#[from] WorkspaceError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportOutcome {
    Added,
    /// The directive was already there; nothing changed.
    AlreadyPresent,
}

/// One `import` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportDirective {
    /// Normalized name, `import` keyword and terminator stripped.
    pub name: String,
    /// Span of the directive text, without trailing whitespace.
    pub range: Range<usize>,
}

/// Canonical form of an import name.
pub fn normalize_import(name: &str) -> String {
    let name = name.trim();
    let name = name.strip_prefix("import ").unwrap_or(name);
    let name = name.trim().trim_end_matches(';').trim();
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace(" .", ".")
        .replace(". ", ".")
}

/// Every import directive in `source`, in document order.
pub fn list_imports(source: &str) -> Result<Vec<ImportDirective>, TreeSitterError> {
    Ok(header_spans(source, queries::IMPORT_HEADERS)?
        .into_iter()
        .map(|range| ImportDirective {
            name: normalize_import(&source[range.clone()]),
            range,
        })
        .collect())
}

fn package_span(source: &str) -> Result<Option<Range<usize>>, TreeSitterError> {
    Ok(header_spans(source, queries::PACKAGE_HEADER)?.into_iter().next())
}

/// End of the shebang and `@file:` annotations, if the file has any.
fn preamble_end(source: &str) -> Result<Option<usize>, TreeSitterError> {
    Ok(header_spans(source, queries::FILE_PREAMBLE)?
        .into_iter()
        .map(|span| span.end)
        .max())
}

fn header_spans(source: &str, query: &str) -> Result<Vec<Range<usize>>, TreeSitterError> {
    let engine = QueryEngine::new(query)?;
    let matches = with_parser(|parser| {
        parser
            .parse_with_source(source)
            .map(|parsed| engine.find_all(&parsed))
    })??;
    Ok(matches
        .into_iter()
        .map(|m| m.byte_start..trimmed_end(source, m.byte_start, m.byte_end))
        .collect())
}

/// Edit adding `import name`, or `None` when it is already present.
pub fn plan_add(source: &str, name: &str) -> Result<Option<Edit>, TreeSitterError> {
    let wanted = normalize_import(name);
    let imports = list_imports(source)?;
    if imports.iter().any(|i| i.name == wanted) {
        return Ok(None);
    }

    let anchor = match package_span(source)? {
        Some(package) => Some(package.end),
        None => preamble_end(source)?,
    };
    let edit = match (imports.last(), anchor) {
        (Some(last), _) => Edit::insert(last.range.end, format!("\nimport {wanted}")),
        (None, Some(end)) => Edit::insert(end, format!("\n\nimport {wanted}")),
        (None, None) if source.trim().is_empty() => {
            Edit::replace(source, 0..source.len(), format!("import {wanted}\n"))
        }
        (None, None) => Edit::insert(0, format!("import {wanted}\n\n")),
    };
    Ok(Some(edit))
}

/// Edit removing `import name`, or `None` when there is no such import.
pub fn plan_remove(source: &str, name: &str) -> Result<Option<Edit>, TreeSitterError> {
    let wanted = normalize_import(name);
    let imports = list_imports(source)?;
    let Some(index) = imports.iter().position(|i| i.name == wanted) else {
        return Ok(None);
    };
    let directive = &imports[index];

    let mut start = if starts_line(source, directive.range.start) {
        line_start(source, directive.range.start)
    } else {
        directive.range.start
    };
    let mut end = line_end_inclusive(source, directive.range.end);

    let block_empty = imports.len() == 1;
    let next_line_blank = is_blank_line(source, end);

    if block_empty {
        // Drop the now-empty section with one of the blank lines around it.
        if source[..start].ends_with("\n\n") {
            start -= 1;
        } else if next_line_blank {
            end = line_end_inclusive(source, end);
        }
    } else if next_line_blank {
        let after_blank = line_end_inclusive(source, end);
        if source[after_blank..].trim_start().starts_with("import ") {
            end = after_blank;
        }
    }

    Ok(Some(Edit::delete(source, start..end)))
}

fn is_blank_line(source: &str, offset: usize) -> bool {
    if offset >= source.len() {
        return false;
    }
    let line_end = line_end_inclusive(source, offset);
    source[offset..line_end].trim().is_empty()
}

/// Add `name` to the file stored under `key`.
pub fn add_import(
    txn: &mut Transaction<'_>,
    key: &str,
    name: &str,
) -> Result<ImportOutcome, ImportError> {
    let doc = txn
        .document(key)
        .ok_or_else(|| ImportError::MissingFile(key.to_string()))?;
    match plan_add(doc.text(), name)? {
        None => Ok(ImportOutcome::AlreadyPresent),
        Some(edit) => {
            txn.apply_edit_keeping_syntax(key, &edit)?;
            debug!(file = %key, import = name, "import added");
            Ok(ImportOutcome::Added)
        }
    }
}

/// Remove `name` from the file stored under `key`. `Ok(false)` when the
/// file has no such import.
pub fn remove_import(txn: &mut Transaction<'_>, key: &str, name: &str) -> Result<bool, ImportError> {
    let doc = txn
        .document(key)
        .ok_or_else(|| ImportError::MissingFile(key.to_string()))?;
    match plan_remove(doc.text(), name)? {
        None => Ok(false),
        Some(edit) => {
            txn.apply_edit_keeping_syntax(key, &edit)?;
            debug!(file = %key, import = name, "import removed");
            Ok(true)
        }
    }
}
