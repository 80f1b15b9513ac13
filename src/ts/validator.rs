use crate::pool::with_parser;
use crate::ts::errors::TreeSitterError;
use crate::ts::fragment::{parse_fragments, FragmentContext};
use crate::ts::outline::Outline;

/// Best-effort structural check of a code fragment.
///
/// Blank input passes. Non-blank input passes when it yields at least one
/// declaration, in either file or class-body context, even if tree-sitter
/// had to recover from errors along the way. This is a heuristic, not a
/// compiler check; use [`validate_strict`] to reject any ERROR node.
pub fn validate_syntax(source: &str) -> Result<(), TreeSitterError> {
    if source.trim().is_empty() {
        return Ok(());
    }

    if !parse_fragments(source, FragmentContext::ClassBody).is_empty() {
        return Ok(());
    }

    let outline = Outline::build(source)?;
    if outline.declaration_count() > 0 {
        return Ok(());
    }

    Err(TreeSitterError::NoStructure { len: source.len() })
}

/// Validate that Kotlin source code has no syntax errors.
///
/// Returns Ok(()) if the code parses without ERROR nodes.
pub fn validate_strict(source: &str) -> Result<(), TreeSitterError> {
    let errors = with_parser(|parser| {
        parser
            .parse_with_source(source)
            .map(|parsed| parsed.error_nodes())
    })??;

    match errors.len() {
        0 => Ok(()),
        1 => Err(TreeSitterError::SyntaxError {
            byte_start: errors[0].byte_start,
            byte_end: errors[0].byte_end,
        }),
        n => Err(TreeSitterError::MultipleSyntaxErrors { count: n }),
    }
}
