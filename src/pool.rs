//! Thread-local parser pooling.
//!
//! Outlines are rebuilt after every staged edit, so parser construction sits
//! on the hot path. Each thread keeps one reusable Kotlin parser, created on
//! first use.

use crate::ts::{KotlinParser, TreeSitterError};
use std::cell::RefCell;

thread_local! {
    static KOTLIN_PARSER: RefCell<Option<KotlinParser>> = const { RefCell::new(None) };
}

/// Execute function with pooled parser instance.
///
/// On first call per thread, creates new parser. Subsequent calls reuse
/// the same parser instance, avoiding allocation and initialization overhead.
///
/// # Example
///
/// ```no_run
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use kt_patcher::pool::with_parser;
///
/// let tree = with_parser(|parser| parser.parse("fun main() {}"))??;
/// assert_eq!(tree.root_node().kind(), "source_file");
/// # Ok(())
/// # }
/// ```
pub fn with_parser<F, R>(f: F) -> Result<R, TreeSitterError>
where
    F: FnOnce(&mut KotlinParser) -> R,
{
    KOTLIN_PARSER.with(|cell| {
        let mut slot = cell.borrow_mut();
        let mut parser = match slot.take() {
            Some(parser) => parser,
            None => KotlinParser::new()?,
        };
        let out = f(&mut parser);
        *slot = Some(parser);
        Ok(out)
    })
}
