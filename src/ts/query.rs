use crate::ts::errors::TreeSitterError;
use crate::ts::parser::ParsedSource;
use ast_grep_language::{LanguageExt, SupportLang};
use std::collections::HashMap;
use tree_sitter::{Query, QueryCursor, StreamingIterator};

/// One query match: the span covering all of its captures, plus each
/// capture by name.
#[derive(Debug, Clone)]
pub struct QueryMatch {
    pub byte_start: usize,
    pub byte_end: usize,
    pub captures: HashMap<String, CapturedNode>,
}

#[derive(Debug, Clone)]
pub struct CapturedNode {
    pub byte_start: usize,
    pub byte_end: usize,
    pub text: String,
}

/// Compiled tree-sitter query over the Kotlin grammar.
///
/// Queries use the S-expression syntax, with `@name` captures:
/// ```text
/// (import_header (identifier) @path) @import
/// ```
pub struct QueryEngine {
    query: Query,
    capture_names: Vec<String>,
}

impl QueryEngine {
    pub fn new(query_str: &str) -> Result<Self, TreeSitterError> {
        let language = SupportLang::Kotlin.get_ts_language();
        let query = Query::new(&language, query_str).map_err(|e| TreeSitterError::InvalidQuery {
            message: e.to_string(),
        })?;
        let capture_names = query.capture_names().iter().map(|s| s.to_string()).collect();
        Ok(Self {
            query,
            capture_names,
        })
    }

    /// All matches in `parsed`, sorted by start offset.
    pub fn find_all<'a>(&self, parsed: &'a ParsedSource<'a>) -> Vec<QueryMatch> {
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&self.query, parsed.root_node(), parsed.source.as_bytes());

        let mut results = Vec::new();
        while let Some(m) = matches.next() {
            let Some(span) = m
                .captures
                .iter()
                .map(|c| c.node.byte_range())
                .reduce(|a, b| a.start.min(b.start)..a.end.max(b.end))
            else {
                continue;
            };

            let captures = m
                .captures
                .iter()
                .map(|c| {
                    let name = self.capture_names[c.index as usize].clone();
                    let node = CapturedNode {
                        byte_start: c.node.start_byte(),
                        byte_end: c.node.end_byte(),
                        text: parsed.node_text(c.node).to_string(),
                    };
                    (name, node)
                })
                .collect();

            results.push(QueryMatch {
                byte_start: span.start,
                byte_end: span.end,
                captures,
            });
        }

        results.sort_by_key(|m| m.byte_start);
        results
    }
}

/// Common tree-sitter queries for Kotlin file headers.
pub mod queries {
    /// Every import directive.
    pub const IMPORT_HEADERS: &str = "(import_header) @import";

    /// The package declaration.
    pub const PACKAGE_HEADER: &str = "(package_header) @package";

    /// What must stay ahead of any import: a shebang and `@file:` annotations.
    pub const FILE_PREAMBLE: &str = "(shebang_line) @preamble (file_annotation) @preamble";
}
