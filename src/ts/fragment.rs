//! Fragment parsing: standalone text into unattached declarations.
//!
//! Member-only constructs (`init`, secondary constructors, companion
//! objects) and enum entries are not valid at the top level of a Kotlin
//! file, so those fragments are parsed inside a synthetic container.

use crate::format::line_indent;
use crate::path::ElementKind;
use crate::ts::outline::{NodeId, Outline};
use std::ops::Range;
use tracing::debug;

const WRAPPER_NAME: &str = "__Fragment__";

/// Syntactic context a fragment is parsed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentContext {
    TopLevel,
    ClassBody,
    EnumBody,
}

impl FragmentContext {
    /// Natural context for a declaration of `kind`.
    pub fn for_kind(kind: ElementKind) -> Self {
        match kind {
            ElementKind::EnumEntry => FragmentContext::EnumBody,
            k if k.is_member_only() => FragmentContext::ClassBody,
            _ => FragmentContext::TopLevel,
        }
    }

    fn wrap(self, content: &str) -> String {
        match self {
            FragmentContext::TopLevel => content.to_string(),
            FragmentContext::ClassBody => format!("class {WRAPPER_NAME} {{\n{content}\n}}\n"),
            FragmentContext::EnumBody => format!("enum class {WRAPPER_NAME} {{\n{content}\n}}\n"),
        }
    }
}

/// One parsed declaration, detached from any file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub kind: ElementKind,
    pub name: Option<String>,
    /// Declaration text, starting at its first token.
    pub text: String,
    /// Indentation the text was written against.
    pub indent: String,
    /// Multi-line string literals, relative to `text`.
    pub literals: Vec<Range<usize>>,
}

/// Parse `content` into its declarations, in order. Returns an empty list
/// when the content has syntax errors or holds no declaration.
pub fn parse_fragments(content: &str, context: FragmentContext) -> Vec<Fragment> {
    if content.trim().is_empty() {
        return Vec::new();
    }

    let source = context.wrap(content);
    let outline = match Outline::build(&source) {
        Ok(outline) => outline,
        Err(e) => {
            debug!(error = %e, "fragment parse failed");
            return Vec::new();
        }
    };
    if outline.has_errors() {
        debug!(?context, "fragment has syntax errors");
        return Vec::new();
    }

    let container = match context {
        FragmentContext::TopLevel => Some(outline.root()),
        _ => outline.children(outline.root()).first().copied(),
    };
    let Some(container) = container else {
        return Vec::new();
    };

    collect(&outline, &source, outline.members(container))
}

/// Parse `content` as exactly one declaration of `kind`.
pub fn parse_single(content: &str, kind: ElementKind) -> Option<Fragment> {
    let mut fragments = parse_fragments(content, FragmentContext::for_kind(kind));
    if fragments.len() != 1 {
        debug!(kind = %kind, count = fragments.len(), "expected exactly one declaration");
        return None;
    }
    let fragment = fragments.pop()?;
    (fragment.kind == kind).then_some(fragment)
}

/// Parse `content` as a class's primary constructor, with or without the
/// `constructor` keyword: `(val id: Int)`, `private constructor(id: Int)`.
pub fn parse_primary_constructor(content: &str) -> Option<Fragment> {
    let content = content.trim();
    if content.is_empty() {
        return None;
    }

    let source = format!("class {WRAPPER_NAME} {content} {{}}\n");
    let outline = Outline::build(&source).ok()?;
    if outline.has_errors() {
        return None;
    }
    let class = *outline.children(outline.root()).first()?;
    let ctor = outline
        .children(class)
        .iter()
        .copied()
        .find(|c| outline.get(*c).is_some_and(|n| n.primary))?;
    collect(&outline, &source, std::iter::once(ctor)).pop()
}

fn collect(outline: &Outline, source: &str, ids: impl Iterator<Item = NodeId>) -> Vec<Fragment> {
    ids.filter_map(|id| outline.get(id))
        .map(|node| {
            let start = node.range.start;
            Fragment {
                kind: node.kind,
                name: node.name.clone(),
                text: source[node.range.clone()].to_string(),
                indent: line_indent(source, start).to_string(),
                literals: outline
                    .literals_within(node.range.clone())
                    .map(|l| l.start - start..l.end - start)
                    .collect(),
            }
        })
        .collect()
}
