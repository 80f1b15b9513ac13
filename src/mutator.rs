//! Structural inserts, replacements and deletions.
//!
//! Each operation resolves to a single verified [`Edit`] on one document,
//! staged in the current [`Transaction`]. Only the inserted or replaced
//! text is reformatted. An operation that would leave a previously clean
//! file with syntax errors is undone and reported as a failure.
//!
//! Like the navigator, the mutator signals failure with `None`.

use crate::edit::Edit;
use crate::format::{line_indent, starts_line, Reformatter};
use crate::navigator::{Navigator, Node};
use crate::path::ElementKind;
use crate::ts::fragment::{parse_fragments, parse_primary_constructor, parse_single};
use crate::ts::{Fragment, FragmentContext, NodeId, Outline};
use crate::txn::Transaction;
use crate::workspace::{Document, WorkspaceError};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::sync::Arc;
use tracing::debug;

const ENTRY_SEPARATOR: &str = ",\n";

/// Where a new element goes relative to the target.
///
/// `FirstChild`/`LastChild` treat the target as a container;
/// `Before`/`After` treat it as a sibling and insert into its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InsertPosition {
    FirstChild,
    #[default]
    LastChild,
    Before,
    After,
}

impl InsertPosition {
    pub fn is_sibling(self) -> bool {
        matches!(self, InsertPosition::Before | InsertPosition::After)
    }
}

/// Text spliced into a document: `prefix + text + suffix` replaces `range`.
#[derive(Debug)]
struct Insertion {
    range: Range<usize>,
    prefix: String,
    text: String,
    suffix: String,
}

impl Insertion {
    fn at(offset: usize, prefix: impl Into<String>, text: String, suffix: impl Into<String>) -> Self {
        Self {
            range: offset..offset,
            prefix: prefix.into(),
            text,
            suffix: suffix.into(),
        }
    }

    fn before(anchor: usize, text: String, separator: &str, indent: &str) -> Self {
        Self::at(anchor, "", text, format!("{separator}{indent}"))
    }

    fn after(anchor: usize, text: String, separator: &str, indent: &str) -> Self {
        Self::at(anchor, format!("{separator}{indent}"), text, "")
    }

    /// Offset of the inserted node in the edited text.
    fn node_start(&self) -> usize {
        self.range.start + self.prefix.len()
    }

    fn into_edit(self, source: &str) -> Edit {
        let new_text = format!("{}{}{}", self.prefix, self.text, self.suffix);
        Edit::replace(source, self.range, new_text)
    }
}

#[derive(Debug, Clone)]
pub struct Mutator {
    reformatter: Arc<dyn Reformatter>,
}

impl Mutator {
    pub fn new(reformatter: Arc<dyn Reformatter>) -> Self {
        Self { reformatter }
    }

    pub fn create_file(
        &self,
        txn: &mut Transaction<'_>,
        key: &str,
        content: &str,
    ) -> Result<Node, WorkspaceError> {
        let text = self.reformatter.reformat_file(content, &file_literals(content));
        let doc = txn.create(key, text)?;
        Node::from_outline(&doc, NodeId::ROOT).ok_or_else(|| WorkspaceError::NotFound(key.to_string()))
    }

    pub fn delete_file(&self, txn: &mut Transaction<'_>, key: &str) -> Result<(), WorkspaceError> {
        txn.delete(key)
    }

    /// Swap a file's whole text. The file keeps its key, so paths and
    /// other references to it stay valid; its old node handles do not.
    pub fn replace_file_content(
        &self,
        txn: &mut Transaction<'_>,
        file: &Node,
        content: &str,
    ) -> Option<Node> {
        if !file.is_file() {
            return None;
        }
        let current = Navigator::new(&*txn).document(file)?;
        let text = self.reformatter.reformat_file(content, &file_literals(content));
        let doc = txn.replace_text(current.key(), text);
        Node::from_outline(&doc, NodeId::ROOT)
    }

    /// Insert `content`, which must parse as exactly one declaration of
    /// `kind`, relative to `target`.
    pub fn add_element(
        &self,
        txn: &mut Transaction<'_>,
        target: &Node,
        content: &str,
        kind: ElementKind,
        position: InsertPosition,
    ) -> Option<Node> {
        let doc = Navigator::new(&*txn).document(target)?;
        let Some(fragment) = parse_single(content, kind) else {
            debug!(%kind, "content is not exactly one declaration of the requested kind");
            return None;
        };

        let insertion = match position {
            InsertPosition::FirstChild => self.plan_child(&doc, target, &fragment, true)?,
            InsertPosition::LastChild => self.plan_child(&doc, target, &fragment, false)?,
            InsertPosition::Before => self.plan_sibling(&doc, target, &fragment, true)?,
            InsertPosition::After => self.plan_sibling(&doc, target, &fragment, false)?,
        };

        let start = insertion.node_start();
        let edit = insertion.into_edit(doc.text());
        let updated = self.stage(txn, &doc, &edit)?;
        let node = locate(&updated, start)?;
        (node.kind == kind).then_some(node)
    }

    /// Replace `target` with `content`.
    ///
    /// File targets get their whole text replaced. Otherwise the content is
    /// parsed as one declaration of `kind` and substituted in place; if it
    /// is not exactly one such declaration but parses as a sequence, the
    /// first one replaces the target and the rest follow it as siblings.
    /// Returns the node that now sits where `target` was.
    pub fn replace_element(
        &self,
        txn: &mut Transaction<'_>,
        target: &Node,
        content: &str,
        kind: ElementKind,
    ) -> Option<Node> {
        if target.is_file() {
            return self.replace_file_content(txn, target, content);
        }
        let doc = Navigator::new(&*txn).document(target)?;
        if kind == ElementKind::File {
            let file = Node::from_outline(&doc, NodeId::ROOT)?;
            return self.replace_file_content(txn, &file, content);
        }

        let source = doc.text();
        let outline = doc.outline();
        let indent = self.node_indent(source, outline, target.id)?;

        let single = if target.primary {
            parse_primary_constructor(content)
        } else {
            parse_single(content, kind)
        };
        let replacement = match single {
            Some(fragment) => self.reindent(&fragment, &indent),
            None if target.primary => return None,
            None => {
                debug!(%kind, "falling back to multi-declaration replace");
                self.join_fragments(outline, target, content, &indent)?
            }
        };

        let edit = Edit::replace(source, target.range.clone(), replacement);
        let updated = self.stage(txn, &doc, &edit)?;
        locate(&updated, target.range.start)
    }

    /// Delete `node` together with the whitespace that separated it from
    /// its next sibling (at most one blank line).
    pub fn delete_element(&self, txn: &mut Transaction<'_>, node: &Node) -> Option<()> {
        if node.is_file() {
            return None;
        }
        let doc = Navigator::new(&*txn).document(node)?;
        let source = doc.text();

        let range = if node.primary {
            node.range.clone()
        } else if node.kind == ElementKind::EnumEntry {
            entry_deletion_range(source, node.range.clone())
        } else {
            deletion_range(source, node.range.clone())
        };

        let edit = Edit::delete(source, range);
        self.stage(txn, &doc, &edit).map(|_| ())
    }

    fn plan_child(
        &self,
        doc: &Document,
        target: &Node,
        fragment: &Fragment,
        first: bool,
    ) -> Option<Insertion> {
        let source = doc.text();
        let outline = doc.outline();
        let kind = fragment.kind;

        if target.is_file() {
            let text = self.reindent(&fragment, "");
            let separator = self.reformatter.member_separator(kind);
            let members: Vec<Range<usize>> = outline
                .members(NodeId::ROOT)
                .filter_map(|id| outline.get(id).map(|n| n.range.clone()))
                .collect();
            return Some(match (members.first(), members.last()) {
                (Some(head), _) if first => Insertion::before(head.start, text, separator, ""),
                (_, Some(tail)) => Insertion::after(tail.end, text, separator, ""),
                _ => append_to_file(source, text),
            });
        }

        let container = outline.get(target.id)?;
        let outer = line_indent(source, container.range.start).to_string();
        let inner = format!("{outer}{}", self.reformatter.indent_unit());
        let text = self.reindent(&fragment, &inner);

        let is_enum = container.kind == ElementKind::Enum;
        let adding_entry = kind == ElementKind::EnumEntry;
        let separator = if adding_entry {
            ENTRY_SEPARATOR
        } else {
            self.reformatter.member_separator(kind)
        };

        let members: Vec<Range<usize>> = outline
            .members(target.id)
            .filter_map(|id| outline.get(id))
            .filter(|n| !is_enum || (n.kind == ElementKind::EnumEntry) == adding_entry)
            .map(|n| n.range.clone())
            .collect();

        let indent_at = |offset: usize| {
            if starts_line(source, offset) {
                line_indent(source, offset).to_string()
            } else {
                inner.clone()
            }
        };

        if let (Some(head), Some(tail)) = (members.first(), members.last()) {
            return Some(if first {
                Insertion::before(head.start, text, separator, &indent_at(head.start))
            } else {
                Insertion::after(tail.end, text, separator, &indent_at(tail.start))
            });
        }

        // Enum members other than entries go after the `;` ending the entry
        // list, which may have to be created.
        let mut lead = String::new();
        if is_enum && !adding_entry {
            let entries: Vec<Range<usize>> = outline
                .members(target.id)
                .filter_map(|id| outline.get(id))
                .filter(|n| n.kind == ElementKind::EnumEntry)
                .map(|n| n.range.clone())
                .collect();
            match (container.body.and_then(|b| b.entries_end), entries.last()) {
                (Some(semicolon), _) => {
                    return Some(Insertion::after(semicolon + 1, text, separator, &inner));
                }
                (None, Some(last)) => {
                    let rest = &source[last.end..];
                    let anchor = match rest.trim_start().strip_prefix(',') {
                        Some(after_comma) => source.len() - after_comma.len(),
                        None => last.end,
                    };
                    return Some(Insertion::at(
                        anchor,
                        format!(";{separator}{inner}"),
                        text,
                        "",
                    ));
                }
                (None, None) => lead = format!(";{separator}{inner}"),
            }
        } else if is_enum {
            // First entry in an enum that only has members after its `;`.
            if let Some(body) = container.body {
                if let Some(semicolon) = body.entries_end {
                    if source[body.open + 1..semicolon].trim().is_empty() {
                        let mut insertion = Insertion::at(body.open + 1, format!("\n{inner}"), text, "");
                        insertion.range = body.open + 1..semicolon;
                        return Some(insertion);
                    }
                }
            }
        }

        let Some(body) = container.body else {
            return Some(Insertion::at(
                container.range.end,
                format!(" {{\n{inner}{lead}"),
                text,
                format!("\n{outer}}}"),
            ));
        };

        let inside = &source[body.open + 1..body.close];
        let start = body.open + 1 + inside.trim_end().len();
        let mut insertion = Insertion::at(start, format!("\n{inner}{lead}"), text, format!("\n{outer}"));
        insertion.range = start..body.close;
        Some(insertion)
    }

    fn plan_sibling(
        &self,
        doc: &Document,
        target: &Node,
        fragment: &Fragment,
        before: bool,
    ) -> Option<Insertion> {
        if target.is_file() || target.primary {
            return None;
        }
        let entry_target = target.kind == ElementKind::EnumEntry;
        if entry_target != (fragment.kind == ElementKind::EnumEntry) {
            debug!(target_kind = %target.kind, kind = %fragment.kind, "enum entries only neighbour entries");
            return None;
        }

        let source = doc.text();
        let indent = self.node_indent(source, doc.outline(), target.id)?;
        let text = self.reindent(&fragment, &indent);
        let separator = if entry_target {
            ENTRY_SEPARATOR
        } else {
            self.reformatter.member_separator(fragment.kind)
        };

        Some(if before {
            Insertion::before(target.range.start, text, separator, &indent)
        } else {
            Insertion::after(target.range.end, text, separator, &indent)
        })
    }

    /// Replacement text for the multi-declaration fallback: every parsed
    /// declaration, indented like the target and separated like members.
    fn join_fragments(
        &self,
        outline: &Outline,
        target: &Node,
        content: &str,
        indent: &str,
    ) -> Option<String> {
        let parent = outline.get(outline.parent(target.id)?)?;
        let context = match parent.kind {
            ElementKind::File => FragmentContext::TopLevel,
            ElementKind::Enum if target.kind == ElementKind::EnumEntry => FragmentContext::EnumBody,
            _ => FragmentContext::ClassBody,
        };

        let fragments = parse_fragments(content, context);
        if fragments.is_empty() {
            debug!(?context, "content holds no declarations");
            return None;
        }

        let mut out = String::new();
        for (i, fragment) in fragments.iter().enumerate() {
            if i > 0 {
                out.push_str(if fragment.kind == ElementKind::EnumEntry {
                    ENTRY_SEPARATOR
                } else {
                    self.reformatter.member_separator(fragment.kind)
                });
                out.push_str(indent);
            }
            out.push_str(&self.reindent(&fragment, indent));
        }
        Some(out)
    }

    fn reindent(&self, fragment: &Fragment, to_indent: &str) -> String {
        self.reformatter
            .reformat_node(&fragment.text, &fragment.literals, &fragment.indent, to_indent)
    }

    /// Indentation a node is (or should be) written at.
    fn node_indent(&self, source: &str, outline: &Outline, id: NodeId) -> Option<String> {
        let node = outline.get(id)?;
        if starts_line(source, node.range.start) {
            return Some(line_indent(source, node.range.start).to_string());
        }
        let parent = outline.get(node.parent?)?;
        if parent.kind == ElementKind::File {
            return Some(String::new());
        }
        Some(format!(
            "{}{}",
            line_indent(source, parent.range.start),
            self.reformatter.indent_unit()
        ))
    }

    /// Apply `edit` to `doc`'s file, undoing it if it broke the syntax.
    fn stage(&self, txn: &mut Transaction<'_>, doc: &Arc<Document>, edit: &Edit) -> Option<Arc<Document>> {
        match txn.apply_edit_keeping_syntax(doc.key(), edit) {
            Ok(updated) => Some(updated),
            Err(e) => {
                debug!(file = %doc.key(), error = %e, "edit rejected");
                None
            }
        }
    }
}

fn locate(doc: &Document, start: usize) -> Option<Node> {
    let id = doc.outline().find_starting_at(start)?;
    Node::from_outline(doc, id)
}

fn append_to_file(source: &str, text: String) -> Insertion {
    let end = source.trim_end().len();
    let prefix = if end == 0 { "" } else { "\n\n" };
    let mut insertion = Insertion::at(end, prefix, text, "\n");
    insertion.range = end..source.len();
    insertion
}

/// Node range plus the whitespace up to the next sibling, when that
/// whitespace holds at most one blank line. Before a closing brace or the
/// end of the file, the whitespace in front of the node goes instead, so
/// the brace keeps its own indentation.
fn deletion_range(source: &str, range: Range<usize>) -> Range<usize> {
    let rest = &source[range.end..];
    let next = range.end + (rest.len() - rest.trim_start().len());
    let closes = next == source.len() || source[next..].starts_with('}');

    if !closes {
        if source[range.end..next].matches('\n').count() <= 2 {
            return range.start..next;
        }
        return range;
    }

    let previous = source[..range.start].trim_end().len();
    if source[previous..range.start].matches('\n').count() <= 2 {
        return previous..range.end;
    }
    range
}

/// Enum entries also take their separating comma with them.
fn entry_deletion_range(source: &str, range: Range<usize>) -> Range<usize> {
    let rest = &source[range.end..];
    if let Some(after_comma) = rest.trim_start().strip_prefix(',') {
        let following = after_comma.trim_start();
        if !following.starts_with(';') && !following.starts_with('}') && !following.is_empty() {
            // `A, B` -> `B`
            return range.start..source.len() - following.len();
        }
    }

    let head = source[..range.start].trim_end();
    if head.ends_with(',') {
        // `A, B` -> `A`
        return head.len() - 1..range.end;
    }
    deletion_range(source, range)
}

/// Multi-line string literals of a whole file's new content.
fn file_literals(content: &str) -> Vec<Range<usize>> {
    Outline::build(content)
        .map(|outline| outline.literals_within(0..content.len()).collect())
        .unwrap_or_default()
}
