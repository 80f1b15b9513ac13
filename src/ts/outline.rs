//! Declaration outline: the part of the Kotlin CST that element paths can
//! address.
//!
//! The outline is an arena. Index 0 is always the file node; every other
//! entry is a declaration with its kind, name, exact byte span and, for
//! containers, the byte offsets of its body delimiters. A node's span starts
//! at a directly preceding KDoc comment when there is one.

use crate::path::ElementKind;
use crate::pool::with_parser;
use crate::ts::errors::TreeSitterError;
use std::ops::Range;
use tree_sitter::Node as TsNode;

const NAME_KINDS: &[&str] = &["type_identifier", "simple_identifier", "identifier"];

/// String literal node kinds across grammar revisions.
const STRING_KINDS: &[&str] = &[
    "string_literal",
    "line_string_literal",
    "multi_line_string_literal",
    "multiline_string_literal",
];

/// Arena index of an outline node. Only meaningful for the outline (and so
/// the document generation) that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);
}

/// Byte offsets of a declaration body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Body {
    /// Offset of the opening `{`.
    pub open: usize,
    /// Offset of the closing `}` (end of the body if the brace is missing).
    pub close: usize,
    /// Offset of the `;` ending an enum's entry list.
    pub entries_end: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct OutlineNode {
    pub kind: ElementKind,
    pub name: Option<String>,
    pub range: Range<usize>,
    /// Set on the primary constructor of a class.
    pub primary: bool,
    pub body: Option<Body>,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub has_error: bool,
}

#[derive(Debug, Clone)]
pub struct Outline {
    nodes: Vec<OutlineNode>,
    /// Spans of string literals that cross a line break, in source order.
    literals: Vec<Range<usize>>,
}

impl Outline {
    /// Parse `source` and collect its declarations.
    pub fn build(source: &str) -> Result<Self, TreeSitterError> {
        let tree = with_parser(|parser| parser.parse(source))??;
        let root = tree.root_node();

        let mut outline = Self::root_only(source.len());
        outline.nodes[0].has_error = root.has_error();
        outline.collect_members(root, NodeId::ROOT, source);
        collect_multiline_literals(root, source, &mut outline.literals);
        Ok(outline)
    }

    /// An outline holding nothing but the file node.
    pub fn root_only(len: usize) -> Self {
        Self {
            nodes: vec![OutlineNode {
                kind: ElementKind::File,
                name: None,
                range: 0..len,
                primary: false,
                body: None,
                parent: None,
                children: Vec::new(),
                has_error: false,
            }],
            literals: Vec::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    pub fn get(&self, id: NodeId) -> Option<&OutlineNode> {
        self.nodes.get(id.0)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id)?.parent
    }

    /// Direct declaration children in document order, primary constructor
    /// included.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// Direct children that live inside the container's body (everything
    /// but the primary constructor).
    pub fn members(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(move |c| !self.nodes[c.0].primary)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &OutlineNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    /// Outermost declaration whose span starts exactly at `start`.
    pub fn find_starting_at(&self, start: usize) -> Option<NodeId> {
        self.iter()
            .skip(1)
            .find(|(_, n)| n.range.start == start)
            .map(|(id, _)| id)
    }

    /// Whether the parsed source contains ERROR or MISSING nodes anywhere.
    pub fn has_errors(&self) -> bool {
        self.nodes[0].has_error
    }

    /// Multi-line string literals inside `range`. Their text is content, so
    /// reformatting must leave it alone.
    pub fn literals_within(&self, range: Range<usize>) -> impl Iterator<Item = Range<usize>> + '_ {
        self.literals
            .iter()
            .filter(move |l| range.start <= l.start && l.end <= range.end)
            .cloned()
    }

    /// Number of declarations, the file node excluded.
    pub fn declaration_count(&self) -> usize {
        self.nodes.len() - 1
    }

    fn collect_members(&mut self, container: TsNode<'_>, parent: NodeId, source: &str) {
        let mut cursor = container.walk();
        let children: Vec<TsNode<'_>> = container.named_children(&mut cursor).collect();

        let mut doc_start = None;
        for child in children {
            match child.kind() {
                "multiline_comment" | "block_comment" => {
                    let text = &source[child.byte_range()];
                    doc_start = text.starts_with("/**").then_some(child.start_byte());
                    continue;
                }
                // Some grammar revisions wrap top-level declarations.
                "statement" | "statements" => {
                    self.collect_members(child, parent, source);
                    doc_start = None;
                    continue;
                }
                _ => {}
            }

            if let Some(kind) = classify(child, source) {
                let start = match doc_start {
                    Some(doc) if attaches(&source[doc..child.start_byte()]) => doc,
                    _ => child.start_byte(),
                };
                self.push_declaration(child, kind, start, parent, source);
            }
            doc_start = None;
        }
    }

    fn push_declaration(
        &mut self,
        ts: TsNode<'_>,
        kind: ElementKind,
        start: usize,
        parent: NodeId,
        source: &str,
    ) {
        let id = NodeId(self.nodes.len());
        let body_node = direct_child(ts, &["class_body", "enum_class_body"]);

        self.nodes.push(OutlineNode {
            kind,
            name: declaration_name(ts, kind, source),
            range: start..trimmed_end(source, start, ts.end_byte()),
            primary: false,
            body: body_node.map(|b| body_offsets(b, source)),
            parent: Some(parent),
            children: Vec::new(),
            has_error: ts.has_error(),
        });
        self.nodes[parent.0].children.push(id);

        if matches!(
            kind,
            ElementKind::Class | ElementKind::Interface | ElementKind::Enum
        ) {
            if let Some(ctor) = direct_child(ts, &["primary_constructor"]) {
                let ctor_id = NodeId(self.nodes.len());
                self.nodes.push(OutlineNode {
                    kind: ElementKind::Constructor,
                    name: None,
                    range: ctor.start_byte()..trimmed_end(source, ctor.start_byte(), ctor.end_byte()),
                    primary: true,
                    body: None,
                    parent: Some(id),
                    children: Vec::new(),
                    has_error: ctor.has_error(),
                });
                self.nodes[id.0].children.push(ctor_id);
            }
        }

        if let Some(body) = body_node {
            self.collect_members(body, id, source);
        }
    }
}

fn collect_multiline_literals(node: TsNode<'_>, source: &str, out: &mut Vec<Range<usize>>) {
    if STRING_KINDS.contains(&node.kind()) {
        if source[node.byte_range()].contains('\n') {
            out.push(node.byte_range());
        }
        return;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_multiline_literals(child, source, out);
    }
}

fn classify(node: TsNode<'_>, source: &str) -> Option<ElementKind> {
    let kind = match node.kind() {
        "class_declaration" => class_kind(node, source),
        "object_declaration" => ElementKind::Object,
        "companion_object" => ElementKind::CompanionObject,
        "function_declaration" => ElementKind::Function,
        "property_declaration" => ElementKind::Property,
        "enum_entry" => ElementKind::EnumEntry,
        "anonymous_initializer" => ElementKind::Init,
        "secondary_constructor" => ElementKind::Constructor,
        _ => return None,
    };
    Some(kind)
}

fn class_kind(node: TsNode<'_>, source: &str) -> ElementKind {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "interface" => return ElementKind::Interface,
            "enum_class_body" => return ElementKind::Enum,
            "modifiers" => {
                let mut inner = child.walk();
                let is_enum = child
                    .named_children(&mut inner)
                    .any(|m| m.kind() == "class_modifier" && &source[m.byte_range()] == "enum");
                if is_enum {
                    return ElementKind::Enum;
                }
            }
            _ => {}
        }
    }
    ElementKind::Class
}

fn declaration_name(node: TsNode<'_>, kind: ElementKind, source: &str) -> Option<String> {
    match kind {
        ElementKind::Init | ElementKind::Constructor | ElementKind::File => None,
        ElementKind::Property => {
            let var = direct_child(node, &["variable_declaration"])?;
            direct_child(var, NAME_KINDS).map(|n| source[n.byte_range()].to_string())
        }
        _ => direct_child(node, NAME_KINDS).map(|n| source[n.byte_range()].to_string()),
    }
}

fn direct_child<'t>(node: TsNode<'t>, kinds: &[&str]) -> Option<TsNode<'t>> {
    let mut cursor = node.walk();
    let found = node
        .named_children(&mut cursor)
        .find(|c| kinds.contains(&c.kind()));
    found
}

fn body_offsets(body: TsNode<'_>, source: &str) -> Body {
    let open = body.start_byte();
    let end = trimmed_end(source, open, body.end_byte());
    let close = if end > open && source.as_bytes()[end - 1] == b'}' {
        end - 1
    } else {
        end
    };

    let mut cursor = body.walk();
    let entries_end = body
        .children(&mut cursor)
        .find(|c| c.kind() == ";")
        .map(|c| c.start_byte());

    Body {
        open,
        close,
        entries_end: if body.kind() == "enum_class_body" {
            entries_end
        } else {
            None
        },
    }
}

/// Whether the gap between a KDoc comment and a declaration keeps them
/// attached: whitespace only, no blank line.
fn attaches(gap: &str) -> bool {
    gap.trim().is_empty() && gap.matches('\n').count() <= 1
}

pub(crate) fn trimmed_end(source: &str, start: usize, end: usize) -> usize {
    start + source[start..end].trim_end().len()
}
