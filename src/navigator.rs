//! Element path resolution against live declaration trees.
//!
//! Every lookup signals absence with `None`; turning a miss into a typed
//! error is the repository's job.

use crate::path::{ElementKind, ElementPath, Segment};
use crate::ts::{NodeId, Outline, OutlineNode};
use crate::workspace::{Document, SourceTrees};
use std::ops::Range;
use std::sync::Arc;
use tracing::debug;

/// Handle to one declaration (or file) in a document.
///
/// Only valid for the document generation it was resolved against; once
/// the document changes, every operation treats the handle as absent.
/// Re-resolve by [`ElementPath`] instead of keeping handles around.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub file: String,
    pub generation: u64,
    pub id: NodeId,
    pub kind: ElementKind,
    pub name: Option<String>,
    pub range: Range<usize>,
    /// Set on a class's primary constructor.
    pub primary: bool,
}

impl Node {
    pub(crate) fn from_outline(doc: &Document, id: NodeId) -> Option<Self> {
        let OutlineNode {
            kind,
            name,
            range,
            primary,
            ..
        } = doc.outline().get(id)?;
        Some(Self {
            file: doc.key().to_string(),
            generation: doc.generation(),
            id,
            kind: *kind,
            name: name.clone(),
            range: range.clone(),
            primary: *primary,
        })
    }

    pub fn is_file(&self) -> bool {
        self.id == NodeId::ROOT
    }
}

pub struct Navigator<'a, S: SourceTrees + ?Sized> {
    trees: &'a S,
}

impl<'a, S: SourceTrees + ?Sized> Navigator<'a, S> {
    pub fn new(trees: &'a S) -> Self {
        Self { trees }
    }

    /// The document behind `node`, if the handle is still current.
    pub fn document(&self, node: &Node) -> Option<Arc<Document>> {
        let doc = self.trees.document(&node.file)?;
        if doc.generation() != node.generation {
            debug!(file = %node.file, "stale node handle");
            return None;
        }
        Some(doc)
    }

    pub fn find_file(&self, path: &ElementPath) -> Option<Node> {
        let key = self.trees.resolve_key(path.file_path())?;
        let doc = self.trees.document(&key)?;
        Node::from_outline(&doc, NodeId::ROOT)
    }

    pub fn find_element(&self, path: &ElementPath) -> Option<Node> {
        let (node, matched) = self.resolve_prefix(path)?;
        (matched == path.segments().len()).then_some(node)
    }

    /// Resolve as many leading segments as possible. Returns the deepest
    /// node reached and how many segments it took.
    pub fn resolve_prefix(&self, path: &ElementPath) -> Option<(Node, usize)> {
        let mut node = self.find_file(path)?;
        for (i, segment) in path.segments().iter().enumerate() {
            match self.find_child(&node, segment) {
                Some(child) => node = child,
                None => {
                    debug!(path = %path, segment = %segment, "no match for segment");
                    return Some((node, i));
                }
            }
        }
        Some((node, path.segments().len()))
    }

    /// Direct declaration children of `node`, in document order.
    pub fn children(&self, node: &Node) -> Vec<Node> {
        let Some(doc) = self.document(node) else {
            return Vec::new();
        };
        doc.outline()
            .children(node.id)
            .iter()
            .filter_map(|id| Node::from_outline(&doc, *id))
            .collect()
    }

    pub fn parent(&self, node: &Node) -> Option<Node> {
        let doc = self.document(node)?;
        let parent = doc.outline().parent(node.id)?;
        Node::from_outline(&doc, parent)
    }

    pub fn find_child(&self, parent: &Node, segment: &Segment) -> Option<Node> {
        let doc = self.document(parent)?;
        let id = match_child(doc.outline(), parent.id, segment)?;
        Node::from_outline(&doc, id)
    }

    /// Source text of `node`.
    pub fn text(&self, node: &Node) -> Option<String> {
        let doc = self.document(node)?;
        doc.text().get(node.range.clone()).map(str::to_string)
    }

    /// Canonical path that resolves back to `node`, or `None` when `node`
    /// (or an ancestor) has no name.
    pub fn path_of(&self, node: &Node) -> Option<ElementPath> {
        let doc = self.document(node)?;
        let outline = doc.outline();

        let mut segments = Vec::new();
        let mut current = node.id;
        while let Some(parent) = outline.parent(current) {
            segments.push(segment_for(outline, parent, current)?);
            current = parent;
        }
        segments.reverse();
        Some(ElementPath::with_segments(doc.key(), segments))
    }
}

fn match_child(outline: &Outline, parent: NodeId, segment: &Segment) -> Option<NodeId> {
    let mut children = outline
        .children(parent)
        .iter()
        .copied()
        .filter_map(|id| outline.get(id).map(|n| (id, n)));

    let found = match segment.kind {
        ElementKind::File => None,
        ElementKind::CompanionObject => children.find(|(_, n)| n.kind == ElementKind::CompanionObject),
        ElementKind::Init => children
            .filter(|(_, n)| n.kind == ElementKind::Init)
            .nth(segment.index()),
        ElementKind::Constructor if segment.is_primary_constructor() => {
            children.find(|(_, n)| n.primary)
        }
        ElementKind::Constructor => children
            .filter(|(_, n)| n.kind == ElementKind::Constructor && !n.primary)
            .nth(segment.index()),
        kind => {
            let name = segment.name.as_deref()?;
            children.find(|(_, n)| n.kind == kind && n.name.as_deref() == Some(name))
        }
    };
    found.map(|(id, _)| id)
}

fn segment_for(outline: &Outline, parent: NodeId, id: NodeId) -> Option<Segment> {
    let node = outline.get(id)?;
    let position_among = |pred: &dyn Fn(&OutlineNode) -> bool| {
        outline
            .children(parent)
            .iter()
            .filter_map(|c| outline.get(*c).map(|n| (*c, n)))
            .filter(|(_, n)| pred(n))
            .position(|(c, _)| c == id)
    };

    let segment = match node.kind {
        ElementKind::CompanionObject => Segment::companion(),
        ElementKind::Constructor if node.primary => Segment::new(ElementKind::Constructor, "primary"),
        ElementKind::Constructor => {
            let index = position_among(&|n| n.kind == ElementKind::Constructor && !n.primary)?;
            Segment::new(ElementKind::Constructor, index.to_string())
        }
        ElementKind::Init => {
            let index = position_among(&|n| n.kind == ElementKind::Init)?;
            Segment::new(ElementKind::Init, index.to_string())
        }
        // Destructuring declarations have no name to address them by.
        kind => Segment::new(kind, node.name.clone().filter(|n| !n.is_empty())?),
    };
    Some(segment)
}
