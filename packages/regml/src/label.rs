//! Label index: bidirectional map between hierarchical labels and node
//! positions for one tree snapshot.
//!
//! Labels concatenate the deepest labeled ancestor's label with a per-node
//! segment. Ordinal segments (letters, digits, romans) are recomputed from
//! sibling position on every rebuild; identifier segments are taken verbatim
//! and never renumbered. Reserved slots keep their frozen segment and advance
//! the ordinal counter past it, so unrelated siblings do not shift.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{RegmlError, Result};
use crate::node::{Marker, Node, NodeKind};

/// Position of a node within a snapshot: child indices from the root.
/// Opaque identity, unique within one tree snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodePath(pub Vec<usize>);

impl NodePath {
    /// The root path.
    #[must_use]
    pub fn root() -> Self {
        NodePath(Vec::new())
    }

    /// Path of this node's parent, or `None` for the root.
    #[must_use]
    pub fn parent(&self) -> Option<NodePath> {
        if self.0.is_empty() {
            None
        } else {
            Some(NodePath(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    /// Whether `self` is an ancestor of (or equal to) `other`.
    #[must_use]
    pub fn is_prefix_of(&self, other: &NodePath) -> bool {
        other.0.len() >= self.0.len() && other.0[..self.0.len()] == self.0[..]
    }
}

/// Ordinal marker alphabets, cycled by paragraph nesting depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrdinalSeq {
    Digits,
    LowerAlpha,
    RomanLower,
    UpperAlpha,
}

impl OrdinalSeq {
    /// Marker string for the zero-based position `index` in this alphabet.
    #[must_use]
    pub fn marker(&self, index: usize) -> String {
        match self {
            Self::Digits => (index + 1).to_string(),
            Self::LowerAlpha => bijective_alpha(index, b'a'),
            Self::UpperAlpha => bijective_alpha(index, b'A'),
            Self::RomanLower => to_roman(index + 1),
        }
    }

    /// Inverse of [`OrdinalSeq::marker`].
    #[must_use]
    pub fn parse(&self, marker: &str) -> Option<usize> {
        match self {
            Self::Digits => marker.parse::<usize>().ok().and_then(|n| n.checked_sub(1)),
            Self::LowerAlpha => parse_bijective_alpha(marker, b'a'),
            Self::UpperAlpha => parse_bijective_alpha(marker, b'A'),
            Self::RomanLower => from_roman(marker).and_then(|n| n.checked_sub(1)),
        }
    }
}

/// Bijective base-26 marker: a..z, aa, ab, ...
fn bijective_alpha(index: usize, base: u8) -> String {
    let mut n = index + 1;
    let mut out = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        out.push(base + rem as u8);
        n = (n - 1) / 26;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

fn parse_bijective_alpha(marker: &str, base: u8) -> Option<usize> {
    if marker.is_empty() {
        return None;
    }
    let mut n: usize = 0;
    for byte in marker.bytes() {
        if byte < base || byte >= base + 26 {
            return None;
        }
        n = n * 26 + (byte - base) as usize + 1;
    }
    n.checked_sub(1)
}

const ROMAN_TABLE: [(usize, &str); 13] = [
    (1000, "m"),
    (900, "cm"),
    (500, "d"),
    (400, "cd"),
    (100, "c"),
    (90, "xc"),
    (50, "l"),
    (40, "xl"),
    (10, "x"),
    (9, "ix"),
    (5, "v"),
    (4, "iv"),
    (1, "i"),
];

fn to_roman(mut n: usize) -> String {
    let mut out = String::new();
    for (value, digits) in ROMAN_TABLE {
        while n >= value {
            out.push_str(digits);
            n -= value;
        }
    }
    out
}

fn from_roman(marker: &str) -> Option<usize> {
    if marker.is_empty() {
        return None;
    }
    let mut rest = marker;
    let mut n = 0;
    for (value, digits) in ROMAN_TABLE {
        while let Some(stripped) = rest.strip_prefix(digits) {
            rest = stripped;
            n += value;
        }
    }
    if rest.is_empty() {
        Some(n)
    } else {
        None
    }
}

/// Alphabet used for ordinal markers of a node, given its kind and the
/// number of same-kind ancestors (`pdepth`, nonzero only for paragraphs).
#[must_use]
pub fn sequence_for(kind: NodeKind, pdepth: usize) -> OrdinalSeq {
    match kind {
        NodeKind::Appendix => OrdinalSeq::UpperAlpha,
        NodeKind::Paragraph => match pdepth % 4 {
            0 => OrdinalSeq::LowerAlpha,
            1 => OrdinalSeq::Digits,
            2 => OrdinalSeq::RomanLower,
            _ => OrdinalSeq::UpperAlpha,
        },
        _ => OrdinalSeq::Digits,
    }
}

/// Compute the label segments of a sibling list.
///
/// `pdepth` is the paragraph nesting depth of the children. Ordinal counters
/// run per child kind; identifier segments are emitted verbatim, and when a
/// frozen identifier parses as an ordinal of the child's alphabet the counter
/// jumps past it (reserved slots hold their place without shifting others).
#[must_use]
pub fn sibling_segments(children: &[Arc<Node>], pdepth: usize) -> Vec<String> {
    segments_inner(children.iter().map(|c| (c.kind, &c.marker)), pdepth)
}

/// As [`sibling_segments`], over (kind, marker) pairs. The applier uses this
/// form for working nodes that are not yet `Arc`-wrapped.
#[must_use]
pub fn segments_of<'a, I>(items: I, pdepth: usize) -> Vec<String>
where
    I: Iterator<Item = (NodeKind, &'a Marker)>,
{
    segments_inner(items, pdepth)
}

fn segments_inner<'a, I>(items: I, pdepth: usize) -> Vec<String>
where
    I: Iterator<Item = (NodeKind, &'a Marker)>,
{
    let mut counters: HashMap<NodeKind, usize> = HashMap::new();
    let mut segments = Vec::new();
    for (kind, marker) in items {
        let seq = sequence_for(kind, pdepth);
        match marker {
            Marker::None => segments.push(String::new()),
            Marker::Ident(ident) => {
                if let Some(pos) = seq.parse(ident) {
                    let counter = counters.entry(kind).or_insert(0);
                    if pos >= *counter {
                        *counter = pos + 1;
                    }
                }
                segments.push(ident.clone());
            }
            Marker::Ordinal => {
                let counter = counters.entry(kind).or_insert(0);
                segments.push(seq.marker(*counter));
                *counter += 1;
            }
        }
    }
    segments
}

/// A node visited during a labeled traversal.
pub struct LabeledNode<'a> {
    pub label: String,
    pub parent_label: Option<String>,
    pub path: NodePath,
    /// Position among siblings.
    pub position: usize,
    pub node: &'a Arc<Node>,
}

/// Depth-first traversal yielding each node with its computed label, in
/// document order. The root itself is not yielded (its label is the part
/// number held by the tree metadata).
pub fn visit_labeled<'a, F>(root: &'a Node, root_label: &str, visitor: &mut F)
where
    F: FnMut(LabeledNode<'a>),
{
    visit_children(root, root_label, 0, &NodePath::root(), visitor);
}

fn visit_children<'a, F>(
    parent: &'a Node,
    parent_label: &str,
    parent_pdepth: usize,
    parent_path: &NodePath,
    visitor: &mut F,
) where
    F: FnMut(LabeledNode<'a>),
{
    let child_pdepth = |child: &Node| {
        if child.kind == parent.kind && child.kind == NodeKind::Paragraph {
            parent_pdepth + 1
        } else {
            0
        }
    };
    // Sibling alphabets depend on the children's own nesting depth. All
    // paragraph children of one parent share a depth, so taking the first
    // child's depth for the whole list is sound.
    let pdepth = parent
        .children
        .first()
        .map(|c| child_pdepth(c))
        .unwrap_or(0);
    let segments = sibling_segments(&parent.children, pdepth);

    for (position, (child, segment)) in parent.children.iter().zip(segments).enumerate() {
        let label = if segment.is_empty() {
            parent_label.to_string()
        } else {
            format!("{parent_label}-{segment}")
        };
        let mut path = parent_path.clone();
        path.0.push(position);
        visitor(LabeledNode {
            label: label.clone(),
            parent_label: Some(parent_label.to_string()),
            path: path.clone(),
            position,
            node: child,
        });
        visit_children(child, &label, child_pdepth(child), &path, visitor);
    }
}

/// Bidirectional map between labels and node positions for one snapshot.
#[derive(Debug, Clone, Default)]
pub struct LabelIndex {
    map: HashMap<String, NodePath>,
    duplicates: Vec<String>,
}

impl LabelIndex {
    /// Rebuild the index with one full traversal from the root.
    #[must_use]
    pub fn rebuild(root: &Node, root_label: &str) -> Self {
        let mut map = HashMap::new();
        let mut duplicates = Vec::new();
        map.insert(root_label.to_string(), NodePath::root());
        visit_labeled(root, root_label, &mut |entry| {
            if map.insert(entry.label.clone(), entry.path).is_some() {
                duplicates.push(entry.label);
            }
        });
        LabelIndex { map, duplicates }
    }

    /// Resolve a label to its node position.
    pub fn resolve(&self, label: &str) -> Result<&NodePath> {
        self.map
            .get(label)
            .ok_or_else(|| RegmlError::LabelNotFound(label.to_string()))
    }

    /// Whether the label exists in this snapshot.
    #[must_use]
    pub fn contains(&self, label: &str) -> bool {
        self.map.contains_key(label)
    }

    /// Labels that were assigned to more than one node during the rebuild.
    /// An empty slice is the invariant for a well-formed tree.
    #[must_use]
    pub fn duplicates(&self) -> &[String] {
        &self.duplicates
    }

    /// Number of labels, root included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterate over all labels in unspecified order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.map.keys().map(String::as_str)
    }
}

/// Walk a path down from the root.
#[must_use]
pub fn node_at<'a>(root: &'a Node, path: &NodePath) -> Option<&'a Node> {
    let mut current = root;
    for &index in &path.0 {
        current = current.children.get(index)?;
    }
    Some(current)
}
