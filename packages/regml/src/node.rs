//! Core node types for regulation trees.
//!
//! A [`Node`] is one element of a regulation's hierarchy. Nodes never store
//! their own label: labels are derived from tree position by the label index
//! (see [`crate::label`]). Children are held behind [`Arc`] so that versions
//! produced by the applier share unaffected subtrees with their predecessor.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Structural kind of a regulation node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// The root of a regulation part.
    Regulation,
    /// A subpart grouping sections.
    Subpart,
    /// A numbered section.
    Section,
    /// A marked paragraph, possibly nested.
    Paragraph,
    /// An interpretation (supplement) entry.
    Interpretation,
    /// An appendix.
    Appendix,
}

impl NodeKind {
    /// String value as used in document files.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Regulation => "regulation",
            Self::Subpart => "subpart",
            Self::Section => "section",
            Self::Paragraph => "paragraph",
            Self::Interpretation => "interpretation",
            Self::Appendix => "appendix",
        }
    }

    /// Whether a node of this kind may appear as a direct child of `self`.
    #[must_use]
    pub fn may_contain(&self, child: NodeKind) -> bool {
        match self {
            Self::Regulation => matches!(
                child,
                NodeKind::Subpart | NodeKind::Section | NodeKind::Appendix | NodeKind::Interpretation
            ),
            Self::Subpart => matches!(child, NodeKind::Section),
            Self::Section => matches!(child, NodeKind::Paragraph),
            Self::Paragraph => matches!(child, NodeKind::Paragraph),
            Self::Interpretation => matches!(child, NodeKind::Interpretation | NodeKind::Paragraph),
            Self::Appendix => matches!(child, NodeKind::Paragraph | NodeKind::Section),
        }
    }
}

/// How a node contributes a segment to its label.
///
/// Ordinal markers are recomputed from sibling position on every index
/// rebuild; identifier markers are taken verbatim and never renumbered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Marker {
    /// No label segment (the regulation root; its label is the part number).
    None,
    /// Positional marker, recomputed from the node's place among siblings
    /// of the same kind.
    Ordinal,
    /// Fixed marker taken verbatim (e.g. "A" for Appendix A, or an ordinal
    /// segment frozen by a reserved designation).
    Ident(String),
}

impl Default for Marker {
    fn default() -> Self {
        Marker::Ordinal
    }
}

/// Auxiliary attributes of a node (title variants, defined terms, etc.).
pub type Attributes = BTreeMap<String, String>;

/// One element of a regulation tree.
///
/// Immutable once placed in a published [`crate::tree::DocTree`]; the
/// applier builds new nodes along edited paths and shares the rest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub kind: NodeKind,
    pub marker: Marker,
    pub title: Option<String>,
    pub text: String,
    pub attributes: Attributes,
    /// Reserved slot: structurally present, content-empty, label frozen.
    pub reserved: bool,
    pub children: Vec<Arc<Node>>,
}

impl Node {
    /// Create a node with the given kind and marker; other fields empty.
    #[must_use]
    pub fn new(kind: NodeKind, marker: Marker) -> Self {
        Self {
            kind,
            marker,
            title: None,
            text: String::new(),
            attributes: Attributes::new(),
            reserved: false,
            children: Vec::new(),
        }
    }

    /// Builder: set the title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Builder: set the text content.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Builder: add an attribute.
    #[must_use]
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Builder: set the children.
    #[must_use]
    pub fn with_children(mut self, children: Vec<Node>) -> Self {
        self.children = children.into_iter().map(Arc::new).collect();
        self
    }

    /// Fingerprint over this node's own content, ignoring children.
    ///
    /// Used by the differ to decide whether a label present in both
    /// versions was modified.
    #[must_use]
    pub fn interior_fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.kind.as_str().as_bytes());
        match &self.marker {
            Marker::None => hasher.update(b"-"),
            Marker::Ordinal => hasher.update(b"#"),
            Marker::Ident(m) => hasher.update(m.as_bytes()),
        }
        if let Some(title) = &self.title {
            hasher.update(title.as_bytes());
        }
        hasher.update(self.text.as_bytes());
        for (key, value) in &self.attributes {
            hasher.update(key.as_bytes());
            hasher.update(value.as_bytes());
        }
        hasher.update(if self.reserved { b"r" } else { b"." });
        hex::encode(hasher.finalize())
    }

    /// Merkle-style fingerprint over this node and its whole subtree.
    #[must_use]
    pub fn subtree_fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.interior_fingerprint().as_bytes());
        for child in &self.children {
            hasher.update(child.subtree_fingerprint().as_bytes());
        }
        hex::encode(hasher.finalize())
    }

    /// Number of nodes in this subtree, including self.
    #[must_use]
    pub fn subtree_len(&self) -> usize {
        1 + self.children.iter().map(|c| c.subtree_len()).sum::<usize>()
    }

    /// Height of the subtree rooted at this node.
    #[must_use]
    pub fn height(&self) -> usize {
        1 + self.children.iter().map(|c| c.height()).max().unwrap_or(0)
    }
}

/// Serializable form of a node subtree, used in document files and as
/// operation payloads.
///
/// The `label` field is authored output only: on load it is checked against
/// the computed label and never trusted as addressing state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub kind: NodeKind,
    #[serde(default)]
    pub marker: Marker,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,
    #[serde(default, skip_serializing_if = "is_false")]
    pub reserved: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeSpec>,
}

fn is_false(value: &bool) -> bool {
    !value
}

impl NodeSpec {
    /// Build the in-memory subtree, dropping authored labels.
    #[must_use]
    pub fn into_node(self) -> Node {
        Node {
            kind: self.kind,
            marker: self.marker,
            title: self.title,
            text: self.text,
            attributes: self.attributes,
            reserved: self.reserved,
            children: self
                .children
                .into_iter()
                .map(|c| Arc::new(c.into_node()))
                .collect(),
        }
    }

    /// Authored labels of this subtree, in document order. Used for
    /// load-time verification against computed labels.
    #[must_use]
    pub fn authored_labels(&self) -> Vec<String> {
        let mut labels = Vec::new();
        self.collect_labels(&mut labels);
        labels
    }

    fn collect_labels(&self, labels: &mut Vec<String>) {
        if let Some(label) = &self.label {
            labels.push(label.clone());
        }
        for child in &self.children {
            child.collect_labels(labels);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> Node {
        Node::new(NodeKind::Section, Marker::Ordinal)
            .with_title("Definitions")
            .with_text("intro")
            .with_children(vec![
                Node::new(NodeKind::Paragraph, Marker::Ordinal).with_text("first"),
                Node::new(NodeKind::Paragraph, Marker::Ordinal).with_text("second"),
            ])
    }

    #[test]
    fn test_interior_fingerprint_ignores_children() {
        let with_children = sample();
        let mut without_children = sample();
        without_children.children.clear();
        assert_eq!(
            with_children.interior_fingerprint(),
            without_children.interior_fingerprint()
        );
    }

    #[test]
    fn test_subtree_fingerprint_sees_children() {
        let a = sample();
        let mut b = sample();
        b.children.pop();
        assert_ne!(a.subtree_fingerprint(), b.subtree_fingerprint());
    }

    #[test]
    fn test_fingerprint_changes_with_text() {
        let a = Node::new(NodeKind::Paragraph, Marker::Ordinal).with_text("one");
        let b = Node::new(NodeKind::Paragraph, Marker::Ordinal).with_text("two");
        assert_ne!(a.interior_fingerprint(), b.interior_fingerprint());
    }

    #[test]
    fn test_may_contain() {
        assert!(NodeKind::Regulation.may_contain(NodeKind::Section));
        assert!(NodeKind::Section.may_contain(NodeKind::Paragraph));
        assert!(!NodeKind::Paragraph.may_contain(NodeKind::Section));
        assert!(!NodeKind::Section.may_contain(NodeKind::Regulation));
    }

    #[test]
    fn test_node_spec_round_trip() {
        let spec: NodeSpec = serde_json::from_str(
            r#"{
                "kind": "paragraph",
                "marker": "ordinal",
                "text": "content",
                "children": [{"kind": "paragraph", "marker": {"ident": "x"}, "text": "sub"}]
            }"#,
        )
        .unwrap();
        let node = spec.into_node();
        assert_eq!(node.kind, NodeKind::Paragraph);
        assert_eq!(node.children.len(), 1);
        assert_eq!(node.children[0].marker, Marker::Ident("x".to_string()));
    }

    #[test]
    fn test_subtree_len_and_height() {
        let node = sample();
        assert_eq!(node.subtree_len(), 3);
        assert_eq!(node.height(), 2);
    }
}
