//! Document tree: one immutable regulation version.
//!
//! A [`DocTree`] owns its root node, its rebuilt label index, and the
//! version metadata. Trees are never mutated once built; the applier
//! produces a new tree sharing unaffected subtrees with its input.

use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;
use crate::label::{node_at, sibling_segments, LabelIndex, NodePath};
use crate::node::{Node, NodeKind, NodeSpec};

/// Serialized form of a document file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocFile {
    /// CFR title number (e.g. 12).
    pub title: u32,
    /// CFR part number (e.g. "1003").
    pub part: String,
    /// Version identifier: a notice document number or an initial baseline.
    pub version: String,
    pub effective_date: NaiveDate,
    pub root: NodeSpec,
}

/// One regulation version: metadata, root node, and the owned label index.
#[derive(Debug, Clone)]
pub struct DocTree {
    pub title: u32,
    pub part: String,
    pub version: String,
    pub effective_date: NaiveDate,
    /// Load-time diagnostics (authored labels that did not match computed
    /// labels). Empty for trees produced by the applier.
    pub warnings: Vec<String>,
    root: Arc<Node>,
    index: LabelIndex,
}

impl DocTree {
    /// Build a tree from a root node, rebuilding the label index.
    #[must_use]
    pub fn new(
        title: u32,
        part: impl Into<String>,
        version: impl Into<String>,
        effective_date: NaiveDate,
        root: Arc<Node>,
    ) -> Self {
        let part = part.into();
        let index = LabelIndex::rebuild(&root, &part);
        Self {
            title,
            part,
            version: version.into(),
            effective_date,
            warnings: Vec::new(),
            root,
            index,
        }
    }

    /// The root node.
    #[must_use]
    pub fn root(&self) -> &Arc<Node> {
        &self.root
    }

    /// The label index of this snapshot. Private state: never shared
    /// across versions.
    #[must_use]
    pub fn index(&self) -> &LabelIndex {
        &self.index
    }

    /// The root label (the part number).
    #[must_use]
    pub fn root_label(&self) -> &str {
        &self.part
    }

    /// Resolve a label to its node.
    pub fn resolve(&self, label: &str) -> Result<&Node> {
        let path = self.index.resolve(label)?;
        // Paths in the index are valid by construction.
        Ok(node_at(&self.root, path).unwrap_or(&self.root))
    }

    /// Resolve a label to its position.
    pub fn resolve_path(&self, label: &str) -> Result<&NodePath> {
        self.index.resolve(label)
    }

    /// Build a tree from its serialized form.
    ///
    /// Authored labels are verified against the computed index; any
    /// mismatch becomes a warning on the returned tree, not an error.
    /// They are never trusted during diff verification.
    #[must_use]
    pub fn from_file(file: DocFile) -> Self {
        let authored = file.root.authored_labels();
        let root = Arc::new(file.root.into_node());
        let mut tree = Self::new(file.title, file.part, file.version, file.effective_date, root);
        for label in authored {
            if !tree.index.contains(&label) {
                warn!(label = %label, version = %tree.version, "authored label does not match computed labels");
                tree.warnings
                    .push(format!("authored label '{label}' not derivable from tree position"));
            }
        }
        for dup in tree.index.duplicates() {
            tree.warnings.push(format!("duplicate label '{dup}'"));
        }
        tree
    }

    /// Load a document file from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let file: DocFile = serde_json::from_str(&data)?;
        Ok(Self::from_file(file))
    }

    /// Serialized form with freshly computed labels on every node.
    #[must_use]
    pub fn to_file(&self) -> DocFile {
        DocFile {
            title: self.title,
            part: self.part.clone(),
            version: self.version.clone(),
            effective_date: self.effective_date,
            root: node_to_spec(&self.root, &self.part, 0),
        }
    }

    /// Write the document file to disk as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_json::to_string_pretty(&self.to_file())?;
        std::fs::write(path, data)?;
        Ok(())
    }
}

/// Recursively serialize a node, attaching computed labels.
pub(crate) fn node_to_spec(node: &Node, label: &str, pdepth: usize) -> NodeSpec {
    let child_pdepth = if node.kind == NodeKind::Paragraph {
        pdepth + 1
    } else {
        0
    };
    let segments = sibling_segments(&node.children, child_pdepth);
    NodeSpec {
        label: Some(label.to_string()),
        kind: node.kind,
        marker: node.marker.clone(),
        title: node.title.clone(),
        text: node.text.clone(),
        attributes: node.attributes.clone(),
        reserved: node.reserved,
        children: node
            .children
            .iter()
            .zip(segments)
            .map(|(child, segment)| {
                let child_label = if segment.is_empty() {
                    label.to_string()
                } else {
                    format!("{label}-{segment}")
                };
                node_to_spec(child, &child_label, child_pdepth)
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Marker;
    use pretty_assertions::assert_eq;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn sample_tree() -> DocTree {
        let root = Arc::new(Node::new(NodeKind::Regulation, Marker::None).with_children(vec![
            Node::new(NodeKind::Section, Marker::Ordinal)
                .with_title("Authority")
                .with_children(vec![
                    Node::new(NodeKind::Paragraph, Marker::Ordinal).with_text("first"),
                    Node::new(NodeKind::Paragraph, Marker::Ordinal).with_text("second"),
                ]),
            Node::new(NodeKind::Section, Marker::Ordinal).with_title("Purpose"),
        ]));
        DocTree::new(12, "1003", "2011-31712", date("2011-12-30"), root)
    }

    #[test]
    fn test_new_builds_index() {
        let tree = sample_tree();
        assert_eq!(tree.resolve("1003-1-b").unwrap().text, "second");
        assert_eq!(tree.resolve("1003-2").unwrap().title.as_deref(), Some("Purpose"));
        assert!(tree.resolve("1003-3").is_err());
    }

    #[test]
    fn test_to_file_attaches_labels() {
        let tree = sample_tree();
        let file = tree.to_file();
        assert_eq!(file.root.label.as_deref(), Some("1003"));
        assert_eq!(file.root.children[0].label.as_deref(), Some("1003-1"));
        assert_eq!(
            file.root.children[0].children[1].label.as_deref(),
            Some("1003-1-b")
        );
    }

    #[test]
    fn test_file_round_trip() {
        let tree = sample_tree();
        let json = serde_json::to_string(&tree.to_file()).unwrap();
        let file: DocFile = serde_json::from_str(&json).unwrap();
        let reloaded = DocTree::from_file(file);
        assert!(reloaded.warnings.is_empty());
        assert_eq!(reloaded.version, "2011-31712");
        assert_eq!(
            reloaded.root().subtree_fingerprint(),
            tree.root().subtree_fingerprint()
        );
    }

    #[test]
    fn test_load_flags_bad_authored_labels() {
        let mut file = sample_tree().to_file();
        file.root.children[0].label = Some("1003-99".to_string());
        let reloaded = DocTree::from_file(file);
        assert_eq!(reloaded.warnings.len(), 1);
        assert!(reloaded.warnings[0].contains("1003-99"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("2011-31712.json");
        let tree = sample_tree();
        tree.save(&path).unwrap();
        let reloaded = DocTree::load(&path).unwrap();
        assert_eq!(reloaded.part, "1003");
        assert_eq!(reloaded.effective_date, date("2011-12-30"));
    }
}
