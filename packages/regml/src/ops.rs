//! Typed structural edit operations, as authored in a notice.

use serde::{Deserialize, Serialize};

use crate::node::NodeSpec;

/// Kind of structural edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OpKind {
    /// Construct the payload subtree at an anchor and position.
    Insert,
    /// Substitute the target subtree with the payload, keeping position.
    Replace,
    /// Remove the target subtree.
    Delete,
    /// Detach the target subtree and reattach it at a new anchor.
    Move,
    /// Empty the target's content, freezing its label slot.
    DesignateReserved,
}

impl OpKind {
    /// String value as used in notice files.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Replace => "replace",
            Self::Delete => "delete",
            Self::Move => "move",
            Self::DesignateReserved => "designate-reserved",
        }
    }
}

/// Anchor position for insert and move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Position {
    /// Immediately before the anchor node.
    Before,
    /// Immediately after the anchor node.
    After,
    /// Appended to the anchor node's children.
    ChildOf,
}

/// One structural edit.
///
/// `target_label` names the node acted on; for insert it names the anchor
/// (sibling or parent, per `position`). For move, `destination` names the
/// anchor the subtree is reattached at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub kind: OpKind,
    pub target_label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<NodeSpec>,
}

impl Operation {
    /// Depth of the target label (number of segments).
    #[must_use]
    pub fn target_depth(&self) -> usize {
        self.target_label.split('-').count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_operation_deserialization() {
        let op: Operation = serde_json::from_str(
            r#"{
                "kind": "insert",
                "targetLabel": "1003-1",
                "position": "after",
                "payload": {"kind": "section", "text": "new section"}
            }"#,
        )
        .unwrap();
        assert_eq!(op.kind, OpKind::Insert);
        assert_eq!(op.target_label, "1003-1");
        assert_eq!(op.position, Some(Position::After));
        assert!(op.payload.is_some());
        assert!(op.destination.is_none());
    }

    #[test]
    fn test_designate_reserved_kind() {
        let op: Operation = serde_json::from_str(
            r#"{"kind": "designate-reserved", "targetLabel": "1003-1-b"}"#,
        )
        .unwrap();
        assert_eq!(op.kind, OpKind::DesignateReserved);
        assert_eq!(op.kind.as_str(), "designate-reserved");
    }

    #[test]
    fn test_target_depth() {
        let op: Operation =
            serde_json::from_str(r#"{"kind": "delete", "targetLabel": "1003-1-b"}"#).unwrap();
        assert_eq!(op.target_depth(), 3);
    }
}
