//! Changeset applier: apply an ordered operation sequence to a document
//! tree, producing the next version.
//!
//! The applier works on an overlay of the input tree. Nodes are wrapped
//! lazily along edit paths; everything else stays behind the input's `Arc`s,
//! so the produced version shares unaffected subtrees with its predecessor.
//! Operations resolve against pre-rebuild labels, frozen per node when its
//! parent is first expanded. The label index is rebuilt exactly once, after
//! the whole sequence has been applied; renumbering therefore reflects the
//! final structure, never an intermediate state.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::changeset::{self, PlannedOp};
use crate::error::{RegmlError, Result};
use crate::label::{segments_of, visit_labeled, NodePath};
use crate::node::{Marker, Node, NodeKind};
use crate::notice::Notice;
use crate::ops::{OpKind, Position};
use crate::tree::DocTree;

/// A label renumbering caused by a notice application: the same node,
/// addressed differently before and after.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Relabel {
    pub before: String,
    pub after: String,
}

/// Result of applying one notice: the next version plus the structured
/// log of label renumbering it caused.
#[derive(Debug)]
pub struct ApplyOutcome {
    pub tree: DocTree,
    pub relabeled: Vec<Relabel>,
}

/// Apply a notice to a document tree.
///
/// All-or-nothing: on any error the input tree is untouched and no partial
/// result is returned.
pub fn apply_notice(tree: &DocTree, notice: &Notice) -> Result<ApplyOutcome> {
    if notice.applies_to_version != tree.version {
        return Err(RegmlError::VersionMismatch {
            document_number: notice.document_number.clone(),
            declared: notice.applies_to_version.clone(),
            actual: tree.version.clone(),
        });
    }

    let plan = changeset::plan(notice)?;
    let mut root = WorkNode {
        label: Some(tree.root_label().to_string()),
        pdepth: 0,
        node: Arc::clone(tree.root()),
        children: None,
    };

    for planned in &plan.ops {
        info!(
            index = planned.index,
            kind = planned.op.kind.as_str(),
            label = %planned.op.target_label,
            "applying operation"
        );
        apply_op(&mut root, planned)?;
    }

    let (new_root, _) = finish(root);
    let next = DocTree::new(
        tree.title,
        tree.part.clone(),
        notice.document_number.clone(),
        notice.effective_date,
        new_root,
    );
    if let Some(dup) = next.index().duplicates().first() {
        return Err(RegmlError::StructuralConflict {
            index: plan.ops.len(),
            label: dup.clone(),
            reason: "duplicate label after final rebuild".to_string(),
        });
    }

    let relabeled = relabel_log(tree, &next);
    debug!(
        version = %next.version,
        labels = next.index().len(),
        relabeled = relabeled.len(),
        "notice applied"
    );
    Ok(ApplyOutcome { tree: next, relabeled })
}

/// Overlay node: wraps an input (or payload) node without mutating it.
/// `children: None` means the underlying node's children are untouched
/// and stay shared with the input tree.
struct WorkNode {
    /// Pre-rebuild label, frozen when this wrapper was created. `None`
    /// for nodes inserted this pass without an identifier marker: those
    /// only become addressable after the final rebuild.
    label: Option<String>,
    /// Paragraph nesting depth, for provisional label alphabets.
    pdepth: usize,
    node: Arc<Node>,
    children: Option<Vec<WorkNode>>,
}

impl WorkNode {
    fn child_pdepth(&self, child_kind: NodeKind) -> usize {
        if self.node.kind == NodeKind::Paragraph && child_kind == NodeKind::Paragraph {
            self.pdepth + 1
        } else {
            0
        }
    }

    /// Materialize child wrappers, freezing their current labels. A no-op
    /// if already expanded.
    fn expand(&mut self) {
        if self.children.is_some() {
            return;
        }
        let pdepth = self
            .node
            .children
            .first()
            .map(|c| self.child_pdepth(c.kind))
            .unwrap_or(0);
        let segments = segments_of(
            self.node.children.iter().map(|c| (c.kind, &c.marker)),
            pdepth,
        );
        let children = self
            .node
            .children
            .iter()
            .zip(segments)
            .map(|(child, segment)| WorkNode {
                label: self.label.as_ref().map(|base| {
                    if segment.is_empty() {
                        base.clone()
                    } else {
                        format!("{base}-{segment}")
                    }
                }),
                pdepth: self.child_pdepth(child.kind),
                node: Arc::clone(child),
                children: None,
            })
            .collect();
        self.children = Some(children);
    }
}

/// Locate a frozen label in the overlay, expanding nothing outside the
/// found path. Returns overlay child indices from `work`.
fn resolve_work(work: &mut WorkNode, target: &str) -> Option<Vec<usize>> {
    if work.label.as_deref() == Some(target) {
        return Some(Vec::new());
    }
    let found = locate(work, target)?;
    // Expand along the found path so the caller can take mutable hold.
    let mut current = work;
    for &index in &found {
        current.expand();
        current = current.children.as_mut()?.get_mut(index)?;
    }
    Some(found)
}

/// Read-only search for a frozen label. Expanded children carry their
/// frozen labels directly; unexpanded subtrees are walked through the
/// shared nodes, deriving the labels they would freeze to.
fn locate(work: &WorkNode, target: &str) -> Option<Vec<usize>> {
    match &work.children {
        Some(children) => {
            for (index, child) in children.iter().enumerate() {
                if child.label.as_deref() == Some(target) {
                    return Some(vec![index]);
                }
                if let Some(mut path) = locate(child, target) {
                    path.insert(0, index);
                    return Some(path);
                }
            }
            None
        }
        None => {
            let label = work.label.as_deref()?;
            locate_shared(&work.node, label, work.pdepth, target)
        }
    }
}

fn locate_shared(node: &Node, label: &str, pdepth: usize, target: &str) -> Option<Vec<usize>> {
    let child_pdepth = |child: &Node| {
        if node.kind == NodeKind::Paragraph && child.kind == NodeKind::Paragraph {
            pdepth + 1
        } else {
            0
        }
    };
    let list_pdepth = node.children.first().map(|c| child_pdepth(c)).unwrap_or(0);
    let segments = segments_of(node.children.iter().map(|c| (c.kind, &c.marker)), list_pdepth);
    for (index, (child, segment)) in node.children.iter().zip(segments).enumerate() {
        let child_label = if segment.is_empty() {
            label.to_string()
        } else {
            format!("{label}-{segment}")
        };
        if child_label == target {
            return Some(vec![index]);
        }
        if let Some(mut path) = locate_shared(child, &child_label, child_pdepth(child), target) {
            path.insert(0, index);
            return Some(path);
        }
    }
    None
}

/// Mutable access along an already-resolved overlay path.
fn work_at<'a>(root: &'a mut WorkNode, path: &[usize]) -> &'a mut WorkNode {
    let mut current = root;
    for &index in path {
        current.expand();
        // Paths come from resolve_work against the same overlay.
        #[allow(clippy::expect_used)]
        let children = current.children.as_mut().expect("expanded above");
        current = &mut children[index];
    }
    current
}

fn apply_op(root: &mut WorkNode, planned: &PlannedOp) -> Result<()> {
    let index = planned.index;
    let op = &planned.op;
    let unresolved = || RegmlError::UnresolvedTarget {
        index,
        kind: op.kind.as_str().to_string(),
        label: op.target_label.clone(),
    };
    let conflict = |label: &str, reason: &str| RegmlError::StructuralConflict {
        index,
        label: label.to_string(),
        reason: reason.to_string(),
    };

    let path = resolve_work(root, &op.target_label).ok_or_else(unresolved)?;

    match op.kind {
        OpKind::Delete => {
            let Some((&last, parent_path)) = path.split_last() else {
                return Err(conflict(&op.target_label, "cannot delete the regulation root"));
            };
            let parent = work_at(root, parent_path);
            parent.expand();
            if let Some(children) = parent.children.as_mut() {
                children.remove(last);
            }
        }
        OpKind::Replace => {
            // Payload presence is validated by the changeset parser.
            let Some(payload) = op.payload.clone() else {
                return Err(unresolved());
            };
            let target = work_at(root, &path);
            target.node = Arc::new(payload.into_node());
            target.children = None;
        }
        OpKind::DesignateReserved => {
            let target = work_at(root, &path);
            let frozen = target
                .label
                .as_deref()
                .and_then(|l| l.rsplit('-').next())
                .map(str::to_string);
            let mut node = Node::new(target.node.kind, target.node.marker.clone());
            if let (Marker::Ordinal, Some(segment)) = (&target.node.marker, frozen) {
                node.marker = Marker::Ident(segment);
            }
            node.title = Some("[Reserved]".to_string());
            node.reserved = true;
            target.node = Arc::new(node);
            target.children = None;
        }
        OpKind::Insert => {
            let Some(payload) = op.payload.clone() else {
                return Err(unresolved());
            };
            let Some(position) = op.position else {
                return Err(unresolved());
            };
            splice(
                root,
                index,
                &path,
                &op.target_label,
                position,
                Splice::Fresh(payload.into_node()),
            )?;
        }
        OpKind::Move => {
            let Some(position) = op.position else {
                return Err(unresolved());
            };
            let Some(destination) = op.destination.as_deref() else {
                return Err(unresolved());
            };
            let dest_path = resolve_work(root, destination).ok_or_else(|| {
                conflict(destination, "move destination does not resolve")
            })?;
            if NodePath(path.clone()).is_prefix_of(&NodePath(dest_path)) {
                return Err(conflict(
                    &op.target_label,
                    "move destination lies inside the moved subtree",
                ));
            }
            let Some((&last, parent_path)) = path.split_last() else {
                return Err(conflict(&op.target_label, "cannot move the regulation root"));
            };
            let parent = work_at(root, parent_path);
            parent.expand();
            #[allow(clippy::expect_used)]
            let detached = parent
                .children
                .as_mut()
                .expect("expanded above")
                .remove(last);
            // Indices may have shifted; resolve the destination again in
            // the post-detach overlay.
            let dest_path = resolve_work(root, destination).ok_or_else(|| {
                conflict(destination, "insert anchor no longer valid after prior operation")
            })?;
            splice(
                root,
                index,
                &dest_path,
                destination,
                position,
                Splice::Detached(detached),
            )?;
        }
    }
    Ok(())
}

/// What lands at the splice point: a fresh payload node or a subtree
/// detached earlier in the same pass.
enum Splice {
    Fresh(Node),
    Detached(WorkNode),
}

/// Splice a node at an anchor.
///
/// For before/after anchors whose splice point falls on a reserved slot of
/// the same kind, a fresh insert consumes the slot: the payload replaces
/// the placeholder in place and no ordinal shifts.
fn splice(
    root: &mut WorkNode,
    op_index: usize,
    anchor_path: &[usize],
    anchor_label: &str,
    position: Position,
    item: Splice,
) -> Result<()> {
    let conflict = |label: &str, reason: &str| RegmlError::StructuralConflict {
        index: op_index,
        label: label.to_string(),
        reason: reason.to_string(),
    };

    let (parent, at) = match position {
        Position::ChildOf => {
            let parent = work_at(root, anchor_path);
            parent.expand();
            let len = parent.children.as_ref().map(Vec::len).unwrap_or(0);
            (parent, len)
        }
        Position::Before | Position::After => {
            let Some((&last, parent_path)) = anchor_path.split_last() else {
                return Err(conflict(anchor_label, "cannot insert alongside the regulation root"));
            };
            let parent = work_at(root, parent_path);
            parent.expand();
            let at = if position == Position::After { last + 1 } else { last };
            (parent, at)
        }
    };

    let is_insert = matches!(item, Splice::Fresh(_));
    let incoming = match item {
        // A moved subtree keeps its frozen label.
        Splice::Detached(mut work) => {
            work.pdepth = parent.child_pdepth(work.node.kind);
            work
        }
        Splice::Fresh(node) => {
            let label = match (&node.marker, &parent.label) {
                (Marker::Ident(ident), Some(base)) => Some(format!("{base}-{ident}")),
                // Ordinal insertions get their label from the final rebuild only.
                _ => None,
            };
            WorkNode {
                label,
                pdepth: parent.child_pdepth(node.kind),
                node: Arc::new(node),
                children: None,
            }
        }
    };

    #[allow(clippy::expect_used)]
    let children = parent.children.as_mut().expect("expanded above");
    if let Some(label) = &incoming.label {
        if children.iter().any(|c| c.label.as_deref() == Some(label.as_str())) {
            return Err(conflict(label, "insertion would duplicate an existing label"));
        }
    }

    // Reserved-slot consumption applies to fresh insertions only.
    if is_insert {
        if let Some(slot) = children.get(at) {
            if slot.node.reserved && slot.node.kind == incoming.node.kind {
                let frozen = slot.label.clone();
                children[at] = WorkNode { label: frozen, ..incoming };
                return Ok(());
            }
        }
    }

    children.insert(at, incoming);
    Ok(())
}

/// Collapse the overlay into a node tree, sharing every untouched subtree
/// with the input. Returns the node and whether anything under it changed.
fn finish(work: WorkNode) -> (Arc<Node>, bool) {
    let Some(children) = work.children else {
        return (work.node, false);
    };
    let mut changed = children.len() != work.node.children.len();
    let mut new_children = Vec::with_capacity(children.len());
    for (index, child) in children.into_iter().enumerate() {
        let original = work.node.children.get(index).map(Arc::clone);
        let (built, child_changed) = finish(child);
        if child_changed || !original.is_some_and(|o| Arc::ptr_eq(&o, &built)) {
            changed = true;
        }
        new_children.push(built);
    }
    if !changed {
        return (work.node, false);
    }
    let mut node = Node::clone(&work.node);
    node.children = new_children;
    (Arc::new(node), true)
}

/// Pair up nodes shared between the two versions and record every label
/// that changed: the structured renumbering log.
fn relabel_log(before: &DocTree, after: &DocTree) -> Vec<Relabel> {
    let mut old_labels: std::collections::HashMap<*const Node, String> =
        std::collections::HashMap::new();
    visit_labeled(before.root(), before.root_label(), &mut |entry| {
        old_labels.insert(Arc::as_ptr(entry.node), entry.label);
    });

    let mut log = Vec::new();
    visit_labeled(after.root(), after.root_label(), &mut |entry| {
        if let Some(old) = old_labels.get(&Arc::as_ptr(entry.node)) {
            if *old != entry.label {
                log.push(Relabel {
                    before: old.clone(),
                    after: entry.label,
                });
            }
        }
    });
    log
}
