//! Structural diff between two versions of a document tree, and the
//! verification check built on it.
//!
//! Matching walks both trees level by level. At each level, children are
//! paired first by identity (versions produced by the applier share
//! untouched subtrees, so a pointer comparison settles most of the tree),
//! then by interior fingerprint, then by label segment. The fingerprint
//! stage is what keeps a relabeled-but-unchanged node matched to itself
//! when both versions were loaded from disk and share no allocations.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::error::{RegmlError, Result};
use crate::label::sibling_segments;
use crate::node::{Node, NodeKind, NodeSpec};
use crate::tree::{node_to_spec, DocTree};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Removed,
    Modified,
    Moved,
}

/// One entry of a structural diff.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Change {
    pub kind: ChangeKind,
    /// The node's label in the newer version; for removals, in the older.
    pub label: String,
    /// For moves, the label the node carried before.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prior_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<NodeSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<NodeSpec>,
}

impl Change {
    fn bare(kind: ChangeKind, label: impl Into<String>) -> Self {
        Change {
            kind,
            label: label.into(),
            prior_label: None,
            before: None,
            after: None,
        }
    }
}

/// A pairwise diff between two adjacent versions, as exported.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionDiff {
    pub from_version: String,
    pub to_version: String,
    pub changes: Vec<Change>,
}

/// Compute the ordered change list between `a` (older) and `b` (newer).
///
/// Changes come out in `b` document order; removals follow, in `a`
/// document order. Subtrees are reported at their topmost changed node:
/// descendants of an added, removed or relocated subtree produce no
/// entries of their own, and a relabel implied by an ancestor's relabel
/// is not repeated per descendant.
#[must_use]
pub fn diff(a: &DocTree, b: &DocTree) -> Vec<Change> {
    let mut ctx = DiffCtx {
        a_labels_by_ptr: HashMap::new(),
        b_ptrs: HashSet::new(),
        claimed_moves: HashSet::new(),
        changes: Vec::new(),
        removals: Vec::new(),
    };
    index_ptrs(a.root(), a.root_label(), 0, &mut |ptr, label| {
        ctx.a_labels_by_ptr.insert(ptr, label);
    });
    index_ptrs(b.root(), b.root_label(), 0, &mut |ptr, _| {
        ctx.b_ptrs.insert(ptr);
    });

    if a.root().interior_fingerprint() != b.root().interior_fingerprint() {
        let mut change = Change::bare(ChangeKind::Modified, b.root_label());
        change.before = Some(interior_snapshot(a.root(), a.root_label(), 0));
        change.after = Some(interior_snapshot(b.root(), b.root_label(), 0));
        ctx.changes.push(change);
    }
    diff_children(
        &mut ctx,
        a.root(),
        b.root(),
        a.root_label(),
        b.root_label(),
        0,
        0,
    );

    let mut changes = ctx.changes;
    changes.append(&mut ctx.removals);
    debug!(
        from = %a.version,
        to = %b.version,
        changes = changes.len(),
        "diff computed"
    );
    changes
}

struct DiffCtx {
    /// Every allocation in `a`, by label; lets a subtree reattached under
    /// a different parent surface as one move instead of remove + add.
    a_labels_by_ptr: HashMap<*const Node, String>,
    b_ptrs: HashSet<*const Node>,
    claimed_moves: HashSet<*const Node>,
    changes: Vec<Change>,
    removals: Vec<Change>,
}

fn index_ptrs(
    node: &Arc<Node>,
    label: &str,
    pdepth: usize,
    record: &mut impl FnMut(*const Node, String),
) {
    record(Arc::as_ptr(node), label.to_string());
    let list_pdepth = child_list_pdepth(node, pdepth);
    let segments = sibling_segments(&node.children, list_pdepth);
    for (child, segment) in node.children.iter().zip(segments) {
        let child_label = join_label(label, &segment);
        index_ptrs(child, &child_label, list_pdepth, record);
    }
}

fn child_list_pdepth(parent: &Node, pdepth: usize) -> usize {
    let nested = parent.kind == NodeKind::Paragraph
        && parent
            .children
            .first()
            .is_some_and(|c| c.kind == NodeKind::Paragraph);
    if nested {
        pdepth + 1
    } else {
        0
    }
}

fn join_label(base: &str, segment: &str) -> String {
    if segment.is_empty() {
        base.to_string()
    } else {
        format!("{base}-{segment}")
    }
}

fn diff_children(
    ctx: &mut DiffCtx,
    a: &Node,
    b: &Node,
    a_label: &str,
    b_label: &str,
    a_pdepth: usize,
    b_pdepth: usize,
) {
    let a_list_pdepth = child_list_pdepth(a, a_pdepth);
    let b_list_pdepth = child_list_pdepth(b, b_pdepth);
    let a_segments = sibling_segments(&a.children, a_list_pdepth);
    let b_segments = sibling_segments(&b.children, b_list_pdepth);

    // Pair children: identity, then interior fingerprint, then segment.
    let mut matched_a: Vec<Option<usize>> = vec![None; b.children.len()];
    let mut taken_a = vec![false; a.children.len()];

    for (j, b_child) in b.children.iter().enumerate() {
        for (i, a_child) in a.children.iter().enumerate() {
            if !taken_a[i] && Arc::ptr_eq(a_child, b_child) {
                matched_a[j] = Some(i);
                taken_a[i] = true;
                break;
            }
        }
    }
    for pass in [Pass::Fingerprint, Pass::Segment] {
        for (j, b_child) in b.children.iter().enumerate() {
            if matched_a[j].is_some() {
                continue;
            }
            for (i, a_child) in a.children.iter().enumerate() {
                if taken_a[i] || a_child.kind != b_child.kind {
                    continue;
                }
                let hit = match pass {
                    Pass::Fingerprint => {
                        a_child.interior_fingerprint() == b_child.interior_fingerprint()
                    }
                    Pass::Segment => a_segments[i] == b_segments[j],
                };
                if hit {
                    matched_a[j] = Some(i);
                    taken_a[i] = true;
                    break;
                }
            }
        }
    }

    for (j, b_child) in b.children.iter().enumerate() {
        let b_child_label = join_label(b_label, &b_segments[j]);
        let Some(i) = matched_a[j] else {
            let ptr = Arc::as_ptr(b_child);
            if let Some(prior) = ctx.a_labels_by_ptr.get(&ptr) {
                // The same subtree exists in a, under another parent.
                let mut change = Change::bare(ChangeKind::Moved, b_child_label);
                change.prior_label = Some(prior.clone());
                ctx.changes.push(change);
                ctx.claimed_moves.insert(ptr);
            } else {
                let mut change = Change::bare(ChangeKind::Added, b_child_label.clone());
                change.after = Some(node_to_spec(b_child, &b_child_label, b_list_pdepth));
                ctx.changes.push(change);
            }
            continue;
        };

        let a_child = &a.children[i];
        let a_child_label = join_label(a_label, &a_segments[i]);
        let identical = Arc::ptr_eq(a_child, b_child);

        if a_segments[i] != b_segments[j] {
            let mut change = Change::bare(ChangeKind::Moved, b_child_label.clone());
            change.prior_label = Some(a_child_label.clone());
            ctx.changes.push(change);
        }
        if identical {
            // Shared subtree: nothing below can differ structurally, and
            // relabels of descendants are implied by the one above.
            continue;
        }
        if a_child.interior_fingerprint() != b_child.interior_fingerprint() {
            let mut change = Change::bare(ChangeKind::Modified, b_child_label.clone());
            change.before = Some(interior_snapshot(a_child, &a_child_label, a_list_pdepth));
            change.after = Some(interior_snapshot(b_child, &b_child_label, b_list_pdepth));
            ctx.changes.push(change);
        }
        diff_children(
            ctx,
            a_child,
            b_child,
            &a_child_label,
            &b_child_label,
            a_list_pdepth,
            b_list_pdepth,
        );
    }

    for (i, a_child) in a.children.iter().enumerate() {
        if taken_a[i] {
            continue;
        }
        let ptr = Arc::as_ptr(a_child);
        if ctx.b_ptrs.contains(&ptr) || ctx.claimed_moves.contains(&ptr) {
            // Reattached elsewhere; reported as a move on the b side.
            continue;
        }
        let a_child_label = join_label(a_label, &a_segments[i]);
        let mut change = Change::bare(ChangeKind::Removed, a_child_label.clone());
        change.before = Some(node_to_spec(a_child, &a_child_label, a_list_pdepth));
        ctx.removals.push(change);
    }
}

#[derive(Clone, Copy)]
enum Pass {
    Fingerprint,
    Segment,
}

/// Diff every adjacent pair of an ordered version sequence. Never squashes
/// across non-adjacent versions.
#[must_use]
pub fn diff_adjacent(trees: &[DocTree]) -> Vec<VersionDiff> {
    trees
        .windows(2)
        .map(|pair| VersionDiff {
            from_version: pair[0].version.clone(),
            to_version: pair[1].version.clone(),
            changes: diff(&pair[0], &pair[1]),
        })
        .collect()
}

/// Check that `actual` reproduces `expected` exactly.
///
/// Any structural difference fails with [`RegmlError::VerificationFailed`],
/// naming the first diverging label.
pub fn verify(expected: &DocTree, actual: &DocTree) -> Result<()> {
    let changes = diff(expected, actual);
    if let Some(first) = changes.first() {
        return Err(RegmlError::VerificationFailed {
            expected_version: expected.version.clone(),
            count: changes.len(),
            first_label: first.label.clone(),
        });
    }
    Ok(())
}

/// A node's own content, children dropped. Used for modified-entry
/// snapshots, where child changes get their own entries.
fn interior_snapshot(node: &Node, label: &str, pdepth: usize) -> NodeSpec {
    let mut shallow = Node::clone(node);
    shallow.children = Vec::new();
    node_to_spec(&shallow, label, pdepth)
}
