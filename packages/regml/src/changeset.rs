//! Changeset parser: turn a notice's authored operation list into an
//! execution-ordered plan.
//!
//! Shape validation happens first, then conflict detection, then ordering.
//! Execution order is: deletions (deepest target first), then
//! replace/designate-reserved/move, then insertions (shallowest anchor
//! first). The sort is stable, so authored order is kept whenever no
//! dependency forces a reordering.

use tracing::debug;

use crate::error::{RegmlError, Result};
use crate::notice::Notice;
use crate::ops::{OpKind, Operation};

/// An operation annotated with its authored index, for fault reporting.
#[derive(Debug, Clone)]
pub struct PlannedOp {
    /// Position in the notice's authored operation list.
    pub index: usize,
    pub op: Operation,
}

/// An execution-ordered, validated operation sequence.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    pub ops: Vec<PlannedOp>,
}

/// Validate and order a notice's operations.
pub fn plan(notice: &Notice) -> Result<ExecutionPlan> {
    for (index, op) in notice.operations.iter().enumerate() {
        check_shape(index, op)?;
    }
    check_conflicts(&notice.operations)?;

    let mut ops: Vec<PlannedOp> = notice
        .operations
        .iter()
        .cloned()
        .enumerate()
        .map(|(index, op)| PlannedOp { index, op })
        .collect();

    // Stable sort: ties keep authored order.
    ops.sort_by_key(|p| {
        let depth = p.op.target_depth() as i64;
        match p.op.kind {
            OpKind::Delete => (0, -depth),
            OpKind::Replace | OpKind::DesignateReserved | OpKind::Move => (1, 0),
            OpKind::Insert => (2, depth),
        }
    });

    debug!(
        document_number = %notice.document_number,
        operations = ops.len(),
        "planned changeset"
    );
    Ok(ExecutionPlan { ops })
}

fn check_shape(index: usize, op: &Operation) -> Result<()> {
    let malformed = |reason: &str| RegmlError::MalformedOperation {
        index,
        kind: op.kind.as_str().to_string(),
        reason: reason.to_string(),
    };

    if op.target_label.is_empty() {
        return Err(malformed("targetLabel is required"));
    }

    match op.kind {
        OpKind::Insert => {
            if op.position.is_none() {
                return Err(malformed("position is required for insert"));
            }
            if op.payload.is_none() {
                return Err(malformed("payload is required for insert"));
            }
            if op.destination.is_some() {
                return Err(malformed("destination is not allowed for insert"));
            }
        }
        OpKind::Replace => {
            if op.payload.is_none() {
                return Err(malformed("payload is required for replace"));
            }
            if op.position.is_some() || op.destination.is_some() {
                return Err(malformed("replace takes no position or destination"));
            }
        }
        OpKind::Delete | OpKind::DesignateReserved => {
            if op.payload.is_some() || op.position.is_some() || op.destination.is_some() {
                return Err(malformed("only targetLabel is allowed for this kind"));
            }
        }
        OpKind::Move => {
            if op.position.is_none() {
                return Err(malformed("position is required for move"));
            }
            if op.destination.is_none() {
                return Err(malformed("destination is required for move"));
            }
            if op.payload.is_some() {
                return Err(malformed("payload is not allowed for move"));
            }
        }
    }
    Ok(())
}

/// Whether `descendant` is strictly under `ancestor` in label space.
fn is_strict_descendant(descendant: &str, ancestor: &str) -> bool {
    descendant.len() > ancestor.len()
        && descendant.starts_with(ancestor)
        && descendant.as_bytes()[ancestor.len()] == b'-'
}

fn check_conflicts(operations: &[Operation]) -> Result<()> {
    for (first, a) in operations.iter().enumerate() {
        for (offset, b) in operations[first + 1..].iter().enumerate() {
            let second = first + 1 + offset;

            // Two destructive operations on the same node, or two inserts
            // claiming the same insertion point.
            let a_destructive = a.kind != OpKind::Insert;
            let b_destructive = b.kind != OpKind::Insert;
            let same_insert_point = a.kind == OpKind::Insert
                && b.kind == OpKind::Insert
                && a.position == b.position;
            if a.target_label == b.target_label && ((a_destructive && b_destructive) || same_insert_point)
            {
                return Err(RegmlError::DuplicateTarget {
                    first,
                    second,
                    label: a.target_label.clone(),
                });
            }

            // A delete or move of a subtree combined with any operation
            // referencing a descendant of that subtree: no precedence is
            // guessed.
            for (outer_index, outer, inner) in
                [(first, a, b), (second, b, a)]
            {
                if !matches!(outer.kind, OpKind::Delete | OpKind::Move) {
                    continue;
                }
                let inner_refs = [Some(inner.target_label.as_str()), inner.destination.as_deref()];
                if inner_refs
                    .into_iter()
                    .flatten()
                    .any(|label| is_strict_descendant(label, &outer.target_label))
                {
                    return Err(RegmlError::StructuralConflict {
                        index: outer_index,
                        label: outer.target_label.clone(),
                        reason: format!(
                            "another operation in this notice references a descendant of '{}'",
                            outer.target_label
                        ),
                    });
                }
            }
        }
    }
    Ok(())
}
