//! Notice chain resolution: ordering the available notices for a part into
//! the version chain their `appliesToVersion` links describe.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::apply::{apply_notice, ApplyOutcome};
use crate::config;
use crate::error::{RegmlError, Result};
use crate::notice::{Notice, NoticeRef};
use crate::tree::DocTree;

/// A source of notice listings for one part. Consumed read-only; the
/// engine neither retries nor caches behind this seam.
pub trait NoticeListing {
    fn list(&self, part: &str) -> Result<Vec<NoticeRef>>;
}

/// Notice files under `<data_root>/notice/<part>/<documentNumber>.json`.
pub struct NoticeDir {
    data_root: PathBuf,
}

impl NoticeDir {
    #[must_use]
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        NoticeDir {
            data_root: data_root.into(),
        }
    }

    fn dir(&self, part: &str) -> PathBuf {
        config::notice_dir(&self.data_root, part)
    }

    /// Load one notice in full.
    pub fn load(&self, part: &str, document_number: &str) -> Result<Notice> {
        let path = self.dir(part).join(format!("{document_number}.json"));
        if !path.is_file() {
            return Err(RegmlError::UnknownNotice(document_number.to_string()));
        }
        Notice::load(&path)
    }
}

impl NoticeListing for NoticeDir {
    fn list(&self, part: &str) -> Result<Vec<NoticeRef>> {
        let dir = self.dir(part);
        let mut refs = Vec::new();
        if !dir.is_dir() {
            warn!(dir = %dir.display(), "notice directory does not exist");
            return Ok(refs);
        }
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|e| e == "json") {
                refs.push(Notice::load(&path)?.to_ref());
            }
        }
        debug!(part, count = refs.len(), "listed notices");
        Ok(refs)
    }
}

/// Sort notices into their chain order: by effective date, ties broken by
/// document number.
fn sort_refs(refs: &[NoticeRef]) -> Vec<NoticeRef> {
    let mut ordered = refs.to_vec();
    ordered.sort_by(|a, b| {
        a.effective_date
            .cmp(&b.effective_date)
            .then_with(|| a.document_number.cmp(&b.document_number))
    });
    ordered
}

/// Order the given notices into the version chain starting at `baseline`.
///
/// Each notice must apply to the version the previous one produced (its
/// document number); the first must apply to the baseline. A gap fails
/// with [`RegmlError::ChainBroken`] naming the version nothing applies to.
pub fn resolve_chain(baseline: &str, refs: &[NoticeRef]) -> Result<Vec<NoticeRef>> {
    let ordered = sort_refs(refs);
    let mut current = baseline.to_string();
    for r in &ordered {
        if r.applies_to_version != current {
            return Err(RegmlError::ChainBroken {
                missing: current,
                next: r.document_number.clone(),
                declared: r.applies_to_version.clone(),
            });
        }
        current = r.document_number.clone();
    }
    Ok(ordered)
}

/// As [`resolve_chain`], but stop at (and include) the named notice.
///
/// Links after the cut-off are not validated; a bounded sub-chain supports
/// partial regeneration of a lineage whose tail is still being authored.
pub fn resolve_chain_through(
    baseline: &str,
    refs: &[NoticeRef],
    through: &str,
) -> Result<Vec<NoticeRef>> {
    let ordered = sort_refs(refs);
    let mut chain = Vec::new();
    let mut current = baseline.to_string();
    for r in ordered {
        if r.applies_to_version != current {
            return Err(RegmlError::ChainBroken {
                missing: current,
                next: r.document_number.clone(),
                declared: r.applies_to_version.clone(),
            });
        }
        current = r.document_number.clone();
        let done = r.document_number == through;
        chain.push(r);
        if done {
            return Ok(chain);
        }
    }
    Err(RegmlError::UnknownNotice(through.to_string()))
}

/// Fold a resolved chain of notices over a baseline tree.
///
/// The fold is inherently sequential; a failure at step k aborts the whole
/// chain with no partial output. Returns one outcome per notice, in order.
pub fn apply_chain(baseline: &DocTree, notices: &[Notice]) -> Result<Vec<ApplyOutcome>> {
    let refs: Vec<NoticeRef> = notices.iter().map(Notice::to_ref).collect();
    let ordered = resolve_chain(&baseline.version, &refs)?;

    let mut outcomes: Vec<ApplyOutcome> = Vec::with_capacity(ordered.len());
    for r in &ordered {
        // resolve_chain preserves the input set, only reordered.
        let notice = notices
            .iter()
            .find(|n| n.document_number == r.document_number)
            .ok_or_else(|| RegmlError::UnknownNotice(r.document_number.clone()))?;
        let input = outcomes.last().map_or(baseline, |o| &o.tree);
        let outcome = apply_notice(input, notice)?;
        outcomes.push(outcome);
    }
    Ok(outcomes)
}

/// Locate the regulation snapshot file for a version, if materialized.
#[must_use]
pub fn regulation_path(data_root: &Path, part: &str, version: &str) -> PathBuf {
    config::regulation_dir(data_root, part).join(format!("{version}.json"))
}
