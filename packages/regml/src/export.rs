//! JSON export for downstream rendering: fully expanded trees plus, when
//! several versions are exported together, the adjacent pairwise diffs.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::diff::{diff_adjacent, VersionDiff};
use crate::error::Result;
use crate::tree::{DocFile, DocTree};

/// Export payload for one version.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDoc {
    pub document: DocFile,
    /// Adjacent pairwise diffs over the whole exported sequence, keyed by
    /// `fromVersion`/`toVersion`. Empty when a single version is exported.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diffs: Vec<VersionDiff>,
}

/// Build the export payloads for an ordered sequence of versions. With N
/// trees the shared diff list has N-1 entries; no squashed diffs across
/// non-adjacent versions are produced.
#[must_use]
pub fn export_docs(trees: &[DocTree]) -> Vec<ExportDoc> {
    let diffs = if trees.len() > 1 {
        diff_adjacent(trees)
    } else {
        Vec::new()
    };
    trees
        .iter()
        .map(|tree| ExportDoc {
            document: tree.to_file(),
            diffs: diffs.clone(),
        })
        .collect()
}

/// Write one `<version>.json` per tree into `output_dir`, creating it if
/// needed. Returns the written paths in input order.
pub fn write_export(trees: &[DocTree], output_dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir)?;
    let mut written = Vec::with_capacity(trees.len());
    for (tree, doc) in trees.iter().zip(export_docs(trees)) {
        let path = output_dir.join(format!("{}.json", tree.version));
        std::fs::write(&path, serde_json::to_string_pretty(&doc)?)?;
        info!(path = %path.display(), "exported");
        written.push(path);
    }
    Ok(written)
}
