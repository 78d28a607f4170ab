//! End-to-end integration tests for the RegML engine.
//!
//! Exercises the complete pipeline on a Regulation C style fixture:
//! agency XML conversion, notice chain resolution, sequential
//! application, diffing and JSON export.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use regml::apply::apply_notice;
use regml::chain::{apply_chain, resolve_chain, NoticeDir, NoticeListing};
use regml::diff::{diff, verify, ChangeKind};
use regml::export::export_docs;
use regml::node::Marker;
use regml::notice::Notice;
use regml::tree::DocTree;
use regml::validate::{StructureValidator, Validator};
use regml::{convert, RegmlError};

/// Load fixture file content.
fn load_fixture(name: &str) -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("hmda")
        .join(name);
    fs::read_to_string(&path).unwrap_or_else(|e| panic!("Failed to load {}: {}", path.display(), e))
}

fn baseline() -> DocTree {
    convert::from_xml(&load_fixture("regulation.xml")).expect("fixture XML converts")
}

fn notice(name: &str) -> Notice {
    serde_json::from_str(&load_fixture(name)).expect("fixture notice parses")
}

#[test]
fn test_conversion_produces_expected_labels() {
    let tree = baseline();
    assert_eq!(tree.part, "1003");
    assert_eq!(tree.version, "2011-31712");

    // Intro paragraph folded into the section text.
    let authority = tree.resolve("1003-1").unwrap();
    assert!(authority.text.contains("implements the Home Mortgage"));
    assert_eq!(authority.children.len(), 2);

    // Positional markers became renumberable ordinals.
    assert_eq!(tree.resolve("1003-2-b").unwrap().marker, Marker::Ordinal);
    assert_eq!(
        tree.resolve("1003-A").unwrap().attributes.get("source"),
        Some(&"76 FR 78468".to_string())
    );

    assert!(StructureValidator.validate(&tree).is_empty());
}

#[test]
fn test_full_chain_application() {
    let base = baseline();
    let notices = vec![notice("2013-100.json"), notice("2012-1728.json")];
    let outcomes = apply_chain(&base, &notices).expect("chain applies");
    assert_eq!(outcomes.len(), 2);

    let final_tree = &outcomes[1].tree;
    assert_eq!(final_tree.version, "2013-100");

    // First notice inserted the Purpose section after 1003-1, shifting
    // Definitions to 1003-3 and reserving its paragraph b.
    assert_eq!(
        outcomes[0].tree.resolve("1003-2").unwrap().title.as_deref(),
        Some("Purpose")
    );
    assert!(outcomes[0].tree.resolve("1003-3-b").unwrap().reserved);
    assert!(outcomes[0]
        .relabeled
        .iter()
        .any(|r| r.before == "1003-2" && r.after == "1003-3"));

    // Second notice revived the reserved slot in place and deleted
    // 1003-1-b; nothing else was renumbered.
    let revived = final_tree.resolve("1003-3-b").unwrap();
    assert!(!revived.reserved);
    assert!(revived.text.contains("approved as a branch"));
    assert!(outcomes[1].relabeled.is_empty());
    assert_eq!(final_tree.resolve("1003-1").unwrap().children.len(), 1);

    // The appendix was never on an edit path: still the same allocation
    // as the baseline, two versions later.
    let appendix_path = final_tree.resolve_path("1003-A").unwrap().0.clone();
    let base_appendix = &base.root().children[2];
    let final_appendix = &final_tree.root().children[appendix_path[0]];
    assert!(Arc::ptr_eq(base_appendix, final_appendix));
}

#[test]
fn test_chain_resolution_orders_and_validates() {
    let notices = vec![notice("2013-100.json"), notice("2012-1728.json")];
    let refs: Vec<_> = notices.iter().map(Notice::to_ref).collect();

    let chain = resolve_chain("2011-31712", &refs).unwrap();
    assert_eq!(chain[0].document_number, "2012-1728");
    assert_eq!(chain[1].document_number, "2013-100");

    // Dropping the first link breaks the chain at the baseline.
    let err = resolve_chain("2011-31712", &refs[..1]).unwrap_err();
    match err {
        RegmlError::ChainBroken { missing, next, .. } => {
            assert_eq!(missing, "2011-31712");
            assert_eq!(next, "2013-100");
        }
        other => panic!("expected ChainBroken, got {other}"),
    }
}

#[test]
fn test_notice_directory_listing() {
    let dir = tempfile::tempdir().unwrap();
    let notice_dir = dir.path().join("notice").join("1003");
    fs::create_dir_all(&notice_dir).unwrap();
    for name in ["2012-1728.json", "2013-100.json"] {
        fs::write(notice_dir.join(name), load_fixture(name)).unwrap();
    }

    let store = NoticeDir::new(dir.path());
    let refs = store.list("1003").unwrap();
    assert_eq!(refs.len(), 2);
    let chain = resolve_chain("2011-31712", &refs).unwrap();
    assert_eq!(chain.last().unwrap().document_number, "2013-100");

    let full = store.load("1003", "2012-1728").unwrap();
    assert_eq!(full.operations.len(), 2);
}

#[test]
fn test_diff_across_the_chain() {
    let base = baseline();
    let first = apply_notice(&base, &notice("2012-1728.json")).unwrap().tree;

    let changes = diff(&base, &first);
    // One added section, one moved (relabeled) section, one modified
    // paragraph (the reserved designation); the appendix is untouched.
    assert_eq!(changes.len(), 3);
    assert!(changes
        .iter()
        .any(|c| c.kind == ChangeKind::Added && c.label == "1003-2"));
    assert!(changes
        .iter()
        .any(|c| c.kind == ChangeKind::Moved
            && c.label == "1003-3"
            && c.prior_label.as_deref() == Some("1003-2")));
    assert!(changes
        .iter()
        .any(|c| c.kind == ChangeKind::Modified && c.label == "1003-3-b"));
    assert!(!changes.iter().any(|c| c.label.starts_with("1003-A")));
}

#[test]
fn test_application_is_deterministic_and_verifiable() {
    let base = baseline();
    let n = notice("2012-1728.json");
    let once = apply_notice(&base, &n).unwrap().tree;
    let again = apply_notice(&base, &n).unwrap().tree;
    verify(&once, &again).expect("identical applications verify");

    // A tampered result is rejected.
    let tampered = apply_notice(&once, &notice("2013-100.json")).unwrap().tree;
    let err = verify(&once, &tampered).unwrap_err();
    assert!(matches!(err, RegmlError::VerificationFailed { .. }));
}

#[test]
fn test_round_trip_through_files() {
    let dir = tempfile::tempdir().unwrap();
    let base = baseline();
    let path = dir.path().join("2011-31712.json");
    base.save(&path).unwrap();

    let reloaded = DocTree::load(&path).unwrap();
    assert!(reloaded.warnings.is_empty(), "{:?}", reloaded.warnings);
    verify(&base, &reloaded).expect("file round-trip preserves structure");

    // The reloaded tree shares nothing with the original, so the diff
    // exercises the label-matching fallback.
    let first = apply_notice(&reloaded, &notice("2012-1728.json")).unwrap().tree;
    assert_eq!(diff(&base, &first).len(), 3);
}

#[test]
fn test_export_with_pairwise_diffs() {
    let base = baseline();
    let outcomes = apply_chain(
        &base,
        &[notice("2012-1728.json"), notice("2013-100.json")],
    )
    .unwrap();
    let trees = vec![base, outcomes[0].tree.clone(), outcomes[1].tree.clone()];

    let docs = export_docs(&trees);
    assert_eq!(docs.len(), 3);
    assert_eq!(docs[0].diffs.len(), 2);
    assert_eq!(docs[0].diffs[0].from_version, "2011-31712");
    assert_eq!(docs[0].diffs[0].to_version, "2012-1728");
    assert_eq!(docs[0].diffs[1].to_version, "2013-100");

    // Exported labels are the derived ones.
    let authority = &docs[0].document.root.children[0];
    assert_eq!(authority.label.as_deref(), Some("1003-1"));
}

#[test]
fn test_version_mismatch_is_rejected_mid_chain() {
    let base = baseline();
    // Applying the second notice directly to the baseline must fail.
    let err = apply_notice(&base, &notice("2013-100.json")).unwrap_err();
    assert!(matches!(err, RegmlError::VersionMismatch { .. }));
}
