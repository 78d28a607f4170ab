//! Unreferenced-term candidates.
//!
//! Defined terms appearing in body text should be marked as references,
//! written `{term}` in node text. This module only finds the unmarked
//! occurrences and proposes the edit; deciding what to do with each
//! candidate (apply, ignore, always-apply) is the caller's policy.

use regex::Regex;
use serde::Serialize;

use crate::label::visit_labeled;
use crate::tree::DocTree;

/// One unmarked occurrence of a defined term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TermCandidate {
    pub term: String,
    /// Label of the node whose text contains the occurrence.
    pub occurrence_label: String,
    /// Byte offset of the occurrence within that node's text.
    pub offset: usize,
    /// The node's text with this occurrence wrapped as a reference.
    pub suggested_edit: String,
}

/// Scan every node's text for unmarked occurrences of the given terms,
/// in document order. Matching is word-bounded and case-sensitive;
/// occurrences already wrapped as `{term}` are skipped, as are reserved
/// nodes.
#[must_use]
pub fn find_term_candidates(tree: &DocTree, terms: &[String]) -> Vec<TermCandidate> {
    let patterns: Vec<(String, Regex)> = terms
        .iter()
        .filter_map(|term| {
            let pattern = format!(r"\b{}\b", regex::escape(term));
            Regex::new(&pattern).ok().map(|re| (term.clone(), re))
        })
        .collect();

    let mut candidates = Vec::new();
    visit_labeled(tree.root(), tree.root_label(), &mut |ln| {
        if ln.node.reserved || ln.node.text.is_empty() {
            return;
        }
        for (term, re) in &patterns {
            for found in re.find_iter(&ln.node.text) {
                if is_referenced(&ln.node.text, found.start(), found.end()) {
                    continue;
                }
                let mut edited = ln.node.text.clone();
                edited.insert(found.end(), '}');
                edited.insert(found.start(), '{');
                candidates.push(TermCandidate {
                    term: term.clone(),
                    occurrence_label: ln.label.clone(),
                    offset: found.start(),
                    suggested_edit: edited,
                });
            }
        }
    });
    candidates
}

fn is_referenced(text: &str, start: usize, end: usize) -> bool {
    text[..start].ends_with('{') && text[end..].starts_with('}')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Marker, Node, NodeKind};
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn tree(texts: &[&str]) -> DocTree {
        let root = Arc::new(Node::new(NodeKind::Regulation, Marker::None).with_children(vec![
            Node::new(NodeKind::Section, Marker::Ordinal).with_children(
                texts
                    .iter()
                    .map(|t| Node::new(NodeKind::Paragraph, Marker::Ordinal).with_text(*t))
                    .collect(),
            ),
        ]));
        DocTree::new(
            12,
            "1003",
            "v1",
            NaiveDate::from_ymd_opt(2011, 12, 30).unwrap(),
            root,
        )
    }

    fn terms(list: &[&str]) -> Vec<String> {
        list.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_finds_unmarked_occurrence() {
        let t = tree(&["each branch office of the institution"]);
        let found = find_term_candidates(&t, &terms(&["branch office"]));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].occurrence_label, "1003-1-a");
        assert_eq!(found[0].offset, 5);
        assert_eq!(
            found[0].suggested_edit,
            "each {branch office} of the institution"
        );
    }

    #[test]
    fn test_word_boundaries() {
        let t = tree(&["the branch offices were rebranched"]);
        assert!(find_term_candidates(&t, &terms(&["branch office"])).is_empty());
        assert!(find_term_candidates(&t, &terms(&["branch"])).len() == 1);
    }

    #[test]
    fn test_already_referenced_is_skipped() {
        let t = tree(&["a {branch office} and a branch office"]);
        let found = find_term_candidates(&t, &terms(&["branch office"]));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].offset, 24);
    }

    #[test]
    fn test_document_order() {
        let t = tree(&["second dwelling here", "a dwelling there"]);
        let found = find_term_candidates(&t, &terms(&["dwelling"]));
        let labels: Vec<&str> = found.iter().map(|c| c.occurrence_label.as_str()).collect();
        assert_eq!(labels, vec!["1003-1-a", "1003-1-b"]);
    }

    #[test]
    fn test_reserved_nodes_are_skipped() {
        let mut reserved = Node::new(NodeKind::Paragraph, Marker::Ident("a".to_string()));
        reserved.reserved = true;
        reserved.text = String::new();
        let root = Arc::new(Node::new(NodeKind::Regulation, Marker::None).with_children(vec![
            Node::new(NodeKind::Section, Marker::Ordinal).with_children(vec![reserved]),
        ]));
        let t = DocTree::new(
            12,
            "1003",
            "v1",
            NaiveDate::from_ymd_opt(2011, 12, 30).unwrap(),
            root,
        );
        assert!(find_term_candidates(&t, &terms(&["dwelling"])).is_empty());
    }
}
