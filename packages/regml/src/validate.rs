//! Structural validation of document trees.
//!
//! Validators are consumed black-box: the CLI runs whatever implements
//! [`Validator`] and reports the diagnostics, it never inspects how they
//! were produced.

use std::fmt;

use console::style;

use crate::label::visit_labeled;
use crate::node::{Marker, Node, NodeKind};
use crate::tree::DocTree;

/// Diagnostic severity, ordered from harmless to fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Ok,
    Info,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let styled = match self {
            Severity::Ok => style("OK").green(),
            Severity::Info => style("INFO").cyan(),
            Severity::Warning => style("WARNING").yellow(),
            Severity::Error => style("ERROR").red(),
            Severity::Critical => style("CRITICAL").red().bold(),
        };
        write!(f, "{styled}")
    }
}

/// One finding, tied to a label when the fault is localizable.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub label: Option<String>,
    pub message: String,
}

impl Diagnostic {
    fn at(severity: Severity, label: impl Into<String>, message: impl Into<String>) -> Self {
        Diagnostic {
            severity,
            label: Some(label.into()),
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.label {
            Some(label) => write!(f, "{} {}: {}", self.severity, label, self.message),
            None => write!(f, "{} {}", self.severity, self.message),
        }
    }
}

pub trait Validator {
    fn validate(&self, tree: &DocTree) -> Vec<Diagnostic>;
}

/// The worst severity among a set of diagnostics.
#[must_use]
pub fn max_severity(diagnostics: &[Diagnostic]) -> Severity {
    diagnostics
        .iter()
        .map(|d| d.severity)
        .max()
        .unwrap_or(Severity::Ok)
}

/// Built-in checks: label uniqueness, marker conformance, kind nesting,
/// reserved-slot hygiene.
#[derive(Debug, Default)]
pub struct StructureValidator;

impl Validator for StructureValidator {
    fn validate(&self, tree: &DocTree) -> Vec<Diagnostic> {
        let mut out = Vec::new();

        for dup in tree.index().duplicates() {
            out.push(Diagnostic::at(
                Severity::Critical,
                dup.clone(),
                "label is claimed by more than one node",
            ));
        }

        if tree.root().kind != NodeKind::Regulation {
            out.push(Diagnostic {
                severity: Severity::Error,
                label: None,
                message: format!("root node is a {}, not a regulation", tree.root().kind.as_str()),
            });
        }
        if tree.root().children.is_empty() {
            out.push(Diagnostic {
                severity: Severity::Warning,
                label: None,
                message: "regulation has no content".to_string(),
            });
        }

        check_node(tree.root(), tree.root_label(), &mut out);
        visit_labeled(tree.root(), tree.root_label(), &mut |ln| {
            check_node(ln.node, &ln.label, &mut out);
        });

        out
    }
}

fn check_node(node: &Node, label: &str, out: &mut Vec<Diagnostic>) {
    if let Marker::Ident(ident) = &node.marker {
        if ident.is_empty() {
            out.push(Diagnostic::at(
                Severity::Error,
                label,
                "identifier marker is empty",
            ));
        }
    }

    if node.reserved {
        if !node.text.is_empty() || !node.children.is_empty() {
            out.push(Diagnostic::at(
                Severity::Error,
                label,
                "reserved node carries content",
            ));
        }
        if node.marker == Marker::Ordinal {
            out.push(Diagnostic::at(
                Severity::Warning,
                label,
                "reserved node has an unfrozen ordinal marker",
            ));
        }
    }

    for child in &node.children {
        if !node.kind.may_contain(child.kind) {
            out.push(Diagnostic::at(
                Severity::Error,
                label,
                format!(
                    "{} may not contain a {}",
                    node.kind.as_str(),
                    child.kind.as_str()
                ),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2011, 12, 30).unwrap()
    }

    fn tree(root: Node) -> DocTree {
        DocTree::new(12, "1003", "v1", date(), Arc::new(root))
    }

    #[test]
    fn test_clean_tree_has_no_findings() {
        let t = tree(Node::new(NodeKind::Regulation, Marker::None).with_children(vec![
            Node::new(NodeKind::Section, Marker::Ordinal).with_children(vec![
                Node::new(NodeKind::Paragraph, Marker::Ordinal).with_text("text"),
            ]),
        ]));
        let diags = StructureValidator.validate(&t);
        assert!(diags.is_empty(), "{diags:?}");
        assert_eq!(max_severity(&diags), Severity::Ok);
    }

    #[test]
    fn test_duplicate_labels_are_critical() {
        let t = tree(Node::new(NodeKind::Regulation, Marker::None).with_children(vec![
            Node::new(NodeKind::Section, Marker::Ordinal),
            Node::new(NodeKind::Section, Marker::Ident("1".to_string())),
        ]));
        let diags = StructureValidator.validate(&t);
        assert_eq!(max_severity(&diags), Severity::Critical);
        assert_eq!(diags[0].label.as_deref(), Some("1003-1"));
    }

    #[test]
    fn test_bad_nesting_is_an_error() {
        let t = tree(Node::new(NodeKind::Regulation, Marker::None).with_children(vec![
            Node::new(NodeKind::Section, Marker::Ordinal)
                .with_children(vec![Node::new(NodeKind::Section, Marker::Ordinal)]),
        ]));
        let diags = StructureValidator.validate(&t);
        assert!(diags
            .iter()
            .any(|d| d.severity == Severity::Error
                && d.message.contains("may not contain")));
    }

    #[test]
    fn test_reserved_node_with_content() {
        let mut reserved = Node::new(NodeKind::Paragraph, Marker::Ident("b".to_string()))
            .with_text("should be empty");
        reserved.reserved = true;
        let t = tree(Node::new(NodeKind::Regulation, Marker::None).with_children(vec![
            Node::new(NodeKind::Section, Marker::Ordinal).with_children(vec![reserved]),
        ]));
        let diags = StructureValidator.validate(&t);
        assert_eq!(max_severity(&diags), Severity::Error);
        assert_eq!(diags[0].label.as_deref(), Some("1003-1-b"));
    }

    #[test]
    fn test_empty_regulation_is_a_warning() {
        let t = tree(Node::new(NodeKind::Regulation, Marker::None));
        let diags = StructureValidator.validate(&t);
        assert_eq!(max_severity(&diags), Severity::Warning);
    }
}
