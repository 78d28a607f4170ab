//! One-shot conversion of agency XML into a document tree.
//!
//! The accepted dialect is the eregs-style fragment: a `<regulation>` root
//! carrying `title`/`part`/`version`/`effectiveDate`, with nested
//! `<subpart>`, `<section>`, `<paragraph>`, `<interpretation>` and
//! `<appendix>` elements. Markers come from the `marker` attribute; a
//! marker that matches what the node's position would produce anyway is
//! normalized to an ordinal so later insertions renumber it, everything
//! else is kept verbatim as an identifier.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use crate::error::{RegmlError, Result};
use crate::label::sequence_for;
use crate::node::{Marker, Node, NodeKind};
use crate::tree::DocTree;

/// Parse an XML fragment into a document tree.
pub fn from_xml(xml: &str) -> Result<DocTree> {
    let doc = roxmltree::Document::parse(xml)?;
    let root = doc.root_element();
    if root.tag_name().name() != "regulation" {
        return Err(missing("regulation", "document root"));
    }

    let title: u32 = attr(&root, "title")?
        .parse()
        .map_err(|_| missing("title", "regulation"))?;
    let part = attr(&root, "part")?.to_string();
    crate::config::validate_part(&part)?;
    let version = attr(&root, "version")?.to_string();
    let effective = attr(&root, "effectiveDate")?;
    let effective_date = chrono::NaiveDate::parse_from_str(effective, "%Y-%m-%d")
        .map_err(|_| RegmlError::InvalidDate(effective.to_string()))?;

    let mut node = Node::new(NodeKind::Regulation, Marker::None);
    build_children(&root, &mut node, 0)?;
    Ok(DocTree::new(title, part, version, effective_date, Arc::new(node)))
}

fn missing(element: &str, context: &str) -> RegmlError {
    RegmlError::MissingElement {
        element: element.to_string(),
        context: context.to_string(),
    }
}

fn attr<'a>(el: &roxmltree::Node<'a, '_>, name: &str) -> Result<&'a str> {
    el.attribute(name)
        .ok_or_else(|| missing(name, el.tag_name().name()))
}

fn kind_of(name: &str) -> Option<NodeKind> {
    match name {
        "subpart" => Some(NodeKind::Subpart),
        "section" => Some(NodeKind::Section),
        "paragraph" => Some(NodeKind::Paragraph),
        "interpretation" => Some(NodeKind::Interpretation),
        "appendix" => Some(NodeKind::Appendix),
        _ => None,
    }
}

fn build_children(el: &roxmltree::Node<'_, '_>, parent: &mut Node, pdepth: usize) -> Result<()> {
    let mut children = Vec::new();
    for child_el in el.children().filter(roxmltree::Node::is_element) {
        let Some(kind) = kind_of(child_el.tag_name().name()) else {
            warn!(
                element = child_el.tag_name().name(),
                "skipping unknown element"
            );
            continue;
        };
        let child_pdepth = if parent.kind == NodeKind::Paragraph && kind == NodeKind::Paragraph {
            pdepth + 1
        } else {
            0
        };
        children.push(build_node(&child_el, kind, child_pdepth)?);
    }

    // Intro folding: a leading marker-less, childless paragraph is the
    // parent's own text, not a labeled child.
    if parent.text.is_empty() {
        if let Some(first) = children.first() {
            if first.kind == NodeKind::Paragraph
                && first.marker == Marker::None
                && first.children.is_empty()
            {
                parent.text = children.remove(0).text;
            }
        }
    }

    let list_pdepth = children
        .first()
        .map(|c| {
            if parent.kind == NodeKind::Paragraph && c.kind == NodeKind::Paragraph {
                pdepth + 1
            } else {
                0
            }
        })
        .unwrap_or(0);
    normalize_markers(&mut children, list_pdepth);
    parent.children = children.into_iter().map(Arc::new).collect();
    Ok(())
}

fn build_node(el: &roxmltree::Node<'_, '_>, kind: NodeKind, pdepth: usize) -> Result<Node> {
    let marker = match el.attribute("marker") {
        Some(m) => Marker::Ident(m.to_string()),
        None => Marker::None,
    };
    let mut node = Node::new(kind, marker);
    node.title = el.attribute("title").map(str::to_string);
    node.reserved = el.attribute("reserved") == Some("true");
    for a in el.attributes() {
        if !matches!(a.name(), "marker" | "title" | "reserved") {
            node.attributes.insert(a.name().to_string(), a.value().to_string());
        }
    }
    node.text = el
        .children()
        .filter(roxmltree::Node::is_text)
        .filter_map(|t| t.text())
        .collect::<String>()
        .trim()
        .to_string();

    build_children(el, &mut node, pdepth)?;
    Ok(node)
}

/// Turn authored markers back into ordinals where the position agrees,
/// running the same per-kind counters the label derivation uses. Nodes
/// that survived intro folding without a marker become ordinal too.
fn normalize_markers(children: &mut [Node], pdepth: usize) {
    let mut counters: HashMap<NodeKind, usize> = HashMap::new();
    for child in children {
        let seq = sequence_for(child.kind, pdepth);
        let counter = counters.entry(child.kind).or_insert(0);
        match &child.marker {
            Marker::None => {
                child.marker = Marker::Ordinal;
                *counter += 1;
            }
            Marker::Ordinal => {
                *counter += 1;
            }
            Marker::Ident(ident) => match seq.parse(ident) {
                Some(pos) if pos == *counter && !child.reserved => {
                    child.marker = Marker::Ordinal;
                    *counter += 1;
                }
                Some(pos) => {
                    if pos >= *counter {
                        *counter = pos + 1;
                    }
                }
                None => {}
            },
        }
    }
}
