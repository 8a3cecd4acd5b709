//! Small DOM toolkit over `html5ever` + `markup5ever_rcdom`: queries used by
//! the programme parser and the tree edits used to prepare pages for print.

use anyhow::{Context, Result};
use html5ever::serialize::{SerializeOpts, serialize};
use html5ever::tendril::{StrTendril, TendrilSink};
use html5ever::{Attribute, LocalName, Namespace, QualName, parse_document};
use markup5ever_rcdom::{NodeData, RcDom, SerializableHandle};
use std::fs;
use std::path::Path;
use std::rc::Rc;

pub use markup5ever_rcdom::Handle;

pub fn parse(html: &str) -> RcDom {
    parse_document(RcDom::default(), Default::default()).one(html)
}

/// Parses an HTML file; invalid UTF-8 sequences are replaced.
pub fn load(path: &Path) -> Result<RcDom> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read HTML {:?}", path))?;
    Ok(parse(&String::from_utf8_lossy(&bytes)))
}

pub fn serialize_document(dom: &RcDom) -> Result<String> {
    let mut out = Vec::new();
    let document: SerializableHandle = dom.document.clone().into();
    serialize(&mut out, &document, SerializeOpts::default()).context("Failed to serialize HTML")?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}

pub fn save(dom: &RcDom, path: &Path) -> Result<()> {
    fs::write(path, serialize_document(dom)?).with_context(|| format!("Failed to write HTML {:?}", path))
}

pub fn tag_name(node: &Handle) -> Option<String> {
    match &node.data {
        NodeData::Element { name, .. } => Some(name.local.to_string().to_ascii_lowercase()),
        _ => None,
    }
}

pub fn is_tag(node: &Handle, tag: &str) -> bool {
    tag_name(node).is_some_and(|name| name == tag)
}

pub fn attr(node: &Handle, name: &str) -> Option<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|a| local_is(&a.name.local, name))
            .map(|a| a.value.to_string()),
        _ => None,
    }
}

fn local_is(local: &LocalName, name: &str) -> bool {
    let local: &str = local;
    local.eq_ignore_ascii_case(name)
}

pub fn has_class(node: &Handle, class: &str) -> bool {
    attr(node, "class").is_some_and(|value| value.split_whitespace().any(|c| c == class))
}

/// Element `tag` carrying class `class`.
pub fn is_tag_with_class(node: &Handle, tag: &str, class: &str) -> bool {
    is_tag(node, tag) && has_class(node, class)
}

pub fn set_attr(node: &Handle, name: &str, value: &str) {
    if let NodeData::Element { attrs, .. } = &node.data {
        let mut attrs = attrs.borrow_mut();
        attrs.retain(|a| !local_is(&a.name.local, name));
        attrs.push(Attribute {
            name: QualName::new(None, Namespace::from(""), LocalName::from(name)),
            value: StrTendril::from_slice(value),
        });
    }
}

/// Strips the named attributes from every element under `root`.
pub fn remove_attributes(root: &Handle, names: &[&str]) {
    for node in descendants(root) {
        if let NodeData::Element { attrs, .. } = &node.data {
            attrs
                .borrow_mut()
                .retain(|a| !names.iter().any(|n| local_is(&a.name.local, n)));
        }
    }
}

/// Every node below `root` in document order.
pub fn descendants(root: &Handle) -> Vec<Handle> {
    let mut out = Vec::new();
    let mut stack: Vec<Handle> = root.children.borrow().iter().rev().cloned().collect();
    while let Some(node) = stack.pop() {
        stack.extend(node.children.borrow().iter().rev().cloned());
        out.push(node);
    }
    out
}

pub fn find_all(root: &Handle, predicate: impl Fn(&Handle) -> bool) -> Vec<Handle> {
    descendants(root).into_iter().filter(|n| predicate(n)).collect()
}

pub fn find(root: &Handle, predicate: impl Fn(&Handle) -> bool) -> Option<Handle> {
    descendants(root).into_iter().find(|n| predicate(n))
}

pub fn element_children(node: &Handle) -> Vec<Handle> {
    node.children
        .borrow()
        .iter()
        .filter(|c| matches!(c.data, NodeData::Element { .. }))
        .cloned()
        .collect()
}

pub fn text_of(node: &Handle) -> Option<String> {
    match &node.data {
        NodeData::Text { contents } => Some(contents.borrow().to_string()),
        _ => None,
    }
}

/// Text of the text nodes directly under `node`.
pub fn direct_texts(node: &Handle) -> Vec<String> {
    node.children.borrow().iter().filter_map(text_of).collect()
}

/// Text in front of the first child element.
pub fn leading_text(node: &Handle) -> String {
    node.children
        .borrow()
        .iter()
        .take_while(|c| !matches!(c.data, NodeData::Element { .. }))
        .filter_map(text_of)
        .collect()
}

/// Every descendant text node in document order, whitespace-only ones
/// included.
pub fn text_fragments(node: &Handle) -> Vec<String> {
    descendants(node).iter().filter_map(text_of).collect()
}

pub fn all_text(node: &Handle) -> String {
    text_fragments(node).concat()
}

/// Whether one of the direct text children of `node` reads `text`.
pub fn has_direct_text(node: &Handle, text: &str) -> bool {
    direct_texts(node).iter().any(|t| t.trim() == text)
}

pub fn parent(node: &Handle) -> Option<Handle> {
    let weak = node.parent.take()?;
    let parent = weak.upgrade();
    node.parent.set(Some(weak));
    parent
}

fn position_in(parent: &Handle, node: &Handle) -> Option<usize> {
    parent.children.borrow().iter().position(|c| Rc::ptr_eq(c, node))
}

/// Element siblings after `node`.
pub fn following_siblings(node: &Handle) -> Vec<Handle> {
    let Some(parent) = parent(node) else {
        return Vec::new();
    };
    let Some(index) = position_in(&parent, node) else {
        return Vec::new();
    };
    let siblings = parent.children.borrow()[index + 1..]
        .iter()
        .filter(|c| matches!(c.data, NodeData::Element { .. }))
        .cloned()
        .collect();
    siblings
}

/// Parses body-level markup into detached nodes.
pub fn fragment(markup: &str) -> Vec<Handle> {
    let dom = parse(&format!("<html><head></head><body>{}</body></html>", markup));
    let Some(body) = find(&dom.document, |n| is_tag(n, "body")) else {
        return Vec::new();
    };
    let nodes: Vec<Handle> = body.children.borrow_mut().drain(..).collect();
    for node in &nodes {
        node.parent.set(None);
    }
    nodes
}

pub fn detach(node: &Handle) {
    if let Some(parent) = parent(node) {
        parent.children.borrow_mut().retain(|c| !Rc::ptr_eq(c, node));
    }
    node.parent.set(None);
}

fn insert_at(parent: &Handle, index: usize, nodes: Vec<Handle>) {
    let mut children = parent.children.borrow_mut();
    for (offset, node) in nodes.into_iter().enumerate() {
        node.parent.set(Some(Rc::downgrade(parent)));
        children.insert(index + offset, node);
    }
}

pub fn append_children(parent: &Handle, nodes: Vec<Handle>) {
    let end = parent.children.borrow().len();
    insert_at(parent, end, nodes);
}

pub fn prepend_children(parent: &Handle, nodes: Vec<Handle>) {
    insert_at(parent, 0, nodes);
}

pub fn insert_before(reference: &Handle, nodes: Vec<Handle>) {
    if let Some(parent) = parent(reference) {
        if let Some(index) = position_in(&parent, reference) {
            insert_at(&parent, index, nodes);
        }
    }
}

pub fn insert_after(reference: &Handle, nodes: Vec<Handle>) {
    if let Some(parent) = parent(reference) {
        if let Some(index) = position_in(&parent, reference) {
            insert_at(&parent, index + 1, nodes);
        }
    }
}

/// Puts `nodes` where `old` was and detaches `old`.
pub fn replace(old: &Handle, nodes: Vec<Handle>) {
    insert_after(old, nodes);
    detach(old);
}
