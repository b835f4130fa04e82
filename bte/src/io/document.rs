//! XML document loading into the in-memory [`Tree`].

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::debug;

use crate::tree::{
    ActionCommand, ActionKind, DecoratorKind, Node, NodeId, NodeKind, STREAM_ID_ATTR, TYPE_ATTR,
    Tree,
};

/// Read and parse a behavior tree document from disk.
pub fn load_document(path: &Path) -> Result<Tree> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read document {}", path.display()))?;
    parse_document(&contents).with_context(|| format!("load document {}", path.display()))
}

/// Parse a behavior tree document. The root element must be `<bt>`.
pub fn parse_document(xml: &str) -> Result<Tree> {
    let doc = roxmltree::Document::parse(xml).context("parse xml")?;
    let root = doc.root_element();
    let root_tag = root.tag_name().name();
    if root_tag != "bt" {
        bail!("root element must be <bt>, found <{root_tag}>");
    }
    let mut tree = Tree::new();
    build_node(&mut tree, root);
    debug!(nodes = tree.len(), "document loaded");
    Ok(tree)
}

fn build_node(tree: &mut Tree, element: roxmltree::Node<'_, '_>) -> NodeId {
    let tag = element.tag_name().name().to_string();
    let attrs = element
        .attributes()
        .map(|attr| (attr.name().to_string(), attr.value().to_string()))
        .collect();
    let kind = match NodeKind::from_tag(&tag) {
        NodeKind::Decorator(_) => {
            NodeKind::Decorator(element.attribute(TYPE_ATTR).and_then(DecoratorKind::from_type))
        }
        NodeKind::Action(_) => NodeKind::Action(resolve_action(element)),
        other => other,
    };
    let is_leaf = matches!(kind, NodeKind::Action(_));
    let id = tree.push(Node {
        tag,
        kind,
        attrs,
        children: Vec::new(),
    });
    // Command elements belong to their action leaf, not to the tree.
    if !is_leaf {
        for child in element.children().filter(roxmltree::Node::is_element) {
            let child_id = build_node(tree, child);
            tree.add_child(id, child_id);
        }
    }
    id
}

fn resolve_action(element: roxmltree::Node<'_, '_>) -> Result<ActionCommand, String> {
    let mut commands = element.children().filter(roxmltree::Node::is_element);
    let command = commands
        .next()
        .ok_or_else(|| "action has no command element".to_string())?;
    if commands.next().is_some() {
        return Err("action must wrap exactly one command element".to_string());
    }
    let tag = command.tag_name().name();
    let kind = ActionKind::from_tag(tag)
        .ok_or_else(|| format!("action command <{tag}> is not supported"))?;
    let stream_id = command
        .attribute(STREAM_ID_ATTR)
        .or_else(|| element.attribute(STREAM_ID_ATTR))
        .map(str::to_string);
    Ok(ActionCommand {
        kind,
        text: text_content(command),
        stream_id,
    })
}

fn text_content(element: roxmltree::Node<'_, '_>) -> String {
    element
        .descendants()
        .filter(roxmltree::Node::is_text)
        .filter_map(|node| node.text())
        .collect()
}
