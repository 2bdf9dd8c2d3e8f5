//! Immutable tree document.
//!
//! Every edit returns a new [`Document`]. Untouched subtrees are shared by
//! reference between the old and the new value; only the nodes on the path
//! from the root to the edited node are copied. Holders of an older value
//! never observe a later edit.
//!
//! Lookups, edits and drops walk the tree with explicit stacks, so depth is
//! bounded by memory only. Serializing a document and converting
//! [`NodeData`] payloads still recurse once per level.

use crate::error::DocumentError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

pub const DEFAULT_CLASS: &str = "default";
pub const DEFAULT_NODE_TEXT: &str = "New Node";

fn default_class() -> String {
    DEFAULT_CLASS.to_string()
}

/// Generates an id that is unique across sessions.
pub fn fresh_node_id() -> String {
    format!("node-{}", Uuid::new_v4().simple())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    pub text: String,
    #[serde(default = "default_class", alias = "class")]
    pub class_tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Arc<Node>>,
}

impl Node {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            class_tag: default_class(),
            notes: None,
            children: Vec::new(),
        }
    }

    pub fn with_class(mut self, class_tag: impl Into<String>) -> Self {
        self.class_tag = class_tag.into();
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(Arc::new(child));
        self
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Empty notes count as no notes.
    pub fn has_notes(&self) -> bool {
        self.notes.as_deref().is_some_and(|notes| !notes.is_empty())
    }

    /// Pre-order, depth-first walk starting at (and including) this node.
    pub fn iter(&self) -> Nodes<'_> {
        Nodes { stack: vec![self] }
    }
}

// Unlinks uniquely owned descendants one at a time so that dropping a deep
// chain does not recurse once per level.
impl Drop for Node {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(child) = pending.pop() {
            if let Ok(mut node) = Arc::try_unwrap(child) {
                pending.append(&mut node.children);
            }
        }
    }
}

/// Pre-order iterator over a subtree; children are visited in array order.
#[derive(Debug, Clone)]
pub struct Nodes<'a> {
    stack: Vec<&'a Node>,
}

impl<'a> Iterator for Nodes<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack
            .extend(node.children.iter().rev().map(|child| child.as_ref()));
        Some(node)
    }
}

/// One of the closed set of settable node properties, carrying its new value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeProperty {
    Text(String),
    Notes(Option<String>),
    ClassTag(String),
}

impl NodeProperty {
    pub fn name(&self) -> PropertyName {
        match self {
            NodeProperty::Text(_) => PropertyName::Text,
            NodeProperty::Notes(_) => PropertyName::Notes,
            NodeProperty::ClassTag(_) => PropertyName::ClassTag,
        }
    }

    fn apply(self, node: &mut Node) {
        match self {
            NodeProperty::Text(text) => node.text = text,
            NodeProperty::Notes(notes) => node.notes = notes,
            NodeProperty::ClassTag(class_tag) => node.class_tag = class_tag,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PropertyName {
    Text,
    Notes,
    #[serde(alias = "class")]
    ClassTag,
}

/// Payload for inserting a node (and optionally a subtree) under a parent.
///
/// Layout fields such as `x`, `y`, `width` and `height` that a pasted node may
/// still carry are ignored when deserializing, so inserted nodes never hold
/// stale geometry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, alias = "class", skip_serializing_if = "Option::is_none")]
    pub class_tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeData>,
}

impl NodeData {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Drops every id in the payload so that insertion assigns fresh ones.
    /// Used when pasting a copied subtree next to its original.
    pub fn with_fresh_ids(mut self) -> Self {
        self.id = None;
        self.children = self
            .children
            .into_iter()
            .map(NodeData::with_fresh_ids)
            .collect();
        self
    }

    fn into_node(self) -> Node {
        Node {
            id: self
                .id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(fresh_node_id),
            text: self.text.unwrap_or_else(|| DEFAULT_NODE_TEXT.to_string()),
            class_tag: self.class_tag.unwrap_or_else(default_class),
            notes: self.notes,
            children: self
                .children
                .into_iter()
                .map(|child| Arc::new(child.into_node()))
                .collect(),
        }
    }
}

impl From<&Node> for NodeData {
    fn from(node: &Node) -> Self {
        Self {
            id: Some(node.id.clone()),
            text: Some(node.text.clone()),
            class_tag: Some(node.class_tag.clone()),
            notes: node.notes.clone(),
            children: node
                .children
                .iter()
                .map(|child| NodeData::from(child.as_ref()))
                .collect(),
        }
    }
}

/// A rooted tree with unique, non-empty node ids.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Document {
    root: Arc<Node>,
}

impl Document {
    pub fn new(root: Node) -> Result<Self, DocumentError> {
        check_ids(&root, &mut HashSet::new())?;
        Ok(Self {
            root: Arc::new(root),
        })
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn root_id(&self) -> &str {
        &self.root.id
    }

    pub fn nodes(&self) -> Nodes<'_> {
        self.root.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes().count()
    }

    /// First node with `id` in pre-order.
    pub fn find(&self, id: &str) -> Option<&Node> {
        self.nodes().find(|node| node.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.find(id).is_some()
    }

    pub fn parent_of(&self, id: &str) -> Option<&Node> {
        self.nodes()
            .find(|node| node.children.iter().any(|child| child.id == id))
    }

    /// Chain of nodes from the root down to `id`, both ends included.
    pub fn path_to(&self, id: &str) -> Option<Vec<&Node>> {
        let indices = index_path(&self.root, id)?;
        Some(ancestor_chain(&self.root, &indices).into_iter().map(|node| &**node).collect())
    }

    /// Ids of every node strictly below `id`, in pre-order.
    pub fn descendant_ids(&self, id: &str) -> Vec<String> {
        self.find(id)
            .map(|node| node.iter().skip(1).map(|n| n.id.clone()).collect())
            .unwrap_or_default()
    }

    /// Copy of the subtree at `id`, suitable for re-insertion.
    pub fn subtree_data(&self, id: &str) -> Option<NodeData> {
        self.find(id).map(NodeData::from)
    }

    /// Sets one property of node `id`. A missing id leaves the document as is.
    pub fn set_property(&self, id: &str, property: NodeProperty) -> Document {
        self.rewrite(id, |node| property.apply(node))
    }

    /// Appends a node built from `data` to the children of `parent_id`.
    ///
    /// Missing ids in `data` (at any depth) are generated. A missing parent
    /// leaves the document as is; an id that already exists in the document
    /// is rejected.
    pub fn add_child(&self, parent_id: &str, data: NodeData) -> Result<Document, DocumentError> {
        if !self.contains(parent_id) {
            return Ok(self.clone());
        }

        let child = data.into_node();
        let mut seen: HashSet<&str> = self.nodes().map(|node| node.id.as_str()).collect();
        check_ids(&child, &mut seen)?;

        Ok(self.rewrite(parent_id, |node| node.children.push(Arc::new(child))))
    }

    /// Removes node `id` together with its subtree. The root is never removed.
    pub fn remove_node(&self, id: &str) -> Document {
        match index_path(&self.root, id) {
            Some(mut indices) => match indices.pop() {
                Some(idx) => Document {
                    root: rebuild_path(&self.root, &indices, |parent| {
                        parent.children.remove(idx);
                    }),
                },
                None => self.clone(),
            },
            None => self.clone(),
        }
    }

    /// True when both documents share the same root allocation.
    pub fn ptr_eq(&self, other: &Document) -> bool {
        Arc::ptr_eq(&self.root, &other.root)
    }

    fn rewrite(&self, id: &str, edit: impl FnOnce(&mut Node)) -> Document {
        match index_path(&self.root, id) {
            Some(indices) => Document {
                root: rebuild_path(&self.root, &indices, edit),
            },
            None => self.clone(),
        }
    }
}

fn check_ids<'a>(root: &'a Node, seen: &mut HashSet<&'a str>) -> Result<(), DocumentError> {
    for node in root.iter() {
        if node.id.is_empty() {
            return Err(DocumentError::EmptyId);
        }
        if !seen.insert(node.id.as_str()) {
            return Err(DocumentError::DuplicateId {
                id: node.id.clone(),
            });
        }
    }
    Ok(())
}

/// Child indices leading from `root` to the first pre-order match of `id`.
/// Empty when `id` is the root itself.
fn index_path(root: &Node, id: &str) -> Option<Vec<usize>> {
    if root.id == id {
        return Some(Vec::new());
    }
    // Each frame holds a node and the index of its next unvisited child.
    let mut stack: Vec<(&Node, usize)> = vec![(root, 0)];
    while let Some(frame) = stack.last_mut() {
        let (node, next) = (frame.0, frame.1);
        let Some(child) = node.children.get(next) else {
            stack.pop();
            continue;
        };
        frame.1 += 1;
        if child.id == id {
            return Some(stack.iter().map(|(_, next)| next - 1).collect());
        }
        stack.push((child, 0));
    }
    None
}

fn ancestor_chain<'a>(root: &'a Arc<Node>, indices: &[usize]) -> Vec<&'a Arc<Node>> {
    let mut chain = Vec::with_capacity(indices.len() + 1);
    let mut current = root;
    chain.push(current);
    for &idx in indices {
        current = &current.children[idx];
        chain.push(current);
    }
    chain
}

// Copies only the nodes along `indices`; siblings keep their Arc.
fn rebuild_path(root: &Arc<Node>, indices: &[usize], edit: impl FnOnce(&mut Node)) -> Arc<Node> {
    let chain = ancestor_chain(root, indices);
    let mut target = Node::clone(chain[chain.len() - 1]);
    edit(&mut target);
    let mut current = Arc::new(target);
    for (ancestor, &idx) in chain.iter().rev().skip(1).zip(indices.iter().rev()) {
        let mut updated = Node::clone(ancestor);
        updated.children[idx] = current;
        current = Arc::new(updated);
    }
    current
}
