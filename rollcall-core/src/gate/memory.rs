//! Headless presentation tree
//!
//! A small retained tree of elements for servers, tests and tooling that
//! need view gating without a real UI toolkit.

use super::ViewElement;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

#[derive(Debug, Clone, PartialEq, Eq)]
enum NodeKind {
    Element(String),
    Marker,
}

#[derive(Debug)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    display: String,
    disabled: bool,
    attributes: BTreeMap<String, String>,
    classes: BTreeSet<String>,
}

impl Node {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            children: Vec::new(),
            display: String::new(),
            disabled: false,
            attributes: BTreeMap::new(),
            classes: BTreeSet::new(),
        }
    }
}

#[derive(Debug)]
struct Tree {
    nodes: HashMap<NodeId, Node>,
    next_id: u64,
}

impl Tree {
    fn insert(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(id, Node::new(kind));
        id
    }

    fn replace_child(&mut self, parent: NodeId, old: NodeId, new: NodeId) -> bool {
        let Some(slot) = self
            .nodes
            .get_mut(&parent)
            .and_then(|p| p.children.iter_mut().find(|c| **c == old))
        else {
            return false;
        };
        *slot = new;
        if let Some(node) = self.nodes.get_mut(&old) {
            node.parent = None;
        }
        if let Some(node) = self.nodes.get_mut(&new) {
            node.parent = Some(parent);
        }
        true
    }
}

/// Shared handle to a tree of elements
#[derive(Debug, Clone)]
pub struct MemoryTree {
    inner: Arc<Mutex<Tree>>,
    root: NodeId,
}

impl Default for MemoryTree {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTree {
    /// Tree holding a single `root` element
    pub fn new() -> Self {
        let mut tree = Tree { nodes: HashMap::new(), next_id: 0 };
        let root = tree.insert(NodeKind::Element("root".to_string()));
        Self { inner: Arc::new(Mutex::new(tree)), root }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Create a detached element
    pub fn create_element(&self, tag: &str) -> NodeId {
        self.lock().insert(NodeKind::Element(tag.to_string()))
    }

    /// Append `child` to `parent`, detaching it from any previous parent
    pub fn append_child(&self, parent: NodeId, child: NodeId) {
        let mut tree = self.lock();
        if let Some(previous) = tree.nodes.get(&child).and_then(|n| n.parent) {
            if let Some(p) = tree.nodes.get_mut(&previous) {
                p.children.retain(|c| *c != child);
            }
        }
        if let Some(p) = tree.nodes.get_mut(&parent) {
            p.children.push(child);
        }
        if let Some(c) = tree.nodes.get_mut(&child) {
            c.parent = Some(parent);
        }
    }

    /// Gate-able handle to `id`
    pub fn element(&self, id: NodeId) -> MemoryElement {
        MemoryElement { tree: self.clone(), id }
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.lock().nodes.get(&id).map(|n| n.children.clone()).unwrap_or_default()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.lock().nodes.get(&id).and_then(|n| n.parent)
    }

    pub fn tag(&self, id: NodeId) -> Option<String> {
        match &self.lock().nodes.get(&id)?.kind {
            NodeKind::Element(tag) => Some(tag.clone()),
            NodeKind::Marker => None,
        }
    }

    pub fn is_marker(&self, id: NodeId) -> bool {
        self.lock().nodes.get(&id).is_some_and(|n| n.kind == NodeKind::Marker)
    }

    /// Markers currently standing in for detached elements
    pub fn marker_count(&self) -> usize {
        self.lock().nodes.values().filter(|n| n.kind == NodeKind::Marker).count()
    }

    pub fn display(&self, id: NodeId) -> String {
        self.lock().nodes.get(&id).map(|n| n.display.clone()).unwrap_or_default()
    }

    pub fn set_display(&self, id: NodeId, value: &str) {
        self.with_node(id, |n| n.display = value.to_string());
    }

    pub fn is_disabled(&self, id: NodeId) -> bool {
        self.lock().nodes.get(&id).is_some_and(|n| n.disabled)
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<String> {
        self.lock().nodes.get(&id).and_then(|n| n.attributes.get(name).cloned())
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.lock().nodes.get(&id).is_some_and(|n| n.classes.contains(class))
    }

    fn with_node<F: FnOnce(&mut Node)>(&self, id: NodeId, f: F) {
        if let Some(node) = self.lock().nodes.get_mut(&id) {
            f(node);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Tree> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One element of a [`MemoryTree`]
#[derive(Debug, Clone)]
pub struct MemoryElement {
    tree: MemoryTree,
    id: NodeId,
}

impl MemoryElement {
    pub fn id(&self) -> NodeId {
        self.id
    }
}

impl ViewElement for MemoryElement {
    type Marker = NodeId;

    fn display(&self) -> String {
        self.tree.display(self.id)
    }

    fn set_display(&mut self, value: &str) {
        self.tree.set_display(self.id, value);
    }

    fn is_disabled(&self) -> bool {
        self.tree.is_disabled(self.id)
    }

    fn set_disabled(&mut self, disabled: bool) {
        self.tree.with_node(self.id, |n| n.disabled = disabled);
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.tree.attribute(self.id, name)
    }

    fn set_attribute(&mut self, name: &str, value: Option<&str>) {
        self.tree.with_node(self.id, |n| match value {
            Some(v) => {
                n.attributes.insert(name.to_string(), v.to_string());
            }
            None => {
                n.attributes.remove(name);
            }
        });
    }

    fn has_class(&self, class: &str) -> bool {
        self.tree.has_class(self.id, class)
    }

    fn set_class(&mut self, class: &str, present: bool) {
        self.tree.with_node(self.id, |n| {
            if present {
                n.classes.insert(class.to_string());
            } else {
                n.classes.remove(class);
            }
        });
    }

    fn detach(&mut self) -> Option<NodeId> {
        let mut tree = self.tree.lock();
        let parent = tree.nodes.get(&self.id)?.parent?;
        let marker = tree.insert(NodeKind::Marker);
        if tree.replace_child(parent, self.id, marker) {
            Some(marker)
        } else {
            tree.nodes.remove(&marker);
            None
        }
    }

    fn reattach(&mut self, marker: NodeId) {
        let mut tree = self.tree.lock();
        match tree.nodes.get(&marker).and_then(|m| m.parent) {
            Some(parent) => {
                tree.replace_child(parent, marker, self.id);
            }
            None => log::debug!("Marker {:?} no longer in the tree, element stays detached", marker),
        }
        tree.nodes.remove(&marker);
    }
}
