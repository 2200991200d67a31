use std::collections::{BTreeMap, BTreeSet};
use std::ops::{Index, IndexMut};

use bytes::Bytes;

use crate::topic::{MULTI_WILDCARD, SINGLE_WILDCARD};
use crate::types::{SequenceId, SubscriberId};

pub(crate) type NodeIdx = usize;

pub(crate) const ROOT: NodeIdx = 0;

/// One segment of the topic namespace.
#[derive(Debug, Default)]
pub(crate) struct TrieNode {
    pub segment: String,
    /// Back-reference used only for trimming, `None` for the root.
    pub parent: Option<NodeIdx>,
    pub children: BTreeMap<String, NodeIdx>,
    /// Aliases `children["+"]`.
    pub wildcard_child: Option<NodeIdx>,
    /// Aliases `children["#"]`.
    pub terminating_wildcard_child: Option<NodeIdx>,
    /// Pending payloads of the current batch, keyed by publish sequence id.
    pub messages: BTreeMap<SequenceId, Bytes>,
    pub subscribers: BTreeSet<SubscriberId>,
    pub triggered: bool,
}

impl TrieNode {
    #[inline]
    pub fn new(segment: &str, parent: NodeIdx) -> Self {
        Self { segment: segment.to_owned(), parent: Some(parent), ..Default::default() }
    }

    /// Links a freshly inserted child into `children` and the wildcard fast paths.
    #[inline]
    pub fn link_child(&mut self, segment: &str, child: NodeIdx) {
        let prev = self.children.insert(segment.to_owned(), child);
        assert!(prev.is_none(), "segment {:?} linked twice", segment);
        match segment {
            SINGLE_WILDCARD => self.wildcard_child = Some(child),
            MULTI_WILDCARD => self.terminating_wildcard_child = Some(child),
            _ => {}
        }
    }

    #[inline]
    pub fn unlink_child(&mut self, segment: &str, child: NodeIdx) {
        let removed = self.children.remove(segment);
        assert_eq!(removed, Some(child), "child {:?} is not linked under its parent", segment);
        if self.wildcard_child == Some(child) {
            self.wildcard_child = None;
        }
        if self.terminating_wildcard_child == Some(child) {
            self.terminating_wildcard_child = None;
        }
    }

    /// No subscribers, no children and not part of a pending batch.
    #[inline]
    pub fn is_trimmable(&self) -> bool {
        self.subscribers.is_empty()
            && self.children.is_empty()
            && self.wildcard_child.is_none()
            && self.terminating_wildcard_child.is_none()
            && !self.triggered
    }
}

/// Slot arena that owns every node of one tree. Slot 0 is the root.
#[derive(Debug)]
pub(crate) struct Nodes {
    slots: Vec<Option<TrieNode>>,
    free: Vec<NodeIdx>,
}

impl Default for Nodes {
    fn default() -> Self {
        Self { slots: vec![Some(TrieNode::default())], free: Vec::new() }
    }
}

impl Nodes {
    #[inline]
    pub fn insert(&mut self, node: TrieNode) -> NodeIdx {
        if let Some(idx) = self.free.pop() {
            self.slots[idx] = Some(node);
            idx
        } else {
            self.slots.push(Some(node));
            self.slots.len() - 1
        }
    }

    #[inline]
    pub fn remove(&mut self, idx: NodeIdx) -> TrieNode {
        assert_ne!(idx, ROOT, "the root node is never removed");
        match self.slots.get_mut(idx).and_then(Option::take) {
            Some(node) => {
                self.free.push(idx);
                node
            }
            None => unreachable!("remove of vacant node slot {}", idx),
        }
    }

    #[inline]
    pub fn contains(&self, idx: NodeIdx) -> bool {
        matches!(self.slots.get(idx), Some(Some(_)))
    }

    /// Removes `idx` and then its ancestors while they are trimmable.
    /// Returns the number of removed nodes.
    pub fn trim(&mut self, mut idx: NodeIdx) -> usize {
        let mut trimmed = 0;
        while idx != ROOT && self[idx].is_trimmable() {
            let node = self.remove(idx);
            assert!(node.messages.is_empty(), "trimmed topic node {:?} with pending messages", node.segment);
            let Some(parent) = node.parent else {
                unreachable!("non-root topic node {:?} without parent", node.segment);
            };
            self[parent].unlink_child(&node.segment, idx);
            trimmed += 1;
            idx = parent;
        }
        trimmed
    }

    /// Number of live nodes, root excluded.
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len() - 1
    }
}

impl Index<NodeIdx> for Nodes {
    type Output = TrieNode;

    #[inline]
    fn index(&self, idx: NodeIdx) -> &TrieNode {
        match self.slots.get(idx) {
            Some(Some(node)) => node,
            _ => unreachable!("access to vacant node slot {}", idx),
        }
    }
}

impl IndexMut<NodeIdx> for Nodes {
    #[inline]
    fn index_mut(&mut self, idx: NodeIdx) -> &mut TrieNode {
        match self.slots.get_mut(idx) {
            Some(Some(node)) => node,
            _ => unreachable!("access to vacant node slot {}", idx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_reuse() {
        let mut nodes = Nodes::default();
        assert_eq!(nodes.len(), 0);

        let a = nodes.insert(TrieNode::new("a", ROOT));
        let b = nodes.insert(TrieNode::new("b", a));
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[b].parent, Some(a));

        let removed = nodes.remove(b);
        assert_eq!(removed.segment, "b");
        assert!(!nodes.contains(b));
        assert_eq!(nodes.len(), 1);

        let c = nodes.insert(TrieNode::new("c", a));
        assert_eq!(c, b);
        assert_eq!(nodes[c].segment, "c");
    }

    #[test]
    fn test_wildcard_links() {
        let mut parent = TrieNode::default();
        parent.link_child("+", 1);
        parent.link_child("#", 2);
        parent.link_child("x", 3);
        assert_eq!(parent.wildcard_child, Some(1));
        assert_eq!(parent.terminating_wildcard_child, Some(2));
        assert_eq!(parent.children.keys().collect::<Vec<_>>(), vec!["#", "+", "x"]);

        parent.unlink_child("+", 1);
        assert_eq!(parent.wildcard_child, None);
        assert_eq!(parent.terminating_wildcard_child, Some(2));
        parent.unlink_child("#", 2);
        assert_eq!(parent.terminating_wildcard_child, None);
        assert_eq!(parent.children.len(), 1);
    }

    #[test]
    #[should_panic(expected = "the root node is never removed")]
    fn test_root_removal_panics() {
        let mut nodes = Nodes::default();
        nodes.remove(ROOT);
    }

    #[test]
    fn test_trimmable() {
        let mut n = TrieNode::new("a", ROOT);
        assert!(n.is_trimmable());
        n.triggered = true;
        assert!(!n.is_trimmable());
        n.triggered = false;
        n.subscribers.insert(SubscriberId::new(1));
        assert!(!n.is_trimmable());
    }
}
