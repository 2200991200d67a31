//! Topic tree: subscription trie, publish matching, trimming and batched drain.
//!
//! ```text
//!   subscribe("a/b", S1)      root ── a ── b {S1}
//!   subscribe("a/#", S2)                 └─ # {S2}
//!   publish("a/b", "M1")      b.messages = {0: M1}, #.messages = {0: M1}
//!   drain()                   deliver(S1, "M1"), deliver(S2, "M1")
//! ```
//!
//! A tree is a plain single-threaded structure; every call runs to completion.
//! Shard one tree per worker when parallelism is needed.

use std::str::FromStr;

use bytes::Bytes;
use itertools::Itertools;

use crate::batch::TriggeredBatch;
use crate::config::{OverflowPolicy, TreeConfig};
use crate::drain::{BatchReset, FanOut};
use crate::error::{Error, Result};
use crate::node::{NodeIdx, Nodes, TrieNode, ROOT};
use crate::sink::DeliverySink;
use crate::stats::Stats;
use crate::subscriber::Subscriber;
use crate::topic::{validate_topic_name, Topic};
use crate::types::{HashMap, SequenceId, SubscriberId};

pub struct TopicTree<H, S> {
    nodes: Nodes,
    registry: HashMap<SubscriberId, Subscriber<H>>,
    next_subscriber_id: u64,
    sequence: SequenceId,
    batch: TriggeredBatch,
    overflow: OverflowPolicy,
    sink: S,
    stats: Stats,
}

impl<H, S> TopicTree<H, S>
where
    S: DeliverySink<H>,
{
    /// Creates a tree with the default batch capacity and overflow policy.
    #[inline]
    pub fn new(sink: S) -> Self {
        match Self::with_config(&TreeConfig::default(), sink) {
            Ok(tree) => tree,
            Err(e) => unreachable!("default tree config rejected: {}", e),
        }
    }

    pub fn with_config(cfg: &TreeConfig, sink: S) -> Result<Self> {
        Ok(Self {
            nodes: Nodes::default(),
            registry: HashMap::default(),
            next_subscriber_id: 0,
            sequence: 0,
            batch: TriggeredBatch::new(cfg.batch_capacity)?,
            overflow: cfg.overflow,
            sink,
            stats: Stats::default(),
        })
    }

    /// Adds a subscriber to the registry and returns its identity.
    #[inline]
    pub fn register(&mut self, handle: H) -> SubscriberId {
        let id = SubscriberId::new(self.next_subscriber_id);
        self.next_subscriber_id += 1;
        self.registry.insert(id, Subscriber::new(id, handle));
        self.stats.subscribers.inc();
        id
    }

    /// Detaches the subscriber from every topic and drops its registry entry.
    pub fn deregister(&mut self, id: SubscriberId) -> Result<H> {
        self.unsubscribe_all(id)?;
        match self.registry.remove(&id) {
            Some(subscriber) => {
                self.stats.subscribers.dec();
                Ok(subscriber.into_handle())
            }
            None => unreachable!("subscriber {} vanished during unsubscribe_all", id),
        }
    }

    #[inline]
    pub fn subscriber(&self, id: SubscriberId) -> Option<&Subscriber<H>> {
        self.registry.get(&id)
    }

    #[inline]
    pub fn subscriber_mut(&mut self, id: SubscriberId) -> Option<&mut Subscriber<H>> {
        self.registry.get_mut(&id)
    }

    /// Attaches `id` to `topic_filter`, creating the missing path nodes.
    ///
    /// Returns `false` if the subscriber was already attached to that filter.
    pub fn subscribe(&mut self, topic_filter: &str, id: SubscriberId) -> Result<bool> {
        let topic = Topic::from_str(topic_filter)?;
        if !self.registry.contains_key(&id) {
            return Err(Error::UnknownSubscriber(id));
        }

        let mut iterator = ROOT;
        for level in topic.levels() {
            iterator = self.child_or_insert(iterator, level.segment());
        }

        if !self.nodes[iterator].subscribers.insert(id) {
            return Ok(false);
        }
        match self.registry.get_mut(&id) {
            Some(subscriber) => subscriber.subscriptions.push(iterator),
            None => unreachable!(),
        }
        self.stats.subscriptions.inc();
        log::debug!("{} subscribe, topic_filter: {:?}", id, topic_filter);
        Ok(true)
    }

    /// Detaches `id` from `topic_filter` only, leaving its other subscriptions.
    ///
    /// Returns `false` if the subscriber was not attached to that filter.
    pub fn unsubscribe(&mut self, topic_filter: &str, id: SubscriberId) -> Result<bool> {
        let topic = Topic::from_str(topic_filter)?;
        let subscriber = self.registry.get_mut(&id).ok_or(Error::UnknownSubscriber(id))?;

        let mut iterator = ROOT;
        for level in topic.levels() {
            match self.nodes[iterator].children.get(level.segment()) {
                Some(&child) => iterator = child,
                None => return Ok(false),
            }
        }

        let Some(pos) = subscriber.subscriptions.iter().position(|idx| *idx == iterator) else {
            return Ok(false);
        };
        subscriber.subscriptions.remove(pos);
        self.detach(iterator, id);
        log::debug!("{} unsubscribe, topic_filter: {:?}", id, topic_filter);
        Ok(true)
    }

    /// Detaches `id` from every topic it is attached to and trims the tree.
    ///
    /// Returns the number of removed subscriptions.
    pub fn unsubscribe_all(&mut self, id: SubscriberId) -> Result<usize> {
        let subscriber = self.registry.get_mut(&id).ok_or(Error::UnknownSubscriber(id))?;
        let subscriptions = std::mem::take(&mut subscriber.subscriptions);
        let removed = subscriptions.len();
        for idx in subscriptions {
            self.detach(idx, id);
        }
        log::debug!("{} unsubscribe all, removed: {}", id, removed);
        Ok(removed)
    }

    /// Queues `payload` on every node that matches `topic`.
    ///
    /// All matching nodes share one sequence id, so a subscriber reached through
    /// several of them still receives the payload once. Returns the number of
    /// matched nodes.
    pub fn publish<P: Into<Bytes>>(&mut self, topic: &str, payload: P) -> Result<usize> {
        validate_topic_name(topic)?;

        let matched = self.collect_matches(topic);
        let fresh = matched.iter().filter(|idx| !self.nodes[**idx].triggered).count();
        if fresh > self.batch.remaining() {
            if matched.len() > self.batch.capacity() {
                return Err(Error::BatchTooLarge { matched: matched.len(), capacity: self.batch.capacity() });
            }
            match self.overflow {
                OverflowPolicy::Reject => {
                    log::warn!("publish to {:?} rejected, triggered batch is full", topic);
                    return Err(Error::BatchFull(self.batch.capacity()));
                }
                OverflowPolicy::Drain => {
                    log::debug!("triggered batch is full, draining before publish to {:?}", topic);
                    self.stats.forced_drains.inc();
                    self.drain();
                }
            }
        }

        let seq = self.sequence;
        self.sequence += 1;
        self.stats.publishes.inc();
        if matched.is_empty() {
            return Ok(0);
        }

        let payload = payload.into();
        for &idx in &matched {
            let node = &mut self.nodes[idx];
            node.messages.insert(seq, payload.clone());
            if !node.triggered {
                node.triggered = true;
                self.batch.push(idx);
            }
        }
        self.stats.matched_publishes.inc();
        self.stats.batch.sets(self.batch.len() as isize);
        Ok(matched.len())
    }

    /// Delivers the pending batch and resets it.
    ///
    /// The sink is called once per distinct subscriber. Returns the number of
    /// deliveries; an empty batch is a no-op. If the sink panics, the batch is
    /// still reset and trimmed while unwinding, and the tree stays usable.
    pub fn drain(&mut self) -> usize {
        if self.batch.is_empty() {
            return 0;
        }

        let reset = BatchReset { nodes: &mut self.nodes, batch: self.batch.take(), stats: &self.stats };
        let deliveries = FanOut {
            nodes: &*reset.nodes,
            batch: &reset.batch,
            registry: &self.registry,
            sink: &mut self.sink,
            stats: &self.stats,
        }
        .run();
        let triggered = reset.batch.len();
        drop(reset);

        self.stats.drains.inc();
        log::debug!("drain, triggered nodes: {}, deliveries: {}", triggered, deliveries);
        deliveries
    }

    /// Subscribers a publish to `topic` would reach, in identity order.
    pub fn matches(&self, topic: &str) -> Result<Vec<SubscriberId>> {
        validate_topic_name(topic)?;
        Ok(self
            .collect_matches(topic)
            .into_iter()
            .map(|idx| self.nodes[idx].subscribers.iter().copied())
            .kmerge()
            .dedup()
            .collect())
    }

    /// Indented listing of the tree, `top` levels deep.
    pub fn list(&self, top: usize) -> Vec<String> {
        let mut out = Vec::new();
        self._list(ROOT, &mut out, top, 0);
        out
    }

    fn _list(&self, idx: NodeIdx, out: &mut Vec<String>, top: usize, depth: usize) {
        if top == 0 {
            return;
        }
        for (segment, child) in self.nodes[idx].children.iter() {
            let n = &self.nodes[*child];
            out.push(format!(
                "{}{:?} = {} publishes, {} subscribers",
                "  ".repeat(depth + 1),
                segment,
                n.messages.len(),
                n.subscribers.len()
            ));
            self._list(*child, out, top - 1, depth + 1);
        }
    }

    /// Number of nodes, root excluded.
    #[inline]
    pub fn nodes_size(&self) -> usize {
        self.nodes.len()
    }

    /// Number of (subscriber, topic filter) attachments.
    #[inline]
    pub fn values_size(&self) -> usize {
        self.registry.values().map(Subscriber::subscriptions_size).sum()
    }

    #[inline]
    pub fn subscribers_size(&self) -> usize {
        self.registry.len()
    }

    /// Number of nodes triggered since the last drain.
    #[inline]
    pub fn batch_len(&self) -> usize {
        self.batch.len()
    }

    #[inline]
    pub fn batch_capacity(&self) -> usize {
        self.batch.capacity()
    }

    /// Sequence id the next accepted publish will use.
    #[inline]
    pub fn sequence(&self) -> SequenceId {
        self.sequence
    }

    #[inline]
    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    #[inline]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    #[inline]
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    #[inline]
    pub fn into_sink(self) -> S {
        self.sink
    }

    fn child_or_insert(&mut self, parent: NodeIdx, segment: &str) -> NodeIdx {
        if let Some(&child) = self.nodes[parent].children.get(segment) {
            return child;
        }
        let child = self.nodes.insert(TrieNode::new(segment, parent));
        self.nodes[parent].link_child(segment, child);
        self.stats.nodes.inc();
        child
    }

    /// Nodes holding subscribers that match `topic`, each at most once.
    fn collect_matches(&self, topic: &str) -> Vec<NodeIdx> {
        let segments = topic.split('/').collect::<Vec<_>>();
        let mut out = Vec::new();
        self._matches(ROOT, &segments, &mut out);
        out.retain(|idx| !self.nodes[*idx].subscribers.is_empty());
        out.sort_unstable();
        out.dedup();
        out
    }

    fn _matches(&self, mut iterator: NodeIdx, mut segments: &[&str], out: &mut Vec<NodeIdx>) {
        loop {
            let node = &self.nodes[iterator];

            //a terminating wildcard matches here and everything below, including nothing
            if let Some(t) = node.terminating_wildcard_child {
                out.push(t);
            }

            let Some((segment, rest)) = segments.split_first() else {
                out.push(iterator);
                return;
            };

            if let Some(w) = node.wildcard_child {
                self._matches(w, rest, out);
            }

            match node.children.get(*segment) {
                Some(&child) => {
                    iterator = child;
                    segments = rest;
                }
                None => return,
            }
        }
    }

    fn detach(&mut self, idx: NodeIdx, id: SubscriberId) {
        let removed = self.nodes[idx].subscribers.remove(&id);
        assert!(removed, "subscriber {} listed a topic node it is not attached to", id);
        self.stats.subscriptions.dec();
        let trimmed = self.nodes.trim(idx);
        self.stats.nodes.decs(trimmed as isize);
    }
}
