//! Batched fan-out merge.
//!
//! Every triggered node keeps its subscribers in a sorted set. Draining runs a
//! k-way merge over those sets (k is bounded by the batch capacity), so each
//! distinct subscriber is visited once and receives one payload. The set of
//! nodes whose cursor sits on the current subscriber is recorded as a bitmask;
//! payloads are built once per distinct mask and shared by every subscriber
//! with the same mask.
//!
//! A payload is the union of the nodes' pending messages keyed by sequence id,
//! concatenated in ascending id order. A message that reached several nodes of
//! the subset through the same publish appears once.

use std::collections::btree_set;
use std::collections::BTreeMap;
use std::iter::Peekable;

use bytes::{Bytes, BytesMut};

use crate::node::{NodeIdx, Nodes};
use crate::sink::{DeliverySink, DeliveryStatus};
use crate::stats::Stats;
use crate::subscriber::Subscriber;
use crate::types::{HashMap, SequenceId, SubscriberId};

type Cursor<'a> = Peekable<btree_set::Iter<'a, SubscriberId>>;

pub(crate) struct FanOut<'a, H, S> {
    pub nodes: &'a Nodes,
    pub batch: &'a [NodeIdx],
    pub registry: &'a HashMap<SubscriberId, Subscriber<H>>,
    pub sink: &'a mut S,
    pub stats: &'a Stats,
}

impl<H, S> FanOut<'_, H, S>
where
    S: DeliverySink<H>,
{
    /// Delivers the batch, returns the number of sink calls.
    pub fn run(self) -> usize {
        match self.batch.len() {
            0 => 0,
            1 => self.run_single(),
            _ => self.run_merge(),
        }
    }

    fn run_single(self) -> usize {
        let FanOut { nodes, batch, registry, sink, stats } = self;
        let node = &nodes[batch[0]];
        let mut payload: Option<Bytes> = None;
        let mut deliveries = 0;
        for id in node.subscribers.iter() {
            let payload = payload.get_or_insert_with(|| {
                stats.payload_builds.inc();
                concat(node.messages.iter())
            });
            deliver(registry, sink, stats, *id, payload);
            deliveries += 1;
        }
        deliveries
    }

    fn run_merge(self) -> usize {
        let FanOut { nodes, batch, registry, sink, stats } = self;
        let mut cursors: Vec<Cursor<'_>> =
            batch.iter().map(|idx| nodes[*idx].subscribers.iter().peekable()).collect();
        let mut cache: HashMap<u64, Bytes> = HashMap::default();
        let mut deliveries = 0;

        let mut min = cursors.iter_mut().filter_map(|c| c.peek().copied()).min().copied();
        while let Some(current) = min {
            let mut intersection = 0u64;
            let mut next_min: Option<SubscriberId> = None;

            for (i, cursor) in cursors.iter_mut().enumerate() {
                if cursor.next_if_eq(&&current).is_some() {
                    intersection |= 1 << i;
                }
                if let Some(&&id) = cursor.peek() {
                    next_min = Some(next_min.map_or(id, |m| m.min(id)));
                }
            }
            debug_assert_ne!(intersection, 0);

            let payload = cache.entry(intersection).or_insert_with(|| {
                stats.payload_builds.inc();
                build(nodes, batch, intersection)
            });
            deliver(registry, sink, stats, current, payload);
            deliveries += 1;

            min = next_min;
        }

        log::debug!(
            "fan-out merge over {} nodes, deliveries: {}, distinct payloads: {}",
            batch.len(),
            deliveries,
            cache.len()
        );
        deliveries
    }
}

/// Clears the drained batch when dropped, also while a panicking sink unwinds.
///
/// Nodes left empty while triggered were kept alive until now and are trimmed here.
pub(crate) struct BatchReset<'a> {
    pub nodes: &'a mut Nodes,
    pub batch: Vec<NodeIdx>,
    pub stats: &'a Stats,
}

impl Drop for BatchReset<'_> {
    fn drop(&mut self) {
        for &idx in &self.batch {
            let node = &mut self.nodes[idx];
            node.messages.clear();
            node.triggered = false;
        }
        let mut trimmed = 0;
        for &idx in &self.batch {
            if self.nodes.contains(idx) {
                trimmed += self.nodes.trim(idx);
            }
        }
        self.stats.nodes.decs(trimmed as isize);
        self.stats.batch.sets(0);
    }
}

/// Payload of the nodes selected by `intersection`, deduplicated by sequence id.
fn build(nodes: &Nodes, batch: &[NodeIdx], intersection: u64) -> Bytes {
    let mut complete: BTreeMap<SequenceId, &Bytes> = BTreeMap::new();
    for (i, idx) in batch.iter().enumerate() {
        if intersection & (1 << i) != 0 {
            for (seq, msg) in nodes[*idx].messages.iter() {
                complete.entry(*seq).or_insert(msg);
            }
        }
    }
    concat(complete.iter().map(|(seq, msg)| (seq, *msg)))
}

/// A single message is shared as is, several are copied into one buffer.
fn concat<'a, I>(messages: I) -> Bytes
where
    I: Iterator<Item = (&'a SequenceId, &'a Bytes)> + Clone,
{
    let mut iter = messages.clone();
    match (iter.next(), iter.next()) {
        (None, _) => unreachable!("triggered node without pending messages"),
        (Some((_, msg)), None) => msg.clone(),
        _ => {
            let len = messages.clone().map(|(_, msg)| msg.len()).sum();
            let mut buf = BytesMut::with_capacity(len);
            for (_, msg) in messages {
                buf.extend_from_slice(msg);
            }
            buf.freeze()
        }
    }
}

#[inline]
fn deliver<H, S>(
    registry: &HashMap<SubscriberId, Subscriber<H>>,
    sink: &mut S,
    stats: &Stats,
    id: SubscriberId,
    payload: &Bytes,
) where
    S: DeliverySink<H>,
{
    let Some(subscriber) = registry.get(&id) else {
        unreachable!("subscriber {} is attached to a topic node but not registered", id);
    };
    if let DeliveryStatus::Backpressure = sink.deliver(id, subscriber.handle(), payload) {
        stats.backpressured.inc();
    }
    stats.deliveries.inc();
}
