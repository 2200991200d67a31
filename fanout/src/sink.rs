//! Delivery boundary of the tree.
//!
//! `TopicTree::drain` calls [`DeliverySink::deliver`] exactly once for every
//! distinct subscriber touched by the pending batch. The call is synchronous and
//! the sink must not re-enter the tree it is draining. The tree owns its sink and
//! hands it out by `&mut` only, so the borrow checker rejects a sink that tries.
//!
//! A sink that panics unwinds out of `drain`; the pending batch is still reset
//! and trimmed on the way out, and subscribers not yet visited miss that batch.

use bytes::Bytes;

use crate::types::SubscriberId;

/// Caller-side bookkeeping reported back from a delivery.
///
/// The tree only counts these, it never changes its behavior because of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryStatus {
    #[default]
    Delivered,
    Backpressure,
}

pub trait DeliverySink<H> {
    fn deliver(&mut self, subscriber: SubscriberId, handle: &H, payload: &Bytes) -> DeliveryStatus;
}

impl<H, F> DeliverySink<H> for F
where
    F: FnMut(SubscriberId, &H, &Bytes) -> DeliveryStatus,
{
    #[inline]
    fn deliver(&mut self, subscriber: SubscriberId, handle: &H, payload: &Bytes) -> DeliveryStatus {
        self(subscriber, handle, payload)
    }
}

/// Sink that keeps every delivery in memory, in call order.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    pub deliveries: Vec<(SubscriberId, Bytes)>,
}

impl RecordingSink {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn take(&mut self) -> Vec<(SubscriberId, Bytes)> {
        std::mem::take(&mut self.deliveries)
    }
}

impl<H> DeliverySink<H> for RecordingSink {
    #[inline]
    fn deliver(&mut self, subscriber: SubscriberId, _handle: &H, payload: &Bytes) -> DeliveryStatus {
        self.deliveries.push((subscriber, payload.clone()));
        DeliveryStatus::Delivered
    }
}
