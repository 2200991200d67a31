use crate::node::NodeIdx;
use crate::types::SubscriberId;

/// Registry entry of one subscriber.
#[derive(Debug)]
pub struct Subscriber<H> {
    id: SubscriberId,
    handle: H,
    /// Nodes this subscriber is attached to, in subscription order.
    pub(crate) subscriptions: Vec<NodeIdx>,
}

impl<H> Subscriber<H> {
    #[inline]
    pub(crate) fn new(id: SubscriberId, handle: H) -> Self {
        Self { id, handle, subscriptions: Vec::new() }
    }

    #[inline]
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    #[inline]
    pub fn handle(&self) -> &H {
        &self.handle
    }

    #[inline]
    pub fn handle_mut(&mut self) -> &mut H {
        &mut self.handle
    }

    #[inline]
    pub fn subscriptions_size(&self) -> usize {
        self.subscriptions.len()
    }

    #[inline]
    pub(crate) fn into_handle(self) -> H {
        self.handle
    }
}
