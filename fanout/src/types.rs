use std::fmt;

use serde::{Deserialize, Serialize};

pub type HashMap<K, V> = std::collections::HashMap<K, V, ahash::RandomState>;

/// Publish sequence id, one per accepted `publish` call.
pub type SequenceId = u64;

/// Subscriber identity, assigned by the tree in registration order.
///
/// This is the total order used by the drain merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SubscriberId(u64);

impl SubscriberId {
    #[inline]
    pub(crate) fn new(id: u64) -> Self {
        SubscriberId(id)
    }

    #[inline]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}", self.0)
    }
}
