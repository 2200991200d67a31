use crate::error::{Error, Result};
use crate::node::NodeIdx;

/// Upper bound of a batch, one bit per triggered node in the drain subset mask.
pub const MAX_BATCH_CAPACITY: usize = u64::BITS as usize;

/// Nodes triggered since the last drain, in trigger order.
#[derive(Debug)]
pub(crate) struct TriggeredBatch {
    nodes: Vec<NodeIdx>,
    capacity: usize,
}

impl TriggeredBatch {
    #[inline]
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 || capacity > MAX_BATCH_CAPACITY {
            return Err(Error::InvalidCapacity(capacity, MAX_BATCH_CAPACITY));
        }
        Ok(Self { nodes: Vec::with_capacity(capacity), capacity })
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.capacity - self.nodes.len()
    }

    /// Callers check `remaining` first; an overfull push is a defect.
    #[inline]
    pub fn push(&mut self, idx: NodeIdx) {
        assert!(self.nodes.len() < self.capacity, "triggered batch overflow, capacity: {}", self.capacity);
        self.nodes.push(idx);
    }

    #[inline]
    pub fn take(&mut self) -> Vec<NodeIdx> {
        std::mem::replace(&mut self.nodes, Vec::with_capacity(self.capacity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_bounds() {
        assert_eq!(TriggeredBatch::new(0).unwrap_err(), Error::InvalidCapacity(0, 64));
        assert_eq!(TriggeredBatch::new(65).unwrap_err(), Error::InvalidCapacity(65, 64));
        assert_eq!(TriggeredBatch::new(64).unwrap().capacity(), 64);
    }

    #[test]
    fn test_push_take() {
        let mut batch = TriggeredBatch::new(2).unwrap();
        assert!(batch.is_empty());
        batch.push(3);
        batch.push(7);
        assert_eq!(batch.remaining(), 0);

        assert_eq!(batch.take(), vec![3, 7]);
        assert!(batch.is_empty());
        assert_eq!(batch.remaining(), 2);
    }

    #[test]
    #[should_panic(expected = "triggered batch overflow")]
    fn test_overfull_push_panics() {
        let mut batch = TriggeredBatch::new(1).unwrap();
        batch.push(1);
        batch.push(2);
    }
}
