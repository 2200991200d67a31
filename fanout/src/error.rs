use crate::topic::TopicError;
use crate::types::SubscriberId;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("topic error: {0}")]
    Topic(#[from] TopicError),
    /// The triggered batch has no room left and the overflow policy is `reject`.
    #[error("triggered batch is full, capacity: {0}")]
    BatchFull(usize),
    /// A single publish matches more nodes than one batch can hold.
    #[error("publish matches {matched} topic nodes, batch capacity is {capacity}")]
    BatchTooLarge { matched: usize, capacity: usize },
    #[error("invalid batch capacity {0}, expected 1..={1}")]
    InvalidCapacity(usize, usize),
    #[error("unknown subscriber {0}")]
    UnknownSubscriber(SubscriberId),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
