#![deny(unsafe_code)] // Enforce memory safety across the entire crate

//! # Overall Example
//! ```rust
//! use fanout::{RecordingSink, TopicTree};
//!
//! let mut tree = TopicTree::new(RecordingSink::new());
//!
//! let s1 = tree.register("conn-1");
//! let s2 = tree.register("conn-2");
//! tree.subscribe("sport/tennis", s1)?;
//! tree.subscribe("sport/#", s2)?;
//! tree.subscribe("sport/+", s2)?;
//!
//! tree.publish("sport/tennis", "ace;")?;
//! tree.publish("sport/golf", "birdie;")?;
//! assert_eq!(tree.drain(), 2);
//!
//! let deliveries = tree.sink_mut().take();
//! assert_eq!(deliveries[0], (s1, "ace;".into()));
//! assert_eq!(deliveries[1], (s2, "ace;birdie;".into()));
//! # Ok::<(), fanout::Error>(())
//! ```

/// Topic Handling
pub mod topic; // Topic filter parsing and validation

/// Topic Tree
mod batch; // Triggered-node batch
pub mod config; // Tree configuration
mod drain; // Fan-out merge
mod node; // Trie nodes and their arena
pub mod sink; // Delivery boundary
pub mod stats; // Tree statistics
mod subscriber; // Subscriber registry entry
pub mod tree; // Subscribe, publish, trim, drain

/// Common Types
pub mod error;
pub mod types;

pub use batch::MAX_BATCH_CAPACITY;
pub use config::{OverflowPolicy, TreeConfig};
pub use error::{Error, Result};
pub use sink::{DeliverySink, DeliveryStatus, RecordingSink};
pub use stats::Stats;
pub use subscriber::Subscriber;
pub use topic::{Level, Topic, TopicError};
pub use tree::TopicTree;
pub use types::{SequenceId, SubscriberId};

/// External Crate Re-exports
pub use bytes;
pub use fanout_utils as utils;
pub use log;
pub use serde_json;
