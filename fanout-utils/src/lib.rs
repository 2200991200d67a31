#![deny(unsafe_code)]

//! Small utilities shared by the fanout crates.
//!
//! - [`Counter`]: current/max gauge with a merge mode, used for tree statistics
//!   and for combining the statistics of several sharded trees.
//!
//! ```rust
//! use fanout_utils::{Counter, StatsMergeMode};
//!
//! let c = Counter::new_with(0, 0, StatsMergeMode::Sum);
//! c.inc();
//! c.inc();
//! c.dec();
//! assert_eq!(c.count(), 1);
//! assert_eq!(c.max(), 2);
//! ```

mod counter;

pub use counter::{Counter, StatsMergeMode};
