use std::fmt;

use serde::de::{self, Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};

use crate::batch::MAX_BATCH_CAPACITY;

/// What `publish` does when the triggered batch has no room for its matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Drain the pending batch first, then accept the publish.
    #[default]
    Drain,
    /// Refuse the publish with `Error::BatchFull`, leaving the tree unchanged.
    Reject,
}

impl std::str::FromStr for OverflowPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "drain" => Ok(OverflowPolicy::Drain),
            "reject" => Ok(OverflowPolicy::Reject),
            _ => Err(format!("unknown overflow policy `{}`, expected drain|reject", s)),
        }
    }
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverflowPolicy::Drain => f.write_str("drain"),
            OverflowPolicy::Reject => f.write_str("reject"),
        }
    }
}

impl<'de> Deserialize<'de> for OverflowPolicy {
    #[inline]
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer)?.parse().map_err(de::Error::custom)
    }
}

impl Serialize for OverflowPolicy {
    #[inline]
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct TreeConfig {
    #[serde(default = "TreeConfig::batch_capacity_default")]
    pub batch_capacity: usize,
    #[serde(default)]
    pub overflow: OverflowPolicy,
}

impl Default for TreeConfig {
    #[inline]
    fn default() -> Self {
        Self { batch_capacity: Self::batch_capacity_default(), overflow: OverflowPolicy::default() }
    }
}

impl TreeConfig {
    #[inline]
    fn batch_capacity_default() -> usize {
        MAX_BATCH_CAPACITY
    }
}
