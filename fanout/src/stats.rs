//! Topic tree statistics
//!
//! Gauges (`nodes`, `subscribers`, `subscriptions`, `batch`) carry their current
//! value and high-water mark; the remaining counters only grow. `Stats::merge`
//! folds the statistics of several trees together, e.g. when one tree runs per
//! worker.

use serde::{Deserialize, Serialize};
use serde_json::json;

use fanout_utils::{Counter, StatsMergeMode};

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Stats {
    pub nodes: Counter,
    pub subscribers: Counter,
    pub subscriptions: Counter,
    pub batch: Counter,

    pub publishes: Counter,
    pub matched_publishes: Counter,
    pub drains: Counter,
    pub forced_drains: Counter,
    pub deliveries: Counter,
    pub payload_builds: Counter,
    pub backpressured: Counter,
}

impl Default for Stats {
    fn default() -> Self {
        let sum = || Counter::new_with(0, 0, StatsMergeMode::Sum);
        Self {
            nodes: sum(),
            subscribers: sum(),
            subscriptions: sum(),
            batch: Counter::new_with(0, 0, StatsMergeMode::Max),
            publishes: sum(),
            matched_publishes: sum(),
            drains: sum(),
            forced_drains: sum(),
            deliveries: sum(),
            payload_builds: sum(),
            backpressured: sum(),
        }
    }
}

impl Stats {
    #[inline]
    pub fn merge(&mut self, other: &Self) {
        self.nodes.merge(&other.nodes);
        self.subscribers.merge(&other.subscribers);
        self.subscriptions.merge(&other.subscriptions);
        self.batch.merge(&other.batch);
        self.publishes.merge(&other.publishes);
        self.matched_publishes.merge(&other.matched_publishes);
        self.drains.merge(&other.drains);
        self.forced_drains.merge(&other.forced_drains);
        self.deliveries.merge(&other.deliveries);
        self.payload_builds.merge(&other.payload_builds);
        self.backpressured.merge(&other.backpressured);
    }

    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "nodes.count": self.nodes.count(),
            "nodes.max": self.nodes.max(),
            "subscribers.count": self.subscribers.count(),
            "subscribers.max": self.subscribers.max(),
            "subscriptions.count": self.subscriptions.count(),
            "subscriptions.max": self.subscriptions.max(),
            "batch.count": self.batch.count(),
            "batch.max": self.batch.max(),

            "publishes": self.publishes.count(),
            "matched_publishes": self.matched_publishes.count(),
            "drains": self.drains.count(),
            "forced_drains": self.forced_drains.count(),
            "deliveries": self.deliveries.count(),
            "payload_builds": self.payload_builds.count(),
            "backpressured": self.backpressured.count(),
        })
    }
}
