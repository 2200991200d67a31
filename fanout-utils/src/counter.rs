use std::fmt;
use std::sync::atomic::{AtomicIsize, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::json;

type Current = AtomicIsize;
type Max = AtomicIsize;

/// A gauge that remembers the highest value it has ever held.
#[derive(Serialize, Deserialize)]
pub struct Counter(Current, Max, StatsMergeMode);

impl Clone for Counter {
    fn clone(&self) -> Self {
        Counter(
            AtomicIsize::new(self.0.load(Ordering::Relaxed)),
            AtomicIsize::new(self.1.load(Ordering::Relaxed)),
            self.2.clone(),
        )
    }
}

impl fmt::Debug for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, r#"{{ "count":{}, "max":{} }}"#, self.count(), self.max())
    }
}

impl Default for Counter {
    fn default() -> Self {
        Self::new()
    }
}

impl Counter {
    #[inline]
    pub fn new() -> Self {
        Counter(AtomicIsize::new(0), AtomicIsize::new(0), StatsMergeMode::None)
    }

    #[inline]
    pub fn new_with(c: isize, max: isize, m: StatsMergeMode) -> Self {
        Counter(AtomicIsize::new(c), AtomicIsize::new(max), m)
    }

    #[inline]
    pub fn inc(&self) {
        self.incs(1);
    }

    #[inline]
    pub fn incs(&self, c: isize) {
        let prev = self.0.fetch_add(c, Ordering::Relaxed);
        self.1.fetch_max(prev + c, Ordering::Relaxed);
    }

    #[inline]
    pub fn dec(&self) {
        self.decs(1)
    }

    #[inline]
    pub fn decs(&self, c: isize) {
        self.0.fetch_sub(c, Ordering::Relaxed);
    }

    /// Overwrites the current value, raising the max if needed.
    #[inline]
    pub fn sets(&self, c: isize) {
        self.0.store(c, Ordering::Relaxed);
        self.1.fetch_max(c, Ordering::Relaxed);
    }

    #[inline]
    pub fn count(&self) -> isize {
        self.0.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn max(&self) -> isize {
        self.1.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn add(&self, other: &Self) {
        self.0.fetch_add(other.count(), Ordering::Relaxed);
        self.1.fetch_add(other.max(), Ordering::Relaxed);
    }

    #[inline]
    pub fn merge(&self, other: &Self) {
        stats_merge(&self.2, self, other);
    }

    #[inline]
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "count": self.count(),
            "max": self.max()
        })
    }
}

#[inline]
fn stats_merge<'a>(mode: &StatsMergeMode, c: &'a Counter, o: &Counter) -> &'a Counter {
    match mode {
        StatsMergeMode::None => {}
        StatsMergeMode::Sum => {
            c.add(o);
        }
        StatsMergeMode::Max => {
            c.0.fetch_max(o.count(), Ordering::Relaxed);
            c.1.fetch_max(o.max(), Ordering::Relaxed);
        }
        StatsMergeMode::Min => {
            c.0.fetch_min(o.count(), Ordering::Relaxed);
            c.1.fetch_min(o.max(), Ordering::Relaxed);
        }
    }
    c
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatsMergeMode {
    None,
    Sum,
    Max,
    Min,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_max() {
        let c = Counter::new();
        c.incs(3);
        c.decs(2);
        c.inc();
        assert_eq!(c.count(), 2);
        assert_eq!(c.max(), 3);

        c.sets(1);
        assert_eq!(c.count(), 1);
        assert_eq!(c.max(), 3);
    }

    #[test]
    fn test_counter_merge() {
        let a = Counter::new_with(2, 5, StatsMergeMode::Sum);
        a.merge(&Counter::new_with(3, 4, StatsMergeMode::Sum));
        assert_eq!((a.count(), a.max()), (5, 9));

        let b = Counter::new_with(2, 5, StatsMergeMode::Max);
        b.merge(&Counter::new_with(3, 4, StatsMergeMode::Max));
        assert_eq!((b.count(), b.max()), (3, 5));

        let m = Counter::new_with(2, 5, StatsMergeMode::Min);
        m.merge(&Counter::new_with(3, 4, StatsMergeMode::Min));
        assert_eq!((m.count(), m.max()), (2, 4));

        let n = Counter::new_with(2, 5, StatsMergeMode::None);
        n.merge(&Counter::new_with(3, 4, StatsMergeMode::None));
        assert_eq!((n.count(), n.max()), (2, 5));

        assert_eq!(a.to_json(), json!({"count": 5, "max": 9}));
    }
}
