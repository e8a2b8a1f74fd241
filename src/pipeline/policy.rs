//! Queue backpressure and run stopping policies

use serde::Deserialize;
use std::fmt;
use std::time::Duration;

/// Capacity and backpressure behavior of a work queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum QueuePolicy {
    /// Grows without limit
    Unbounded,

    /// Producers wait for space once `capacity` items are queued
    Block { capacity: usize },

    /// Items pushed while `capacity` items are queued are discarded
    DropNewest { capacity: usize },
}

impl QueuePolicy {
    /// Maximum number of queued items, if bounded
    pub fn capacity(&self) -> Option<usize> {
        match self {
            QueuePolicy::Unbounded => None,
            QueuePolicy::Block { capacity } | QueuePolicy::DropNewest { capacity } => {
                Some(*capacity)
            }
        }
    }
}

impl Default for QueuePolicy {
    fn default() -> Self {
        QueuePolicy::Block { capacity: 512 }
    }
}

/// Decides when the Leaf stage stops and the run finalizes
///
/// Whatever the policy, a run also finalizes once every queue has drained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum StopPolicy {
    /// Stop once `limit` leaf records have been accepted
    Count { limit: usize },

    /// Stop `seconds` after the index page has loaded
    Elapsed { seconds: u64 },

    /// Run until every queue is empty
    Exhausted,
}

impl StopPolicy {
    /// Maximum number of records the sink accepts
    pub fn record_limit(&self) -> Option<usize> {
        match self {
            StopPolicy::Count { limit } => Some(*limit),
            _ => None,
        }
    }

    /// Wall-clock budget for seeding and draining
    pub fn deadline(&self) -> Option<Duration> {
        match self {
            StopPolicy::Elapsed { seconds } => Some(Duration::from_secs(*seconds)),
            _ => None,
        }
    }
}

impl Default for StopPolicy {
    fn default() -> Self {
        StopPolicy::Count { limit: 101 }
    }
}

/// Why a run moved into its finalizing phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Every queue reported zero pending work
    Drained,

    /// The sink accepted its record limit
    LimitReached,

    /// The elapsed-time budget ran out
    DeadlineReached,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Drained => write!(f, "all queues drained"),
            StopReason::LimitReached => write!(f, "record limit reached"),
            StopReason::DeadlineReached => write!(f, "time budget exhausted"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_capacity() {
        assert_eq!(QueuePolicy::Unbounded.capacity(), None);
        assert_eq!(QueuePolicy::Block { capacity: 8 }.capacity(), Some(8));
        assert_eq!(QueuePolicy::DropNewest { capacity: 2 }.capacity(), Some(2));
    }

    #[test]
    fn test_stop_policy_accessors() {
        let count = StopPolicy::Count { limit: 101 };
        assert_eq!(count.record_limit(), Some(101));
        assert_eq!(count.deadline(), None);

        let elapsed = StopPolicy::Elapsed { seconds: 30 };
        assert_eq!(elapsed.record_limit(), None);
        assert_eq!(elapsed.deadline(), Some(Duration::from_secs(30)));

        assert_eq!(StopPolicy::Exhausted.record_limit(), None);
        assert_eq!(StopPolicy::Exhausted.deadline(), None);
    }

    #[test]
    fn test_defaults() {
        assert_eq!(StopPolicy::default(), StopPolicy::Count { limit: 101 });
        assert_eq!(QueuePolicy::default(), QueuePolicy::Block { capacity: 512 });
    }
}
