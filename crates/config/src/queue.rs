use crate::ConcurrencyLimits;
use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use std::time::Duration;

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Queue {
    /// Maximum number of pending and loading items. Enqueue attempts beyond
    /// this are dropped.
    pub max_queue_size: usize,

    /// How many times a failed fetch is retried before the item is marked
    /// failed.
    pub max_retries: u32,

    /// Base retry delay. The n-th retry waits `retry_delay * n`.
    /// **Measured in milliseconds**.
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub retry_delay: Duration,

    /// Pending items older than this are scheduled one priority level
    /// higher. **Measured in milliseconds**.
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub age_boost_threshold: Duration,

    /// Completed and cancelled items are forgotten after this long.
    /// **Measured in milliseconds**.
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub completed_ttl: Duration,

    /// How often the host sweeps expired items. **Measured in
    /// milliseconds**.
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub cleanup_interval: Duration,

    pub concurrency: ConcurrencyLimits,
}

impl Default for Queue {
    fn default() -> Self {
        Self {
            max_queue_size: 50,
            max_retries: 2,
            retry_delay: Duration::from_millis(1_000),
            age_boost_threshold: Duration::from_millis(5_000),
            completed_ttl: Duration::from_secs(300),
            cleanup_interval: Duration::from_secs(60),
            concurrency: ConcurrencyLimits::default(),
        }
    }
}
