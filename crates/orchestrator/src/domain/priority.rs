#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

/// Scheduling priority. Lower numeric value is served first.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High = 0,
    Normal = 1,
    Low = 2,
}

impl Priority {
    pub fn value(self) -> u8 {
        self as u8
    }

    /// One level higher, floored at `High`.
    pub fn boosted(self) -> Self {
        match self {
            Priority::High | Priority::Normal => Priority::High,
            Priority::Low => Priority::Normal,
        }
    }
}

/// Probability bucket assigned by the predictor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityBucket {
    High,
    Medium,
    Low,
}

impl From<PriorityBucket> for Priority {
    fn from(bucket: PriorityBucket) -> Self {
        match bucket {
            PriorityBucket::High => Priority::High,
            PriorityBucket::Medium => Priority::Normal,
            PriorityBucket::Low => Priority::Low,
        }
    }
}
