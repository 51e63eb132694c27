use crate::NetworkQuality;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Policy {
    /// Bytes that may be prefetched before admission stops. Only an explicit
    /// budget reset lifts the limit again.
    pub byte_budget: u64,

    /// Prefetching is suppressed on connections worse than this.
    pub min_network_quality: NetworkQuality,

    /// Whether an active data-saver preference suppresses prefetching.
    pub respect_data_saver: bool,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            byte_budget: 10 * 1024 * 1024,
            min_network_quality: NetworkQuality::ThreeG,
            respect_data_saver: true,
        }
    }
}
