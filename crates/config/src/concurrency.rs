#![forbid(unsafe_code)]

use crate::NetworkQuality;
use serde::{Deserialize, Serialize};

/// Maximum simultaneous prefetches per network tier.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ConcurrencyLimits {
    #[serde(rename = "4g")]
    pub four_g: usize,
    #[serde(rename = "3g")]
    pub three_g: usize,
    #[serde(rename = "2g")]
    pub two_g: usize,
    #[serde(rename = "slow-2g")]
    pub slow_2g: usize,
    /// Used when the network tier is unknown.
    pub default: usize,
}

impl Default for ConcurrencyLimits {
    fn default() -> Self {
        Self {
            four_g: 6,
            three_g: 3,
            two_g: 1,
            slow_2g: 1,
            default: 2,
        }
    }
}

impl ConcurrencyLimits {
    /// Every tier is allowed at least one fetch in flight.
    pub fn clamp(self) -> Self {
        Self {
            four_g: self.four_g.max(1),
            three_g: self.three_g.max(1),
            two_g: self.two_g.max(1),
            slow_2g: self.slow_2g.max(1),
            default: self.default.max(1),
        }
    }

    pub fn for_quality(&self, quality: NetworkQuality) -> usize {
        match quality {
            NetworkQuality::FourG => self.four_g,
            NetworkQuality::ThreeG => self.three_g,
            NetworkQuality::TwoG => self.two_g,
            NetworkQuality::Slow2G => self.slow_2g,
            NetworkQuality::Unknown => self.default,
        }
    }

    /// The same limit on every tier.
    pub fn uniform(limit: usize) -> Self {
        Self {
            four_g: limit,
            three_g: limit,
            two_g: limit,
            slow_2g: limit,
            default: limit,
        }
    }
}
