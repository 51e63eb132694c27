#![forbid(unsafe_code)]

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Effective connection quality reported by the host environment.
///
/// Variants are ordered best to worst; [`NetworkQuality::rank`] exposes the
/// ordinal used by admission checks. `Unknown` has no rank.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum NetworkQuality {
    #[serde(rename = "4g")]
    FourG,

    #[serde(rename = "3g")]
    ThreeG,

    #[serde(rename = "2g")]
    TwoG,

    #[serde(rename = "slow-2g")]
    Slow2G,

    /// The environment could not report a connection type.
    #[default]
    #[serde(rename = "unknown")]
    Unknown,
}

impl NetworkQuality {
    pub const ALL: [NetworkQuality; 5] = [
        NetworkQuality::FourG,
        NetworkQuality::ThreeG,
        NetworkQuality::TwoG,
        NetworkQuality::Slow2G,
        NetworkQuality::Unknown,
    ];

    /// Ordinal rank, 0 being the best connection. `None` for `Unknown`.
    pub fn rank(self) -> Option<u8> {
        match self {
            NetworkQuality::FourG => Some(0),
            NetworkQuality::ThreeG => Some(1),
            NetworkQuality::TwoG => Some(2),
            NetworkQuality::Slow2G => Some(3),
            NetworkQuality::Unknown => None,
        }
    }

    /// Whether `self` is at least as good as `minimum`.
    ///
    /// Unknown quality on either side is never ranked below the minimum.
    pub fn meets(self, minimum: NetworkQuality) -> bool {
        match (self.rank(), minimum.rank()) {
            (Some(actual), Some(required)) => actual <= required,
            _ => true,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NetworkQuality::FourG => "4g",
            NetworkQuality::ThreeG => "3g",
            NetworkQuality::TwoG => "2g",
            NetworkQuality::Slow2G => "slow-2g",
            NetworkQuality::Unknown => "unknown",
        }
    }
}

impl fmt::Display for NetworkQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NetworkQuality {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "4g" => Ok(NetworkQuality::FourG),
            "3g" => Ok(NetworkQuality::ThreeG),
            "2g" => Ok(NetworkQuality::TwoG),
            "slow-2g" | "slow2g" => Ok(NetworkQuality::Slow2G),
            "unknown" => Ok(NetworkQuality::Unknown),
            other => Err(Error::InvalidNetworkQuality(other.to_string())),
        }
    }
}
