#![forbid(unsafe_code)]

use super::Route;
use serde::{Deserialize, Serialize};

/// How a navigation or interaction was triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InteractionType {
    #[default]
    Click,
    Hover,
    Focus,
    Touch,
    Programmatic,
    History,
}

/// One observed route change. Timestamps are milliseconds since the Unix
/// epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationEvent {
    pub from: Route,
    pub to: Route,
    pub timestamp: u64,
    #[serde(default)]
    pub interaction: InteractionType,
}
