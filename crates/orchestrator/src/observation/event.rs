#![forbid(unsafe_code)]

use crate::domain::{InteractionType, NavigationEvent, Route};
use serde::{Deserialize, Serialize};

/// Input supplied by the navigation source.
///
/// The serde representation is internally tagged so traces can be stored
/// as JSON lines, e.g.
/// `{"type":"navigation","from":"/","to":"/docs","timestamp":0}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObservationEvent {
    Navigation(NavigationEvent),
    Interaction {
        route: Route,
        timestamp: u64,
        #[serde(default = "default_interaction")]
        kind: InteractionType,
    },
}

fn default_interaction() -> InteractionType {
    InteractionType::Hover
}

impl ObservationEvent {
    pub fn navigation(from: impl Into<Route>, to: impl Into<Route>, timestamp: u64) -> Self {
        ObservationEvent::Navigation(NavigationEvent {
            from: from.into(),
            to: to.into(),
            timestamp,
            interaction: InteractionType::Click,
        })
    }

    pub fn hover(route: impl Into<Route>, timestamp: u64) -> Self {
        ObservationEvent::Interaction {
            route: route.into(),
            timestamp,
            kind: InteractionType::Hover,
        }
    }

    pub fn timestamp(&self) -> u64 {
        match self {
            ObservationEvent::Navigation(event) => event.timestamp,
            ObservationEvent::Interaction { timestamp, .. } => *timestamp,
        }
    }
}

pub type Observation = Vec<ObservationEvent>;
