#![forbid(unsafe_code)]

mod interaction_store;
mod navigation_history;
mod transition_graph;

pub use interaction_store::InteractionStore;
pub use navigation_history::{NavigationHistory, hour_of_day};
pub use transition_graph::{EdgeUpdate, TransitionGraph};

use crate::domain::{NavigationEvent, Route};
use config::Model;

/// Everything the predictor learns from observed navigation.
#[derive(Debug, Clone, Default)]
pub struct Stores {
    pub transitions: TransitionGraph,
    pub history: NavigationHistory,
    pub interactions: InteractionStore,
}

impl Stores {
    pub fn new(model: &Model) -> Self {
        Self {
            transitions: TransitionGraph::default(),
            history: NavigationHistory::with_cap(model.history_cap),
            interactions: InteractionStore::default(),
        }
    }

    /// Update the transition graph and history for one route change.
    ///
    /// Self-transitions are ignored entirely and yield `None`.
    pub fn record_navigation(&mut self, event: NavigationEvent, model: &Model) -> Option<EdgeUpdate> {
        let update = self.transitions.record(
            &event.from,
            &event.to,
            model.learning_rate(),
            model.prune_epsilon(),
        )?;
        self.history.push(event, model.utc_offset_minutes);
        Some(update)
    }

    pub fn record_interaction(&mut self, route: Route) -> u32 {
        self.interactions.record(route)
    }

    /// Every destination ever reached from `from` that is still in the graph.
    pub fn known_destinations(&self, from: &Route) -> Vec<Route> {
        let mut routes: Vec<Route> = self.transitions.outgoing(from).map(|(to, _)| to.clone()).collect();
        routes.sort();
        routes
    }

    pub fn reset(&mut self) {
        self.transitions.clear();
        self.history.clear();
        self.interactions.clear();
    }
}
