#![forbid(unsafe_code)]

use crate::domain::Route;
use crate::observation::ObservationEvent;
use crate::stores::Stores;
use config::{Config, Model};
use tracing::{debug, trace};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ModelDelta {
    pub navigations: usize,
    pub interactions: usize,
    pub ignored_self_transitions: usize,
    pub new_edges: Vec<(Route, Route)>,
    pub pruned_edges: usize,
}

impl ModelDelta {
    pub fn merge(&mut self, other: ModelDelta) {
        self.navigations += other.navigations;
        self.interactions += other.interactions;
        self.ignored_self_transitions += other.ignored_self_transitions;
        self.new_edges.extend(other.new_edges);
        self.pruned_edges += other.pruned_edges;
    }
}

pub trait ModelUpdater: Send + Sync {
    /// Fold observed events into the stores.
    fn apply(&mut self, stores: &mut Stores, observation: &[ObservationEvent]) -> ModelDelta;
}

#[derive(Debug, Clone)]
pub struct DefaultModelUpdater {
    model: Model,
}

impl DefaultModelUpdater {
    pub fn new(config: &Config) -> Self {
        Self {
            model: config.model.clone(),
        }
    }
}

impl ModelUpdater for DefaultModelUpdater {
    fn apply(&mut self, stores: &mut Stores, observation: &[ObservationEvent]) -> ModelDelta {
        let mut delta = ModelDelta::default();

        for event in observation {
            match event {
                ObservationEvent::Navigation(navigation) => {
                    let edge = (navigation.from.clone(), navigation.to.clone());
                    match stores.record_navigation(navigation.clone(), &self.model) {
                        Some(update) => {
                            delta.navigations += 1;
                            delta.pruned_edges += update.pruned;
                            if update.created {
                                delta.new_edges.push(edge);
                            }
                        }
                        None => {
                            trace!(route = %navigation.from, "self-transition ignored");
                            delta.ignored_self_transitions += 1;
                        }
                    }
                }
                ObservationEvent::Interaction { route, kind, .. } => {
                    let count = stores.record_interaction(route.clone());
                    trace!(%route, ?kind, count, "interaction recorded");
                    delta.interactions += 1;
                }
            }
        }

        debug!(
            navigations = delta.navigations,
            interactions = delta.interactions,
            new_edges = delta.new_edges.len(),
            pruned_edges = delta.pruned_edges,
            "model delta computed"
        );

        delta
    }
}
