#![forbid(unsafe_code)]

use crate::domain::Route;
use rustc_hash::FxHashMap;

/// Decaying weighted graph of `from → to` route transitions.
///
/// Each outgoing row is updated with an exponential moving average: the
/// followed edge moves towards 1, its siblings decay, and anything that
/// falls below the pruning epsilon is dropped. Memory therefore stays
/// proportional to the edges that are still being reinforced.
#[derive(Debug, Default, Clone)]
pub struct TransitionGraph {
    rows: FxHashMap<Route, FxHashMap<Route, f32>>,
}

/// What a single [`TransitionGraph::record`] changed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EdgeUpdate {
    pub created: bool,
    pub pruned: usize,
}

impl TransitionGraph {
    /// Reinforce `from → to` and decay every other edge leaving `from`.
    ///
    /// Returns `None` for self-transitions, which are ignored.
    pub fn record(
        &mut self,
        from: &Route,
        to: &Route,
        learning_rate: f32,
        epsilon: f32,
    ) -> Option<EdgeUpdate> {
        if from == to {
            return None;
        }

        let row = self.rows.entry(from.clone()).or_default();
        let decay = 1.0 - learning_rate / 2.0;
        for (target, weight) in row.iter_mut() {
            if target != to {
                *weight *= decay;
            }
        }

        let mut update = EdgeUpdate::default();
        let weight = row.entry(to.clone()).or_insert_with(|| {
            update.created = true;
            0.0
        });
        *weight = (*weight + learning_rate * (1.0 - *weight)).clamp(0.0, 1.0);

        let before = row.len();
        row.retain(|target, weight| target == to || *weight >= epsilon);
        update.pruned = before - row.len();

        Some(update)
    }

    /// Normalised probability of moving from `from` to `to`: the edge weight
    /// divided by the sum of all weights leaving `from`.
    pub fn probability(&self, from: &Route, to: &Route) -> f32 {
        let Some(row) = self.rows.get(from) else {
            return 0.0;
        };
        let total: f32 = row.values().sum();
        if total <= 0.0 {
            return 0.0;
        }
        let weight = row.get(to).copied().unwrap_or(0.0);
        (weight / total).clamp(0.0, 1.0)
    }

    pub fn weight(&self, from: &Route, to: &Route) -> Option<f32> {
        self.rows.get(from)?.get(to).copied()
    }

    /// Insert an edge verbatim. Used when rehydrating a snapshot; negative or
    /// non-finite weights are dropped.
    pub fn set_weight(&mut self, from: Route, to: Route, weight: f32) {
        if from == to || !weight.is_finite() || weight <= 0.0 {
            return;
        }
        self.rows.entry(from).or_default().insert(to, weight);
    }

    pub fn outgoing(&self, from: &Route) -> impl Iterator<Item = (&Route, f32)> {
        self.rows
            .get(from)
            .into_iter()
            .flat_map(|row| row.iter().map(|(to, weight)| (to, *weight)))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Route, &Route, f32)> {
        self.rows
            .iter()
            .flat_map(|(from, row)| row.iter().map(move |(to, weight)| (from, to, *weight)))
    }

    pub fn edge_count(&self) -> usize {
        self.rows.values().map(|row| row.len()).sum()
    }

    pub fn route_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.values().all(|row| row.is_empty())
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn route(s: &str) -> Route {
        Route::new(s)
    }

    #[test]
    fn self_transitions_are_ignored() {
        let mut graph = TransitionGraph::default();
        assert!(graph.record(&route("/a"), &route("/a"), 0.3, 0.01).is_none());
        assert!(graph.is_empty());
    }

    #[test]
    fn followed_edge_moves_towards_one_and_siblings_decay() {
        let mut graph = TransitionGraph::default();
        let (a, b, c) = (route("/a"), route("/b"), route("/c"));

        let update = graph.record(&a, &b, 0.5, 0.0).unwrap();
        assert!(update.created);
        assert!((graph.weight(&a, &b).unwrap() - 0.5).abs() < 1e-6);

        graph.record(&a, &c, 0.5, 0.0);
        assert!((graph.weight(&a, &c).unwrap() - 0.5).abs() < 1e-6);
        assert!((graph.weight(&a, &b).unwrap() - 0.375).abs() < 1e-6);

        graph.record(&a, &b, 0.5, 0.0);
        assert!((graph.weight(&a, &b).unwrap() - 0.6875).abs() < 1e-6);
        assert!((graph.weight(&a, &c).unwrap() - 0.375).abs() < 1e-6);
    }

    #[test]
    fn repeated_transitions_prune_stale_edges() {
        let mut graph = TransitionGraph::default();
        let (a, b, c) = (route("/a"), route("/b"), route("/c"));
        graph.record(&a, &c, 0.3, 0.01);

        let mut pruned = 0;
        for _ in 0..60 {
            pruned += graph.record(&a, &b, 0.3, 0.01).unwrap().pruned;
        }

        assert_eq!(pruned, 1);
        assert!(graph.weight(&a, &c).is_none());
        assert!(graph.weight(&a, &b).unwrap() > 0.99);
        assert!((graph.probability(&a, &b) - 1.0).abs() < 1e-6);
        assert_eq!(graph.probability(&a, &c), 0.0);
    }

    #[test]
    fn probability_normalises_over_outgoing_weights() {
        let mut graph = TransitionGraph::default();
        graph.set_weight(route("/a"), route("/b"), 4.5);
        graph.set_weight(route("/a"), route("/c"), 1.0);
        graph.set_weight(route("/a"), route("/d"), -1.0);

        assert_eq!(graph.edge_count(), 2);
        assert!((graph.probability(&route("/a"), &route("/b")) - 4.5 / 5.5).abs() < 1e-6);
        assert_eq!(graph.probability(&route("/z"), &route("/b")), 0.0);
    }

    proptest! {
        #[test]
        fn weights_stay_bounded_and_above_epsilon(
            steps in prop::collection::vec((0u8..6, 0u8..6), 0..200),
            learning_rate in 0.01f32..=1.0,
            epsilon in 0f32..0.2,
        ) {
            let routes: Vec<Route> = (0..6).map(|i| Route::new(format!("/r{i}"))).collect();
            let mut graph = TransitionGraph::default();
            for (from, to) in steps {
                let from = &routes[from as usize];
                let to = &routes[to as usize];
                graph.record(from, to, learning_rate, epsilon);
                // The edge just reinforced survives even when tiny.
                if from != to {
                    prop_assert!(graph.weight(from, to).is_some());
                }
            }

            for (from, to, weight) in graph.iter() {
                prop_assert!(from != to);
                prop_assert!((0.0..=1.0).contains(&weight));
            }
            for from in &routes {
                let total: f32 = routes.iter().map(|to| graph.probability(from, to)).sum();
                prop_assert!(total == 0.0 || (total - 1.0).abs() < 1e-4);
            }
        }
    }
}
