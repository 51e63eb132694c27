#![forbid(unsafe_code)]

use crate::domain::{PriorityBucket, Route};
use crate::prediction::{
    Prediction, PredictionFactor, PredictionRequest, PrefetchCandidate, SignalScorer,
};
use crate::stores::Stores;
use config::{BucketThresholds, Config};
use rustc_hash::FxHashSet;
use std::cmp::Ordering;
use tracing::trace;

pub trait Predictor: Send + Sync {
    /// Rank the request's candidates. Pure read of the stores.
    fn predict(&self, stores: &Stores, request: &PredictionRequest<'_>) -> Prediction;

    /// How much to trust predictions given the observed history volume.
    fn confidence(&self, stores: &Stores) -> f32;
}

#[derive(Debug, Clone)]
pub struct NavigationPredictor {
    scorer: SignalScorer,
    threshold: f32,
    max_batch: usize,
    buckets: BucketThresholds,
    min_samples: u64,
    max_samples: u64,
}

impl NavigationPredictor {
    pub fn new(config: &Config) -> Self {
        let model = &config.model;
        Self {
            scorer: SignalScorer::new(model),
            threshold: model.probability_threshold,
            max_batch: model.max_batch,
            buckets: model.buckets,
            min_samples: model.confidence_min_samples,
            max_samples: model.confidence_max_samples.max(model.confidence_min_samples),
        }
    }

    pub fn bucket(&self, probability: f32) -> PriorityBucket {
        if probability >= self.buckets.high {
            PriorityBucket::High
        } else if probability >= self.buckets.medium {
            PriorityBucket::Medium
        } else {
            PriorityBucket::Low
        }
    }

    fn score(
        &self,
        stores: &Stores,
        current: &Route,
        candidate: &Route,
        now: u64,
    ) -> (f32, Vec<PredictionFactor>) {
        let factors = self.scorer.factors(stores, current, candidate, now);
        let weight_sum: f32 = factors.iter().map(|factor| factor.weight).sum();
        if weight_sum <= 0.0 {
            return (0.0, factors);
        }
        let weighted: f32 = factors.iter().map(|factor| factor.value * factor.weight).sum();
        ((weighted / weight_sum).clamp(0.0, 1.0), factors)
    }
}

impl Predictor for NavigationPredictor {
    fn predict(&self, stores: &Stores, request: &PredictionRequest<'_>) -> Prediction {
        if stores.transitions.is_empty() {
            return Prediction::default();
        }

        let mut seen = FxHashSet::default();
        let mut candidates = Vec::new();

        for candidate in request.candidates {
            if &candidate.route == request.current || !seen.insert(&candidate.route) {
                continue;
            }
            let (probability, factors) = self.score(stores, request.current, &candidate.route, request.now);
            if probability.is_nan() || probability < self.threshold || probability <= 0.0 {
                trace!(route = %candidate.route, probability, "candidate below threshold");
                continue;
            }
            candidates.push(PrefetchCandidate {
                url: candidate.route.clone(),
                kind: candidate.kind,
                probability,
                bucket: self.bucket(probability),
                factors,
            });
        }

        candidates.sort_by(rank_order);
        candidates.truncate(self.max_batch);

        Prediction {
            candidates,
            confidence: self.confidence(stores),
        }
    }

    fn confidence(&self, stores: &Stores) -> f32 {
        if stores.transitions.is_empty() {
            return 0.0;
        }
        let samples = stores.history.total_observed();
        if samples >= self.max_samples {
            return 1.0;
        }
        if samples <= self.min_samples {
            return 0.0;
        }
        let span = (self.max_samples - self.min_samples) as f32;
        ((samples - self.min_samples) as f32 / span).clamp(0.0, 1.0)
    }
}

/// Bucket first, then probability descending, then URL for a stable order.
pub fn rank_order(a: &PrefetchCandidate, b: &PrefetchCandidate) -> Ordering {
    a.bucket
        .cmp(&b.bucket)
        .then_with(|| b.probability.total_cmp(&a.probability))
        .then_with(|| a.url.cmp(&b.url))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{InteractionType, NavigationEvent};
    use crate::prediction::CandidateRoute;
    use config::Config;
    use proptest::prelude::*;

    fn nav(from: &str, to: &str, timestamp: u64) -> NavigationEvent {
        NavigationEvent {
            from: Route::new(from),
            to: Route::new(to),
            timestamp,
            interaction: InteractionType::Click,
        }
    }

    #[test]
    fn cold_start_yields_nothing() {
        let config = Config::default();
        let predictor = NavigationPredictor::new(&config);
        let stores = Stores::new(&config.model);
        let current = Route::new("/");
        let candidates = [CandidateRoute::document("/a")];
        let prediction = predictor.predict(
            &stores,
            &PredictionRequest {
                current: &current,
                candidates: &candidates,
                now: 0,
            },
        );
        assert!(prediction.is_empty());
        assert_eq!(prediction.confidence, 0.0);
    }

    #[test]
    fn confidence_ramps_linearly() {
        let mut config = Config::default();
        config.model.confidence_min_samples = 2;
        config.model.confidence_max_samples = 6;
        let predictor = NavigationPredictor::new(&config);
        let mut stores = Stores::new(&config.model);

        let mut seen = Vec::new();
        for i in 0..8u64 {
            let to = if i % 2 == 0 { "/b" } else { "/a" };
            let from = if i % 2 == 0 { "/a" } else { "/b" };
            stores.record_navigation(nav(from, to, i), &config.model);
            seen.push(predictor.confidence(&stores));
        }

        assert_eq!(seen, vec![0.0, 0.0, 0.25, 0.5, 0.75, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn absent_signals_do_not_dilute_the_score() {
        let mut config = Config::default();
        config.model.probability_threshold = 0.0;
        let predictor = NavigationPredictor::new(&config);
        let mut stores = Stores::new(&config.model);
        stores.transitions.set_weight(Route::new("/a"), Route::new("/b"), 3.0);
        stores.transitions.set_weight(Route::new("/a"), Route::new("/c"), 1.0);
        stores.record_interaction(Route::new("/c"));

        let current = Route::new("/a");
        let candidates = [CandidateRoute::document("/b"), CandidateRoute::document("/c")];
        let prediction = predictor.predict(
            &stores,
            &PredictionRequest {
                current: &current,
                candidates: &candidates,
                now: 0,
            },
        );

        let b = prediction.candidates.iter().find(|c| c.url.as_str() == "/b").unwrap();
        let c = prediction.candidates.iter().find(|c| c.url.as_str() == "/c").unwrap();
        assert!((b.probability - 0.75).abs() < 1e-6);
        assert_eq!(b.factors.len(), 1);
        // (0.25 * 0.4 + 1.0 * 0.25) / (0.4 + 0.25)
        assert!((c.probability - 0.35 / 0.65).abs() < 1e-5);
    }

    #[test]
    fn ranks_by_bucket_then_probability_and_truncates() {
        let mut config = Config::default();
        config.model.probability_threshold = 0.0;
        config.model.max_batch = 2;
        let predictor = NavigationPredictor::new(&config);
        let mut stores = Stores::new(&config.model);
        for (to, weight) in [("/b", 1.0), ("/c", 6.0), ("/d", 3.0)] {
            stores.transitions.set_weight(Route::new("/a"), Route::new(to), weight);
        }

        let current = Route::new("/a");
        let candidates = [
            CandidateRoute::document("/b"),
            CandidateRoute::document("/d"),
            CandidateRoute::document("/c"),
            CandidateRoute::document("/c"),
            CandidateRoute::document("/a"),
        ];
        let prediction = predictor.predict(
            &stores,
            &PredictionRequest {
                current: &current,
                candidates: &candidates,
                now: 0,
            },
        );

        let urls: Vec<_> = prediction.candidates.iter().map(|c| c.url.as_str()).collect();
        assert_eq!(urls, vec!["/c", "/d"]);
    }

    proptest! {
        #[test]
        fn probabilities_are_bounded(
            steps in prop::collection::vec((0u8..5, 0u8..5, 0u64..200_000_000), 0..60),
            hovers in prop::collection::vec(0u8..5, 0..20),
            threshold in 0f32..1f32,
            current in 0u8..5,
            now in 0u64..200_000_000,
        ) {
            let mut config = Config::default();
            config.model.probability_threshold = threshold;
            let predictor = NavigationPredictor::new(&config);
            let mut stores = Stores::new(&config.model);
            let routes: Vec<Route> = (0..5).map(|i| Route::new(format!("/s/{i}"))).collect();

            for (from, to, timestamp) in steps {
                let event = NavigationEvent {
                    from: routes[from as usize].clone(),
                    to: routes[to as usize].clone(),
                    timestamp,
                    interaction: InteractionType::Click,
                };
                stores.record_navigation(event, &config.model);
            }
            for hover in hovers {
                stores.record_interaction(routes[hover as usize].clone());
            }

            let candidates: Vec<_> = routes.iter().cloned().map(CandidateRoute::document).collect();
            let prediction = predictor.predict(
                &stores,
                &PredictionRequest { current: &routes[current as usize], candidates: &candidates, now },
            );

            prop_assert!((0.0..=1.0).contains(&prediction.confidence));
            prop_assert!(prediction.candidates.len() <= config.model.max_batch);
            for candidate in &prediction.candidates {
                prop_assert!(!candidate.probability.is_nan());
                prop_assert!(candidate.probability >= threshold);
                prop_assert!((0.0..=1.0).contains(&candidate.probability));
                prop_assert!(candidate.url != routes[current as usize]);
            }
            for pair in prediction.candidates.windows(2) {
                prop_assert!(rank_order(&pair[0], &pair[1]) != Ordering::Greater);
            }
        }
    }
}
