use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Model {
    /// Step size of the exponential transition update. The followed edge
    /// moves by `learning_rate * (1 - w)`, every sibling edge decays by
    /// `learning_rate / 2`. Clamped to `(0, 1]`.
    pub learning_rate: f32,

    /// Edges whose weight drops below this value are deleted from the
    /// transition graph.
    pub prune_epsilon: f32,

    /// Candidates with a fused probability below this value are dropped.
    pub probability_threshold: f32,

    /// Maximum number of candidates returned by a single prediction.
    pub max_batch: usize,

    /// Number of navigation events kept in the rolling history.
    pub history_cap: usize,

    /// Number of most recent destinations considered by the recency signal.
    pub recency_window: usize,

    /// Below this many observed navigations the predictor reports zero
    /// confidence.
    pub confidence_min_samples: u64,

    /// At or above this many observed navigations the predictor reports full
    /// confidence.
    pub confidence_max_samples: u64,

    /// Offset applied to event timestamps before bucketing them by hour for
    /// the time-of-day signal.
    pub utc_offset_minutes: i32,

    pub weights: SignalWeights,

    pub buckets: BucketThresholds,
}

impl Default for Model {
    fn default() -> Self {
        Self {
            learning_rate: 0.3,
            prune_epsilon: 0.01,
            probability_threshold: 0.3,
            max_batch: 5,
            history_cap: 100,
            recency_window: 10,
            confidence_min_samples: 5,
            confidence_max_samples: 50,
            utc_offset_minutes: 0,
            weights: SignalWeights::default(),
            buckets: BucketThresholds::default(),
        }
    }
}

impl Model {
    pub fn learning_rate(&self) -> f32 {
        if self.learning_rate.is_nan() || self.learning_rate <= 0.0 {
            f32::EPSILON
        } else {
            self.learning_rate.min(1.0)
        }
    }

    pub fn prune_epsilon(&self) -> f32 {
        if self.prune_epsilon.is_nan() {
            0.0
        } else {
            self.prune_epsilon.clamp(0.0, 1.0)
        }
    }
}

/// Relative weight of each prediction signal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SignalWeights {
    pub transition: f32,
    pub interaction: f32,
    pub recency: f32,
    pub similarity: f32,
    pub time_of_day: f32,
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            transition: 0.4,
            interaction: 0.25,
            recency: 0.15,
            similarity: 0.1,
            time_of_day: 0.1,
        }
    }
}

/// Probability cut-offs for the priority buckets.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BucketThresholds {
    pub high: f32,
    pub medium: f32,
}

impl Default for BucketThresholds {
    fn default() -> Self {
        Self {
            high: 0.8,
            medium: 0.65,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn learning_rate_is_clamped(rate in -2f32..4f32) {
            let model = Model { learning_rate: rate, ..Default::default() };
            let effective = model.learning_rate();
            prop_assert!(effective > 0.0 && effective <= 1.0);
        }
    }

    #[test]
    fn nan_learning_rate_falls_back() {
        let model = Model {
            learning_rate: f32::NAN,
            prune_epsilon: f32::NAN,
            ..Default::default()
        };
        assert!(model.learning_rate() > 0.0);
        assert_eq!(model.prune_epsilon(), 0.0);
    }
}
