#![forbid(unsafe_code)]

use crate::domain::Route;
use crate::prediction::{PredictionFactor, Signal};
use crate::stores::{Stores, hour_of_day};
use config::{Model, SignalWeights};

/// Computes every signal for one candidate from the learned stores.
#[derive(Debug, Clone)]
pub struct SignalScorer {
    weights: SignalWeights,
    recency_window: usize,
    utc_offset_minutes: i32,
}

impl SignalScorer {
    pub fn new(model: &Model) -> Self {
        Self {
            weights: model.weights,
            recency_window: model.recency_window,
            utc_offset_minutes: model.utc_offset_minutes,
        }
    }

    pub fn weight(&self, signal: Signal) -> f32 {
        let weight = match signal {
            Signal::Transition => self.weights.transition,
            Signal::Interaction => self.weights.interaction,
            Signal::Recency => self.weights.recency,
            Signal::Similarity => self.weights.similarity,
            Signal::TimeOfDay => self.weights.time_of_day,
        };
        if weight.is_finite() { weight.max(0.0) } else { 0.0 }
    }

    pub fn value(&self, signal: Signal, stores: &Stores, current: &Route, candidate: &Route, now: u64) -> f32 {
        let value = match signal {
            Signal::Transition => stores.transitions.probability(current, candidate),
            Signal::Interaction => stores.interactions.frequency(candidate),
            Signal::Recency => self.recency(stores, candidate),
            Signal::Similarity => similarity(current, candidate),
            Signal::TimeOfDay => self.time_of_day(stores, candidate, now),
        };
        value.clamp(0.0, 1.0)
    }

    /// Factors for every signal that produced a non-zero value.
    pub fn factors(&self, stores: &Stores, current: &Route, candidate: &Route, now: u64) -> Vec<PredictionFactor> {
        Signal::ALL
            .iter()
            .filter_map(|&signal| {
                let weight = self.weight(signal);
                let value = self.value(signal, stores, current, candidate, now);
                (value > 0.0 && weight > 0.0).then(|| PredictionFactor {
                    signal,
                    weight,
                    value,
                    description: describe(signal, value, current, candidate),
                })
            })
            .collect()
    }

    fn recency(&self, stores: &Stores, candidate: &Route) -> f32 {
        if self.recency_window == 0 {
            return 0.0;
        }
        match stores.history.recency_position(candidate, self.recency_window) {
            Some(position) => 1.0 - position as f32 / self.recency_window as f32,
            None => 0.0,
        }
    }

    fn time_of_day(&self, stores: &Stores, candidate: &Route, now: u64) -> f32 {
        let Some(hours) = stores.history.hourly_visits(candidate) else {
            return 0.0;
        };
        let total: u64 = hours.iter().map(|&visits| visits as u64).sum();
        if total == 0 {
            return 0.0;
        }
        let hour = hour_of_day(now, self.utc_offset_minutes);
        hours[hour] as f32 / total as f32
    }
}

/// Shared leading path segments divided by the longer path's segment count.
pub fn similarity(a: &Route, b: &Route) -> f32 {
    let a_segments: Vec<&str> = a.segments().collect();
    let b_segments: Vec<&str> = b.segments().collect();
    let longest = a_segments.len().max(b_segments.len());
    if longest == 0 {
        return 0.0;
    }
    let shared = a_segments
        .iter()
        .zip(b_segments.iter())
        .take_while(|(x, y)| x == y)
        .count();
    shared as f32 / longest as f32
}

fn describe(signal: Signal, value: f32, current: &Route, candidate: &Route) -> String {
    match signal {
        Signal::Transition => format!("{:.0}% of navigations from {current} went to {candidate}", value * 100.0),
        Signal::Interaction => format!("interaction frequency {value:.2} relative to the busiest route"),
        Signal::Recency => format!("visited recently (score {value:.2})"),
        Signal::Similarity => format!("shares {:.0}% of its path with {current}", value * 100.0),
        Signal::TimeOfDay => format!("{:.0}% of visits happen at this hour", value * 100.0),
    }
}
