#![forbid(unsafe_code)]

use crate::domain::{PriorityBucket, ResourceKind, Route};
use serde::Serialize;
use std::fmt;

/// The fixed set of signals fused into a candidate's probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    Transition,
    Interaction,
    Recency,
    Similarity,
    TimeOfDay,
}

impl Signal {
    pub const ALL: [Signal; 5] = [
        Signal::Transition,
        Signal::Interaction,
        Signal::Recency,
        Signal::Similarity,
        Signal::TimeOfDay,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Signal::Transition => "transition",
            Signal::Interaction => "interaction",
            Signal::Recency => "recency",
            Signal::Similarity => "similarity",
            Signal::TimeOfDay => "time_of_day",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why a candidate got its score. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionFactor {
    pub signal: Signal,
    pub weight: f32,
    pub value: f32,
    pub description: String,
}

/// A route the caller may navigate to next, and how to fetch it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateRoute {
    pub route: Route,
    pub kind: ResourceKind,
}

impl CandidateRoute {
    pub fn document(route: impl Into<Route>) -> Self {
        Self {
            route: route.into(),
            kind: ResourceKind::Document,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PredictionRequest<'a> {
    pub current: &'a Route,
    pub candidates: &'a [CandidateRoute],
    /// Milliseconds since the Unix epoch, used by the time-of-day signal.
    pub now: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrefetchCandidate {
    pub url: Route,
    pub kind: ResourceKind,
    pub probability: f32,
    pub bucket: PriorityBucket,
    pub factors: Vec<PredictionFactor>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub candidates: Vec<PrefetchCandidate>,
    pub confidence: f32,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct PredictionSummary {
    pub num_candidates: usize,
    pub num_high: usize,
    pub confidence: f32,
}

impl Prediction {
    pub fn summarize(&self) -> PredictionSummary {
        PredictionSummary {
            num_candidates: self.candidates.len(),
            num_high: self
                .candidates
                .iter()
                .filter(|candidate| candidate.bucket == PriorityBucket::High)
                .count(),
            confidence: self.confidence,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}
