#![forbid(unsafe_code)]

mod predictor;
mod signals;
mod types;

pub use predictor::{NavigationPredictor, Predictor, rank_order};
pub use signals::{SignalScorer, similarity};
pub use types::{
    CandidateRoute, Prediction, PredictionFactor, PredictionRequest, PredictionSummary,
    PrefetchCandidate, Signal,
};
