#![forbid(unsafe_code)]

mod event;
mod model_updater;

pub use event::{Observation, ObservationEvent};
pub use model_updater::{DefaultModelUpdater, ModelDelta, ModelUpdater};
