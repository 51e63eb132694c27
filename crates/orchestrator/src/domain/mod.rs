#![forbid(unsafe_code)]

mod ids;
mod navigation;
mod priority;
mod resource;

pub use config::NetworkQuality;
pub use ids::{ItemId, Route};
pub use navigation::{InteractionType, NavigationEvent};
pub use priority::{Priority, PriorityBucket};
pub use resource::ResourceKind;
