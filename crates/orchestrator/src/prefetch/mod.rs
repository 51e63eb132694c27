#![forbid(unsafe_code)]

mod executor;
mod item;
mod queue;

pub use executor::{DryRunExecutor, FetchExecutor, FetchOutcome, NoopFetchExecutor};
pub use item::{ItemStatus, QueueItem};
pub use queue::{PrefetchQueue, QueueAction, QueueStats};
