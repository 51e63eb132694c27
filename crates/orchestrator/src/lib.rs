#![forbid(unsafe_code)]

pub mod clock;
pub mod domain;
pub mod engine;
pub mod error;
pub mod observation;
pub mod persistence;
pub mod policy;
pub mod prediction;
pub mod prefetch;
pub mod stores;

pub use engine::{ControlEvent, PrefetchEngine, ReloadBundle, Services, TickReport};
pub use observation::{DefaultModelUpdater, ModelDelta, ModelUpdater, Observation, ObservationEvent};
pub use persistence::{
    KeyValueRepository, KeyValueStore, MemoryStore, NoopRepository, SqliteStore, StateRepository,
    StoresSnapshot,
};
pub use policy::{
    AdmissionContext, AdmissionDecision, AdmissionPolicy, ByteBudget, DefaultAdmissionPolicy,
    Environment, RejectReason, StaticEnvironment,
};
pub use prediction::{
    CandidateRoute, NavigationPredictor, Prediction, PredictionSummary, Predictor,
    PrefetchCandidate,
};
pub use prefetch::{
    DryRunExecutor, FetchExecutor, FetchOutcome, ItemStatus, NoopFetchExecutor, PrefetchQueue,
    QueueAction, QueueItem, QueueStats,
};

pub use clock::{Clock, ManualClock, SystemClock};
pub use domain::{
    InteractionType, ItemId, NavigationEvent, NetworkQuality, Priority, PriorityBucket,
    ResourceKind, Route,
};
pub use stores::Stores;
