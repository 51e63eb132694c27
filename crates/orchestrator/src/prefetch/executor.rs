#![forbid(unsafe_code)]

use crate::domain::ResourceKind;
use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Success { size_bytes: u64 },
    Failure { error: String },
}

impl FetchOutcome {
    pub fn failure(error: impl Into<String>) -> Self {
        FetchOutcome::Failure {
            error: error.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success { .. })
    }
}

/// Performs the actual retrieval of a resource.
///
/// Implementations report every failure through [`FetchOutcome::Failure`];
/// timeouts are theirs to enforce.
#[async_trait]
pub trait FetchExecutor: Send + Sync {
    async fn fetch(&self, url: &str, kind: ResourceKind) -> FetchOutcome;
}

#[derive(Debug, Default)]
pub struct NoopFetchExecutor;

#[async_trait]
impl FetchExecutor for NoopFetchExecutor {
    async fn fetch(&self, _url: &str, _kind: ResourceKind) -> FetchOutcome {
        FetchOutcome::Success { size_bytes: 0 }
    }
}

/// Pretends every fetch succeeded with a fixed size. Useful for replaying
/// traces against the byte budget without touching the network.
#[derive(Debug, Clone)]
pub struct DryRunExecutor {
    size_bytes: u64,
}

impl DryRunExecutor {
    pub fn new(size_bytes: u64) -> Self {
        Self { size_bytes }
    }
}

#[async_trait]
impl FetchExecutor for DryRunExecutor {
    async fn fetch(&self, url: &str, kind: ResourceKind) -> FetchOutcome {
        tracing::trace!(url, %kind, size = self.size_bytes, "dry-run fetch");
        FetchOutcome::Success {
            size_bytes: self.size_bytes,
        }
    }
}
