#![forbid(unsafe_code)]

use crate::domain::{ItemId, Priority, ResourceKind, Route};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Pending,
    Loading,
    Completed,
    Failed,
    Cancelled,
}

impl ItemStatus {
    /// Completed, failed and cancelled items never run again.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ItemStatus::Completed | ItemStatus::Failed | ItemStatus::Cancelled
        )
    }

    /// Pending and loading items count against the queue size.
    pub fn is_live(self) -> bool {
        matches!(self, ItemStatus::Pending | ItemStatus::Loading)
    }
}

/// One scheduled prefetch. Only [`super::PrefetchQueue`] mutates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueItem {
    #[serde(skip)]
    pub id: ItemId,
    pub url: Route,
    pub kind: ResourceKind,
    pub priority: Priority,
    pub status: ItemStatus,
    pub created_at: u64,
    pub started_at: Option<u64>,
    pub completed_at: Option<u64>,
    pub size_bytes: Option<u64>,
    pub retry_count: u32,
    pub error: Option<String>,
    /// A retried item is not eligible before this instant.
    pub not_before: Option<u64>,
    pub(crate) seq: u64,
}

impl QueueItem {
    pub(crate) fn new(
        id: ItemId,
        url: Route,
        kind: ResourceKind,
        priority: Priority,
        now: u64,
        seq: u64,
    ) -> Self {
        Self {
            id,
            url,
            kind,
            priority,
            status: ItemStatus::Pending,
            created_at: now,
            started_at: None,
            completed_at: None,
            size_bytes: None,
            retry_count: 0,
            error: None,
            not_before: None,
            seq,
        }
    }

    /// Priority used for selection at `now`: one level higher once the item
    /// has waited longer than `boost_after`.
    pub fn effective_priority(&self, now: u64, boost_after: u64) -> Priority {
        if now.saturating_sub(self.created_at) > boost_after {
            self.priority.boosted()
        } else {
            self.priority
        }
    }

    pub fn is_eligible(&self, now: u64) -> bool {
        self.status == ItemStatus::Pending && self.not_before.is_none_or(|at| at <= now)
    }
}
