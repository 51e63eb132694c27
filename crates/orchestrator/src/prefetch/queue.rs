#![forbid(unsafe_code)]

use crate::domain::{ItemId, NetworkQuality, Priority, ResourceKind, Route};
use crate::prefetch::{FetchOutcome, ItemStatus, QueueItem};
use config::{ConcurrencyLimits, Config};
use rustc_hash::FxHashMap;
use slotmap::SlotMap;
use std::cmp::Ordering;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Side effects requested by the queue. The host performs them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueAction {
    /// Start fetching this item and report back via [`PrefetchQueue::complete`].
    Dispatch {
        id: ItemId,
        url: Route,
        kind: ResourceKind,
    },
    /// The item failed and becomes eligible again at `at`. Call
    /// [`PrefetchQueue::poll`] then.
    RetryScheduled { id: ItemId, at: u64 },
    /// Nothing is pending or loading any more.
    Drained,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct QueueStats {
    pub pending: usize,
    pub loading: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub completed_bytes: u64,
}

#[derive(Debug, Clone)]
struct QueueSettings {
    max_queue_size: usize,
    max_retries: u32,
    retry_delay_ms: u64,
    age_boost_ms: u64,
    completed_ttl_ms: u64,
    concurrency: ConcurrencyLimits,
}

/// Priority admission queue for prefetches.
///
/// A pure state machine: every mutating call runs a scheduling pass at the
/// given time and records the resulting [`QueueAction`]s, which the host
/// collects with [`PrefetchQueue::take_actions`]. The queue never awaits
/// and never reads a clock.
#[derive(Debug)]
pub struct PrefetchQueue {
    settings: QueueSettings,
    items: SlotMap<ItemId, QueueItem>,
    by_url: FxHashMap<Route, ItemId>,
    actions: Vec<QueueAction>,
    network: NetworkQuality,
    active: usize,
    next_seq: u64,
    drained: bool,
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl QueueSettings {
    fn from_config(config: &Config) -> Self {
        let queue = &config.queue;
        Self {
            max_queue_size: queue.max_queue_size,
            max_retries: queue.max_retries,
            retry_delay_ms: millis(queue.retry_delay),
            age_boost_ms: millis(queue.age_boost_threshold),
            completed_ttl_ms: millis(queue.completed_ttl),
            concurrency: queue.concurrency.clamp(),
        }
    }
}

impl PrefetchQueue {
    pub fn new(config: &Config) -> Self {
        Self {
            settings: QueueSettings::from_config(config),
            items: SlotMap::with_key(),
            by_url: FxHashMap::default(),
            actions: Vec::new(),
            network: NetworkQuality::Unknown,
            active: 0,
            next_seq: 0,
            drained: true,
        }
    }

    /// Queue `url` for prefetching.
    ///
    /// A pending, loading or completed item for the same URL is returned as
    /// is. `None` means the queue is saturated and the request was dropped.
    pub fn enqueue(
        &mut self,
        url: Route,
        kind: ResourceKind,
        priority: Priority,
        now: u64,
    ) -> Option<ItemId> {
        if let Some(id) = self.existing(&url) {
            trace!(%url, "already queued");
            return Some(id);
        }

        let live = self.live_count();
        if live >= self.settings.max_queue_size {
            warn!(%url, live, max = self.settings.max_queue_size, "prefetch queue saturated, dropping request");
            return None;
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        let id = self
            .items
            .insert_with_key(|id| QueueItem::new(id, url.clone(), kind, priority, now, seq));
        self.by_url.insert(url.clone(), id);
        self.drained = false;
        debug!(%url, ?priority, %kind, "prefetch enqueued");

        self.schedule(now);
        Some(id)
    }

    /// Report the result of a dispatched fetch.
    ///
    /// Returns the item's new status, or `None` if the id is unknown or the
    /// item was not loading.
    pub fn complete(&mut self, id: ItemId, outcome: FetchOutcome, now: u64) -> Option<ItemStatus> {
        let max_retries = self.settings.max_retries;
        let retry_delay = self.settings.retry_delay_ms;

        let item = self.items.get_mut(id)?;
        if item.status != ItemStatus::Loading {
            return None;
        }
        self.active = self.active.saturating_sub(1);

        match outcome {
            FetchOutcome::Success { size_bytes } => {
                item.status = ItemStatus::Completed;
                item.completed_at = Some(now);
                item.size_bytes = Some(size_bytes);
                item.error = None;
                debug!(url = %item.url, size_bytes, "prefetch completed");
            }
            FetchOutcome::Failure { error } => {
                if item.retry_count < max_retries {
                    item.retry_count += 1;
                    let at = now.saturating_add(retry_delay.saturating_mul(item.retry_count as u64));
                    item.status = ItemStatus::Pending;
                    item.not_before = Some(at);
                    debug!(url = %item.url, retry = item.retry_count, at, %error, "prefetch failed, retrying");
                    item.error = Some(error);
                    self.actions.push(QueueAction::RetryScheduled { id, at });
                } else {
                    item.status = ItemStatus::Failed;
                    item.completed_at = Some(now);
                    warn!(url = %item.url, retries = item.retry_count, %error, "prefetch failed");
                    item.error = Some(error);
                }
            }
        }

        let status = item.status;
        self.schedule(now);
        Some(status)
    }

    /// Cancel a pending item. Loading and terminal items are left alone.
    pub fn cancel(&mut self, id: ItemId, now: u64) -> bool {
        let Some(item) = self.items.get_mut(id) else {
            return false;
        };
        if item.status != ItemStatus::Pending {
            return false;
        }
        item.status = ItemStatus::Cancelled;
        item.completed_at = Some(now);
        item.not_before = None;
        trace!(url = %item.url, "prefetch cancelled");
        self.check_drained();
        true
    }

    /// Cancel every pending item, returning how many were cancelled.
    pub fn cancel_all(&mut self, now: u64) -> usize {
        let mut cancelled = 0;
        for (_, item) in self.items.iter_mut() {
            if item.status == ItemStatus::Pending {
                item.status = ItemStatus::Cancelled;
                item.completed_at = Some(now);
                item.not_before = None;
                cancelled += 1;
            }
        }
        if cancelled > 0 {
            debug!(cancelled, "pending prefetches cancelled");
        }
        self.check_drained();
        cancelled
    }

    /// Run a scheduling pass, e.g. once a retry delay has elapsed or the
    /// network tier changed.
    pub fn poll(&mut self, now: u64) {
        self.schedule(now);
    }

    /// Forget completed and cancelled items older than the configured TTL.
    pub fn cleanup(&mut self, now: u64) -> usize {
        let ttl = self.settings.completed_ttl_ms;
        let before = self.items.len();
        let by_url = &mut self.by_url;
        self.items.retain(|id, item| {
            let expired = matches!(item.status, ItemStatus::Completed | ItemStatus::Cancelled)
                && item
                    .completed_at
                    .is_some_and(|done| now.saturating_sub(done) > ttl);
            if expired && by_url.get(&item.url) == Some(&id) {
                by_url.remove(&item.url);
            }
            !expired
        });
        let removed = before - self.items.len();
        if removed > 0 {
            debug!(removed, "expired prefetch items swept");
        }
        removed
    }

    /// Apply new limits. Items already queued keep their state; the next
    /// pass uses the new concurrency table.
    pub fn reconfigure(&mut self, config: &Config) {
        self.settings = QueueSettings::from_config(config);
    }

    pub fn set_network_quality(&mut self, network: NetworkQuality) {
        if self.network != network {
            debug!(from = %self.network, to = %network, "network quality changed");
            self.network = network;
        }
    }

    pub fn network_quality(&self) -> NetworkQuality {
        self.network
    }

    pub fn max_concurrent(&self) -> usize {
        self.settings.concurrency.for_quality(self.network)
    }

    /// Earliest instant after `now` at which a retried item becomes
    /// eligible. Items whose delay already elapsed wait for a free slot, not
    /// for a timer, and are not reported.
    pub fn next_wakeup(&self, now: u64) -> Option<u64> {
        self.items
            .values()
            .filter(|item| item.status == ItemStatus::Pending)
            .filter_map(|item| item.not_before)
            .filter(|at| *at > now)
            .min()
    }

    pub fn take_actions(&mut self) -> Vec<QueueAction> {
        std::mem::take(&mut self.actions)
    }

    pub fn get(&self, id: ItemId) -> Option<&QueueItem> {
        self.items.get(id)
    }

    pub fn status(&self, id: ItemId) -> Option<ItemStatus> {
        self.items.get(id).map(|item| item.status)
    }

    /// Whether `url` has a pending, loading or completed item.
    pub fn contains_url(&self, url: &Route) -> bool {
        self.existing(url).is_some()
    }

    /// Point-in-time copy of every item, oldest first.
    pub fn snapshot(&self) -> Vec<QueueItem> {
        let mut items: Vec<QueueItem> = self.items.values().cloned().collect();
        items.sort_by_key(|item| item.seq);
        items
    }

    pub fn stats(&self) -> QueueStats {
        let mut stats = QueueStats::default();
        for item in self.items.values() {
            match item.status {
                ItemStatus::Pending => stats.pending += 1,
                ItemStatus::Loading => stats.loading += 1,
                ItemStatus::Completed => {
                    stats.completed += 1;
                    stats.completed_bytes += item.size_bytes.unwrap_or(0);
                }
                ItemStatus::Failed => stats.failed += 1,
                ItemStatus::Cancelled => stats.cancelled += 1,
            }
        }
        stats
    }

    pub fn active_count(&self) -> usize {
        self.active
    }

    pub fn live_count(&self) -> usize {
        self.items.values().filter(|item| item.status.is_live()).count()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_drained(&self) -> bool {
        self.active == 0 && !self.items.values().any(|item| item.status == ItemStatus::Pending)
    }

    /// Drop every item and pending action. Fetches already dispatched will
    /// report back with ids the queue no longer knows, which are ignored.
    pub fn clear(&mut self) {
        self.items.clear();
        self.by_url.clear();
        self.actions.clear();
        self.active = 0;
        self.drained = true;
    }

    fn existing(&self, url: &Route) -> Option<ItemId> {
        let id = *self.by_url.get(url)?;
        let item = self.items.get(id)?;
        matches!(
            item.status,
            ItemStatus::Pending | ItemStatus::Loading | ItemStatus::Completed
        )
        .then_some(id)
    }

    fn schedule(&mut self, now: u64) {
        let max = self.max_concurrent();
        let mut dispatched = 0;
        while self.active < max {
            let Some(id) = self.select_next(now) else {
                break;
            };
            let Some(item) = self.items.get_mut(id) else {
                break;
            };
            item.status = ItemStatus::Loading;
            item.started_at = Some(now);
            item.not_before = None;
            self.active += 1;
            dispatched += 1;
            trace!(url = %item.url, priority = ?item.priority, retry = item.retry_count, "prefetch dispatched");
            self.actions.push(QueueAction::Dispatch {
                id,
                url: item.url.clone(),
                kind: item.kind,
            });
        }
        if dispatched > 0 {
            debug!(dispatched, active = self.active, max, "scheduling pass");
        }
        self.check_drained();
    }

    fn select_next(&self, now: u64) -> Option<ItemId> {
        let boost = self.settings.age_boost_ms;
        self.items
            .iter()
            .filter(|(_, item)| item.is_eligible(now))
            .min_by(|(_, a), (_, b)| compare(a, b, now, boost))
            .map(|(id, _)| id)
    }

    fn check_drained(&mut self) {
        let drained = self.is_drained();
        if drained && !self.drained {
            debug!("prefetch queue drained");
            self.actions.push(QueueAction::Drained);
        }
        self.drained = drained;
    }
}

/// Effective priority, then creation time, then insertion order.
fn compare(a: &QueueItem, b: &QueueItem, now: u64, boost_after: u64) -> Ordering {
    a.effective_priority(now, boost_after)
        .cmp(&b.effective_priority(now, boost_after))
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.seq.cmp(&b.seq))
}
