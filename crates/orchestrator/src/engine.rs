#![forbid(unsafe_code)]

use crate::clock::{Clock, SystemClock};
use crate::domain::{InteractionType, ItemId, NavigationEvent, Priority, Route};
use crate::error::Error;
use crate::observation::{DefaultModelUpdater, ModelDelta, ModelUpdater, ObservationEvent};
use crate::persistence::{NoopRepository, StateRepository, StoresSnapshot};
use crate::policy::{
    AdmissionContext, AdmissionDecision, AdmissionPolicy, ByteBudget, DefaultAdmissionPolicy,
    Environment, StaticEnvironment,
};
use crate::prediction::{
    CandidateRoute, NavigationPredictor, Prediction, PredictionRequest, PredictionSummary,
    Predictor,
};
use crate::prefetch::{
    FetchExecutor, FetchOutcome, ItemStatus, NoopFetchExecutor, PrefetchQueue, QueueAction,
};
use crate::stores::Stores;
use config::Config;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

pub struct Services {
    pub environment: Box<dyn Environment>,
    pub updater: Box<dyn ModelUpdater>,
    pub predictor: Box<dyn Predictor>,
    pub admission: Box<dyn AdmissionPolicy>,
    pub executor: Arc<dyn FetchExecutor>,
    pub repo: Box<dyn StateRepository>,
    pub clock: Box<dyn Clock>,
}

impl Services {
    /// Stock services: unknown network, no data saver, a no-op executor and
    /// no persistence.
    pub fn with_defaults(config: &Config) -> Self {
        Self {
            environment: Box::new(StaticEnvironment::default()),
            updater: Box::new(DefaultModelUpdater::new(config)),
            predictor: Box::new(NavigationPredictor::new(config)),
            admission: Box::new(DefaultAdmissionPolicy::new(config)),
            executor: Arc::new(NoopFetchExecutor),
            repo: Box::new(NoopRepository),
            clock: Box::new(SystemClock),
        }
    }
}

pub struct ReloadBundle {
    pub config: Config,
    pub updater: Box<dyn ModelUpdater>,
    pub predictor: Box<dyn Predictor>,
    pub admission: Box<dyn AdmissionPolicy>,
    pub executor: Arc<dyn FetchExecutor>,
}

impl ReloadBundle {
    /// Stock services rebuilt for `config`, keeping the given executor.
    pub fn with_defaults(config: Config, executor: Arc<dyn FetchExecutor>) -> Self {
        Self {
            updater: Box::new(DefaultModelUpdater::new(&config)),
            predictor: Box::new(NavigationPredictor::new(&config)),
            admission: Box::new(DefaultAdmissionPolicy::new(&config)),
            executor,
            config,
        }
    }
}

pub enum ControlEvent {
    Navigate(NavigationEvent),
    Interact(Route),
    Predict {
        current: Route,
        candidates: Vec<CandidateRoute>,
    },
    CancelAll,
    ResetBudget,
    Reset,
    Reload(Box<ReloadBundle>),
    DumpStatus,
    SaveNow,
}

#[derive(Debug, Clone)]
pub struct TickReport {
    pub tick_id: u64,
    pub prediction: PredictionSummary,
    /// The last admission decision taken; `Admit` when nothing was tried.
    pub admission: AdmissionDecision,
    pub enqueued: Vec<ItemId>,
    /// Candidates already pending, loading or completed.
    pub already_queued: usize,
    pub saturated: usize,
    pub dispatched: usize,
}

type Fetch = Pin<Box<dyn Future<Output = (ItemId, FetchOutcome)> + Send + Sync>>;
type InFlight = FuturesUnordered<Fetch>;

pub struct PrefetchEngine {
    config: Config,
    services: Services,
    stores: Stores,
    queue: PrefetchQueue,
    budget: ByteBudget,
    in_flight: InFlight,
    tick_id: u64,
    last_save: u64,
    last_cleanup: u64,
}

impl PrefetchEngine {
    /// Create an engine with empty state. No persistence is read.
    pub fn new(config: Config, services: Services) -> Self {
        let now = services.clock.now_ms();
        Self {
            stores: Stores::new(&config.model),
            queue: PrefetchQueue::new(&config),
            budget: ByteBudget::new(config.policy.byte_budget),
            config,
            services,
            in_flight: FuturesUnordered::new(),
            tick_id: 0,
            last_save: now,
            last_cleanup: now,
        }
    }

    /// Build the engine from the last saved snapshot. Any storage failure is
    /// logged and results in a cold start.
    pub async fn load(config: Config, services: Services) -> Self {
        let snapshot = services.repo.load().await;
        let mut engine = Self::new(config, services);
        match snapshot {
            Ok(Some(snapshot)) => match snapshot.into_stores(&engine.config.model) {
                Ok(stores) => {
                    info!(
                        edges = stores.transitions.edge_count(),
                        observed = stores.history.total_observed(),
                        "learned state restored"
                    );
                    engine.stores = stores;
                }
                Err(err) => warn!(%err, "discarding saved state, starting cold"),
            },
            Ok(None) => info!("no saved state, starting cold"),
            Err(err) => warn!(%err, "failed to load saved state, starting cold"),
        }
        engine
    }

    /// Learn from observed events.
    pub fn observe(&mut self, events: &[ObservationEvent]) -> ModelDelta {
        if !self.config.system.dolearn {
            return ModelDelta::default();
        }
        self.services.updater.apply(&mut self.stores, events)
    }

    /// Rank `candidates` as likely next steps from `current`.
    pub fn predict(&self, current: &Route, candidates: &[CandidateRoute]) -> Prediction {
        if !self.config.system.dopredict {
            return Prediction::default();
        }
        let request = PredictionRequest {
            current,
            candidates,
            now: self.services.clock.now_ms(),
        };
        self.services.predictor.predict(&self.stores, &request)
    }

    /// Predict from `current`, admit and enqueue the result, and dispatch
    /// whatever the queue allows.
    pub fn tick(&mut self, current: &Route, candidates: &[CandidateRoute]) -> TickReport {
        self.tick_id = self.tick_id.saturating_add(1);
        let now = self.services.clock.now_ms();
        self.queue
            .set_network_quality(self.services.environment.network_quality());

        // Routes the queue already holds must not take up batch slots.
        let (fresh, queued): (Vec<CandidateRoute>, Vec<CandidateRoute>) = candidates
            .iter()
            .cloned()
            .partition(|candidate| !self.queue.contains_url(&candidate.route));

        let prediction = self.predict(current, &fresh);
        let mut report = TickReport {
            tick_id: self.tick_id,
            prediction: prediction.summarize(),
            admission: AdmissionDecision::Admit,
            enqueued: Vec::new(),
            already_queued: queued.len(),
            saturated: 0,
            dispatched: 0,
        };

        for candidate in prediction.candidates {
            report.admission = self.services.admission.decide(&self.admission_context());
            if let AdmissionDecision::Reject { reason } = report.admission {
                debug!(?reason, "prefetching suppressed");
                break;
            }
            let priority = Priority::from(candidate.bucket);
            match self.queue.enqueue(candidate.url, candidate.kind, priority, now) {
                Some(id) => report.enqueued.push(id),
                None => report.saturated += 1,
            }
        }

        report.dispatched = self.dispatch();
        debug!(
            tick_id = report.tick_id,
            candidates = report.prediction.num_candidates,
            enqueued = report.enqueued.len(),
            dispatched = report.dispatched,
            "tick finished"
        );
        report
    }

    /// Run a scheduling pass and fold in fetches that already finished,
    /// without waiting.
    pub fn poll(&mut self) -> usize {
        let mut completed = 0;
        while let Some(Some((id, outcome))) = self.in_flight.next().now_or_never() {
            self.complete(id, outcome);
            completed += 1;
        }
        let now = self.services.clock.now_ms();
        self.queue.poll(now);
        self.dispatch();
        completed
    }

    /// Wait until nothing is pending or loading, sleeping on the clock for
    /// retry delays.
    pub async fn run_until_drained(&mut self) {
        loop {
            let now = self.services.clock.now_ms();
            self.queue.poll(now);
            self.dispatch();

            // An eligible item blocked on a slot waits for a completion.
            let wakeup = self.queue.next_wakeup(now);
            if self.in_flight.is_empty() && wakeup.is_none() {
                break;
            }
            let wait = Duration::from_millis(wakeup.map_or(0, |at| at.saturating_sub(now)));

            tokio::select! {
                Some((id, outcome)) = self.in_flight.next(), if !self.in_flight.is_empty() => {
                    self.complete(id, outcome);
                }
                _ = self.services.clock.sleep(wait), if wakeup.is_some() => {}
            }
        }
    }

    /// Serve control events until the cancellation token fires. Handles
    /// completions, retries, periodic cleanup and autosave.
    pub async fn run_until(
        &mut self,
        cancel: CancellationToken,
        mut control_rx: mpsc::UnboundedReceiver<ControlEvent>,
    ) -> Result<(), Error> {
        info!("prefetch engine started");
        loop {
            let now = self.services.clock.now_ms();
            let wait = Duration::from_millis(self.next_deadline(now).saturating_sub(now));

            tokio::select! {
                _ = cancel.cancelled() => {
                    if self.config.persistence.save_on_shutdown
                        && let Err(err) = self.save().await
                    {
                        warn!(%err, "failed to save state on shutdown");
                    }
                    info!("shutdown requested");
                    break;
                }
                Some(event) = control_rx.recv() => {
                    self.handle_control(event).await;
                }
                Some((id, outcome)) = self.in_flight.next(), if !self.in_flight.is_empty() => {
                    self.complete(id, outcome);
                }
                _ = self.services.clock.sleep(wait) => {
                    self.housekeeping().await;
                }
            }
        }
        Ok(())
    }

    /// Persist the learned stores via the configured repository.
    pub async fn save(&self) -> Result<(), Error> {
        let snapshot = StoresSnapshot::from_stores(&self.stores, self.services.clock.now_ms());
        self.services.repo.save(&snapshot).await
    }

    /// Forget everything learned and queued, and restore the byte budget.
    pub fn reset(&mut self) {
        self.stores.reset();
        self.queue.clear();
        self.budget.reset();
        info!("engine state reset");
    }

    pub fn reset_budget(&mut self) {
        self.budget.reset();
        info!(cap = self.budget.cap(), "byte budget reset");
    }

    /// Sweep completed and cancelled items past their TTL so their routes
    /// can be prefetched again.
    pub fn cleanup(&mut self) -> usize {
        let now = self.services.clock.now_ms();
        self.last_cleanup = now;
        self.queue.cleanup(now)
    }

    pub fn cancel_all(&mut self) -> usize {
        let now = self.services.clock.now_ms();
        let cancelled = self.queue.cancel_all(now);
        self.dispatch();
        cancelled
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Read-only access to the learned stores.
    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    pub fn queue(&self) -> &PrefetchQueue {
        &self.queue
    }

    pub fn budget(&self) -> &ByteBudget {
        &self.budget
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn apply_reload(&mut self, mut bundle: ReloadBundle) {
        if bundle.config.persistence.state_path != self.config.persistence.state_path {
            warn!(
                current = ?self.config.persistence.state_path,
                requested = ?bundle.config.persistence.state_path,
                "ignoring state_path change during reload"
            );
            bundle.config.persistence.state_path = self.config.persistence.state_path.clone();
        }

        self.queue.reconfigure(&bundle.config);
        self.budget.set_cap(bundle.config.policy.byte_budget);
        self.stores.history.set_cap(bundle.config.model.history_cap);
        self.config = bundle.config;
        self.services.updater = bundle.updater;
        self.services.predictor = bundle.predictor;
        self.services.admission = bundle.admission;
        self.services.executor = bundle.executor;
        info!("config reloaded");
    }

    fn admission_context(&self) -> AdmissionContext {
        AdmissionContext {
            network: self.services.environment.network_quality(),
            data_saver: self.services.environment.data_saver(),
            bytes_used: self.budget.used(),
        }
    }

    fn complete(&mut self, id: ItemId, outcome: FetchOutcome) {
        let now = self.services.clock.now_ms();
        let size = match &outcome {
            FetchOutcome::Success { size_bytes } => *size_bytes,
            FetchOutcome::Failure { .. } => 0,
        };
        match self.queue.complete(id, outcome, now) {
            Some(ItemStatus::Completed) => {
                self.budget.record(size);
                if self.budget.is_exhausted() {
                    warn!(used = self.budget.used(), cap = self.budget.cap(), "byte budget exhausted");
                }
            }
            Some(_) => {}
            None => trace!(?id, "completion for unknown item ignored"),
        }
        self.dispatch();
    }

    /// Start fetches for every queued dispatch action.
    ///
    /// A fetch task that panics is reported as a failure. This needs an
    /// unwinding build; the release profile aborts instead.
    fn dispatch(&mut self) -> usize {
        let mut started = 0;
        for action in self.queue.take_actions() {
            match action {
                QueueAction::Dispatch { id, url, kind } => {
                    let executor = Arc::clone(&self.services.executor);
                    let handle = tokio::spawn(async move { executor.fetch(url.as_str(), kind).await });
                    self.in_flight.push(Box::pin(async move {
                        match handle.await {
                            Ok(outcome) => (id, outcome),
                            Err(err) => (id, FetchOutcome::failure(format!("fetch task failed: {err}"))),
                        }
                    }));
                    started += 1;
                }
                QueueAction::RetryScheduled { id, at } => trace!(?id, at, "retry scheduled"),
                QueueAction::Drained => debug!("all prefetches settled"),
            }
        }
        started
    }

    fn next_deadline(&self, now: u64) -> u64 {
        let mut deadline = self
            .last_cleanup
            .saturating_add(millis(self.config.queue.cleanup_interval).max(1));
        if let Some(interval) = self.autosave_interval() {
            deadline = deadline.min(self.last_save.saturating_add(interval));
        }
        if let Some(wakeup) = self.queue.next_wakeup(now) {
            deadline = deadline.min(wakeup);
        }
        deadline.max(now)
    }

    fn autosave_interval(&self) -> Option<u64> {
        self.config
            .persistence
            .autosave_interval
            .map(millis)
            .filter(|interval| *interval > 0)
    }

    async fn housekeeping(&mut self) {
        let now = self.services.clock.now_ms();
        self.queue.poll(now);
        self.dispatch();

        if now.saturating_sub(self.last_cleanup) >= millis(self.config.queue.cleanup_interval) {
            self.cleanup();
        }

        if let Some(interval) = self.autosave_interval()
            && now.saturating_sub(self.last_save) >= interval
        {
            if let Err(err) = self.save().await {
                warn!(%err, "autosave failed, keeping state in memory");
            }
            self.last_save = now;
        }
    }

    async fn handle_control(&mut self, event: ControlEvent) {
        match event {
            ControlEvent::Navigate(navigation) => {
                self.observe(&[ObservationEvent::Navigation(navigation)]);
            }
            ControlEvent::Interact(route) => {
                let timestamp = self.services.clock.now_ms();
                self.observe(&[ObservationEvent::Interaction {
                    route,
                    timestamp,
                    kind: InteractionType::Hover,
                }]);
            }
            ControlEvent::Predict {
                current,
                candidates,
            } => {
                let report = self.tick(&current, &candidates);
                info!(
                    %current,
                    candidates = report.prediction.num_candidates,
                    enqueued = report.enqueued.len(),
                    confidence = report.prediction.confidence,
                    "prediction scheduled"
                );
            }
            ControlEvent::CancelAll => {
                let cancelled = self.cancel_all();
                info!(cancelled, "pending prefetches cancelled");
            }
            ControlEvent::ResetBudget => self.reset_budget(),
            ControlEvent::Reset => self.reset(),
            ControlEvent::Reload(bundle) => self.apply_reload(*bundle),
            ControlEvent::DumpStatus => self.dump_status(),
            ControlEvent::SaveNow => {
                match self.save().await {
                    Ok(()) => info!("state saved"),
                    Err(err) => warn!(%err, "failed to save state"),
                }
                self.last_save = self.services.clock.now_ms();
            }
        }
    }

    fn dump_status(&self) {
        let stats = self.queue.stats();
        info!(?self.config, "current config");
        info!(
            routes = self.stores.transitions.route_count(),
            edges = self.stores.transitions.edge_count(),
            observed = self.stores.history.total_observed(),
            interactions = self.stores.interactions.len(),
            "model summary"
        );
        info!(
            pending = stats.pending,
            loading = stats.loading,
            completed = stats.completed,
            failed = stats.failed,
            cancelled = stats.cancelled,
            network = %self.queue.network_quality(),
            "queue summary"
        );
        info!(used = self.budget.used(), cap = self.budget.cap(), "byte budget");
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::domain::ResourceKind;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, Clone)]
    struct Recording {
        id: u32,
        hits: Arc<AtomicU32>,
    }

    impl Recording {
        fn record(&self) {
            self.hits.store(self.id, Ordering::SeqCst);
        }
    }

    impl ModelUpdater for Recording {
        fn apply(&mut self, _stores: &mut Stores, _observation: &[ObservationEvent]) -> ModelDelta {
            self.record();
            ModelDelta::default()
        }
    }

    impl Predictor for Recording {
        fn predict(&self, _stores: &Stores, request: &PredictionRequest<'_>) -> Prediction {
            self.record();
            let candidates = request
                .candidates
                .iter()
                .map(|candidate| crate::prediction::PrefetchCandidate {
                    url: candidate.route.clone(),
                    kind: candidate.kind,
                    probability: 0.9,
                    bucket: crate::domain::PriorityBucket::High,
                    factors: Vec::new(),
                })
                .collect();
            Prediction {
                candidates,
                confidence: 1.0,
            }
        }

        fn confidence(&self, _stores: &Stores) -> f32 {
            1.0
        }
    }

    impl AdmissionPolicy for Recording {
        fn decide(&self, _context: &AdmissionContext) -> AdmissionDecision {
            self.record();
            AdmissionDecision::Admit
        }
    }

    #[async_trait]
    impl FetchExecutor for Recording {
        async fn fetch(&self, _url: &str, _kind: ResourceKind) -> FetchOutcome {
            self.record();
            FetchOutcome::Success { size_bytes: 1 }
        }
    }

    fn recording(id: u32, hits: &Arc<AtomicU32>) -> Recording {
        Recording {
            id,
            hits: Arc::clone(hits),
        }
    }

    #[tokio::test]
    async fn reload_swaps_runtime_services() {
        let config = Config::default();
        let updater_hits = Arc::new(AtomicU32::new(0));
        let predictor_hits = Arc::new(AtomicU32::new(0));
        let admission_hits = Arc::new(AtomicU32::new(0));
        let executor_hits = Arc::new(AtomicU32::new(0));

        let services = Services {
            updater: Box::new(recording(1, &updater_hits)),
            predictor: Box::new(recording(1, &predictor_hits)),
            admission: Box::new(recording(1, &admission_hits)),
            executor: Arc::new(recording(1, &executor_hits)),
            clock: Box::new(ManualClock::new(0)),
            ..Services::with_defaults(&config)
        };
        let mut engine = PrefetchEngine::new(config.clone(), services);

        engine.observe(&[ObservationEvent::navigation("/", "/a", 0)]);
        engine.tick(&Route::new("/"), &[CandidateRoute::document("/a")]);
        engine.run_until_drained().await;

        for hits in [&updater_hits, &predictor_hits, &admission_hits, &executor_hits] {
            assert_eq!(hits.load(Ordering::SeqCst), 1);
        }

        let mut reloaded = config.clone();
        reloaded.persistence.state_path = Some("/elsewhere.db".into());
        engine.apply_reload(ReloadBundle {
            config: reloaded,
            updater: Box::new(recording(2, &updater_hits)),
            predictor: Box::new(recording(2, &predictor_hits)),
            admission: Box::new(recording(2, &admission_hits)),
            executor: Arc::new(recording(2, &executor_hits)),
        });
        assert_eq!(engine.config().persistence.state_path, None);

        engine.observe(&[ObservationEvent::navigation("/", "/b", 1)]);
        engine.tick(&Route::new("/"), &[CandidateRoute::document("/b")]);
        engine.run_until_drained().await;

        for hits in [&updater_hits, &predictor_hits, &admission_hits, &executor_hits] {
            assert_eq!(hits.load(Ordering::SeqCst), 2);
        }
    }

    #[tokio::test]
    async fn learning_and_prediction_switches_are_honoured() {
        let mut config = Config::default();
        config.system.dolearn = false;
        config.system.dopredict = false;
        let mut engine = PrefetchEngine::new(config.clone(), Services::with_defaults(&config));

        let delta = engine.observe(&[ObservationEvent::navigation("/", "/a", 0)]);
        assert_eq!(delta, ModelDelta::default());
        assert!(engine.stores().transitions.is_empty());

        let report = engine.tick(&Route::new("/"), &[CandidateRoute::document("/a")]);
        assert_eq!(report.prediction.num_candidates, 0);
        assert!(engine.queue().is_empty());
    }

    #[test]
    fn deadline_never_lies_in_the_past() {
        let mut config = Config::default();
        config.persistence.autosave_interval = Some(Duration::from_secs(1));
        let services = Services {
            clock: Box::new(ManualClock::new(10_000)),
            ..Services::with_defaults(&config)
        };
        let engine = PrefetchEngine::new(config, services);
        assert_eq!(engine.next_deadline(10_000), 11_000);
        assert_eq!(engine.next_deadline(50_000), 50_000);
    }
}
