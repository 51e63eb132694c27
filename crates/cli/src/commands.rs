#![forbid(unsafe_code)]

use anyhow::Context;
use config::{Config, NetworkQuality};
use orchestrator::persistence::EdgeRecord;
use orchestrator::{
    CandidateRoute, Clock, DryRunExecutor, KeyValueRepository, ManualClock, NoopRepository,
    ObservationEvent, Prediction, PrefetchEngine, Route, Services, SqliteStore, StateRepository,
    StaticEnvironment, SystemClock,
};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Open the repository learned state is kept in. Without a path state only
/// lives for the duration of the command.
pub async fn open_repository(path: Option<&Path>) -> anyhow::Result<Box<dyn StateRepository>> {
    match path {
        Some(path) => {
            let store = SqliteStore::open(path)
                .await
                .with_context(|| format!("failed to open state file {}", path.display()))?;
            debug!(path = %path.display(), "using sqlite state");
            Ok(Box::new(KeyValueRepository::new(store)))
        }
        None => {
            debug!("no state file configured, learned state is not kept");
            Ok(Box::new(NoopRepository))
        }
    }
}

/// Parse a JSON-lines trace. Blank lines and lines starting with `#` are
/// skipped.
pub fn read_trace(path: &Path) -> anyhow::Result<Vec<ObservationEvent>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read trace {}", path.display()))?;
    parse_trace(&text).with_context(|| format!("invalid trace {}", path.display()))
}

fn parse_trace(text: &str) -> anyhow::Result<Vec<ObservationEvent>> {
    let mut events = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let event = serde_json::from_str(line).with_context(|| format!("line {}", index + 1))?;
        events.push(event);
    }
    Ok(events)
}

#[derive(Debug, Clone, Copy)]
pub struct ReplayOptions {
    pub assume_size: u64,
    pub network: NetworkQuality,
    pub data_saver: bool,
}

#[derive(Debug, Default, Clone, Serialize, PartialEq)]
pub struct ReplaySummary {
    pub events: usize,
    pub navigations: usize,
    pub interactions: usize,
    pub ignored_self_transitions: usize,
    pub ticks: usize,
    pub predicted: usize,
    pub enqueued: usize,
    pub already_queued: usize,
    pub saturated: usize,
    pub rejected_ticks: usize,
    pub completed: usize,
    pub failed: usize,
    pub bytes_used: u64,
    pub byte_budget: u64,
    pub routes: usize,
    pub edges: usize,
    /// False when the replay was interrupted before the end of the trace.
    pub finished: bool,
}

/// Feed `events` through the engine in order, scheduling prefetches after
/// every navigation and letting them settle before the next event.
///
/// The engine clock follows the trace timestamps.
pub async fn replay(
    config: Config,
    repo: Box<dyn StateRepository>,
    events: Vec<ObservationEvent>,
    options: ReplayOptions,
    cancel: CancellationToken,
) -> anyhow::Result<ReplaySummary> {
    let clock = ManualClock::new(events.first().map_or(0, ObservationEvent::timestamp));
    let services = Services {
        environment: Box::new(StaticEnvironment::new(options.network, options.data_saver)),
        executor: Arc::new(DryRunExecutor::new(options.assume_size)),
        repo,
        clock: Box::new(clock.clone()),
        ..Services::with_defaults(&config)
    };
    let save_on_shutdown = config.persistence.save_on_shutdown;
    let mut engine = PrefetchEngine::load(config, services).await;

    let mut summary = ReplaySummary {
        finished: true,
        ..Default::default()
    };
    for event in events {
        if cancel.is_cancelled() {
            info!(replayed = summary.events, "replay interrupted");
            summary.finished = false;
            break;
        }
        // Retry sleeps may have moved the clock past the next timestamp.
        clock.set(event.timestamp().max(clock.now_ms()));
        engine.cleanup();
        summary.events += 1;

        let destination = match &event {
            ObservationEvent::Navigation(navigation) => Some(navigation.to.clone()),
            ObservationEvent::Interaction { .. } => None,
        };
        let delta = engine.observe(std::slice::from_ref(&event));
        summary.navigations += delta.navigations;
        summary.interactions += delta.interactions;
        summary.ignored_self_transitions += delta.ignored_self_transitions;

        let Some(current) = destination else {
            continue;
        };
        let candidates: Vec<_> = engine
            .stores()
            .known_destinations(&current)
            .into_iter()
            .map(CandidateRoute::document)
            .collect();
        let report = engine.tick(&current, &candidates);
        summary.ticks += 1;
        summary.predicted += report.prediction.num_candidates;
        summary.enqueued += report.enqueued.len();
        summary.already_queued += report.already_queued;
        summary.saturated += report.saturated;
        if !report.admission.is_admit() {
            summary.rejected_ticks += 1;
        }
        engine.run_until_drained().await;
    }

    let stats = engine.queue().stats();
    summary.completed = stats.completed;
    summary.failed = stats.failed;
    summary.bytes_used = engine.budget().used();
    summary.byte_budget = engine.budget().cap();
    summary.routes = engine.stores().transitions.route_count();
    summary.edges = engine.stores().transitions.edge_count();

    if save_on_shutdown && let Err(err) = engine.save().await {
        warn!(%err, "failed to save learned state");
    }
    Ok(summary)
}

/// Rank `candidates` from `route` using the saved state. An empty candidate
/// list means every destination learned from `route`.
pub async fn predict(
    config: Config,
    repo: Box<dyn StateRepository>,
    route: &str,
    candidates: &[String],
) -> anyhow::Result<Prediction> {
    let services = Services {
        repo,
        clock: Box::new(SystemClock),
        ..Services::with_defaults(&config)
    };
    let engine = PrefetchEngine::load(config, services).await;
    let current = Route::normalize(route);
    let candidates: Vec<_> = if candidates.is_empty() {
        engine
            .stores()
            .known_destinations(&current)
            .into_iter()
            .map(CandidateRoute::document)
            .collect()
    } else {
        candidates
            .iter()
            .map(|candidate| CandidateRoute::document(Route::normalize(candidate)))
            .collect()
    };
    Ok(engine.predict(&current, &candidates))
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StateStats {
    pub routes: usize,
    pub edges: usize,
    pub observed: u64,
    pub history_len: usize,
    pub interaction_routes: usize,
    pub strongest: Vec<EdgeRecord>,
}

pub async fn stats(
    config: Config,
    repo: Box<dyn StateRepository>,
    top: usize,
) -> anyhow::Result<StateStats> {
    let services = Services {
        repo,
        ..Services::with_defaults(&config)
    };
    let engine = PrefetchEngine::load(config, services).await;
    let stores = engine.stores();

    let mut strongest: Vec<_> = stores
        .transitions
        .iter()
        .map(|(from, to, weight)| EdgeRecord {
            from: from.clone(),
            to: to.clone(),
            weight,
        })
        .collect();
    strongest.sort_by(|a, b| {
        b.weight
            .total_cmp(&a.weight)
            .then_with(|| a.from.cmp(&b.from))
            .then_with(|| a.to.cmp(&b.to))
    });
    strongest.truncate(top);

    Ok(StateStats {
        routes: stores.transitions.route_count(),
        edges: stores.transitions.edge_count(),
        observed: stores.history.total_observed(),
        history_len: stores.history.len(),
        interaction_routes: stores.interactions.len(),
        strongest,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> ReplayOptions {
        ReplayOptions {
            assume_size: 1_000,
            network: NetworkQuality::FourG,
            data_saver: false,
        }
    }

    fn walk() -> Vec<ObservationEvent> {
        vec![
            ObservationEvent::navigation("/", "/docs", 0),
            ObservationEvent::navigation("/docs", "/docs/intro", 1_000),
            ObservationEvent::navigation("/docs/intro", "/docs", 2_000),
            ObservationEvent::hover("/docs/intro", 2_500),
            ObservationEvent::navigation("/docs", "/docs/intro", 3_000),
        ]
    }

    #[test]
    fn trace_parsing_skips_comments_and_reports_line_numbers() {
        let text = "# recorded session\n\n{\"type\":\"navigation\",\"from\":\"/\",\"to\":\"/a\",\"timestamp\":5}\n";
        let events = parse_trace(text).unwrap();
        assert_eq!(events, vec![ObservationEvent::navigation("/", "/a", 5)]);

        let err = parse_trace("{\"type\":\"navigation\"}\nnot json").unwrap_err();
        assert_eq!(err.to_string(), "line 1");
    }

    #[tokio::test]
    async fn replay_learns_and_prefetches_known_destinations() {
        let summary = replay(
            Config::default(),
            Box::new(NoopRepository),
            walk(),
            options(),
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert!(summary.finished);
        assert_eq!(summary.events, 5);
        assert_eq!(summary.navigations, 4);
        assert_eq!(summary.interactions, 1);
        assert_eq!(summary.ticks, 4);
        assert_eq!(summary.edges, 3);
        assert!(summary.enqueued > 0);
        assert_eq!(summary.bytes_used, summary.completed as u64 * 1_000);
        assert_eq!(summary.failed, 0);
    }

    #[tokio::test]
    async fn data_saver_rejects_every_tick() {
        let summary = replay(
            Config::default(),
            Box::new(NoopRepository),
            walk(),
            ReplayOptions {
                data_saver: true,
                ..options()
            },
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(summary.enqueued, 0);
        assert_eq!(summary.bytes_used, 0);
        assert_eq!(summary.edges, 3);
    }

    #[tokio::test]
    async fn routes_are_prefetched_again_once_their_ttl_expires() {
        let mut config = Config::default();
        config.queue.completed_ttl = std::time::Duration::from_secs(1);
        let events = vec![
            ObservationEvent::navigation("/", "/a", 0),
            ObservationEvent::navigation("/a", "/", 1),
            ObservationEvent::navigation("/", "/a", 2),
            ObservationEvent::navigation("/a", "/", 10_000),
        ];

        let summary = replay(config, Box::new(NoopRepository), events, options(), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.ticks, 4);
        assert_eq!(summary.already_queued, 0);
        assert_eq!(summary.enqueued, 3);
    }

    #[tokio::test]
    async fn cancelled_replay_stops_before_the_first_event() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let summary = replay(Config::default(), Box::new(NoopRepository), walk(), options(), cancel)
            .await
            .unwrap();
        assert!(!summary.finished);
        assert_eq!(summary.events, 0);
    }

    #[tokio::test]
    async fn state_survives_between_commands() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.db");

        let repo = open_repository(Some(&path)).await.unwrap();
        replay(Config::default(), repo, walk(), options(), CancellationToken::new())
            .await
            .unwrap();

        let repo = open_repository(Some(&path)).await.unwrap();
        let stats = stats(Config::default(), repo, 1).await.unwrap();
        assert_eq!(stats.edges, 3);
        assert_eq!(stats.observed, 4);
        assert_eq!(stats.strongest.len(), 1);
        assert_eq!(stats.strongest[0].from, Route::new("/docs"));
        assert_eq!(stats.strongest[0].to, Route::new("/docs/intro"));

        let repo = open_repository(Some(&path)).await.unwrap();
        let prediction = predict(Config::default(), repo, "/docs", &[]).await.unwrap();
        assert!(
            prediction
                .candidates
                .iter()
                .all(|candidate| candidate.url == Route::new("/docs/intro"))
        );
    }
}
