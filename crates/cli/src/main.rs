use clap::Parser;
use config::Config;
use prefetch_rs::{
    cli::{Cli, Command},
    commands::{self, ReplayOptions},
};
use serde::Serialize;
use std::fmt::Display;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // NOTE: The verbosity flag takes precedence over the environment variable
    // for log control. For example, `PREFETCH_LOG=warn prefetch-rs -vvv` will
    // still log at the trace level. The environment variable (`PREFETCH_LOG`)
    // can only set the log level per crate, not override the verbosity flag.
    // Eg. `PREFETCH_LOG=orchestrator=warn prefetch-rs -vvv` will log at the
    // trace level for all crates except `orchestrator`.
    let env_filter = EnvFilter::builder()
        .with_default_directive("sqlx=warn".parse()?)
        .with_env_var("PREFETCH_LOG")
        .from_env()?
        .add_directive(cli.verbosity.log_level_filter().as_str().parse()?);

    let layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_level(true)
        .with_file(false)
        .with_line_number(false);

    tracing_subscriber::registry()
        .with(layer)
        .with(env_filter)
        .init();

    // load config
    let mut config = match &cli.config {
        Some(path) => Config::load_with_env([path])?,
        _ => {
            let mut candidates = glob::glob("/etc/prefetch-rs/config.d/*.toml")?
                .filter_map(Result::ok)
                .collect::<Vec<_>>();
            candidates.insert(0, "/etc/prefetch-rs/config.toml".into());
            trace!(?candidates, "config file candidates");
            Config::load_with_env(candidates)?
        }
    };
    if let Some(state) = &cli.state {
        config.persistence.state_path = Some(state.clone());
    }
    debug!(?config, ?cli);

    let repo = commands::open_repository(config.persistence.state_path.as_deref()).await?;

    match cli.command {
        Command::Replay {
            trace,
            assume_size,
            network,
            data_saver,
            json,
        } => {
            let events = commands::read_trace(&trace)?;
            info!(events = events.len(), trace = %trace.display(), "replaying trace");

            let cancel = CancellationToken::new();
            let interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    debug!("interrupt received");
                    interrupt.cancel();
                }
            });

            let options = ReplayOptions {
                assume_size,
                network,
                data_saver,
            };
            let summary = commands::replay(config, repo, events, options, cancel).await?;
            if json {
                emit_json(&summary)?;
            } else {
                emit(format_args!(
                    "replayed {} events ({} navigations, {} interactions)",
                    summary.events, summary.navigations, summary.interactions
                ));
                emit(format_args!(
                    "prefetched {} routes in {} ticks, {} already queued, {} saturated, {} ticks rejected",
                    summary.enqueued,
                    summary.ticks,
                    summary.already_queued,
                    summary.saturated,
                    summary.rejected_ticks
                ));
                emit(format_args!(
                    "{} completed, {} failed, {} of {} bytes used",
                    summary.completed, summary.failed, summary.bytes_used, summary.byte_budget
                ));
                emit(format_args!(
                    "model holds {} edges across {} routes",
                    summary.edges, summary.routes
                ));
                if !summary.finished {
                    emit("replay was interrupted");
                }
            }
        }

        Command::Predict {
            route,
            candidates,
            json,
        } => {
            let prediction = commands::predict(config, repo, &route, &candidates).await?;
            if json {
                emit_json(&prediction)?;
            } else if prediction.is_empty() {
                emit(format_args!("no prediction for {route}"));
            } else {
                emit(format_args!("confidence {:.2}", prediction.confidence));
                for candidate in &prediction.candidates {
                    emit(format_args!(
                        "{:<40} {:.3} {:?}",
                        candidate.url.as_str(),
                        candidate.probability,
                        candidate.bucket
                    ));
                    for factor in &candidate.factors {
                        emit(format_args!("    {}: {}", factor.signal, factor.description));
                    }
                }
            }
        }

        Command::Stats { top, json } => {
            let stats = commands::stats(config, repo, top).await?;
            if json {
                emit_json(&stats)?;
            } else {
                emit(format_args!(
                    "{} routes, {} edges, {} navigations observed ({} in history), {} routes with interactions",
                    stats.routes, stats.edges, stats.observed, stats.history_len, stats.interaction_routes
                ));
                for edge in &stats.strongest {
                    emit(format_args!("{:.3}  {} -> {}", edge.weight, edge.from, edge.to));
                }
            }
        }
    }

    Ok(())
}

#[allow(clippy::print_stdout)]
fn emit(line: impl Display) {
    println!("{line}");
}

fn emit_json(value: &impl Serialize) -> anyhow::Result<()> {
    emit(serde_json::to_string_pretty(value)?);
    Ok(())
}
