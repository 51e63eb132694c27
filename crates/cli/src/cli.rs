use clap::{Parser, Subcommand};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use config::NetworkQuality;
use std::path::{Path, PathBuf};

/// prefetch-rs: predictive prefetch scheduler
///
/// prefetch-rs learns which routes users move between and speculatively
/// fetches the likely next ones under network, concurrency and byte budget
/// limits. The command line replays recorded navigation traces against the
/// scheduler and inspects what it has learned.
#[derive(Debug, Parser, Clone)]
#[command(about, long_about, version)]
pub struct Cli {
    /// Path to configuration file.
    ///
    /// If not provided, the default locations are checked. They are
    /// `/etc/prefetch-rs/config.toml` and `/etc/prefetch-rs/config.d/*.toml`,
    /// where the latter being a glob pattern. If they don't exist, the default
    /// configuration is used. `PREFETCH_`-prefixed environment variables
    /// override file values in both cases.
    #[arg(short, long, value_parser = validate_file)]
    pub config: Option<PathBuf>,

    /// SQLite file to load and save learned state to.
    ///
    /// Overrides `persistence.state_path`. Without either, state lives in
    /// memory for the duration of the command.
    #[arg(short, long)]
    pub state: Option<PathBuf>,

    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Learn from a JSON-lines navigation trace, prefetching after every step.
    ///
    /// Each line is an observation such as
    /// `{"type":"navigation","from":"/","to":"/docs","timestamp":0}` or
    /// `{"type":"interaction","route":"/pricing","timestamp":10}`.
    Replay {
        /// Trace file to replay.
        #[arg(value_parser = validate_file)]
        trace: PathBuf,

        /// Size in bytes reported for every simulated fetch.
        #[arg(long, default_value_t = 50 * 1024)]
        assume_size: u64,

        /// Network tier to simulate.
        #[arg(long, default_value = "4g", value_parser = validate_network)]
        network: NetworkQuality,

        /// Simulate an active data-saver preference.
        #[arg(long)]
        data_saver: bool,

        /// Print the summary as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Rank candidate next routes from the saved state.
    Predict {
        /// Route the user is on.
        route: String,

        /// Candidate route; may be repeated. Defaults to every destination
        /// learned from `route`.
        #[arg(short = 'n', long = "candidate")]
        candidates: Vec<String>,

        /// Print the prediction as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print statistics about the saved state.
    Stats {
        /// Number of strongest transitions to list.
        #[arg(long, default_value_t = 10)]
        top: usize,

        /// Print the statistics as JSON.
        #[arg(long)]
        json: bool,
    },
}

/// Check if the file exists.
#[inline(always)]
fn validate_file(file: &str) -> Result<PathBuf, String> {
    let path = Path::new(file);
    if path.exists() {
        Ok(path.to_owned())
    } else {
        Err(format!("File not found: {:?}", path))
    }
}

/// Parse a network tier name.
#[inline(always)]
fn validate_network(network: &str) -> Result<NetworkQuality, String> {
    network.parse().map_err(|_| {
        let known: Vec<_> = NetworkQuality::ALL.iter().map(|q| q.as_str()).collect();
        format!("`{network}` is not a network tier, expected one of {}", known.join(", "))
    })
}
