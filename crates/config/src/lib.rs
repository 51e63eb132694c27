#![forbid(unsafe_code)]

mod concurrency;
mod error;
mod model;
mod network;
mod persistence;
mod policy;
mod queue;
mod system;

pub use concurrency::ConcurrencyLimits;
pub use error::Error;
pub use model::{BucketThresholds, Model, SignalWeights};
pub use network::NetworkQuality;
pub use persistence::Persistence;
pub use policy::Policy;
pub use queue::Queue;
pub use system::System;

use figment::Figment;
use figment::providers::{Env, Format, Toml};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Prefix of environment variables recognised by [`Config::load_with_env`].
pub const ENV_PREFIX: &str = "PREFETCH_";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub model: Model,
    pub queue: Queue,
    pub policy: Policy,
    pub persistence: Persistence,
    pub system: System,
}

impl Config {
    /// Load configuration from a TOML file. Missing fields are filled with defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path)?;
        let mut config: Config = toml_edit::de::from_str(&text)?;
        config.apply_defaults();
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        let toml = toml_edit::ser::to_string_pretty(self)?;
        std::fs::write(path, toml)?;
        Ok(())
    }

    /// Load configuration from multiple TOML files. Later files override earlier ones.
    pub fn load_multiple<T, U>(paths: U) -> Result<Self, Error>
    where
        T: AsRef<Path>,
        U: IntoIterator<Item = T>,
    {
        let mut merged = toml_edit::DocumentMut::new();
        for path in paths {
            let path = path.as_ref();
            if !path.exists() {
                continue;
            }
            let text = std::fs::read_to_string(path)?;
            let doc: toml_edit::DocumentMut = text.parse()?;
            merge_document(&mut merged, doc);
        }
        let mut config: Config = toml_edit::de::from_str(&merged.to_string())?;
        config.apply_defaults();
        Ok(config)
    }

    /// Load TOML files like [`Config::load_multiple`], then apply
    /// `PREFETCH_`-prefixed environment overrides. Nested keys are separated
    /// by a double underscore, e.g. `PREFETCH_QUEUE__MAX_RETRIES=5`.
    pub fn load_with_env<T, U>(paths: U) -> Result<Self, Error>
    where
        T: AsRef<Path>,
        U: IntoIterator<Item = T>,
    {
        let mut figment = Figment::new();
        for path in paths {
            figment = figment.merge(Toml::file(path.as_ref()));
        }
        let mut config: Config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        config.apply_defaults();
        Ok(config)
    }

    fn apply_defaults(&mut self) {
        self.queue.concurrency = self.queue.concurrency.clamp();
        self.model.learning_rate = self.model.learning_rate();
        self.model.prune_epsilon = self.model.prune_epsilon();
        if self.model.confidence_max_samples < self.model.confidence_min_samples {
            self.model.confidence_max_samples = self.model.confidence_min_samples;
        }
    }
}

fn merge_document(target: &mut toml_edit::DocumentMut, source: toml_edit::DocumentMut) {
    for (key, item) in source.iter() {
        merge_item(
            target.entry(key).or_insert(toml_edit::Item::None),
            item.clone(),
        );
    }
}

fn merge_item(target: &mut toml_edit::Item, source: toml_edit::Item) {
    use toml_edit::Item;
    match (target, source) {
        (Item::Table(target_table), Item::Table(source_table)) => {
            for (key, item) in source_table.iter() {
                merge_item(target_table.entry(key).or_insert(Item::None), item.clone());
            }
        }
        (Item::ArrayOfTables(target_array), Item::ArrayOfTables(source_array)) => {
            for table in source_array.iter() {
                target_array.push(table.clone());
            }
        }
        (target_item, source_item) => {
            *target_item = source_item;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.apply_defaults();
        config.save(&path).unwrap();
        let loaded = Config::load(&path).unwrap();

        assert_eq!(config, loaded);
    }

    #[test]
    fn load_multiple_merges() {
        let dir = tempdir().unwrap();
        let path1 = dir.path().join("a.toml");
        let path2 = dir.path().join("b.toml");

        std::fs::write(
            &path1,
            "[queue]\nretry_delay = 250\n[system]\ndopredict = false\n",
        )
        .unwrap();
        std::fs::write(
            &path2,
            "[policy]\nmin_network_quality = \"2g\"\n[queue.concurrency]\n4g = 8\n",
        )
        .unwrap();

        let cfg = Config::load_multiple([path1, path2]).unwrap();
        assert_eq!(cfg.queue.retry_delay, Duration::from_millis(250));
        assert!(!cfg.system.dopredict);
        assert_eq!(cfg.policy.min_network_quality, NetworkQuality::TwoG);
        assert_eq!(cfg.queue.concurrency.four_g, 8);
        assert_eq!(cfg.queue.concurrency.three_g, 3);
    }

    #[test]
    fn load_clamps_out_of_range_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[model]\nlearning_rate = 4.0\nconfidence_min_samples = 10\nconfidence_max_samples = 2\n\
             [queue.concurrency]\ndefault = 0\n",
        )
        .unwrap();

        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.model.learning_rate, 1.0);
        assert_eq!(cfg.model.confidence_max_samples, 10);
        assert_eq!(cfg.queue.concurrency.default, 1);
    }

    #[test]
    fn load_with_env_reads_toml_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[queue]\nmax_retries = 7\n[policy]\nrespect_data_saver = false\n",
        )
        .unwrap();

        let cfg = Config::load_with_env([path]).unwrap();
        assert_eq!(cfg.queue.max_retries, 7);
        assert!(!cfg.policy.respect_data_saver);
        assert_eq!(cfg.model, Model::default());
    }
}
