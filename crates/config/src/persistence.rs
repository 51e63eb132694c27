use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use std::path::PathBuf;
use std::time::Duration;

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Persistence {
    /// SQLite file backing the key-value store. Learned state is kept in
    /// memory only when unset.
    pub state_path: Option<PathBuf>,

    /// Save the learned model this often. **Measured in seconds**.
    #[serde_as(as = "Option<serde_with::DurationSeconds<u64>>")]
    pub autosave_interval: Option<Duration>,

    /// Save the learned model when the engine shuts down.
    pub save_on_shutdown: bool,
}

impl Default for Persistence {
    fn default() -> Self {
        Self {
            state_path: None,
            autosave_interval: Some(Duration::from_secs(300)),
            save_on_shutdown: true,
        }
    }
}
