#![forbid(unsafe_code)]

use crate::domain::NetworkQuality;
use std::sync::Mutex;

/// Live environment inputs, pulled on every admission check.
pub trait Environment: Send + Sync {
    fn network_quality(&self) -> NetworkQuality;
    fn data_saver(&self) -> bool;
}

/// Environment whose values are set by the host (or a test) and read back
/// verbatim.
#[derive(Debug, Default)]
pub struct StaticEnvironment {
    state: Mutex<(NetworkQuality, bool)>,
}

impl StaticEnvironment {
    pub fn new(network: NetworkQuality, data_saver: bool) -> Self {
        Self {
            state: Mutex::new((network, data_saver)),
        }
    }

    pub fn set_network_quality(&self, network: NetworkQuality) {
        if let Ok(mut state) = self.state.lock() {
            state.0 = network;
        }
    }

    pub fn set_data_saver(&self, enabled: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.1 = enabled;
        }
    }
}

impl Environment for StaticEnvironment {
    fn network_quality(&self) -> NetworkQuality {
        self.state
            .lock()
            .map(|state| state.0)
            .unwrap_or(NetworkQuality::Unknown)
    }

    fn data_saver(&self) -> bool {
        self.state.lock().map(|state| state.1).unwrap_or(false)
    }
}

impl<T: Environment + ?Sized> Environment for std::sync::Arc<T> {
    fn network_quality(&self) -> NetworkQuality {
        (**self).network_quality()
    }

    fn data_saver(&self) -> bool {
        (**self).data_saver()
    }
}
