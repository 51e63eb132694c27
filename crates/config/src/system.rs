use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct System {
    /// Whether observed navigations update the transition model and signal
    /// history. Turning it off freezes what has been learned so far.
    pub dolearn: bool,

    /// Whether predictions are made and fed into the prefetch queue. Turn it
    /// off to only train the model.
    pub dopredict: bool,
}

impl Default for System {
    fn default() -> Self {
        Self {
            dolearn: true,
            dopredict: true,
        }
    }
}
