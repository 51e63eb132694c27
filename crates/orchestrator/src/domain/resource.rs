#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use std::fmt;

/// What kind of resource a prefetch retrieves. The executor decides how.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    #[default]
    Document,
    Script,
    Style,
    Image,
    Font,
    Fetch,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::Document => "document",
            ResourceKind::Script => "script",
            ResourceKind::Style => "style",
            ResourceKind::Image => "image",
            ResourceKind::Font => "font",
            ResourceKind::Fetch => "fetch",
        };
        f.write_str(name)
    }
}
