#![forbid(unsafe_code)]

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use slotmap::new_key_type;
use std::borrow::Borrow;
use std::sync::Arc;
use std::{fmt, hash};

new_key_type! { pub struct ItemId; }

/// A normalised navigation destination, used as a node key in the
/// transition graph and as the URL of queued prefetches.
///
/// Cloning is cheap; the string is shared.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Route(Arc<str>);

impl Route {
    /// Wrap an already normalised route without touching it.
    pub fn new(route: impl Into<Arc<str>>) -> Self {
        Self(route.into())
    }

    /// Strip query string and fragment, force a leading slash and drop
    /// trailing slashes (except for the root).
    pub fn normalize(raw: &str) -> Self {
        let end = raw.find(['?', '#']).unwrap_or(raw.len());
        let path = raw[..end].trim();
        let trimmed = path.trim_end_matches('/');
        if trimmed.is_empty() {
            return Self(Arc::from("/"));
        }
        if trimmed.starts_with('/') || trimmed.contains("://") {
            Self(Arc::from(trimmed))
        } else {
            Self(Arc::from(format!("/{trimmed}")))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Non-empty path segments, ignoring any scheme and authority.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        let path = match self.0.find("://") {
            Some(ix) => {
                let rest = &self.0[ix + 3..];
                rest.find('/').map(|p| &rest[p..]).unwrap_or("")
            }
            None => &self.0,
        };
        path.split('/').filter(|segment| !segment.is_empty())
    }
}

impl hash::Hash for Route {
    fn hash<H: hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl Borrow<str> for Route {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Route").field(&&*self.0).finish()
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Route {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Route {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl Serialize for Route {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Route {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::new(raw))
    }
}
