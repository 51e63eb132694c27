#![forbid(unsafe_code)]

use crate::domain::Route;
use rustc_hash::FxHashMap;

/// Hover/focus/touch counts per route.
#[derive(Debug, Default, Clone)]
pub struct InteractionStore {
    counts: FxHashMap<Route, u32>,
    max: u32,
}

impl InteractionStore {
    pub fn record(&mut self, route: Route) -> u32 {
        let count = self.counts.entry(route).or_insert(0);
        *count = count.saturating_add(1);
        self.max = self.max.max(*count);
        *count
    }

    pub fn count(&self, route: &Route) -> u32 {
        self.counts.get(route).copied().unwrap_or(0)
    }

    /// Count normalised against the busiest route, in `[0, 1]`.
    pub fn frequency(&self, route: &Route) -> f32 {
        if self.max == 0 {
            return 0.0;
        }
        self.count(route) as f32 / self.max as f32
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Route, u32)> {
        self.counts.iter().map(|(route, count)| (route, *count))
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn restore(&mut self, counts: impl IntoIterator<Item = (Route, u32)>) {
        self.counts = counts.into_iter().filter(|(_, count)| *count > 0).collect();
        self.max = self.counts.values().copied().max().unwrap_or(0);
    }

    pub fn clear(&mut self) {
        self.counts.clear();
        self.max = 0;
    }
}
