#![forbid(unsafe_code)]

use crate::domain::{NavigationEvent, Route};
use rustc_hash::FxHashMap;
use std::collections::VecDeque;

const HOURS_PER_DAY: usize = 24;
const MS_PER_MINUTE: i64 = 60_000;
const MS_PER_HOUR: i64 = 60 * MS_PER_MINUTE;

/// Hour of day (0..24) for a millisecond timestamp shifted by an offset.
pub fn hour_of_day(timestamp_ms: u64, utc_offset_minutes: i32) -> usize {
    let shifted = timestamp_ms as i64 + utc_offset_minutes as i64 * MS_PER_MINUTE;
    (shifted.div_euclid(MS_PER_HOUR)).rem_euclid(HOURS_PER_DAY as i64) as usize
}

/// Bounded rolling history of navigations plus per-route hourly visit
/// counts.
#[derive(Debug, Clone)]
pub struct NavigationHistory {
    events: VecDeque<NavigationEvent>,
    cap: usize,
    total_observed: u64,
    hourly: FxHashMap<Route, [u32; HOURS_PER_DAY]>,
}

impl Default for NavigationHistory {
    fn default() -> Self {
        Self::with_cap(100)
    }
}

impl NavigationHistory {
    pub fn with_cap(cap: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(cap.min(1024)),
            cap,
            total_observed: 0,
            hourly: FxHashMap::default(),
        }
    }

    /// Append an event, dropping the oldest ones past the cap.
    pub fn push(&mut self, event: NavigationEvent, utc_offset_minutes: i32) {
        let hour = hour_of_day(event.timestamp, utc_offset_minutes);
        let slot = &mut self.hourly.entry(event.to.clone()).or_insert([0; HOURS_PER_DAY])[hour];
        *slot = slot.saturating_add(1);

        self.total_observed = self.total_observed.saturating_add(1);
        self.events.push_back(event);
        while self.events.len() > self.cap {
            self.events.pop_front();
        }
    }

    /// Position of `route` among the last `window` destinations, 0 being the
    /// most recent.
    pub fn recency_position(&self, route: &Route, window: usize) -> Option<usize> {
        self.events
            .iter()
            .rev()
            .take(window)
            .position(|event| &event.to == route)
    }

    pub fn hourly_visits(&self, route: &Route) -> Option<&[u32; HOURS_PER_DAY]> {
        self.hourly.get(route)
    }

    pub fn events(&self) -> impl Iterator<Item = &NavigationEvent> {
        self.events.iter()
    }

    pub fn last(&self) -> Option<&NavigationEvent> {
        self.events.back()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Navigations observed over the model's lifetime, including the ones
    /// that already rolled out of the window.
    pub fn total_observed(&self) -> u64 {
        self.total_observed
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn set_cap(&mut self, cap: usize) {
        self.cap = cap;
        while self.events.len() > self.cap {
            self.events.pop_front();
        }
    }

    pub fn hourly(&self) -> impl Iterator<Item = (&Route, &[u32; HOURS_PER_DAY])> {
        self.hourly.iter()
    }

    /// Restore persisted state verbatim.
    pub fn restore(
        &mut self,
        events: impl IntoIterator<Item = NavigationEvent>,
        total_observed: u64,
        hourly: impl IntoIterator<Item = (Route, [u32; HOURS_PER_DAY])>,
    ) {
        self.events = events.into_iter().collect();
        self.set_cap(self.cap);
        self.total_observed = total_observed.max(self.events.len() as u64);
        self.hourly = hourly.into_iter().collect();
    }

    pub fn clear(&mut self) {
        self.events.clear();
        self.total_observed = 0;
        self.hourly.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::InteractionType;
    use proptest::prelude::*;

    fn nav(from: &str, to: &str, timestamp: u64) -> NavigationEvent {
        NavigationEvent {
            from: Route::new(from),
            to: Route::new(to),
            timestamp,
            interaction: InteractionType::Click,
        }
    }

    #[test]
    fn hour_of_day_applies_offset() {
        let three_am = 3 * 3_600_000;
        assert_eq!(hour_of_day(three_am, 0), 3);
        assert_eq!(hour_of_day(three_am, 120), 5);
        assert_eq!(hour_of_day(three_am, -240), 23);
    }

    #[test]
    fn recency_reports_most_recent_position() {
        let mut history = NavigationHistory::with_cap(10);
        history.push(nav("/", "/a", 0), 0);
        history.push(nav("/a", "/b", 1), 0);
        history.push(nav("/b", "/c", 2), 0);

        assert_eq!(history.recency_position(&Route::new("/c"), 5), Some(0));
        assert_eq!(history.recency_position(&Route::new("/a"), 5), Some(2));
        assert_eq!(history.recency_position(&Route::new("/a"), 2), None);
    }

    proptest! {
        #[test]
        fn history_never_exceeds_cap(cap in 0usize..20, count in 0usize..60) {
            let mut history = NavigationHistory::with_cap(cap);
            for i in 0..count {
                history.push(nav("/x", &format!("/r{}", i % 7), i as u64), 0);
            }
            prop_assert!(history.len() <= cap);
            prop_assert_eq!(history.total_observed(), count as u64);
            let hourly_total: u64 = history
                .hourly()
                .map(|(_, hours)| hours.iter().map(|&v| v as u64).sum::<u64>())
                .sum();
            prop_assert_eq!(hourly_total, count as u64);
        }
    }
}
