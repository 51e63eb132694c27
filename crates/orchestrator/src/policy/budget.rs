#![forbid(unsafe_code)]

/// Bytes consumed by completed prefetches, compared against a cap.
///
/// Only grows; [`ByteBudget::reset`] is the single way back to zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteBudget {
    used: u64,
    cap: u64,
}

impl ByteBudget {
    pub fn new(cap: u64) -> Self {
        Self { used: 0, cap }
    }

    pub fn record(&mut self, bytes: u64) {
        self.used = self.used.saturating_add(bytes);
    }

    pub fn used(&self) -> u64 {
        self.used
    }

    pub fn cap(&self) -> u64 {
        self.cap
    }

    pub fn remaining(&self) -> u64 {
        self.cap.saturating_sub(self.used)
    }

    pub fn is_exhausted(&self) -> bool {
        self.used >= self.cap
    }

    pub fn set_cap(&mut self, cap: u64) {
        self.cap = cap;
    }

    pub fn reset(&mut self) {
        self.used = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn usage_is_monotonic(records in prop::collection::vec(0u64..u64::MAX / 4, 0..20)) {
            let mut budget = ByteBudget::new(1024);
            let mut last = 0;
            for bytes in records {
                budget.record(bytes);
                prop_assert!(budget.used() >= last);
                last = budget.used();
            }
            budget.reset();
            prop_assert_eq!(budget.used(), 0);
            prop_assert_eq!(budget.remaining(), 1024);
        }
    }
}
