//! Delivery statistics tracking.
//!
//! Counts the terminal outcome of every flush and replay so hosts can observe
//! the fire-and-forget pipeline without a callback channel.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use strum::IntoEnumIterator;

use super::types::DeliveryOutcomeType;

/// Thread-safe delivery statistics tracker.
///
/// All outcome types are initialized to zero on creation; counters are atomic
/// so the tracker can be shared across worker tasks behind an `Arc`.
pub struct DeliveryStats {
    outcomes: HashMap<DeliveryOutcomeType, AtomicUsize>,
}

impl DeliveryStats {
    pub fn new() -> Self {
        let mut outcomes = HashMap::new();
        for outcome in DeliveryOutcomeType::iter() {
            outcomes.insert(outcome, AtomicUsize::new(0));
        }
        DeliveryStats { outcomes }
    }

    /// Increment an outcome counter.
    pub fn increment(&self, outcome: DeliveryOutcomeType) {
        self.add(outcome, 1);
    }

    /// Add `count` to an outcome counter.
    pub fn add(&self, outcome: DeliveryOutcomeType, count: usize) {
        if let Some(counter) = self.outcomes.get(&outcome) {
            counter.fetch_add(count, Ordering::Relaxed);
        } else {
            log::error!(
                "Attempted to increment outcome counter for {:?} which is not in the map. \
                 This indicates a bug in DeliveryStats initialization.",
                outcome
            );
        }
    }

    /// Get the count for an outcome type.
    pub fn get(&self, outcome: DeliveryOutcomeType) -> usize {
        self.outcomes
            .get(&outcome)
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    /// Snapshot of all non-zero counters, for logging.
    pub fn summary(&self) -> Vec<(DeliveryOutcomeType, usize)> {
        DeliveryOutcomeType::iter()
            .map(|outcome| (outcome, self.get(outcome)))
            .filter(|(_, count)| *count > 0)
            .collect()
    }
}

impl Default for DeliveryStats {
    fn default() -> Self {
        Self::new()
    }
}
