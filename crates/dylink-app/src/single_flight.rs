//! At most one attach/detach per target at a time

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

/// Registry of targets with an operation in progress
///
/// Clones share the registry. A slot is held by the returned [`FlightGuard`]
/// and released when the guard drops, including on panic unwind.
#[derive(Debug, Clone, Default)]
pub struct SingleFlight {
    active: Arc<Mutex<HashSet<String>>>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `bid`; `None` when another operation already holds it
    pub fn try_acquire(&self, bid: &str) -> Option<FlightGuard> {
        if !self.lock().insert(bid.to_string()) {
            return None;
        }
        Some(FlightGuard {
            bid: bid.to_string(),
            active: self.active.clone(),
        })
    }

    pub fn is_active(&self, bid: &str) -> bool {
        self.lock().contains(bid)
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        // The set stays consistent even if a holder panicked
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Releases its target slot on drop
#[derive(Debug)]
pub struct FlightGuard {
    bid: String,
    active: Arc<Mutex<HashSet<String>>>,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        active.remove(&self.bid);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_is_rejected() {
        let flights = SingleFlight::new();
        let _guard = flights.try_acquire("com.dts.freefireth").unwrap();

        assert!(flights.try_acquire("com.dts.freefireth").is_none());
        assert!(flights.is_active("com.dts.freefireth"));
    }

    #[test]
    fn test_targets_are_independent() {
        let flights = SingleFlight::new();
        let _a = flights.try_acquire("com.example.a").unwrap();
        assert!(flights.try_acquire("com.example.b").is_some());
    }

    #[test]
    fn test_drop_releases_slot() {
        let flights = SingleFlight::new();
        let clone = flights.clone();
        {
            let _guard = flights.try_acquire("com.dts.freefireth").unwrap();
            assert!(clone.is_active("com.dts.freefireth"));
        }
        assert!(!clone.is_active("com.dts.freefireth"));
        assert!(clone.try_acquire("com.dts.freefireth").is_some());
    }
}
