//! In-flight fetch registry.
//!
//! Coalesces concurrent remote fetches for the same identifier: the first
//! caller to claim a key becomes its owner and performs the fetch; later
//! callers get a slot to wait on and receive the owner's published outcome.
//! One registry exists per source, so keys are plain identifiers.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

/// Upper bound on how long a waiter will block for an owner's result.
/// Owners always publish, including on failure paths, so this only fires if
/// the owning thread died; the waiter then degrades to "no result".
const WAIT_CAP: Duration = Duration::from_secs(60);

/// A slot a waiter blocks on until the owner publishes.
pub struct Slot<T> {
    result: Mutex<Option<T>>,
    ready: Condvar,
}

/// Outcome of claiming a key.
pub enum Claim<T> {
    /// This caller owns the fetch and must publish a result for the key.
    Owner,
    /// Another caller is already fetching; wait on the slot.
    Waiter(Arc<Slot<T>>),
}

/// Registry of fetches currently on the wire, keyed by identifier.
pub struct InflightRegistry<T> {
    slots: Mutex<HashMap<String, Arc<Slot<T>>>>,
}

impl<T: Clone> InflightRegistry<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Claim a key. The first claimant becomes the owner; everyone else gets
    /// the owner's slot to wait on.
    pub fn claim(&self, key: &str) -> Claim<T> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = slots.get(key) {
            return Claim::Waiter(Arc::clone(slot));
        }
        slots.insert(
            key.to_string(),
            Arc::new(Slot {
                result: Mutex::new(None),
                ready: Condvar::new(),
            }),
        );
        Claim::Owner
    }

    /// Publish the owner's result for a key and wake all waiters.
    ///
    /// Removes the key from the registry, so the next claim after
    /// publication starts a fresh fetch (a later caller that missed the
    /// cache again must be allowed to retry).
    pub fn publish(&self, key: &str, value: T) {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots.remove(key)
        };
        if let Some(slot) = slot {
            let mut result = slot.result.lock().unwrap_or_else(PoisonError::into_inner);
            *result = Some(value);
            slot.ready.notify_all();
        }
    }

    /// Block until the owner publishes, up to [`WAIT_CAP`].
    pub fn wait(slot: &Slot<T>) -> Option<T> {
        let mut result = slot.result.lock().unwrap_or_else(PoisonError::into_inner);
        let deadline = std::time::Instant::now() + WAIT_CAP;
        while result.is_none() {
            let remaining = deadline.saturating_duration_since(std::time::Instant::now());
            if remaining.is_zero() {
                return None;
            }
            let (guard, timeout) = slot
                .ready
                .wait_timeout(result, remaining)
                .unwrap_or_else(PoisonError::into_inner);
            result = guard;
            if timeout.timed_out() && result.is_none() {
                return None;
            }
        }
        result.clone()
    }
}

impl<T: Clone> Default for InflightRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_first_claim_owns_second_waits() {
        let registry: InflightRegistry<u32> = InflightRegistry::new();
        assert!(matches!(registry.claim("CVE-2024-3094"), Claim::Owner));
        assert!(matches!(registry.claim("CVE-2024-3094"), Claim::Waiter(_)));
        // Unrelated keys are independent.
        assert!(matches!(registry.claim("CVE-2024-21762"), Claim::Owner));
    }

    #[test]
    fn test_publish_wakes_waiter_and_clears_key() {
        let registry: Arc<InflightRegistry<u32>> = Arc::new(InflightRegistry::new());
        assert!(matches!(registry.claim("CVE-2024-3094"), Claim::Owner));

        let Claim::Waiter(slot) = registry.claim("CVE-2024-3094") else {
            panic!("expected waiter");
        };

        let publisher = {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                registry.publish("CVE-2024-3094", 7);
            })
        };

        assert_eq!(InflightRegistry::wait(&slot), Some(7));
        publisher.join().unwrap();

        // Published keys leave the registry; the next claim owns again.
        assert!(matches!(registry.claim("CVE-2024-3094"), Claim::Owner));
    }

    #[test]
    fn test_publish_without_waiters_is_harmless() {
        let registry: InflightRegistry<u32> = InflightRegistry::new();
        assert!(matches!(registry.claim("CVE-2024-3094"), Claim::Owner));
        registry.publish("CVE-2024-3094", 1);
        registry.publish("CVE-2024-3094", 2);
    }
}
