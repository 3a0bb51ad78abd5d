use std::collections::HashMap;

use crate::rwlock::RwLock;

pub const KEY_COUNT: &str = "key_count";
pub const TOTAL_STORE_CONTENTS_SIZE: &str = "total_store_contents_size";
pub const KEYS_READ_COUNT: &str = "keys_read_count";
pub const KEYS_UPDATED_COUNT: &str = "keys_updated_count";
pub const KEYS_DELETED_COUNT: &str = "keys_deleted_count";

/// Counter map with its own lock, so counter traffic never contends with
/// store access.
#[derive(Default)]
pub struct MetricsRegistry {
    counters: RwLock<HashMap<String, i64>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self, name: &str, by: i64) {
        let mut counters = self.counters.write();
        match counters.get_mut(name) {
            Some(value) => *value += by,
            None => {
                counters.insert(name.to_string(), by);
            }
        }
    }

    /// An absent counter is seeded with `+by`, same as `increment`.
    pub fn decrement(&self, name: &str, by: i64) {
        let mut counters = self.counters.write();
        match counters.get_mut(name) {
            Some(value) => *value -= by,
            None => {
                counters.insert(name.to_string(), by);
            }
        }
    }

    /// Returns the current value, or `None` if the counter was never touched.
    pub fn get(&self, name: &str) -> Option<i64> {
        self.counters.read().get(name).copied()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn untouched_counter_is_none() {
        let registry = MetricsRegistry::new();
        assert_eq!(registry.get(KEYS_READ_COUNT), None);
    }

    #[test]
    fn increment_seeds_and_accumulates() {
        let registry = MetricsRegistry::new();
        registry.increment(KEYS_READ_COUNT, 3);
        registry.increment(KEYS_READ_COUNT, 2);
        assert_eq!(registry.get(KEYS_READ_COUNT), Some(5));
    }

    #[test]
    fn decrement_of_absent_counter_seeds_positive() {
        let registry = MetricsRegistry::new();
        registry.decrement(KEYS_DELETED_COUNT, 4);
        assert_eq!(registry.get(KEYS_DELETED_COUNT), Some(4));
        registry.decrement(KEYS_DELETED_COUNT, 1);
        assert_eq!(registry.get(KEYS_DELETED_COUNT), Some(3));
    }

    #[test]
    fn negative_deltas_are_allowed() {
        let registry = MetricsRegistry::new();
        registry.increment(TOTAL_STORE_CONTENTS_SIZE, 10);
        registry.increment(TOTAL_STORE_CONTENTS_SIZE, -6);
        assert_eq!(registry.get(TOTAL_STORE_CONTENTS_SIZE), Some(4));
    }

    #[test]
    fn concurrent_increments_do_not_lose_updates() {
        let registry = Arc::new(MetricsRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    for _ in 0..500 {
                        registry.increment(KEYS_UPDATED_COUNT, 1);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(registry.get(KEYS_UPDATED_COUNT), Some(4000));
    }
}
