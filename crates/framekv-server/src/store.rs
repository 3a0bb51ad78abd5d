use std::collections::HashMap;

use bytes::Bytes;

use crate::rwlock::RwLock;

/// Shared key/value map. Every bulk operation runs under a single lock
/// acquisition so the batch is observed atomically.
#[derive(Default)]
pub struct KvStore {
    map: RwLock<HashMap<String, Bytes>>,
}

impl KvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up every requested key; misses are omitted from the result.
    pub fn get_many(&self, keys: &[String]) -> Vec<(String, Bytes)> {
        let map = self.map.read();
        keys.iter()
            .filter_map(|key| map.get(key).map(|value| (key.clone(), value.clone())))
            .collect()
    }

    /// Upserts the batch in order and returns the byte totals
    /// `(overwritten, inserted)` for the values it replaced and wrote.
    pub fn insert_many(&self, pairs: impl IntoIterator<Item = (String, Bytes)>) -> (u64, u64) {
        let mut map = self.map.write();
        let mut old_total = 0u64;
        let mut new_total = 0u64;
        for (key, value) in pairs {
            new_total += value.len() as u64;
            if let Some(old) = map.insert(key, value) {
                old_total += old.len() as u64;
            }
        }
        (old_total, new_total)
    }

    /// Removes the requested keys, returning the keys that were actually
    /// present and the byte total of their removed values.
    pub fn remove_many(&self, keys: &[String]) -> (Vec<String>, u64) {
        let mut map = self.map.write();
        let mut removed = Vec::new();
        let mut bytes_removed = 0u64;
        for key in keys {
            if let Some(value) = map.remove(key) {
                bytes_removed += value.len() as u64;
                removed.push(key.clone());
            }
        }
        (removed, bytes_removed)
    }

    /// Runs `f` with the map under a single read acquisition.
    pub fn with_read<R>(&self, f: impl FnOnce(&HashMap<String, Bytes>) -> R) -> R {
        f(&self.map.read())
    }

    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
