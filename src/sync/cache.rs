//! Level sync cache
//!
//! Remembers recent on-demand level syncs per `(integration, parent, level)`
//! so repeated expansions of the same node within the TTL skip the provider.
//! Entries expire lazily on read.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use uuid::Uuid;

#[derive(Debug, Clone, Copy)]
struct Entry {
    count: usize,
    expires_at: Instant,
}

#[derive(Debug)]
pub struct LevelCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, Entry>>,
}

impl LevelCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn key(integration_id: Uuid, parent_id: Uuid, level: &str) -> String {
        format!("sync:{integration_id}:{parent_id}:{level}")
    }

    /// Cached count for the key, dropping the entry if it has expired
    pub fn get(&self, key: &str) -> Option<usize> {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get(key) {
            Some(entry) if entry.expires_at > now => Some(entry.count),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, key: String, count: usize) {
        let entry = Entry {
            count,
            expires_at: Instant::now() + self.ttl,
        };
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key, entry);
    }

    /// Drop every entry belonging to an integration
    pub fn invalidate_integration(&self, integration_id: Uuid) {
        let prefix = format!("sync:{integration_id}:");
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|key, _| !key.starts_with(&prefix));
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_format() {
        let integration = Uuid::nil();
        let parent = Uuid::nil();
        assert_eq!(
            LevelCache::key(integration, parent, "tasks"),
            format!("sync:{integration}:{parent}:tasks")
        );
    }

    #[test]
    fn hit_within_ttl() {
        let cache = LevelCache::new(Duration::from_secs(300));
        let key = LevelCache::key(Uuid::new_v4(), Uuid::new_v4(), "projects");
        assert_eq!(cache.get(&key), None);
        cache.put(key.clone(), 7);
        assert_eq!(cache.get(&key), Some(7));
    }

    #[test]
    fn expired_entries_are_dropped_on_read() {
        let cache = LevelCache::new(Duration::ZERO);
        let key = LevelCache::key(Uuid::new_v4(), Uuid::new_v4(), "tasks");
        cache.put(key.clone(), 3);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&key), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn invalidate_integration_only_drops_its_keys() {
        let cache = LevelCache::new(Duration::from_secs(300));
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        cache.put(LevelCache::key(a, Uuid::new_v4(), "tasks"), 1);
        cache.put(LevelCache::key(b, Uuid::new_v4(), "tasks"), 2);
        cache.invalidate_integration(a);
        assert_eq!(cache.len(), 1);
    }
}
