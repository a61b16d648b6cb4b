//! Read-through cache of fetched files.

use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;
use serde_json::Value;
use tracing::debug;

use crate::penpot::model::Id;

/// Time-bounded cache of raw file documents, keyed by file id.
///
/// Cheap to clone; clones share the same entries.
#[derive(Clone)]
pub struct FileCache {
    inner: Cache<String, Arc<Value>>,
}

impl FileCache {
    /// Creates a cache holding at most `max_files` files for `ttl`.
    #[must_use]
    pub fn new(ttl: Duration, max_files: u64) -> Self {
        Self {
            inner: Cache::builder()
                .time_to_live(ttl)
                .max_capacity(max_files)
                .build(),
        }
    }

    /// Returns the cached document, if still fresh.
    #[must_use]
    pub fn get(&self, file_id: &Id) -> Option<Arc<Value>> {
        self.inner.get(file_id.as_str())
    }

    /// Stores a document.
    pub fn insert(&self, file_id: &Id, document: Value) -> Arc<Value> {
        let document = Arc::new(document);
        self.inner
            .insert(file_id.to_string(), Arc::clone(&document));
        document
    }

    /// Drops a document so the next read goes to the platform.
    pub fn invalidate(&self, file_id: &Id) {
        debug!(file_id = %file_id, "Invalidating cached file");
        self.inner.invalidate(file_id.as_str());
    }

    /// Snapshot of the fresh entries, ordered by file id.
    #[must_use]
    pub fn entries(&self) -> Vec<(Id, Arc<Value>)> {
        let mut entries: Vec<(Id, Arc<Value>)> = self
            .inner
            .iter()
            .map(|(id, document)| (Id::from(id.as_str()), document))
            .collect();
        entries.sort_by(|a, b| a.0.as_str().cmp(b.0.as_str()));
        entries
    }

    /// Drops everything.
    pub fn clear(&self) {
        self.inner.invalidate_all();
    }
}

impl std::fmt::Debug for FileCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileCache")
            .field("entries", &self.inner.entry_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn insert_get_invalidate() {
        let cache = FileCache::new(Duration::from_secs(60), 8);
        let id = Id::from("f1");
        assert!(cache.get(&id).is_none());

        cache.insert(&id, json!({"revn": 3}));
        assert_eq!(cache.get(&id).as_deref(), Some(&json!({"revn": 3})));

        cache.invalidate(&id);
        assert!(cache.get(&id).is_none());
    }

    #[test]
    fn entries_are_sorted_by_id() {
        let cache = FileCache::new(Duration::from_secs(60), 8);
        cache.insert(&Id::from("f2"), json!({"revn": 2}));
        cache.insert(&Id::from("f1"), json!({"revn": 1}));
        let ids: Vec<String> = cache.entries().into_iter().map(|(id, _)| id.to_string()).collect();
        assert_eq!(ids, ["f1", "f2"]);
    }

    #[test]
    fn clones_share_entries() {
        let cache = FileCache::new(Duration::from_secs(60), 8);
        let clone = cache.clone();
        cache.insert(&Id::from("f1"), json!({}));
        assert!(clone.get(&Id::from("f1")).is_some());
        clone.clear();
        assert!(cache.get(&Id::from("f1")).is_none());
    }
}
