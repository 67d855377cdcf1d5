use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Mutex, PoisonError};

use crate::graph::PersonId;

/// Thread-safe LRU cache for person display names
///
/// Cast lists already carry every co-star's name, so the graph builder feeds
/// them here and path assembly rarely needs a `resolve_person_name` call.
/// Uses LRU eviction policy to maintain bounded memory usage.
pub struct NameCache {
    cache: Mutex<LruCache<PersonId, String>>,
}

impl NameCache {
    /// Create a new name cache with the specified capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum number of names to cache; 0 is raised to 1
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);

        Self {
            cache: Mutex::new(LruCache::new(cap)),
        }
    }

    /// Get a cached name for a person
    ///
    /// # Returns
    ///
    /// Some(name) if found in cache, None otherwise
    pub fn get(&self, person: PersonId) -> Option<String> {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&person)
            .cloned()
    }

    /// Store a person's name in the cache
    ///
    /// Blank names are dropped so a later lookup falls through to the provider.
    pub fn put(&self, person: PersonId, name: String) {
        if name.trim().is_empty() {
            return;
        }
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .put(person, name);
    }

    /// Store a batch of names under a single lock
    pub fn put_many<'a, I>(&self, names: I)
    where
        I: IntoIterator<Item = (&'a PersonId, &'a String)>,
    {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        for (person, name) in names {
            if name.trim().is_empty() {
                continue;
            }
            cache.put(*person, name.clone());
        }
    }

    /// Get the current number of cached entries
    pub fn len(&self) -> usize {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    /// Clear all entries from the cache
    pub fn clear(&self) {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_cache_put_and_get() {
        let cache = NameCache::new(10);

        cache.put(PersonId(4724), "Kevin Bacon".to_string());

        assert_eq!(cache.get(PersonId(4724)).as_deref(), Some("Kevin Bacon"));
        assert!(cache.get(PersonId(31)).is_none());
    }

    #[test]
    fn test_cache_eviction() {
        let cache = NameCache::new(2);

        cache.put(PersonId(1), "One".to_string());
        cache.put(PersonId(2), "Two".to_string());

        // Touch 1 so 2 becomes least recently used
        let _ = cache.get(PersonId(1));
        cache.put(PersonId(3), "Three".to_string());

        assert!(cache.get(PersonId(1)).is_some());
        assert!(cache.get(PersonId(2)).is_none()); // Evicted
        assert!(cache.get(PersonId(3)).is_some());
    }

    #[test]
    fn test_cache_put_many_and_clear() {
        let cache = NameCache::new(10);
        let cast: BTreeMap<PersonId, String> = [
            (PersonId(1), "One".to_string()),
            (PersonId(2), "Two".to_string()),
        ]
        .into_iter()
        .collect();

        cache.put_many(&cast);
        assert_eq!(cache.len(), 2);
        assert!(!cache.is_empty());

        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.get(PersonId(1)).is_none());
    }

    #[test]
    fn test_cache_zero_capacity_holds_one() {
        let cache = NameCache::new(0);

        cache.put(PersonId(1), "One".to_string());
        cache.put(PersonId(2), "Two".to_string());

        assert_eq!(cache.len(), 1);
        assert!(cache.get(PersonId(2)).is_some());
    }

    #[test]
    fn test_cache_skips_blank_names() {
        let cache = NameCache::new(10);
        let cast: BTreeMap<PersonId, String> = [
            (PersonId(1), "One".to_string()),
            (PersonId(99), String::new()),
        ]
        .into_iter()
        .collect();

        cache.put_many(&cast);
        cache.put(PersonId(98), "  ".to_string());

        assert_eq!(cache.len(), 1);
        assert!(cache.get(PersonId(99)).is_none());
        assert!(cache.get(PersonId(98)).is_none());
    }
}
