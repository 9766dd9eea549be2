//! Derived-property resolution
//!
//! Participant records are rendered as JSON trees and addressed with
//! dot-delimited paths such as `tracks.audio.subscribed`. A [`PropertyCache`]
//! keeps the last resolved value per key and hands back the same `Arc` while
//! the value is deep-equal, so consumers can compare with `Arc::ptr_eq`.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::sync::Arc;

use serde_json::Value;

/// Walk `path` through nested objects
///
/// Returns `None` as soon as a segment is missing or the current value is not
/// an object. The empty path resolves to `value` itself.
pub fn resolve_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(value);
    }

    path.split('.').try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        _ => None,
    })
}

/// Resolve several paths at once, keyed by path
pub fn resolve_paths<'a, 'p>(value: &'a Value, paths: &[&'p str]) -> BTreeMap<&'p str, Option<&'a Value>> {
    paths
        .iter()
        .map(|path| (*path, resolve_path(value, path)))
        .collect()
}

/// Last-value cache giving referential stability to resolved properties
#[derive(Debug)]
pub struct PropertyCache<K> {
    entries: HashMap<K, Arc<Value>>,
}

impl<K: Eq + Hash> PropertyCache<K> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Return the cached `Arc` when `value` is deep-equal to it, else store `value`
    pub fn intern(&mut self, key: K, value: Value) -> Arc<Value> {
        if let Some(cached) = self.entries.get(&key) {
            if **cached == value {
                return Arc::clone(cached);
            }
        }
        let fresh = Arc::new(value);
        self.entries.insert(key, Arc::clone(&fresh));
        fresh
    }

    pub fn forget(&mut self, key: &K) {
        self.entries.remove(key);
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&K) -> bool) {
        self.entries.retain(|key, _| keep(key));
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Eq + Hash> Default for PropertyCache<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolves_nested_path() {
        let record = json!({ "tracks": { "audio": { "subscribed": true } } });
        assert_eq!(
            resolve_path(&record, "tracks.audio.subscribed"),
            Some(&json!(true))
        );
    }

    #[test]
    fn test_missing_branch_is_none() {
        let record = json!({ "tracks": { "audio": { "subscribed": true } } });
        assert_eq!(resolve_path(&record, "tracks.video.subscribed"), None);
        assert_eq!(resolve_path(&record, "permissions"), None);
    }

    #[test]
    fn test_walking_through_a_scalar_is_none() {
        let record = json!({ "tracks": { "audio": { "subscribed": true } } });
        assert_eq!(resolve_path(&record, "tracks.audio.subscribed.deeper"), None);
    }

    #[test]
    fn test_empty_path_is_identity() {
        let record = json!({ "a": 1 });
        assert_eq!(resolve_path(&record, ""), Some(&record));
    }

    #[test]
    fn test_deep_nesting() {
        let record = json!({ "a": { "b": { "c": { "d": { "e": { "f": "deep" } } } } } });
        assert_eq!(resolve_path(&record, "a.b.c.d.e.f"), Some(&json!("deep")));
    }

    #[test]
    fn test_resolve_paths_keyed_by_path() {
        let record = json!({ "local": true, "tracks": { "audio": { "state": "off" } } });
        let resolved = resolve_paths(&record, &["local", "tracks.audio.state", "owner"]);

        assert_eq!(resolved["local"], Some(&json!(true)));
        assert_eq!(resolved["tracks.audio.state"], Some(&json!("off")));
        assert_eq!(resolved["owner"], None);
    }

    #[test]
    fn test_cache_returns_same_reference_when_unchanged() {
        let mut cache = PropertyCache::new();
        let first = cache.intern("k", json!({ "state": "playable" }));
        let second = cache.intern("k", json!({ "state": "playable" }));
        assert!(Arc::ptr_eq(&first, &second));

        let third = cache.intern("k", json!({ "state": "off" }));
        assert!(!Arc::ptr_eq(&second, &third));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_forget() {
        let mut cache = PropertyCache::new();
        let first = cache.intern("k", json!(1));
        cache.forget(&"k");
        let second = cache.intern("k", json!(1));
        assert!(!Arc::ptr_eq(&first, &second));
    }
}
