use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

#[derive(Clone, Debug)]
struct Entry<V> {
	value: V,
	fetched_at: DateTime<Utc>,
}

/// Keyed response cache with a freshness window and an eviction window.
///
/// Entries younger than `stale_after` are served without refetching; entries
/// older than `evict_after` are dropped by [`QueryCache::evict_expired`].
#[derive(Clone, Debug)]
pub struct QueryCache<V> {
	entries: HashMap<String, Entry<V>>,
	stale_after: Duration,
	evict_after: Duration,
}

impl<V: Clone> QueryCache<V> {
	pub fn new(stale_after: Duration, evict_after: Duration) -> Self {
		Self {
			entries: HashMap::new(),
			stale_after,
			evict_after,
		}
	}

	/// The cached value for `key` if it was fetched within the freshness window.
	pub fn get_fresh(&self, key: &str, now: DateTime<Utc>) -> Option<V> {
		self.entries
			.get(key)
			.filter(|e| now - e.fetched_at < self.stale_after)
			.map(|e| e.value.clone())
	}

	pub fn insert(&mut self, key: impl Into<String>, value: V, now: DateTime<Utc>) {
		self.entries.insert(
			key.into(),
			Entry {
				value,
				fetched_at: now,
			},
		);
	}

	pub fn invalidate(&mut self, key: &str) {
		self.entries.remove(key);
	}

	pub fn evict_expired(&mut self, now: DateTime<Utc>) {
		let evict_after = self.evict_after;
		self.entries.retain(|_, e| now - e.fetched_at < evict_after);
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn cache() -> QueryCache<u32> {
		QueryCache::new(Duration::minutes(5), Duration::minutes(10))
	}

	#[test]
	fn fresh_entries_are_served() {
		let t0 = Utc::now();
		let mut c = cache();
		c.insert("splunk-data", 7, t0);
		assert_eq!(c.get_fresh("splunk-data", t0 + Duration::minutes(4)), Some(7));
		assert_eq!(c.get_fresh("splunk-data", t0 + Duration::minutes(5)), None);
		assert_eq!(c.get_fresh("other", t0), None);
	}

	#[test]
	fn eviction_drops_only_expired() {
		let t0 = Utc::now();
		let mut c = cache();
		c.insert("old", 1, t0);
		c.insert("new", 2, t0 + Duration::minutes(8));
		c.evict_expired(t0 + Duration::minutes(11));
		assert_eq!(c.len(), 1);
		assert_eq!(c.get_fresh("new", t0 + Duration::minutes(11)), Some(2));
	}

	#[test]
	fn invalidate_forces_refetch() {
		let t0 = Utc::now();
		let mut c = cache();
		c.insert("k", 1, t0);
		c.invalidate("k");
		assert!(c.is_empty());
	}
}
