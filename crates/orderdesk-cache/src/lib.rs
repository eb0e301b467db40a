//! Query cache for the orderdesk system.
//!
//! The cache is a keyed store of previously fetched snapshots: list pages and
//! single-order details. It is owned by the application session and handed to
//! its users explicitly; there is no global instance.
//!
//! Two write paths exist:
//! - [`QueryCache::store`], used when a fetch completes, replaces an entry wholesale.
//! - [`QueryCache::patch_batch`], used after a successful mutation, rewrites
//!   several entries atomically. Either every patch is committed or none is.
//!
//! Every write is announced on a broadcast channel so consumers can re-render.
//! The API is synchronous: a patch holds the lock from the first
//! scanned entry to the last committed one and never yields in between.

use orderdesk_types::{CacheEvent, QueryData, QueryFamily, QueryKey};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::time::Instant;

/// Capacity of the change notification channel.
const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Errors that can occur during cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
	/// The snapshot does not belong to the family its key addresses.
	#[error("Snapshot of family '{actual}' cannot be stored under key '{key}'")]
	FamilyMismatch { key: QueryKey, actual: &'static str },
	/// A patch could not be computed; nothing was committed.
	#[error("Patch rejected for '{key}': {reason}")]
	PatchRejected { key: QueryKey, reason: String },
}

/// A replacement computed by a [`QueryCache::patch_batch`] closure.
#[derive(Debug)]
pub struct Patch {
	/// New snapshot for the entry.
	pub data: QueryData,
	/// Event announced once the batch is committed.
	pub event: CacheEvent,
}

/// Read-only view of one entry.
#[derive(Debug, Clone)]
pub struct Snapshot {
	pub data: Arc<QueryData>,
	/// Time since the snapshot was fetched. Patches do not reset it.
	pub age: Duration,
	/// Set by [`QueryCache::invalidate`].
	pub invalidated: bool,
}

impl Snapshot {
	/// Whether the snapshot may be served without refetching.
	pub fn is_fresh(&self, stale_after: Duration) -> bool {
		!self.invalidated && self.age < stale_after
	}
}

#[derive(Debug)]
struct CacheEntry {
	data: Arc<QueryData>,
	fetched_at: Instant,
	invalidated: bool,
}

/// Process-wide store of query snapshots.
pub struct QueryCache {
	entries: RwLock<HashMap<QueryKey, CacheEntry>>,
	events: broadcast::Sender<CacheEvent>,
}

impl QueryCache {
	pub fn new() -> Self {
		Self::with_event_capacity(DEFAULT_EVENT_CAPACITY)
	}

	pub fn with_event_capacity(capacity: usize) -> Self {
		let (events, _) = broadcast::channel(capacity.max(1));
		Self {
			entries: RwLock::new(HashMap::new()),
			events,
		}
	}

	/// Subscribes to every subsequent write.
	pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
		self.events.subscribe()
	}

	// Commits never fail midway, so a poisoned lock still guards a whole map.
	fn read(&self) -> RwLockReadGuard<'_, HashMap<QueryKey, CacheEntry>> {
		self.entries.read().unwrap_or_else(PoisonError::into_inner)
	}

	fn write(&self) -> RwLockWriteGuard<'_, HashMap<QueryKey, CacheEntry>> {
		self.entries.write().unwrap_or_else(PoisonError::into_inner)
	}

	fn notify(&self, event: CacheEvent) {
		// No subscribers is not an error.
		self.events.send(event).ok();
	}

	/// Returns the snapshot stored under `key`.
	pub fn get(&self, key: &QueryKey) -> Option<Arc<QueryData>> {
		self.read().get(key).map(|entry| Arc::clone(&entry.data))
	}

	/// Returns the snapshot under `key` together with its age and invalidation flag.
	pub fn snapshot(&self, key: &QueryKey) -> Option<Snapshot> {
		self.read().get(key).map(|entry| Snapshot {
			data: Arc::clone(&entry.data),
			age: entry.fetched_at.elapsed(),
			invalidated: entry.invalidated,
		})
	}

	pub fn contains(&self, key: &QueryKey) -> bool {
		self.read().contains_key(key)
	}

	/// Every key currently cached.
	pub fn keys(&self) -> Vec<QueryKey> {
		self.read().keys().cloned().collect()
	}

	/// Keys of the given family.
	pub fn keys_in(&self, family: QueryFamily) -> Vec<QueryKey> {
		self.read()
			.keys()
			.filter(|key| key.family() == family)
			.cloned()
			.collect()
	}

	pub fn len(&self) -> usize {
		self.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.read().is_empty()
	}

	/// Stores a freshly fetched snapshot, replacing any previous one.
	pub fn store(&self, key: QueryKey, data: QueryData) -> Result<Arc<QueryData>, CacheError> {
		if key.family() != data.family() {
			return Err(CacheError::FamilyMismatch {
				key,
				actual: data.family().as_str(),
			});
		}

		let data = Arc::new(data);
		self.write().insert(
			key.clone(),
			CacheEntry {
				data: Arc::clone(&data),
				fetched_at: Instant::now(),
				invalidated: false,
			},
		);
		tracing::trace!(key = %key, "Stored snapshot");
		self.notify(CacheEvent::Stored { key });
		Ok(data)
	}

	/// Marks an entry stale so the next read refetches it. The data is kept.
	///
	/// Returns false when nothing is cached under `key`.
	pub fn invalidate(&self, key: &QueryKey) -> bool {
		let found = match self.write().get_mut(key) {
			Some(entry) => {
				entry.invalidated = true;
				true
			}
			None => false,
		};
		if found {
			self.notify(CacheEvent::Invalidated { key: key.clone() });
		}
		found
	}

	/// Discards the entry stored under `key`.
	pub fn remove(&self, key: &QueryKey) -> bool {
		let removed = self.write().remove(key).is_some();
		if removed {
			self.notify(CacheEvent::Removed { key: key.clone() });
		}
		removed
	}

	/// Discards entries fetched at least `max_age` ago.
	///
	/// Returns the number of entries removed.
	pub fn cleanup_expired(&self, max_age: Duration) -> usize {
		let expired: Vec<QueryKey> = {
			let mut entries = self.write();
			let expired: Vec<QueryKey> = entries
				.iter()
				.filter(|(_, entry)| entry.fetched_at.elapsed() >= max_age)
				.map(|(key, _)| key.clone())
				.collect();
			for key in &expired {
				entries.remove(key);
			}
			expired
		};

		let count = expired.len();
		for key in expired {
			self.notify(CacheEvent::Removed { key });
		}
		count
	}

	/// Rewrites several entries as one atomic step.
	///
	/// `patch` is called once per cached entry while the write lock is held.
	/// It returns `Ok(None)` to leave the entry untouched, `Ok(Some(patch))`
	/// to replace its snapshot, or an error to abort the whole batch. Nothing
	/// is committed unless every call succeeds. Untouched entries keep their
	/// `Arc`, so consumers comparing by pointer see no change.
	///
	/// Returns the keys that were replaced.
	pub fn patch_batch<F>(&self, mut patch: F) -> Result<Vec<QueryKey>, CacheError>
	where
		F: FnMut(&QueryKey, &QueryData) -> Result<Option<Patch>, CacheError>,
	{
		let events = {
			let mut entries = self.write();

			let mut staged = Vec::new();
			for (key, entry) in entries.iter() {
				if let Some(replacement) = patch(key, &entry.data)? {
					if replacement.data.family() != key.family() {
						return Err(CacheError::FamilyMismatch {
							key: key.clone(),
							actual: replacement.data.family().as_str(),
						});
					}
					staged.push((key.clone(), replacement));
				}
			}

			let mut events = Vec::with_capacity(staged.len());
			for (key, replacement) in staged {
				if let Some(entry) = entries.get_mut(&key) {
					entry.data = Arc::new(replacement.data);
				}
				events.push((key, replacement.event));
			}
			events
		};

		let mut keys = Vec::with_capacity(events.len());
		for (key, event) in events {
			self.notify(event);
			keys.push(key);
		}
		Ok(keys)
	}
}

impl Default for QueryCache {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::{TimeZone, Utc};
	use orderdesk_types::{
		Customer, OrderDetail, OrderPage, OrderStatus, OrderSummary, OrdersQuery, PageMeta,
	};

	fn page(ids: &[&str]) -> QueryData {
		let created_at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
		QueryData::Orders(OrderPage {
			orders: ids
				.iter()
				.map(|id| OrderSummary::new(*id, created_at, OrderStatus::Pending, "Ana", 1000))
				.collect(),
			meta: PageMeta {
				page_index: 0,
				per_page: 10,
				total_count: ids.len() as u64,
			},
		})
	}

	fn detail(id: &str) -> QueryData {
		QueryData::Order(OrderDetail::new(
			id,
			OrderStatus::Pending,
			Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
			1000,
			Customer {
				name: "Ana".into(),
				email: "ana@example.com".into(),
				phone: None,
			},
			vec![],
		))
	}

	fn list_key(page_index: u32) -> QueryKey {
		QueryKey::orders(OrdersQuery::page(page_index, 10))
	}

	#[test]
	fn test_store_and_get() {
		let cache = QueryCache::new();
		assert!(cache.is_empty());

		cache.store(list_key(0), page(&["A", "B"])).unwrap();
		cache.store(QueryKey::order("A"), detail("A")).unwrap();

		assert_eq!(cache.len(), 2);
		assert_eq!(cache.get(&list_key(0)).unwrap().as_page().unwrap().orders.len(), 2);
		assert!(cache.get(&list_key(1)).is_none());
		assert_eq!(cache.keys_in(QueryFamily::Orders), vec![list_key(0)]);
	}

	#[test]
	fn test_store_rejects_family_mismatch() {
		let cache = QueryCache::new();
		let result = cache.store(QueryKey::order("A"), page(&["A"]));
		assert!(matches!(result, Err(CacheError::FamilyMismatch { .. })));
		assert!(cache.is_empty());
	}

	#[test]
	fn test_invalidate_keeps_data() {
		let cache = QueryCache::new();
		let stored = cache.store(list_key(0), page(&["A"])).unwrap();

		assert!(cache.snapshot(&list_key(0)).unwrap().is_fresh(Duration::from_secs(60)));
		assert!(cache.invalidate(&list_key(0)));
		assert!(!cache.invalidate(&list_key(1)));

		let snapshot = cache.snapshot(&list_key(0)).unwrap();
		assert!(snapshot.invalidated);
		assert!(!snapshot.is_fresh(Duration::from_secs(60)));
		assert!(Arc::ptr_eq(&snapshot.data, &stored));
	}

	#[test]
	fn test_cleanup_expired() {
		let cache = QueryCache::new();
		cache.store(list_key(0), page(&["A"])).unwrap();
		cache.store(list_key(1), page(&["B"])).unwrap();

		assert_eq!(cache.cleanup_expired(Duration::from_secs(3600)), 0);
		assert_eq!(cache.len(), 2);
		assert_eq!(cache.cleanup_expired(Duration::ZERO), 2);
		assert!(cache.is_empty());
	}

	#[test]
	fn test_patch_batch_commits_and_keeps_untouched_arcs() {
		let cache = QueryCache::new();
		cache.store(list_key(0), page(&["A"])).unwrap();
		let untouched = cache.store(list_key(1), page(&["B"])).unwrap();

		let patched = cache
			.patch_batch(|key, data| {
				let page = match data.as_page() {
					Some(page) if page.contains("A") => page,
					_ => return Ok(None),
				};
				let mut page = page.clone();
				page.meta.total_count = 99;
				Ok(Some(Patch {
					data: QueryData::Orders(page),
					event: CacheEvent::Invalidated { key: key.clone() },
				}))
			})
			.unwrap();

		assert_eq!(patched, vec![list_key(0)]);
		let after = cache.get(&list_key(0)).unwrap();
		assert_eq!(after.as_page().unwrap().meta.total_count, 99);
		assert!(Arc::ptr_eq(&cache.get(&list_key(1)).unwrap(), &untouched));
	}

	#[test]
	fn test_patch_batch_is_all_or_nothing() {
		let cache = QueryCache::new();
		let first = cache.store(list_key(0), page(&["A"])).unwrap();
		let second = cache.store(list_key(1), page(&["A"])).unwrap();

		let mut calls = 0;
		let result = cache.patch_batch(|key, data| {
			calls += 1;
			if calls == 2 {
				return Err(CacheError::PatchRejected {
					key: key.clone(),
					reason: "conflict".into(),
				});
			}
			Ok(Some(Patch {
				data: data.clone(),
				event: CacheEvent::Stored { key: key.clone() },
			}))
		});

		assert!(result.is_err());
		assert!(Arc::ptr_eq(&cache.get(&list_key(0)).unwrap(), &first));
		assert!(Arc::ptr_eq(&cache.get(&list_key(1)).unwrap(), &second));
	}

	#[tokio::test(start_paused = true)]
	async fn test_age_and_expiry_follow_clock() {
		let cache = QueryCache::new();
		cache.store(list_key(0), page(&["A"])).unwrap();

		tokio::time::advance(Duration::from_secs(30)).await;
		cache.store(list_key(1), page(&["B"])).unwrap();

		let old = cache.snapshot(&list_key(0)).unwrap();
		assert_eq!(old.age, Duration::from_secs(30));
		assert!(!old.is_fresh(Duration::from_secs(30)));
		assert!(cache.snapshot(&list_key(1)).unwrap().is_fresh(Duration::from_secs(30)));

		assert_eq!(cache.cleanup_expired(Duration::from_secs(30)), 1);
		assert_eq!(cache.keys(), vec![list_key(1)]);
	}

	#[tokio::test]
	async fn test_subscribers_see_writes() {
		let cache = QueryCache::new();
		let mut events = cache.subscribe();

		cache.store(list_key(0), page(&["A"])).unwrap();
		cache.invalidate(&list_key(0));
		cache.remove(&list_key(0));

		assert_eq!(
			events.recv().await.unwrap(),
			CacheEvent::Stored { key: list_key(0) }
		);
		assert_eq!(
			events.recv().await.unwrap(),
			CacheEvent::Invalidated { key: list_key(0) }
		);
		assert_eq!(
			events.recv().await.unwrap(),
			CacheEvent::Removed { key: list_key(0) }
		);
	}
}
