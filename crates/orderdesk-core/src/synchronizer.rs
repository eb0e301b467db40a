//! Cache synchronizer.
//!
//! After the order service confirms a transition, every cached list page that
//! holds the order gets a copy of that page with the row's status replaced.
//! Nothing else in the row and no other row changes. Pages without the order
//! keep their stored `Arc`. Detail entries are only patched when
//! `patch_details` is set.
//!
//! The whole rewrite is one [`QueryCache::patch_batch`] call, so it is applied
//! to every matching entry or to none of them.

use crate::DeskError;
use orderdesk_cache::{CacheError, Patch, QueryCache};
use orderdesk_types::{
	truncate_id, CacheEvent, OrderStatus, QueryData, QueryKey, TransitionError,
};
use std::sync::Arc;
use tracing::instrument;

#[derive(Clone)]
pub struct CacheSynchronizer {
	cache: Arc<QueryCache>,
	patch_details: bool,
}

impl CacheSynchronizer {
	pub fn new(cache: Arc<QueryCache>, patch_details: bool) -> Self {
		Self {
			cache,
			patch_details,
		}
	}

	pub fn patches_details(&self) -> bool {
		self.patch_details
	}

	/// Moves `order_id` to `new_status` in every cached snapshot holding it.
	///
	/// Rows already at `new_status` are left as they are. A row that cannot
	/// reach `new_status` through legal transitions aborts the batch.
	///
	/// Returns the keys of the rewritten entries.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id), status = %new_status))]
	pub fn apply_status_change(
		&self,
		order_id: &str,
		new_status: OrderStatus,
	) -> Result<Vec<QueryKey>, DeskError> {
		let patched = self
			.cache
			.patch_batch(|key, data| self.patch_entry(key, data, order_id, new_status))
			.map_err(|e| DeskError::CacheSync {
				order_id: order_id.to_string(),
				reason: e.to_string(),
			})?;

		tracing::debug!(entries = patched.len(), "Synchronized cached snapshots");
		Ok(patched)
	}

	fn patch_entry(
		&self,
		key: &QueryKey,
		data: &QueryData,
		order_id: &str,
		new_status: OrderStatus,
	) -> Result<Option<Patch>, CacheError> {
		let rejected = |e: TransitionError| CacheError::PatchRejected {
			key: key.clone(),
			reason: e.to_string(),
		};

		let data = match data {
			QueryData::Orders(page) => {
				let Some(position) = page.orders.iter().position(|row| row.order_id == order_id)
				else {
					return Ok(None);
				};
				let row = &page.orders[position];
				if row.status() == new_status {
					return Ok(None);
				}

				let mut page = page.clone();
				page.orders[position] = row.advanced_to(new_status).map_err(rejected)?;
				QueryData::Orders(page)
			},
			QueryData::Order(detail) => {
				if !self.patch_details || detail.id != order_id || detail.status() == new_status {
					return Ok(None);
				}
				QueryData::Order(detail.advanced_to(new_status).map_err(rejected)?)
			},
		};

		Ok(Some(Patch {
			data,
			event: CacheEvent::Patched {
				key: key.clone(),
				order_id: order_id.to_string(),
				status: new_status,
			},
		}))
	}

	/// Keys of the cached snapshots, lists and details, currently holding `order_id`.
	pub fn entries_holding(&self, order_id: &str) -> Vec<QueryKey> {
		self.cache
			.keys()
			.into_iter()
			.filter(|key| {
				self.cache.get(key).is_some_and(|data| match data.as_ref() {
					QueryData::Orders(page) => page.contains(order_id),
					QueryData::Order(detail) => detail.id == order_id,
				})
			})
			.collect()
	}

	/// Marks every cached snapshot holding `order_id` stale.
	///
	/// Used when a confirmed mutation could not be patched in, so the next
	/// read refetches instead of serving the outdated row.
	pub fn invalidate_holding(&self, order_id: &str) -> usize {
		self.entries_holding(order_id)
			.iter()
			.filter(|key| self.cache.invalidate(key))
			.count()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::{TimeZone, Utc};
	use orderdesk_types::{
		Customer, OrderDetail, OrderPage, OrderSummary, OrdersQuery, PageMeta,
	};

	fn row(id: &str, status: OrderStatus, customer: &str, total: u64) -> OrderSummary {
		let created_at = Utc.with_ymd_and_hms(2024, 3, 1, 18, 30, 0).unwrap();
		OrderSummary::new(id, created_at, status, customer, total)
	}

	fn page(rows: Vec<OrderSummary>) -> QueryData {
		let total_count = rows.len() as u64;
		QueryData::Orders(OrderPage {
			orders: rows,
			meta: PageMeta {
				page_index: 0,
				per_page: 10,
				total_count,
			},
		})
	}

	fn detail(id: &str, status: OrderStatus) -> QueryData {
		QueryData::Order(OrderDetail::new(
			id,
			status,
			Utc.with_ymd_and_hms(2024, 3, 1, 18, 30, 0).unwrap(),
			8000,
			Customer {
				name: "Ana".into(),
				email: "ana@example.com".into(),
				phone: None,
			},
			vec![],
		))
	}

	fn all_orders() -> QueryKey {
		QueryKey::orders(OrdersQuery::page(0, 10))
	}

	fn pending_only() -> QueryKey {
		QueryKey::orders(OrdersQuery::page(0, 10).with_status(OrderStatus::Pending))
	}

	fn seeded_cache() -> Arc<QueryCache> {
		let cache = Arc::new(QueryCache::new());
		cache
			.store(
				all_orders(),
				page(vec![
					row("o1", OrderStatus::Pending, "Ana", 8000),
					row("o2", OrderStatus::Processing, "Bruno", 3000),
				]),
			)
			.unwrap();
		cache
			.store(pending_only(), page(vec![row("o1", OrderStatus::Pending, "Ana", 8000)]))
			.unwrap();
		cache
			.store(QueryKey::order("o1"), detail("o1", OrderStatus::Pending))
			.unwrap();
		cache
			.store(
				QueryKey::orders(OrdersQuery::page(1, 10)),
				page(vec![row("o3", OrderStatus::Pending, "Carla", 1200)]),
			)
			.unwrap();
		cache
	}

	#[test]
	fn test_status_fans_out_to_every_list_entry() {
		let cache = seeded_cache();
		let detail_before = cache.get(&QueryKey::order("o1")).unwrap();
		let other_page_before = cache.get(&QueryKey::orders(OrdersQuery::page(1, 10))).unwrap();

		let synchronizer = CacheSynchronizer::new(cache.clone(), false);
		let mut patched = synchronizer
			.apply_status_change("o1", OrderStatus::Processing)
			.unwrap();
		patched.sort_by_key(|key| key.to_string());
		let mut expected = vec![all_orders(), pending_only()];
		expected.sort_by_key(|key| key.to_string());
		assert_eq!(patched, expected);

		for key in [all_orders(), pending_only()] {
			let data = cache.get(&key).unwrap();
			let o1 = data.as_page().unwrap().find("o1").unwrap().clone();
			assert_eq!(o1.status(), OrderStatus::Processing);
			assert_eq!(o1, row("o1", OrderStatus::Processing, "Ana", 8000));
		}

		let all = cache.get(&all_orders()).unwrap();
		assert_eq!(
			all.as_page().unwrap().find("o2"),
			Some(&row("o2", OrderStatus::Processing, "Bruno", 3000))
		);
		assert!(Arc::ptr_eq(&cache.get(&QueryKey::order("o1")).unwrap(), &detail_before));
		assert!(Arc::ptr_eq(
			&cache.get(&QueryKey::orders(OrdersQuery::page(1, 10))).unwrap(),
			&other_page_before
		));
	}

	#[test]
	fn test_detail_entries_patched_when_enabled() {
		let cache = seeded_cache();
		let synchronizer = CacheSynchronizer::new(cache.clone(), true);

		let patched = synchronizer
			.apply_status_change("o1", OrderStatus::Canceled)
			.unwrap();
		assert_eq!(patched.len(), 3);

		let detail = cache.get(&QueryKey::order("o1")).unwrap();
		assert_eq!(detail.as_detail().unwrap().status(), OrderStatus::Canceled);
	}

	#[test]
	fn test_stale_row_is_advanced_across_several_steps() {
		let cache = seeded_cache();
		let synchronizer = CacheSynchronizer::new(cache.clone(), false);

		synchronizer
			.apply_status_change("o1", OrderStatus::Delivering)
			.unwrap();
		let data = cache.get(&all_orders()).unwrap();
		assert_eq!(
			data.as_page().unwrap().find("o1").unwrap().status(),
			OrderStatus::Delivering
		);
	}

	#[test]
	fn test_unreachable_status_aborts_whole_batch() {
		let cache = Arc::new(QueryCache::new());
		cache
			.store(all_orders(), page(vec![row("o1", OrderStatus::Pending, "Ana", 8000)]))
			.unwrap();
		cache
			.store(pending_only(), page(vec![row("o1", OrderStatus::Delivered, "Ana", 8000)]))
			.unwrap();
		let before: Vec<_> = [all_orders(), pending_only()]
			.iter()
			.map(|key| cache.get(key).unwrap())
			.collect();

		let synchronizer = CacheSynchronizer::new(cache.clone(), false);
		let result = synchronizer.apply_status_change("o1", OrderStatus::Processing);
		assert!(matches!(result, Err(DeskError::CacheSync { .. })));

		for (key, before) in [all_orders(), pending_only()].iter().zip(before) {
			assert!(Arc::ptr_eq(&cache.get(key).unwrap(), &before));
		}
	}

	#[test]
	fn test_row_already_at_status_is_untouched() {
		let cache = seeded_cache();
		let before = cache.get(&all_orders()).unwrap();
		let synchronizer = CacheSynchronizer::new(cache.clone(), false);

		let patched = synchronizer
			.apply_status_change("o2", OrderStatus::Processing)
			.unwrap();
		assert!(patched.is_empty());
		assert!(Arc::ptr_eq(&cache.get(&all_orders()).unwrap(), &before));
	}

	#[test]
	fn test_entries_holding() {
		let cache = seeded_cache();
		let synchronizer = CacheSynchronizer::new(cache, false);

		assert_eq!(synchronizer.entries_holding("o1").len(), 3);
		assert_eq!(synchronizer.entries_holding("o3").len(), 1);
		assert!(synchronizer.entries_holding("o9").is_empty());

		assert_eq!(synchronizer.invalidate_holding("o3"), 1);
		let stale = synchronizer
			.cache
			.snapshot(&QueryKey::orders(OrdersQuery::page(1, 10)))
			.unwrap();
		assert!(stale.invalidated);
	}
}
