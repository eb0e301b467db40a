//! Read path: fetching snapshots from the order service into the cache.
//!
//! A completed fetch is one of the two sanctioned writers of the query cache;
//! it replaces the entry under its key wholesale. A failed fetch leaves the
//! cache as it was.

use crate::DeskError;
use orderdesk_cache::QueryCache;
use orderdesk_client::OrderServiceClient;
use orderdesk_types::{truncate_id, OrderDetail, OrderPage, OrdersQuery, QueryData, QueryKey};
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Fetches order lists and details, honouring the staleness policy.
pub struct QueryService {
	client: Arc<OrderServiceClient>,
	cache: Arc<QueryCache>,
	stale_after: Duration,
	per_page: u32,
}

impl QueryService {
	pub fn new(
		client: Arc<OrderServiceClient>,
		cache: Arc<QueryCache>,
		stale_after: Duration,
		per_page: u32,
	) -> Self {
		Self {
			client,
			cache,
			stale_after,
			per_page,
		}
	}

	/// Query for the given page with the configured page size and no filters.
	pub fn page_query(&self, page_index: u32) -> OrdersQuery {
		OrdersQuery::page(page_index, self.per_page)
	}

	/// Fetches a page from the service and stores it, bypassing any cached copy.
	#[instrument(skip_all, fields(page = query.page_index))]
	pub async fn fetch_orders(&self, query: &OrdersQuery) -> Result<OrderPage, DeskError> {
		let key = QueryKey::orders(query.clone());
		let page = match self.client.list_orders(query).await {
			Ok(page) => page,
			Err(e) => {
				tracing::warn!(key = %key, error = %e, "Order list fetch failed");
				return Err(DeskError::FetchFailed {
					key,
					reason: e.to_string(),
				});
			},
		};

		self.cache
			.store(key.clone(), QueryData::Orders(page.clone()))
			.map_err(|e| DeskError::FetchFailed {
				key,
				reason: e.to_string(),
			})?;
		tracing::debug!(rows = page.orders.len(), total = page.meta.total_count, "Fetched orders");
		Ok(page)
	}

	/// Fetches one order detail and stores it, bypassing any cached copy.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id)))]
	pub async fn fetch_order_detail(&self, order_id: &str) -> Result<OrderDetail, DeskError> {
		let key = QueryKey::order(order_id);
		let detail = match self.client.get_order_detail(order_id).await {
			Ok(detail) => detail,
			Err(e) => {
				tracing::warn!(key = %key, error = %e, "Order detail fetch failed");
				return Err(DeskError::FetchFailed {
					key,
					reason: e.to_string(),
				});
			},
		};

		self.cache
			.store(key.clone(), QueryData::Order(detail.clone()))
			.map_err(|e| DeskError::FetchFailed {
				key,
				reason: e.to_string(),
			})?;
		Ok(detail)
	}

	/// Serves a fresh cached page, or fetches it.
	pub async fn orders(&self, query: &OrdersQuery) -> Result<OrderPage, DeskError> {
		let key = QueryKey::orders(query.clone());
		if let Some(page) = self.fresh(&key).and_then(|data| data.as_page().cloned()) {
			return Ok(page);
		}
		self.fetch_orders(query).await
	}

	/// Serves a fresh cached detail, or fetches it.
	pub async fn order_detail(&self, order_id: &str) -> Result<OrderDetail, DeskError> {
		let key = QueryKey::order(order_id);
		if let Some(detail) = self.fresh(&key).and_then(|data| data.as_detail().cloned()) {
			return Ok(detail);
		}
		self.fetch_order_detail(order_id).await
	}

	fn fresh(&self, key: &QueryKey) -> Option<Arc<QueryData>> {
		self.cache
			.snapshot(key)
			.filter(|snapshot| snapshot.is_fresh(self.stale_after))
			.map(|snapshot| snapshot.data)
	}

	/// Marks a cached snapshot stale so the next read refetches it.
	pub fn invalidate(&self, key: &QueryKey) -> bool {
		self.cache.invalidate(key)
	}
}
