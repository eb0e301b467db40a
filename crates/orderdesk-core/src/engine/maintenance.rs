//! Background tasks that keep the query cache tidy.
//!
//! Two tasks run for the lifetime of a [`Maintenance`] handle:
//! - garbage collection, discarding snapshots older than `gc_after`;
//! - a relay republishing every cache write on the desk event bus.
//!
//! Dropping the handle aborts both.

use crate::engine::event_bus::EventBus;
use orderdesk_cache::QueryCache;
use orderdesk_types::DeskEvent;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

pub struct Maintenance {
	handles: Vec<JoinHandle<()>>,
}

impl Maintenance {
	pub fn start(
		cache: Arc<QueryCache>,
		event_bus: EventBus,
		gc_after: Duration,
		cleanup_interval: Duration,
	) -> Self {
		let mut events = cache.subscribe();
		let relay = tokio::spawn(async move {
			loop {
				match events.recv().await {
					Ok(event) => {
						event_bus.publish(DeskEvent::Cache(event));
					},
					Err(RecvError::Lagged(skipped)) => {
						tracing::warn!(skipped, "Cache event relay lagged");
					},
					Err(RecvError::Closed) => break,
				}
			}
		});

		let cleanup = tokio::spawn(async move {
			let mut interval = tokio::time::interval(cleanup_interval);
			loop {
				interval.tick().await;
				let removed = cache.cleanup_expired(gc_after);
				if removed > 0 {
					tracing::debug!("Cache cleanup: removed {} expired entries", removed);
				}
			}
		});

		Self {
			handles: vec![relay, cleanup],
		}
	}

	/// Stops both tasks.
	pub fn stop(self) {}
}

impl Drop for Maintenance {
	fn drop(&mut self) {
		for handle in &self.handles {
			handle.abort();
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use orderdesk_types::{CacheEvent, OrderPage, OrdersQuery, PageMeta, QueryData, QueryKey};

	fn empty_page() -> QueryData {
		QueryData::Orders(OrderPage {
			orders: vec![],
			meta: PageMeta {
				page_index: 0,
				per_page: 10,
				total_count: 0,
			},
		})
	}

	#[tokio::test(start_paused = true)]
	async fn test_expired_entries_are_collected() {
		let cache = Arc::new(QueryCache::new());
		cache
			.store(QueryKey::orders(OrdersQuery::page(0, 10)), empty_page())
			.unwrap();

		let maintenance = Maintenance::start(
			cache.clone(),
			EventBus::new(16),
			Duration::from_secs(300),
			Duration::from_secs(60),
		);

		tokio::time::sleep(Duration::from_secs(240)).await;
		assert_eq!(cache.len(), 1);

		tokio::time::sleep(Duration::from_secs(90)).await;
		assert!(cache.is_empty());

		maintenance.stop();
	}

	#[tokio::test]
	async fn test_cache_writes_are_relayed() {
		let cache = Arc::new(QueryCache::new());
		let bus = EventBus::new(16);
		let mut events = bus.subscribe();
		let _maintenance = Maintenance::start(
			cache.clone(),
			bus,
			Duration::from_secs(300),
			Duration::from_secs(60),
		);

		let key = QueryKey::orders(OrdersQuery::page(0, 10));
		cache.store(key.clone(), empty_page()).unwrap();

		match events.recv().await.unwrap() {
			DeskEvent::Cache(event) => assert_eq!(event, CacheEvent::Stored { key }),
			other => panic!("unexpected event {:?}", other),
		}
	}
}
