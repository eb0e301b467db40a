//! Core of the orderdesk system.
//!
//! Wires the query cache, the order service client and the components that
//! operate on them:
//! - [`QueryService`]: the read path, storing fetched snapshots in the cache
//! - [`MutationDispatcher`]: guarded status mutations against the service
//! - [`CacheSynchronizer`]: the patch applied to the cache after a mutation
//! - [`RowController`]: per-row actions with in-flight tracking and notices
//!
//! An [`OrderDesk`] owns one instance of each, sharing a single cache.

pub mod builder;
pub mod controller;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod queries;
pub mod synchronizer;

pub use builder::{BuilderError, DeskBuilder, DeskFactories};
pub use controller::{ActionState, RowController, RowView};
pub use dispatcher::MutationDispatcher;
pub use engine::event_bus::EventBus;
pub use engine::maintenance::Maintenance;
pub use error::DeskError;
pub use queries::QueryService;
pub use synchronizer::CacheSynchronizer;

use orderdesk_cache::QueryCache;
use orderdesk_client::OrderServiceClient;
use orderdesk_config::Config;
use orderdesk_types::DeskEvent;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Capacity of the desk event bus.
const EVENT_BUS_CAPACITY: usize = 1000;

/// One operator session: a cache and the components sharing it.
pub struct OrderDesk {
	config: Config,
	cache: Arc<QueryCache>,
	client: Arc<OrderServiceClient>,
	event_bus: EventBus,
	queries: QueryService,
	dispatcher: Arc<MutationDispatcher>,
	controller: RowController,
}

impl OrderDesk {
	pub fn new(config: Config, client: Arc<OrderServiceClient>) -> Self {
		let cache = Arc::new(QueryCache::new());
		let event_bus = EventBus::new(EVENT_BUS_CAPACITY);

		let queries = QueryService::new(
			client.clone(),
			cache.clone(),
			config.cache.stale_after(),
			config.orders.per_page,
		);
		let synchronizer = CacheSynchronizer::new(cache.clone(), config.cache.patch_detail_entries);
		let dispatcher = Arc::new(MutationDispatcher::new(
			client.clone(),
			synchronizer,
			event_bus.clone(),
		));
		let controller = RowController::new(dispatcher.clone(), cache.clone(), event_bus.clone());

		Self {
			config,
			cache,
			client,
			event_bus,
			queries,
			dispatcher,
			controller,
		}
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	pub fn cache(&self) -> &Arc<QueryCache> {
		&self.cache
	}

	pub fn client(&self) -> &Arc<OrderServiceClient> {
		&self.client
	}

	pub fn queries(&self) -> &QueryService {
		&self.queries
	}

	pub fn dispatcher(&self) -> &MutationDispatcher {
		&self.dispatcher
	}

	pub fn controller(&self) -> &RowController {
		&self.controller
	}

	pub fn event_bus(&self) -> &EventBus {
		&self.event_bus
	}

	pub fn subscribe(&self) -> broadcast::Receiver<DeskEvent> {
		self.event_bus.subscribe()
	}

	/// Starts cache garbage collection and the cache event relay.
	///
	/// The tasks run until the returned handle is dropped.
	pub fn start_maintenance(&self) -> Maintenance {
		tracing::info!(
			desk_id = %self.config.desk.id,
			gc_after_seconds = self.config.cache.gc_after_seconds,
			interval_seconds = self.config.cache.cleanup_interval_seconds,
			"Starting cache maintenance"
		);
		Maintenance::start(
			self.cache.clone(),
			self.event_bus.clone(),
			self.config.cache.gc_after(),
			self.config.cache.cleanup_interval(),
		)
	}
}
