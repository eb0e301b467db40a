//! Command-line entry point for the order desk.
//!
//! Lists orders, shows order details and applies status transitions through
//! the same core a graphical front end would use: reads go through the query
//! cache and every transition goes through the row controller.

use chrono::Utc;
use clap::{Parser, Subcommand};
use orderdesk_config::Config;
use orderdesk_core::{DeskBuilder, DeskFactories, OrderDesk};
use orderdesk_types::{DeskEvent, OrderAction, OrderStatus, OrdersQuery, QueryKey};
use std::path::PathBuf;
use tokio::sync::broadcast;

mod render;

// Import implementations from the client crate
use orderdesk_client::implementations::http::create_service as create_http_service;
use orderdesk_client::implementations::memory::create_service as create_memory_service;

/// Command-line arguments for the order desk.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config/demo.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "warn")]
	log_level: String,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// List one page of orders
	Orders {
		/// Zero-based page index
		#[arg(short, long, default_value_t = 0)]
		page: u32,
		/// Only orders with this status
		#[arg(short, long)]
		status: Option<OrderStatus>,
		/// Only orders whose customer name contains this text
		#[arg(long)]
		customer: Option<String>,
		/// Only orders whose id contains this text
		#[arg(long)]
		order_id: Option<String>,
	},
	/// Show the full detail of one order
	Show { order_id: String },
	/// Approve a pending order
	Approve { order_id: String },
	/// Cancel a pending or processing order
	Cancel { order_id: String },
	/// Dispatch a processing order
	Dispatch { order_id: String },
	/// Mark a delivering order as delivered
	Deliver { order_id: String },
}

impl Command {
	fn action(&self) -> Option<(OrderAction, &str)> {
		match self {
			Command::Approve { order_id } => Some((OrderAction::Approve, order_id)),
			Command::Cancel { order_id } => Some((OrderAction::Cancel, order_id)),
			Command::Dispatch { order_id } => Some((OrderAction::Dispatch, order_id)),
			Command::Deliver { order_id } => Some((OrderAction::Deliver, order_id)),
			Command::Orders { .. } | Command::Show { .. } => None,
		}
	}
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.with_writer(std::io::stderr)
		.init();

	let config_path = args
		.config
		.to_str()
		.ok_or("configuration path is not valid UTF-8")?;
	let config = Config::from_file(config_path).await?;
	tracing::info!("Loaded configuration [{}]", config.desk.id);

	let desk = build_desk(config)?;
	let _maintenance = desk.start_maintenance();

	run(&desk, args.command).await
}

/// Macro to create a factory HashMap with the appropriate type aliases
macro_rules! create_factory_map {
	($interface:path, $error:path, $( $name:literal => $factory:expr ),* $(,)?) => {{
		let mut factories = std::collections::HashMap::new();
		$(
			factories.insert(
				$name.to_string(),
				$factory as fn(&toml::Value) -> Result<Box<dyn $interface>, $error>
			);
		)*
		factories
	}};
}

/// Builds the desk with every order service implementation this binary ships.
fn build_desk(config: Config) -> Result<OrderDesk, Box<dyn std::error::Error>> {
	let service_factories = create_factory_map!(
		orderdesk_client::OrderServiceInterface,
		orderdesk_client::OrderServiceError,
		"http" => create_http_service,
		"memory" => create_memory_service,
	);

	Ok(DeskBuilder::new(config).build(DeskFactories { service_factories })?)
}

async fn run(desk: &OrderDesk, command: Command) -> Result<(), Box<dyn std::error::Error>> {
	if let Some((action, order_id)) = command.action() {
		return transition(desk, order_id, action).await;
	}

	match command {
		Command::Orders {
			page,
			status,
			customer,
			order_id,
		} => {
			let mut query = desk.queries().page_query(page);
			query.status = status;
			query.customer_name = customer;
			query.order_id = order_id;
			print_page(desk, &query).await
		},
		Command::Show { order_id } => {
			let detail = desk.queries().order_detail(&order_id).await?;
			print!("{}", render::detail(&detail, Utc::now()));
			Ok(())
		},
		_ => Ok(()),
	}
}

async fn print_page(desk: &OrderDesk, query: &OrdersQuery) -> Result<(), Box<dyn std::error::Error>> {
	let page = desk.queries().orders(query).await?;
	let rows = desk.controller().rows(&QueryKey::orders(query.clone()));
	print!("{}", render::page(&page, &rows, Utc::now()));
	Ok(())
}

/// Loads the row holding `order_id`, applies `action` and prints the outcome.
async fn transition(
	desk: &OrderDesk,
	order_id: &str,
	action: OrderAction,
) -> Result<(), Box<dyn std::error::Error>> {
	let query = desk.queries().page_query(0).with_order_id(order_id);
	let page = desk.queries().orders(&query).await?;
	if page.find(order_id).is_none() {
		return Err(format!("order '{}' not found", order_id).into());
	}

	let mut events = desk.subscribe();
	let key = QueryKey::orders(query.clone());
	let outcome = desk.controller().perform(&key, order_id, action).await;
	print_notices(&mut events);

	outcome?;
	print!("{}", render_cached(desk, &key)?);
	Ok(())
}

/// Renders the page held under `key` without refetching it.
fn render_cached(desk: &OrderDesk, key: &QueryKey) -> Result<String, Box<dyn std::error::Error>> {
	let data = desk
		.cache()
		.get(key)
		.ok_or("order list is no longer cached")?;
	let page = data.as_page().ok_or("cached entry is not an order list")?;
	let rows = desk.controller().rows(key);
	Ok(render::page(page, &rows, Utc::now()))
}

fn print_notices(events: &mut broadcast::Receiver<DeskEvent>) {
	while let Ok(event) = events.try_recv() {
		if let DeskEvent::Notice(notice) = event {
			println!("{}", render::notice(&notice));
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use orderdesk_config::builders::config::ConfigBuilder;
	use orderdesk_types::CacheEvent;
	use std::fs;
	use tempfile::TempDir;

	#[test]
	fn test_args_parse_subcommands() {
		let args = Args::parse_from(["orderdesk", "--log-level", "debug", "approve", "ord-1001"]);
		assert_eq!(args.log_level, "debug");
		assert_eq!(args.config, PathBuf::from("config/demo.toml"));
		assert_eq!(
			args.command.action(),
			Some((OrderAction::Approve, "ord-1001"))
		);

		let args = Args::parse_from([
			"orderdesk",
			"-c",
			"custom.toml",
			"orders",
			"--page",
			"2",
			"--status",
			"processing",
		]);
		assert_eq!(args.config, PathBuf::from("custom.toml"));
		match args.command {
			Command::Orders { page, status, .. } => {
				assert_eq!(page, 2);
				assert_eq!(status, Some(OrderStatus::Processing));
			},
			other => panic!("unexpected command {:?}", other),
		}
	}

	#[test]
	fn test_unknown_status_is_rejected() {
		let result = Args::try_parse_from(["orderdesk", "orders", "--status", "lost"]);
		assert!(result.is_err());
	}

	#[tokio::test]
	async fn test_transition_updates_listed_row() {
		let desk = build_desk(ConfigBuilder::new().build()).unwrap();

		transition(&desk, "ord-1003", OrderAction::Deliver).await.unwrap();

		let key = QueryKey::orders(desk.queries().page_query(0).with_order_id("ord-1003"));
		let row = desk.controller().row_view(&key, "ord-1003").unwrap();
		assert_eq!(row.status, OrderStatus::Delivered);
		assert!(row.actions.is_empty());
	}

	#[tokio::test]
	async fn test_transition_renders_synchronized_cache() {
		let desk = build_desk(ConfigBuilder::new().build()).unwrap();
		let key = QueryKey::orders(desk.queries().page_query(0).with_order_id("ord-1002"));
		let mut cache_events = desk.cache().subscribe();

		transition(&desk, "ord-1002", OrderAction::Dispatch).await.unwrap();

		let mut stores = 0;
		while let Ok(event) = cache_events.try_recv() {
			if matches!(event, CacheEvent::Stored { .. }) {
				stores += 1;
			}
		}
		assert_eq!(stores, 1);

		let text = render_cached(&desk, &key).unwrap();
		assert!(text.contains("Delivering"));
		assert!(text.contains("Deliver"));
		assert!(text.contains("Total of 1 item(s)."));
	}

	#[tokio::test]
	async fn test_transition_on_unknown_order_fails() {
		let desk = build_desk(ConfigBuilder::new().build()).unwrap();
		assert!(transition(&desk, "ord-9999", OrderAction::Approve).await.is_err());
	}

	#[tokio::test]
	async fn test_demo_config_file_loads() {
		let temp_dir = TempDir::new().unwrap();
		let path = temp_dir.path().join("desk.toml");
		fs::write(
			&path,
			r#"
[desk]
id = "tmp-desk"

[service]
primary = "memory"
[service.implementations.memory]
fail_actions = ["approve"]
"#,
		)
		.unwrap();

		let config = Config::from_file(path.to_str().unwrap()).await.unwrap();
		let desk = build_desk(config).unwrap();
		let result = transition(&desk, "ord-1001", OrderAction::Approve).await;
		assert!(result.is_err());
	}
}
