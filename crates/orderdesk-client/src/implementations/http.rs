//! HTTP order service implementation.
//!
//! Talks to the restaurant backend over its REST interface:
//!
//! - `GET {base}/orders?pageIndex=&perPage=&status=&customerName=&orderId=`
//! - `GET {base}/orders/{orderId}`
//! - `PATCH {base}/orders/{orderId}/{approve|cancel|dispatch|deliver}`
//!
//! Any transport error or non-2xx answer is returned as an error; nothing is
//! retried here.

use crate::{OrderServiceError, OrderServiceFactory, OrderServiceInterface, OrderServiceRegistry};
use async_trait::async_trait;
use orderdesk_types::{
	ImplementationRegistry, OrderAction, OrderDetail, OrderPage, OrdersQuery,
};
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// Configuration for the HTTP order service.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpServiceConfig {
	/// Base URL of the backend, e.g. `https://api.pizza.shop`.
	pub base_url: String,
	/// Optional bearer token sent with every request.
	#[serde(default)]
	pub auth_token: Option<String>,
}

/// HTTP implementation of the order service.
pub struct HttpOrderService {
	client: Client,
	base_url: Url,
	auth_token: Option<String>,
}

impl HttpOrderService {
	pub fn new(config: HttpServiceConfig) -> Result<Self, OrderServiceError> {
		let base_url = Url::parse(&config.base_url).map_err(|e| {
			OrderServiceError::Configuration(format!("Invalid base_url '{}': {}", config.base_url, e))
		})?;
		if !matches!(base_url.scheme(), "http" | "https") {
			return Err(OrderServiceError::Configuration(format!(
				"base_url must use http or https, got '{}'",
				base_url.scheme()
			)));
		}
		if base_url.cannot_be_a_base() {
			return Err(OrderServiceError::Configuration(format!(
				"base_url '{}' cannot carry a path",
				config.base_url
			)));
		}

		let client = Client::builder()
			.build()
			.map_err(|e| OrderServiceError::Configuration(e.to_string()))?;

		Ok(Self {
			client,
			base_url,
			auth_token: config.auth_token,
		})
	}

	/// Builds `{base}/{segments...}`, percent-encoding every segment.
	fn endpoint(&self, segments: &[&str]) -> Result<Url, OrderServiceError> {
		let mut url = self.base_url.clone();
		url.path_segments_mut()
			.map_err(|_| OrderServiceError::Configuration("base_url cannot carry a path".into()))?
			.pop_if_empty()
			.extend(segments);
		Ok(url)
	}

	fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
		match &self.auth_token {
			Some(token) => request.bearer_auth(token),
			None => request,
		}
	}

	async fn send(&self, request: reqwest::RequestBuilder) -> Result<Response, OrderServiceError> {
		let response = self
			.authorize(request)
			.send()
			.await
			.map_err(|e| OrderServiceError::Network(e.to_string()))?;

		let status = response.status();
		if status.is_success() {
			return Ok(response);
		}

		let message = response.text().await.unwrap_or_default();
		Err(OrderServiceError::Status {
			status: status.as_u16(),
			message,
		})
	}

	async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, OrderServiceError> {
		let bytes = response
			.bytes()
			.await
			.map_err(|e| OrderServiceError::Network(e.to_string()))?;
		serde_json::from_slice(&bytes).map_err(|e| OrderServiceError::Decode(e.to_string()))
	}

	async fn transition(&self, order_id: &str, action: OrderAction) -> Result<(), OrderServiceError> {
		let url = self.endpoint(&["orders", order_id, action.as_str()])?;
		self.send(self.client.patch(url)).await.map(|_| ())
	}
}

/// Query string for a list request. Absent filters are left out.
pub(crate) fn list_params(query: &OrdersQuery) -> Vec<(&'static str, String)> {
	let mut params = vec![
		("pageIndex", query.page_index.to_string()),
		("perPage", query.per_page.to_string()),
	];
	if let Some(status) = query.status {
		params.push(("status", status.as_str().to_string()));
	}
	if let Some(customer_name) = &query.customer_name {
		params.push(("customerName", customer_name.clone()));
	}
	if let Some(order_id) = &query.order_id {
		params.push(("orderId", order_id.clone()));
	}
	params
}

#[async_trait]
impl OrderServiceInterface for HttpOrderService {
	async fn list_orders(&self, query: &OrdersQuery) -> Result<OrderPage, OrderServiceError> {
		let url = self.endpoint(&["orders"])?;
		let request = self.client.get(url).query(&list_params(query));
		let response = self.send(request).await?;
		Self::decode(response).await
	}

	async fn get_order_detail(&self, order_id: &str) -> Result<OrderDetail, OrderServiceError> {
		let url = self.endpoint(&["orders", order_id])?;
		let response = self.send(self.client.get(url)).await.map_err(|e| match e {
			OrderServiceError::Status { status: 404, .. } => {
				OrderServiceError::NotFound(order_id.to_string())
			}
			other => other,
		})?;
		Self::decode(response).await
	}

	async fn approve_order(&self, order_id: &str) -> Result<(), OrderServiceError> {
		self.transition(order_id, OrderAction::Approve).await
	}

	async fn cancel_order(&self, order_id: &str) -> Result<(), OrderServiceError> {
		self.transition(order_id, OrderAction::Cancel).await
	}

	async fn dispatch_order(&self, order_id: &str) -> Result<(), OrderServiceError> {
		self.transition(order_id, OrderAction::Dispatch).await
	}

	async fn deliver_order(&self, order_id: &str) -> Result<(), OrderServiceError> {
		self.transition(order_id, OrderAction::Deliver).await
	}
}

/// Factory function to create an HTTP order service from configuration.
///
/// Configuration parameters:
/// - `base_url`: backend root URL (required)
/// - `auth_token`: bearer token (optional)
pub fn create_service(
	config: &toml::Value,
) -> Result<Box<dyn OrderServiceInterface>, OrderServiceError> {
	let http_config: HttpServiceConfig = config
		.clone()
		.try_into()
		.map_err(|e| OrderServiceError::Configuration(format!("Invalid http config: {}", e)))?;

	Ok(Box::new(HttpOrderService::new(http_config)?))
}

/// Registry for the HTTP order service implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "http";
	type Factory = OrderServiceFactory;

	fn factory() -> Self::Factory {
		create_service
	}
}

impl OrderServiceRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use orderdesk_types::OrderStatus;

	fn service(base_url: &str) -> HttpOrderService {
		HttpOrderService::new(HttpServiceConfig {
			base_url: base_url.to_string(),
			auth_token: None,
		})
		.unwrap()
	}

	#[test]
	fn test_endpoint_building() {
		let service = service("https://api.pizza.shop/");
		assert_eq!(
			service.endpoint(&["orders", "abc", "approve"]).unwrap().as_str(),
			"https://api.pizza.shop/orders/abc/approve"
		);

		let nested = self::service("http://localhost:3333/api");
		assert_eq!(
			nested.endpoint(&["orders", "a b"]).unwrap().as_str(),
			"http://localhost:3333/api/orders/a%20b"
		);
	}

	#[test]
	fn test_list_params_skip_absent_filters() {
		let params = list_params(&OrdersQuery::page(2, 10));
		assert_eq!(
			params,
			vec![("pageIndex", "2".to_string()), ("perPage", "10".to_string())]
		);

		let filtered = list_params(
			&OrdersQuery::page(0, 10)
				.with_status(OrderStatus::Delivering)
				.with_customer_name("Ana"),
		);
		assert!(filtered.contains(&("status", "delivering".to_string())));
		assert!(filtered.contains(&("customerName", "Ana".to_string())));
	}

	#[test]
	fn test_factory_validates_config() {
		let missing: toml::Value = toml::from_str("auth_token = \"x\"").unwrap();
		assert!(create_service(&missing).is_err());

		let bad_scheme: toml::Value = toml::from_str("base_url = \"ftp://example.com\"").unwrap();
		assert!(create_service(&bad_scheme).is_err());

		let ok: toml::Value = toml::from_str("base_url = \"http://localhost:3333\"").unwrap();
		assert!(create_service(&ok).is_ok());
	}

	#[test]
	fn test_list_response_shape() {
		let body = r#"{
			"orders": [
				{"orderId": "A", "createdAt": "2024-01-01T12:00:00Z", "status": "pending", "customerName": "Ana", "total": 8000}
			],
			"meta": {"pageIndex": 0, "perPage": 10, "totalCount": 1}
		}"#;
		let page: OrderPage = serde_json::from_str(body).unwrap();
		assert_eq!(page.orders[0].total_in_cents, 8000);
		assert_eq!(page.meta.total_count, 1);
	}
}
