//! HTTP server for the gift order API.
//!
//! Exposes the engine's operations over a small REST surface plus one
//! server-sent-events endpoint for live order updates.

use axum::{
	extract::{Path, Query, State},
	response::sse::{Event, Sse},
	response::Json,
	routing::{get, post},
	Router,
};
use futures::{Stream, StreamExt};
use gift_config::ApiConfig;
use gift_core::OrderEngine;
use gift_types::{
	ApiError, CombinedView, GiftOrderRequest, ListOrdersResponse, PlaceOrderResponse, WebhookAck,
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	/// Reference to the order engine for processing requests.
	pub engine: Arc<OrderEngine>,
}

/// Builds the application router.
///
/// Kept separate from [`start_server`] so tests can drive the router
/// directly without binding a socket.
pub fn build_router(state: AppState) -> Router {
	Router::new()
		.nest(
			"/api",
			Router::new()
				.route("/orders", post(handle_place_order).get(handle_list_orders))
				.route("/orders/{id}", get(handle_refresh))
				.route("/orders/{id}/updates", get(handle_order_updates))
				.route("/webhooks/order-status", post(handle_webhook)),
		)
		.layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
		.with_state(state)
}

/// Starts the HTTP server for the API.
pub async fn start_server(
	api_config: &ApiConfig,
	engine: Arc<OrderEngine>,
) -> Result<(), Box<dyn std::error::Error>> {
	let app = build_router(AppState { engine });

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("Gift order API server starting on {}", bind_address);

	axum::serve(listener, app).await?;

	Ok(())
}

/// Handles POST /api/orders requests.
///
/// Places the order upstream and persists the resulting row. A local
/// persistence failure after a successful placement surfaces as a
/// warning on the success response, not an error.
async fn handle_place_order(
	State(state): State<AppState>,
	Json(request): Json<GiftOrderRequest>,
) -> Result<Json<PlaceOrderResponse>, ApiError> {
	match state.engine.place_order(&request).await {
		Ok(response) => Ok(Json(response)),
		Err(e) => {
			tracing::warn!("Order placement failed: {}", e);
			Err(e)
		}
	}
}

/// Handles POST /api/webhooks/order-status requests.
///
/// Acknowledges success even on internal failure; only a body with no
/// `request_id` is rejected.
async fn handle_webhook(
	State(state): State<AppState>,
	Json(body): Json<Value>,
) -> Result<Json<WebhookAck>, ApiError> {
	match state.engine.ingest(&body).await {
		Ok(ack) => Ok(Json(ack)),
		Err(e) => {
			tracing::warn!("Webhook rejected: {}", e);
			Err(e)
		}
	}
}

/// Handles GET /api/orders/{id} requests.
///
/// Returns the merged canonical view combining the stored row with a
/// live upstream lookup.
async fn handle_refresh(
	Path(id): Path<String>,
	State(state): State<AppState>,
) -> Result<Json<CombinedView>, ApiError> {
	match state.engine.refresh(&id).await {
		Ok(view) => Ok(Json(view)),
		Err(e) => {
			tracing::warn!(request_id = %id, "Status refresh failed: {}", e);
			Err(e)
		}
	}
}

/// Query parameters for the order listing endpoint.
#[derive(Debug, Deserialize)]
struct ListOrdersParams {
	email: String,
}

/// Handles GET /api/orders?email= requests.
///
/// Lists orders matched by reveal email, each annotated with a freshly
/// polled upstream status.
async fn handle_list_orders(
	Query(params): Query<ListOrdersParams>,
	State(state): State<AppState>,
) -> Result<Json<ListOrdersResponse>, ApiError> {
	if params.email.trim().is_empty() {
		return Err(ApiError::BadRequest {
			message: "email query parameter is required".to_string(),
		});
	}
	match state.engine.list_orders(&params.email).await {
		Ok(listing) => Ok(Json(listing)),
		Err(e) => {
			tracing::warn!("Order listing failed: {}", e);
			Err(e)
		}
	}
}

/// Handles GET /api/orders/{id}/updates requests.
///
/// Opens a server-sent-events stream of live order updates. Heartbeats
/// and the lifetime cap are produced by the engine's stream itself.
async fn handle_order_updates(
	Path(id): Path<String>,
	State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
	let events = state.engine.watch(&id).await;
	Sse::new(events.map(|event| Event::default().json_data(&event)))
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use axum::body::Body;
	use axum::http::{Request, StatusCode};
	use gift_core::LiveUpdateBroadcaster;
	use gift_fulfillment::{FulfillmentApi, FulfillmentError, UpstreamStatus};
	use gift_storage::implementations::memory::MemoryOrderStore;
	use gift_storage::OrderStore;
	use gift_types::{Order, OrderStatus, RawSignal};
	use serde_json::{json, Value};
	use tower::ServiceExt;

	struct StubFulfillment;

	#[async_trait]
	impl FulfillmentApi for StubFulfillment {
		async fn place_order(
			&self,
			_request: &GiftOrderRequest,
		) -> Result<String, FulfillmentError> {
			Ok("req-1".to_string())
		}

		async fn fetch_status(&self, _request_id: &str) -> Result<UpstreamStatus, FulfillmentError> {
			let raw = json!({"request_id": "req-1", "status": "shipped"});
			let signal = RawSignal::from_value(&raw);
			Ok(UpstreamStatus {
				signal,
				raw,
				is_processing: false,
			})
		}
	}

	fn test_state() -> (AppState, Arc<OrderStore>) {
		let store = Arc::new(OrderStore::new(Box::new(MemoryOrderStore::new())));
		let engine = Arc::new(OrderEngine::new(
			Arc::clone(&store),
			Arc::new(StubFulfillment),
			LiveUpdateBroadcaster::new(16),
			&gift_config::LiveConfig {
				heartbeat_secs: 30,
				max_connection_secs: 600,
			},
		));
		(AppState { engine }, store)
	}

	fn seeded_order(request_id: &str) -> Order {
		Order {
			request_id: request_id.to_string(),
			product_id: "B000TEST".into(),
			product_name: "Scented Candle".into(),
			price: 9.5,
			recipient_name: "Alex Doe".into(),
			message: None,
			customer_email: "sender@example.com".into(),
			reveal_email: Some("sender@example.com".into()),
			status: OrderStatus::Pending,
			tracking_number: None,
			carrier: None,
			tracking_url: None,
			created_at: chrono::Utc::now(),
			last_updated: chrono::Utc::now(),
			raw_last_signal: None,
		}
	}

	async fn response_json(response: axum::response::Response) -> Value {
		let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
			.await
			.unwrap();
		serde_json::from_slice(&bytes).unwrap()
	}

	#[tokio::test]
	async fn webhook_without_request_id_is_rejected() {
		let (state, _) = test_state();
		let app = build_router(state);

		let response = app
			.oneshot(
				Request::builder()
					.method("POST")
					.uri("/api/webhooks/order-status")
					.header("content-type", "application/json")
					.body(Body::from(r#"{"status":"shipped"}"#))
					.unwrap(),
			)
			.await
			.unwrap();

		assert_eq!(response.status(), StatusCode::BAD_REQUEST);
		let body = response_json(response).await;
		assert_eq!(body["success"], false);
	}

	#[tokio::test]
	async fn webhook_for_unknown_order_still_acks_success() {
		let (state, _) = test_state();
		let app = build_router(state);

		let response = app
			.oneshot(
				Request::builder()
					.method("POST")
					.uri("/api/webhooks/order-status")
					.header("content-type", "application/json")
					.body(Body::from(r#"{"request_id":"missing","status":"shipped"}"#))
					.unwrap(),
			)
			.await
			.unwrap();

		assert_eq!(response.status(), StatusCode::OK);
		let body = response_json(response).await;
		assert_eq!(body["success"], true);
	}

	#[tokio::test]
	async fn webhook_updates_order_status() {
		let (state, store) = test_state();
		store.create(&seeded_order("req-1")).await.unwrap();
		let app = build_router(state);

		let response = app
			.oneshot(
				Request::builder()
					.method("POST")
					.uri("/api/webhooks/order-status")
					.header("content-type", "application/json")
					.body(Body::from(
						r#"{"request_id":"req-1","_type":"error","code":"request_processing"}"#,
					))
					.unwrap(),
			)
			.await
			.unwrap();

		assert_eq!(response.status(), StatusCode::OK);
		let body = response_json(response).await;
		assert_eq!(body["status"], "processing");

		let order = store.get("req-1").await.unwrap().unwrap();
		assert_eq!(order.status, OrderStatus::Processing);
	}

	#[tokio::test]
	async fn refresh_returns_merged_view() {
		let (state, store) = test_state();
		store.create(&seeded_order("req-1")).await.unwrap();
		let app = build_router(state);

		let response = app
			.oneshot(
				Request::builder()
					.uri("/api/orders/req-1")
					.body(Body::empty())
					.unwrap(),
			)
			.await
			.unwrap();

		assert_eq!(response.status(), StatusCode::OK);
		let body = response_json(response).await;
		assert_eq!(body["success"], true);
		assert_eq!(body["status"], "tracking");
		assert_eq!(body["is_processing"], false);
	}

	#[tokio::test]
	async fn listing_requires_email_parameter() {
		let (state, _) = test_state();
		let app = build_router(state);

		let response = app
			.oneshot(
				Request::builder()
					.uri("/api/orders")
					.body(Body::empty())
					.unwrap(),
			)
			.await
			.unwrap();

		assert_eq!(response.status(), StatusCode::BAD_REQUEST);
	}

	#[tokio::test]
	async fn listing_returns_matching_orders() {
		let (state, store) = test_state();
		store.create(&seeded_order("req-1")).await.unwrap();
		let app = build_router(state);

		let response = app
			.oneshot(
				Request::builder()
					.uri("/api/orders?email=sender@example.com")
					.body(Body::empty())
					.unwrap(),
			)
			.await
			.unwrap();

		assert_eq!(response.status(), StatusCode::OK);
		let body = response_json(response).await;
		assert_eq!(body["orders"].as_array().unwrap().len(), 1);
		assert_eq!(body["orders"][0]["upstream_status"], "shipped");
	}

	#[tokio::test]
	async fn place_order_returns_request_id() {
		let (state, store) = test_state();
		let app = build_router(state);

		let request_body = json!({
			"product": {
				"id": "p1",
				"name": "Coffee Mug",
				"price": 12.0,
				"retailer": "amazon",
				"product_id": "B000MUG",
			},
			"shipping_address": {
				"first_name": "Alex",
				"last_name": "Doe",
				"address_line1": "1 Main St",
				"zip_code": "94110",
				"city": "San Francisco",
				"state": "CA",
				"country": "US",
				"phone_number": "5551234567",
			},
			"payment": {
				"name": "Alex Doe",
				"number": "4242424242424242",
				"cvv": "123",
				"expiryMonth": "12",
				"expiryYear": "2030",
			},
			"email": "sender@example.com",
		});

		let response = app
			.oneshot(
				Request::builder()
					.method("POST")
					.uri("/api/orders")
					.header("content-type", "application/json")
					.body(Body::from(request_body.to_string()))
					.unwrap(),
			)
			.await
			.unwrap();

		assert_eq!(response.status(), StatusCode::OK);
		let body = response_json(response).await;
		assert_eq!(body["success"], true);
		assert_eq!(body["request_id"], "req-1");

		let order = store.get("req-1").await.unwrap().unwrap();
		assert_eq!(order.status, OrderStatus::Pending);
	}

	#[tokio::test]
	async fn update_stream_responds_with_event_stream() {
		let (state, store) = test_state();
		store.create(&seeded_order("req-1")).await.unwrap();
		let app = build_router(state);

		let response = app
			.oneshot(
				Request::builder()
					.uri("/api/orders/req-1/updates")
					.body(Body::empty())
					.unwrap(),
			)
			.await
			.unwrap();

		assert_eq!(response.status(), StatusCode::OK);
		let content_type = response
			.headers()
			.get("content-type")
			.unwrap()
			.to_str()
			.unwrap();
		assert!(content_type.starts_with("text/event-stream"));
	}
}
