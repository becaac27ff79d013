//! Core order lifecycle engine for the gift order service.
//!
//! The engine orchestrates order creation, webhook ingestion, on-demand
//! status refresh, and live update fan-out. All canonical status
//! mutation flows through the normalizer and the store's priority merge;
//! the engine itself holds no per-order state.

use chrono::Utc;
use futures::stream::BoxStream;
use futures::StreamExt;
use gift_config::LiveConfig;
use gift_fulfillment::{FulfillmentApi, FulfillmentError};
use gift_storage::OrderStore;
use gift_types::{
	ApiError, CombinedView, GiftOrderRequest, ListOrdersResponse, LiveEvent, Order,
	OrderStatus, OrderWithUpstream, PlaceOrderResponse, RawSignal, WebhookAck,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

pub mod broadcaster;
pub mod normalizer;

pub use broadcaster::LiveUpdateBroadcaster;

/// The order lifecycle engine.
///
/// One instance exists per process; handlers share it behind an `Arc`.
pub struct OrderEngine {
	store: Arc<OrderStore>,
	fulfillment: Arc<dyn FulfillmentApi>,
	broadcaster: LiveUpdateBroadcaster,
	heartbeat: Duration,
	max_connection: Duration,
}

impl OrderEngine {
	/// Creates a new engine over the given store and upstream client.
	pub fn new(
		store: Arc<OrderStore>,
		fulfillment: Arc<dyn FulfillmentApi>,
		broadcaster: LiveUpdateBroadcaster,
		live: &LiveConfig,
	) -> Self {
		Self {
			store,
			fulfillment,
			broadcaster,
			heartbeat: Duration::from_secs(live.heartbeat_secs),
			max_connection: Duration::from_secs(live.max_connection_secs),
		}
	}

	/// Places a new gift order.
	///
	/// The upstream call is authoritative: once it succeeds the order is
	/// considered placed, and a local persistence failure downgrades to a
	/// warning on the response instead of failing the request.
	pub async fn place_order(
		&self,
		request: &GiftOrderRequest,
	) -> Result<PlaceOrderResponse, ApiError> {
		request
			.validate()
			.map_err(|message| ApiError::BadRequest { message })?;

		let request_id = self.fulfillment.place_order(request).await?;
		tracing::info!(request_id = %request_id, "Order placed upstream");

		let now = Utc::now();
		let order = Order {
			request_id: request_id.clone(),
			product_id: request.product.product_id.clone(),
			product_name: request.product.name.clone(),
			price: request.product.price,
			recipient_name: request.shipping_address.recipient_name(),
			message: request.message.clone(),
			customer_email: request.email.clone(),
			reveal_email: request.reveal_email.clone(),
			status: OrderStatus::Pending,
			tracking_number: None,
			carrier: None,
			tracking_url: None,
			created_at: now,
			last_updated: now,
			raw_last_signal: None,
		};

		let warning = match self.store.create(&order).await {
			Ok(()) => None,
			Err(e) => {
				tracing::error!(request_id = %request_id, error = %e, "Failed to persist placed order");
				Some("Order was placed but could not be saved locally; status updates may be delayed".to_string())
			}
		};

		Ok(PlaceOrderResponse {
			success: true,
			request_id,
			message: "Order placed successfully".to_string(),
			warning,
		})
	}

	/// Ingests a raw webhook delivery.
	///
	/// Always acknowledges success to the sender, even when persistence
	/// fails, so the upstream does not enter a retry storm. The single
	/// negative case is a body with no `request_id`, which cannot be
	/// associated with any order.
	pub async fn ingest(&self, body: &Value) -> Result<WebhookAck, ApiError> {
		let signal = RawSignal::from_value(body);
		let request_id = signal
			.request_id
			.clone()
			.filter(|id| !id.is_empty())
			.ok_or_else(|| ApiError::BadRequest {
				message: "webhook body is missing request_id".to_string(),
			})?;

		tracing::debug!(
			request_id = %request_id,
			webhook_type = ?signal.webhook_type,
			"Ingesting status signal"
		);

		let patch = normalizer::normalize(&signal, body);
		match self.store.update_status(&request_id, &patch).await {
			Ok((order, changed)) => {
				if changed {
					self.broadcaster.publish(
						&request_id,
						LiveEvent::Update {
							order: order.clone(),
						},
					);
				}
				Ok(WebhookAck {
					success: true,
					status: Some(order.status),
					message: "Webhook processed".to_string(),
				})
			}
			Err(e) => {
				// Internal failures are logged, never surfaced in the ack.
				tracing::warn!(request_id = %request_id, error = %e, "Failed to apply status signal");
				Ok(WebhookAck {
					success: true,
					status: None,
					message: "Webhook received".to_string(),
				})
			}
		}
	}

	/// Refreshes an order against the upstream, merging the result into
	/// the stored row opportunistically.
	///
	/// When the upstream is unreachable but a local row exists, the view
	/// degrades to store-only rather than failing.
	pub async fn refresh(&self, request_id: &str) -> Result<CombinedView, ApiError> {
		let stored = self
			.store
			.get(request_id)
			.await
			.map_err(|e| ApiError::Internal {
				message: e.to_string(),
			})?;

		match self.fulfillment.fetch_status(request_id).await {
			Ok(upstream) => {
				let patch = normalizer::normalize(&upstream.signal, &upstream.raw);
				let (order, status) = match stored {
					Some(_) => {
						match self.store.update_status(request_id, &patch).await {
							Ok((order, changed)) => {
								if changed {
									self.broadcaster.publish(
										request_id,
										LiveEvent::Update {
											order: order.clone(),
										},
									);
								}
								let status = order.status;
								(Some(order), status)
							}
							Err(e) => {
								tracing::warn!(request_id = %request_id, error = %e, "Opportunistic refresh write failed");
								let status = patch.status.unwrap_or(OrderStatus::Pending);
								(stored, status)
							}
						}
					}
					None => (None, patch.status.unwrap_or(OrderStatus::Pending)),
				};

				Ok(CombinedView {
					success: true,
					request_id: request_id.to_string(),
					status,
					is_processing: upstream.is_processing,
					order,
					upstream: Some(upstream.raw),
					message: None,
				})
			}
			Err(e) => match stored {
				Some(order) => {
					tracing::warn!(request_id = %request_id, error = %e, "Upstream lookup failed; serving stored state");
					let status = order.status;
					Ok(CombinedView {
						success: true,
						request_id: request_id.to_string(),
						status,
						is_processing: status == OrderStatus::Processing,
						order: Some(order),
						upstream: None,
						message: Some("Live status unavailable; showing last known state".to_string()),
					})
				}
				// An upstream 404 with no local row means the id simply
				// does not exist anywhere.
				None => match e {
					FulfillmentError::Upstream { status: 404, .. } => Err(ApiError::NotFound {
						message: format!("no order found for {}", request_id),
					}),
					other => Err(other.into()),
				},
			},
		}
	}

	/// Lists all orders whose reveal email matches, each annotated with a
	/// freshly polled upstream status.
	///
	/// Per-order upstream failures degrade that order to `"unknown"`
	/// instead of failing the whole listing.
	pub async fn list_orders(&self, email: &str) -> Result<ListOrdersResponse, ApiError> {
		let orders = self
			.store
			.list_by_reveal_email(email)
			.await
			.map_err(|e| ApiError::Internal {
				message: e.to_string(),
			})?;

		let mut annotated = Vec::with_capacity(orders.len());
		for order in orders {
			let upstream_status = match self.fulfillment.fetch_status(&order.request_id).await {
				Ok(upstream) if upstream.is_processing => "processing".to_string(),
				Ok(upstream) => upstream
					.signal
					.status
					.clone()
					.unwrap_or_else(|| order.status.to_string()),
				Err(e) => {
					tracing::warn!(request_id = %order.request_id, error = %e, "Upstream status lookup failed for listing");
					"unknown".to_string()
				}
			};
			annotated.push(OrderWithUpstream {
				order,
				upstream_status,
			});
		}

		Ok(ListOrdersResponse { orders: annotated })
	}

	/// Opens a live event stream for an order reference.
	///
	/// The current snapshot is looked up at subscribe time so the client
	/// starts from known state before incremental updates arrive. An
	/// unknown order or a failed lookup yields a short stream that
	/// connects, reports the fault, and closes.
	pub async fn watch(&self, request_id: &str) -> BoxStream<'static, LiveEvent> {
		let snapshot = match self.store.get(request_id).await {
			Ok(Some(order)) => order,
			Ok(None) => {
				return futures::stream::iter([
					LiveEvent::Connected {
						request_id: request_id.to_string(),
					},
					LiveEvent::Error {
						message: format!("no order found for {}", request_id),
					},
				])
				.boxed();
			}
			Err(e) => {
				tracing::warn!(request_id = %request_id, error = %e, "Snapshot lookup failed at subscribe time");
				return futures::stream::iter([
					LiveEvent::Connected {
						request_id: request_id.to_string(),
					},
					LiveEvent::Error {
						message: "order lookup failed".to_string(),
					},
				])
				.boxed();
			}
		};
		self.broadcaster
			.live_stream(
				request_id.to_string(),
				Some(snapshot),
				self.heartbeat,
				self.max_connection,
			)
			.boxed()
	}

	/// The broadcaster shared by this engine.
	pub fn broadcaster(&self) -> &LiveUpdateBroadcaster {
		&self.broadcaster
	}
}
