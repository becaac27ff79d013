//! Fulfillment client module for the gift order service.
//!
//! This module wraps calls to the external order-placement and
//! order-status API. It is pure request/response with no state of its
//! own: it builds the retailer payload, registers webhook callbacks,
//! and interprets the upstream's (occasionally misleading) responses.

use async_trait::async_trait;
use gift_config::FulfillmentConfig;
use gift_types::{GiftOrderRequest, RawSignal};
use serde_json::Value;
use thiserror::Error;

pub mod payload;
pub mod pricing;

/// Errors that can occur during fulfillment API operations.
#[derive(Debug, Error)]
pub enum FulfillmentError {
	/// The network call failed or the upstream returned a non-2xx
	/// response without a parseable error body.
	#[error("Upstream unavailable: {message}")]
	UpstreamUnavailable {
		message: String,
		status: Option<u16>,
	},
	/// The response body could not be parsed as the expected schema.
	#[error("Invalid upstream response: {0}")]
	InvalidUpstreamResponse(String),
	/// The upstream returned its own structured error; its status code is
	/// passed through to callers.
	#[error("Upstream error: {message}")]
	Upstream {
		message: String,
		code: Option<String>,
		status: u16,
	},
}

impl From<FulfillmentError> for gift_types::ApiError {
	fn from(err: FulfillmentError) -> Self {
		match err {
			FulfillmentError::UpstreamUnavailable { message, status } => {
				gift_types::ApiError::Upstream { message, status }
			}
			FulfillmentError::InvalidUpstreamResponse(message) => gift_types::ApiError::Upstream {
				message,
				status: None,
			},
			FulfillmentError::Upstream {
				message, status, ..
			} => gift_types::ApiError::Upstream {
				message,
				status: Some(status),
			},
		}
	}
}

/// A polled upstream status, already checked for the "still processing"
/// special case.
#[derive(Debug, Clone)]
pub struct UpstreamStatus {
	/// Parsed signal fields from the payload.
	pub signal: RawSignal,
	/// The full raw payload.
	pub raw: Value,
	/// True when the upstream reported the `request_processing` sentinel:
	/// an error-enveloped payload that actually means "order accepted,
	/// not finalized yet".
	pub is_processing: bool,
}

/// Trait defining the interface to the fulfillment upstream.
///
/// The production implementation is [`FulfillmentClient`]; callers hold
/// the trait object so the upstream can be stubbed out in tests.
#[async_trait]
pub trait FulfillmentApi: Send + Sync {
	/// Places an order upstream and returns the assigned request id.
	async fn place_order(&self, request: &GiftOrderRequest) -> Result<String, FulfillmentError>;

	/// Fetches the current upstream status for an order.
	async fn fetch_status(&self, request_id: &str) -> Result<UpstreamStatus, FulfillmentError>;
}

/// Client for the fulfillment upstream API.
pub struct FulfillmentClient {
	http: reqwest::Client,
	api_url: String,
	api_key: String,
	webhook_base_url: String,
}

impl FulfillmentClient {
	/// Creates a new client from configuration.
	pub fn new(config: &FulfillmentConfig) -> Result<Self, FulfillmentError> {
		let http = reqwest::Client::builder()
			.timeout(std::time::Duration::from_secs(config.request_timeout_secs))
			.build()
			.map_err(|e| FulfillmentError::UpstreamUnavailable {
				message: format!("failed to build HTTP client: {}", e),
				status: None,
			})?;
		Ok(Self {
			http,
			api_url: config.api_url.trim_end_matches('/').to_string(),
			api_key: config.api_key.clone(),
			webhook_base_url: config.webhook_base_url.trim_end_matches('/').to_string(),
		})
	}
}

#[async_trait]
impl FulfillmentApi for FulfillmentClient {
	/// The payload carries a computed max-price ceiling and registers
	/// webhook callbacks for all status event classes.
	async fn place_order(&self, request: &GiftOrderRequest) -> Result<String, FulfillmentError> {
		let payload = payload::build_order_payload(request, &self.webhook_base_url);

		tracing::info!(
			retailer = %request.product.retailer,
			product_id = %request.product.product_id,
			max_price = %payload.max_price,
			"Placing fulfillment order"
		);

		let response = self
			.http
			.post(format!("{}/orders", self.api_url))
			.basic_auth(&self.api_key, Some(""))
			.json(&payload)
			.send()
			.await
			.map_err(|e| FulfillmentError::UpstreamUnavailable {
				message: e.to_string(),
				status: None,
			})?;

		let status = response.status().as_u16();
		let body = response
			.text()
			.await
			.map_err(|e| FulfillmentError::UpstreamUnavailable {
				message: e.to_string(),
				status: Some(status),
			})?;

		interpret_place_response(status, &body)
	}

	/// The upstream's `request_processing` error code is reported as a
	/// valid non-error state, not a failure.
	async fn fetch_status(&self, request_id: &str) -> Result<UpstreamStatus, FulfillmentError> {
		let response = self
			.http
			.get(format!("{}/orders/{}", self.api_url, request_id))
			.basic_auth(&self.api_key, Some(""))
			.send()
			.await
			.map_err(|e| FulfillmentError::UpstreamUnavailable {
				message: e.to_string(),
				status: None,
			})?;

		let status = response.status().as_u16();
		let body = response
			.text()
			.await
			.map_err(|e| FulfillmentError::UpstreamUnavailable {
				message: e.to_string(),
				status: Some(status),
			})?;

		interpret_status_response(status, &body)
	}
}

/// Interprets an order-placement response body.
pub fn interpret_place_response(status: u16, body: &str) -> Result<String, FulfillmentError> {
	let parsed: Value = serde_json::from_str(body).map_err(|_| {
		// Non-2xx without a parseable body is an availability problem;
		// a 2xx we cannot parse is a schema problem.
		if (200..300).contains(&status) {
			FulfillmentError::InvalidUpstreamResponse(format!(
				"unparseable order-placement response (status {})",
				status
			))
		} else {
			FulfillmentError::UpstreamUnavailable {
				message: format!("upstream returned status {}", status),
				status: Some(status),
			}
		}
	})?;

	if !(200..300).contains(&status) {
		let message = parsed
			.get("message")
			.and_then(Value::as_str)
			.unwrap_or("failed to place order")
			.to_string();
		let code = parsed
			.get("code")
			.and_then(Value::as_str)
			.map(str::to_string);
		return Err(FulfillmentError::Upstream {
			message,
			code,
			status,
		});
	}

	parsed
		.get("request_id")
		.and_then(Value::as_str)
		.map(str::to_string)
		.ok_or_else(|| {
			FulfillmentError::InvalidUpstreamResponse(
				"order-placement response missing request_id".into(),
			)
		})
}

/// Interprets an order-status response body.
pub fn interpret_status_response(
	status: u16,
	body: &str,
) -> Result<UpstreamStatus, FulfillmentError> {
	let parsed: Value = serde_json::from_str(body).map_err(|_| {
		if (200..300).contains(&status) {
			FulfillmentError::InvalidUpstreamResponse(format!(
				"unparseable order-status response (status {})",
				status
			))
		} else {
			FulfillmentError::UpstreamUnavailable {
				message: format!("upstream returned status {}", status),
				status: Some(status),
			}
		}
	})?;

	let signal = RawSignal::from_value(&parsed);

	// The upstream overloads one error code to mean "not ready yet"; it
	// is a valid state regardless of the HTTP status it arrives with.
	if signal.is_processing_sentinel() {
		return Ok(UpstreamStatus {
			signal,
			raw: parsed,
			is_processing: true,
		});
	}

	if !(200..300).contains(&status) {
		if signal.is_error() {
			return Err(FulfillmentError::Upstream {
				message: signal
					.message
					.clone()
					.unwrap_or_else(|| "error retrieving order status".into()),
				code: signal.code.clone(),
				status,
			});
		}
		return Err(FulfillmentError::UpstreamUnavailable {
			message: format!("upstream returned status {}", status),
			status: Some(status),
		});
	}

	Ok(UpstreamStatus {
		signal,
		raw: parsed,
		is_processing: false,
	})
}
