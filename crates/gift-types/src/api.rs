//! API types for the gift order HTTP API.
//!
//! This module defines request and response envelopes for the HTTP
//! endpoints plus the structured API error type with its HTTP status
//! mapping.

use crate::{Order, OrderStatus};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Response to a successful order placement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceOrderResponse {
	pub success: bool,
	/// Order reference assigned by the fulfillment system.
	pub request_id: String,
	pub message: String,
	/// Present when the upstream order succeeded but local persistence
	/// failed; the order is still considered placed.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub warning: Option<String>,
}

/// Acknowledgement returned to the webhook sender.
///
/// `success` stays true even when internal persistence fails; surfacing
/// internal errors here would trigger upstream retry storms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookAck {
	pub success: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub status: Option<OrderStatus>,
	pub message: String,
}

/// Merged canonical view combining the stored row with a live upstream
/// lookup, returned by the refresh endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombinedView {
	pub success: bool,
	pub request_id: String,
	/// Canonical status after merging the fresh upstream signal.
	pub status: OrderStatus,
	/// True when the upstream reported its "still working on it"
	/// non-error state.
	pub is_processing: bool,
	/// The locally stored order row, if one exists.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub order: Option<Order>,
	/// Raw upstream payload from the live lookup.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub upstream: Option<serde_json::Value>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub message: Option<String>,
}

/// An order annotated with a freshly polled upstream status.
///
/// Upstream lookup failures degrade to `"unknown"` per order rather than
/// failing the whole listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderWithUpstream {
	#[serde(flatten)]
	pub order: Order,
	pub upstream_status: String,
}

/// Response to the order listing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListOrdersResponse {
	pub orders: Vec<OrderWithUpstream>,
}

/// Error envelope returned by all non-webhook endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
	pub success: bool,
	pub message: String,
}

/// Structured API error type with appropriate HTTP status mapping.
#[derive(Debug)]
pub enum ApiError {
	/// Malformed client input (400).
	BadRequest { message: String },
	/// No order exists for the given reference (404).
	NotFound { message: String },
	/// The fulfillment upstream failed; passes through the upstream's own
	/// status code when one was received, 502 otherwise.
	Upstream {
		message: String,
		status: Option<u16>,
	},
	/// Internal failure (500).
	Internal { message: String },
}

impl ApiError {
	/// Get the HTTP status code for this error.
	pub fn status_code(&self) -> u16 {
		match self {
			ApiError::BadRequest { .. } => 400,
			ApiError::NotFound { .. } => 404,
			ApiError::Upstream { status, .. } => status.unwrap_or(502),
			ApiError::Internal { .. } => 500,
		}
	}

	/// Convert to the error envelope for JSON serialization.
	pub fn to_error_response(&self) -> ErrorResponse {
		let message = match self {
			ApiError::BadRequest { message }
			| ApiError::NotFound { message }
			| ApiError::Upstream { message, .. }
			| ApiError::Internal { message } => message.clone(),
		};
		ErrorResponse {
			success: false,
			message,
		}
	}
}

impl fmt::Display for ApiError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ApiError::BadRequest { message } => write!(f, "Bad Request: {}", message),
			ApiError::NotFound { message } => write!(f, "Not Found: {}", message),
			ApiError::Upstream { message, .. } => write!(f, "Upstream Error: {}", message),
			ApiError::Internal { message } => write!(f, "Internal Error: {}", message),
		}
	}
}

impl std::error::Error for ApiError {}

impl axum::response::IntoResponse for ApiError {
	fn into_response(self) -> axum::response::Response {
		use axum::{http::StatusCode, response::Json};

		let status = StatusCode::from_u16(self.status_code())
			.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
		(status, Json(self.to_error_response())).into_response()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn upstream_error_passes_through_status() {
		let err = ApiError::Upstream {
			message: "max price exceeded".into(),
			status: Some(400),
		};
		assert_eq!(err.status_code(), 400);

		let err = ApiError::Upstream {
			message: "connection refused".into(),
			status: None,
		};
		assert_eq!(err.status_code(), 502);
	}

	#[test]
	fn error_envelope_is_not_success() {
		let err = ApiError::NotFound {
			message: "no such order".into(),
		};
		let body = err.to_error_response();
		assert!(!body.success);
		assert_eq!(body.message, "no such order");
	}
}
