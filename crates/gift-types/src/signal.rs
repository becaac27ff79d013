//! Raw status signals arriving from the fulfillment upstream.
//!
//! A raw signal is any status-bearing payload before normalization:
//! webhook bodies, polled order-status responses, or the stored copy of
//! either. The upstream overloads its generic error envelope, so the
//! fields here are intentionally loose.

use crate::TrackingInfo;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Upstream error code that means "order accepted, still working on it".
///
/// The upstream reports this inside its error envelope even though it is
/// not a failure. It must normalize to `processing`, never to `failed`.
pub const PROCESSING_SENTINEL: &str = "request_processing";

/// Error envelope marker used by the upstream (`_type: "error"`).
pub const ERROR_TYPE: &str = "error";

/// Webhook event classes registered at order placement.
pub mod webhook_event {
	pub const REQUEST_SUCCEEDED: &str = "request_succeeded";
	pub const REQUEST_FAILED: &str = "request_failed";
	pub const TRACKING_OBTAINED: &str = "tracking_obtained";
	pub const TRACKING_UPDATED: &str = "tracking_updated";
	pub const STATUS_UPDATED: &str = "status_updated";
}

/// A raw status payload as delivered by the upstream.
///
/// All fields besides `request_id` are optional; deliveries may carry any
/// subset and may arrive out of order or duplicated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawSignal {
	/// Order reference this signal belongs to. Absent only on malformed
	/// deliveries, which cannot be associated with any order.
	#[serde(default)]
	pub request_id: Option<String>,
	/// The upstream's own status string, if present.
	#[serde(default)]
	pub status: Option<String>,
	/// Error envelope marker; `"error"` when the payload is error-typed.
	#[serde(rename = "_type", default)]
	pub signal_type: Option<String>,
	/// Error code within the error envelope.
	#[serde(default)]
	pub code: Option<String>,
	/// Human-readable message from the upstream.
	#[serde(default)]
	pub message: Option<String>,
	/// Webhook event class, present on webhook deliveries only.
	#[serde(rename = "_webhook_type", default)]
	pub webhook_type: Option<String>,
	/// Tracking payload. The upstream sends an object on webhooks and an
	/// array on polled responses, so this stays untyped until inspected.
	#[serde(default)]
	pub tracking: Option<Value>,
}

impl RawSignal {
	/// Leniently parses a raw signal out of an arbitrary JSON payload.
	///
	/// Unknown fields are ignored; a payload that is not an object yields
	/// a signal with no populated fields.
	pub fn from_value(value: &Value) -> RawSignal {
		serde_json::from_value(value.clone()).unwrap_or_default()
	}

	/// Whether the payload carries the upstream's error envelope.
	pub fn is_error(&self) -> bool {
		self.signal_type.as_deref() == Some(ERROR_TYPE)
	}

	/// Whether this is the "still processing" non-error special case.
	pub fn is_processing_sentinel(&self) -> bool {
		self.is_error() && self.code.as_deref() == Some(PROCESSING_SENTINEL)
	}

	/// Extracts tracking details, accepting either the webhook object form
	/// or the polled array form.
	pub fn tracking_info(&self) -> Option<TrackingInfo> {
		let value = match &self.tracking {
			Some(Value::Array(items)) => items.first()?,
			Some(value) => value,
			None => return None,
		};
		let info: TrackingInfo = serde_json::from_value(value.clone()).ok()?;
		if info.tracking_number.is_empty() {
			return None;
		}
		Some(info)
	}
}
