//! Status normalization.
//!
//! Pure functions mapping any raw status payload, webhook body, polled
//! response, or stored copy, into a canonical status patch. The rules
//! run on each signal independently; ordering conflicts are resolved
//! later by the store's priority merge, so normalization never needs to
//! know what came before.

use gift_types::{signal::webhook_event, OrderStatus, RawSignal, StatusPatch};
use serde_json::Value;

/// Normalizes a raw signal into a status patch.
///
/// Rule order matters:
/// 1. error envelope with the processing sentinel code is `processing`,
///    not a failure
/// 2. any other error envelope is `failed`
/// 3. a non-empty tracking number means at least `tracking`
/// 4. webhook event classes for terminal outcomes map directly
/// 5. otherwise fall back to the payload's own status string; an
///    unrecognized or absent status yields no status change at all
pub fn normalize(signal: &RawSignal, raw: &Value) -> StatusPatch {
	let tracking = signal.tracking_info();

	let status = if signal.is_processing_sentinel() {
		Some(OrderStatus::Processing)
	} else if signal.is_error() {
		Some(OrderStatus::Failed)
	} else if tracking.is_some() {
		Some(OrderStatus::Tracking)
	} else {
		match signal.webhook_type.as_deref() {
			Some(webhook_event::REQUEST_SUCCEEDED) => Some(OrderStatus::Completed),
			Some(webhook_event::REQUEST_FAILED) => Some(OrderStatus::Failed),
			_ => signal
				.status
				.as_deref()
				.and_then(map_upstream_status),
		}
	};

	StatusPatch {
		status,
		tracking,
		raw: raw.clone(),
	}
}

/// Maps an upstream status string onto the canonical taxonomy.
///
/// The upstream vocabulary is wider than ours; anything unrecognized
/// maps to no change rather than guessing.
pub fn map_upstream_status(raw: &str) -> Option<OrderStatus> {
	match raw.to_ascii_lowercase().as_str() {
		"pending" => Some(OrderStatus::Pending),
		"placed" | "processing" | "request_processing" => Some(OrderStatus::Processing),
		"shipped" | "tracking" => Some(OrderStatus::Tracking),
		"delivered" | "completed" | "success" => Some(OrderStatus::Completed),
		"failed" | "error" | "cancelled" => Some(OrderStatus::Failed),
		_ => None,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	fn normalize_value(raw: Value) -> StatusPatch {
		let signal = RawSignal::from_value(&raw);
		normalize(&signal, &raw)
	}

	#[test]
	fn processing_sentinel_is_not_a_failure() {
		let patch = normalize_value(json!({
			"request_id": "abc",
			"_type": "error",
			"code": "request_processing",
		}));
		assert_eq!(patch.status, Some(OrderStatus::Processing));
	}

	#[test]
	fn other_error_envelopes_are_failures() {
		let patch = normalize_value(json!({
			"request_id": "abc",
			"_type": "error",
			"code": "max_price_exceeded",
		}));
		assert_eq!(patch.status, Some(OrderStatus::Failed));
	}

	#[test]
	fn tracking_presence_upgrades_status() {
		let patch = normalize_value(json!({
			"request_id": "abc",
			"status": "processing",
			"tracking": {"tracking_number": "1Z999", "carrier": "ups"},
		}));
		assert_eq!(patch.status, Some(OrderStatus::Tracking));
		assert_eq!(
			patch.tracking.unwrap().tracking_number,
			"1Z999".to_string()
		);
	}

	#[test]
	fn webhook_event_classes_map_to_terminal_states() {
		let patch = normalize_value(json!({
			"request_id": "abc",
			"_webhook_type": "request_succeeded",
		}));
		assert_eq!(patch.status, Some(OrderStatus::Completed));

		let patch = normalize_value(json!({
			"request_id": "abc",
			"_webhook_type": "request_failed",
		}));
		assert_eq!(patch.status, Some(OrderStatus::Failed));
	}

	#[test]
	fn status_string_is_the_fallback() {
		let patch = normalize_value(json!({
			"request_id": "abc",
			"status": "shipped",
		}));
		assert_eq!(patch.status, Some(OrderStatus::Tracking));
	}

	#[test]
	fn unknown_status_yields_no_change() {
		let patch = normalize_value(json!({
			"request_id": "abc",
			"status": "contacting_retailer",
		}));
		assert_eq!(patch.status, None);
		assert!(patch.tracking.is_none());
	}

	#[test]
	fn raw_payload_is_retained() {
		let raw = json!({"request_id": "abc", "status": "shipped"});
		let patch = normalize_value(raw.clone());
		assert_eq!(patch.raw, raw);
	}
}
