//! Order types for the gift order lifecycle system.
//!
//! This module defines the durable order record, the canonical status
//! taxonomy, and the status patch produced by signal normalization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical status of an order, ordered by lifecycle progress.
///
/// The ordering `pending -> processing -> tracking -> completed` is used
/// for priority-based merging of concurrently arriving signals. `Failed`
/// is reachable from any non-terminal state and is sticky once observed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
	/// Order has been placed upstream but not yet acknowledged.
	Pending,
	/// Upstream has acknowledged the order but has not finalized it.
	Processing,
	/// Carrier tracking has been assigned.
	Tracking,
	/// Terminal success.
	Completed,
	/// Terminal failure.
	Failed,
}

impl OrderStatus {
	/// Position of this status in the progress ordering.
	pub fn priority(&self) -> u8 {
		match self {
			OrderStatus::Pending => 0,
			OrderStatus::Processing => 1,
			OrderStatus::Tracking => 2,
			OrderStatus::Completed => 3,
			OrderStatus::Failed => 4,
		}
	}

	/// Whether this status is terminal (no further transitions allowed).
	pub fn is_terminal(&self) -> bool {
		matches!(self, OrderStatus::Completed | OrderStatus::Failed)
	}

	/// Merges an incoming status into the current one.
	///
	/// Highest-priority wins; terminal states are never overwritten. This
	/// makes status merging commutative and idempotent, so out-of-order or
	/// duplicated signal deliveries converge on the same canonical value.
	pub fn merge(current: OrderStatus, incoming: OrderStatus) -> OrderStatus {
		if current.is_terminal() {
			return current;
		}
		if incoming == OrderStatus::Failed {
			return OrderStatus::Failed;
		}
		if incoming.priority() > current.priority() {
			incoming
		} else {
			current
		}
	}

	/// Parses a raw status string into a canonical status, if recognized.
	pub fn parse(raw: &str) -> Option<OrderStatus> {
		match raw {
			"pending" => Some(OrderStatus::Pending),
			"processing" => Some(OrderStatus::Processing),
			"tracking" => Some(OrderStatus::Tracking),
			"completed" => Some(OrderStatus::Completed),
			"failed" => Some(OrderStatus::Failed),
			_ => None,
		}
	}
}

impl fmt::Display for OrderStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			OrderStatus::Pending => write!(f, "pending"),
			OrderStatus::Processing => write!(f, "processing"),
			OrderStatus::Tracking => write!(f, "tracking"),
			OrderStatus::Completed => write!(f, "completed"),
			OrderStatus::Failed => write!(f, "failed"),
		}
	}
}

/// Carrier tracking details carried by a raw signal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackingInfo {
	/// Carrier tracking number.
	pub tracking_number: String,
	/// Carrier name, when known.
	#[serde(default)]
	pub carrier: Option<String>,
	/// Tracking page URL, when known.
	#[serde(default)]
	pub url: Option<String>,
}

/// Durable order record, keyed by the upstream-assigned request id.
///
/// The record is created at order-placement time and mutated only through
/// normalized status patches; it is never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
	/// Unique identifier assigned by the fulfillment system. Immutable.
	pub request_id: String,
	/// Retailer product identifier.
	pub product_id: String,
	/// Human-readable product name.
	pub product_name: String,
	/// Listed price in dollars.
	pub price: f64,
	/// Recipient full name from the shipping address.
	pub recipient_name: String,
	/// Optional gift message.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub message: Option<String>,
	/// Sender's email address.
	pub customer_email: String,
	/// Optional email for identity disclosure. Not an authentication proof.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub reveal_email: Option<String>,
	/// Current canonical status.
	pub status: OrderStatus,
	/// Carrier tracking number, once known. Never unset.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub tracking_number: Option<String>,
	/// Carrier name, once known. Never unset.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub carrier: Option<String>,
	/// Tracking page URL, once known.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub tracking_url: Option<String>,
	/// Timestamp when this order was created.
	pub created_at: DateTime<Utc>,
	/// Timestamp of the last canonical status mutation.
	pub last_updated: DateTime<Utc>,
	/// The most recent raw payload that produced the current status.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub raw_last_signal: Option<serde_json::Value>,
}

impl Order {
	/// Applies a normalized status patch to this order.
	///
	/// Only fields present in the patch are overwritten; tracking fields,
	/// once set, are retained when later patches carry no tracking data.
	/// Returns true if any field actually changed.
	pub fn apply_patch(&mut self, patch: &StatusPatch) -> bool {
		let mut changed = false;

		if let Some(incoming) = patch.status {
			let merged = OrderStatus::merge(self.status, incoming);
			if merged != self.status {
				self.status = merged;
				changed = true;
			}
		}

		if let Some(tracking) = &patch.tracking {
			if self.tracking_number.as_deref() != Some(tracking.tracking_number.as_str()) {
				self.tracking_number = Some(tracking.tracking_number.clone());
				changed = true;
			}
			if tracking.carrier.is_some() && self.carrier != tracking.carrier {
				self.carrier = tracking.carrier.clone();
				changed = true;
			}
			if tracking.url.is_some() && self.tracking_url != tracking.url {
				self.tracking_url = tracking.url.clone();
				changed = true;
			}
		}

		if changed {
			self.raw_last_signal = Some(patch.raw.clone());
		}

		changed
	}
}

/// Output of the status normalizer for a single raw signal.
///
/// Absent fields mean "retain the previous value" when merged into the
/// stored order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusPatch {
	/// Canonical status derived from the signal, if any.
	pub status: Option<OrderStatus>,
	/// Tracking details carried by the signal, if any.
	pub tracking: Option<TrackingInfo>,
	/// The raw signal payload, retained for diagnostics.
	pub raw: serde_json::Value,
}
