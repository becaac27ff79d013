//! Live update stream event types.
//!
//! Events pushed to subscribers of a single order reference. Each event
//! is serialized as one JSON object with an `event` discriminator,
//! matching what the stream consumer switches on.

use crate::Order;
use serde::{Deserialize, Serialize};

/// A typed event on the live update stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum LiveEvent {
	/// Sent immediately after the subscription is established.
	Connected { request_id: String },
	/// A full order snapshot; replaces any previously received state.
	Update { order: Order },
	/// Periodic keep-alive so intermediary proxies do not close the
	/// connection.
	Heartbeat,
	/// The connection reached its maximum lifetime and will close.
	Timeout { message: String },
	/// An internal fault occurred; the connection will close.
	Error { message: String },
}

impl LiveEvent {
	/// Whether this event terminates the stream.
	pub fn is_terminal(&self) -> bool {
		matches!(self, LiveEvent::Timeout { .. } | LiveEvent::Error { .. })
	}
}
