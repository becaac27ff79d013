//! Client-side order watcher.
//!
//! Consumes the live update stream for one order reference and keeps a
//! local snapshot consistent. The connection lifecycle is an explicit
//! state machine with a bounded retry budget; when the stream cannot be
//! held open, callers fall back to [`OrderWatcher::resync`], a one-shot
//! pull through the refresh endpoint.

use futures::StreamExt;
use gift_types::{CombinedView, LiveEvent, Order};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

/// Maximum automatic reconnect attempts before giving up.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Cap on the exponential backoff between reconnect attempts.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Errors that can occur while watching an order.
#[derive(Debug, Error)]
pub enum WatchError {
	/// The live stream could not be established or held open after
	/// exhausting the retry budget.
	#[error("Connection failed after {attempts} attempts: {message}")]
	ConnectionFailed { attempts: u32, message: String },
	/// A refresh pull failed.
	#[error("Resync failed: {0}")]
	Resync(String),
}

/// Connection state of the watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchState {
	/// Establishing the initial connection.
	Connecting,
	/// Stream is open and delivering events.
	Open,
	/// Connection lost; waiting out the backoff before attempt `attempt`.
	Retrying { attempt: u32 },
	/// Retry budget exhausted; manual resync is the remaining affordance.
	Failed,
}

/// Backoff before the given reconnect attempt, doubling from one second
/// and capped.
pub fn backoff_delay(attempt: u32) -> Duration {
	let exp = attempt.min(31).saturating_sub(1);
	Duration::from_secs(1u64 << exp).min(MAX_BACKOFF)
}

/// Parses one line of the live stream into an event.
///
/// Accepts both bare JSON lines and SSE-framed `data:` lines; blank
/// lines and comment lines yield nothing.
pub fn parse_event_line(line: &str) -> Option<LiveEvent> {
	let line = line.trim();
	if line.is_empty() || line.starts_with(':') {
		return None;
	}
	let payload = line.strip_prefix("data:").unwrap_or(line).trim_start();
	serde_json::from_str(payload).ok()
}

/// Merges a received event into the local snapshot.
///
/// An `update` is a full snapshot and replaces prior state wholesale;
/// the server already performed the field-level merge. Returns true if
/// the snapshot changed.
pub fn apply_event(snapshot: &mut Option<Order>, event: &LiveEvent) -> bool {
	match event {
		LiveEvent::Update { order } => {
			let changed = snapshot
				.as_ref()
				.map(|current| {
					current.status != order.status || current.last_updated != order.last_updated
				})
				.unwrap_or(true);
			if changed {
				*snapshot = Some(order.clone());
			}
			changed
		}
		_ => false,
	}
}

/// Watches the live update stream for one order.
pub struct OrderWatcher {
	http: reqwest::Client,
	base_url: String,
	request_id: String,
	max_retries: u32,
	state_tx: watch::Sender<WatchState>,
	order_tx: watch::Sender<Option<Order>>,
}

impl OrderWatcher {
	/// Creates a watcher for the given order against a service base URL.
	pub fn new(base_url: impl Into<String>, request_id: impl Into<String>) -> Self {
		let (state_tx, _) = watch::channel(WatchState::Connecting);
		let (order_tx, _) = watch::channel(None);
		Self {
			http: reqwest::Client::new(),
			base_url: base_url.into().trim_end_matches('/').to_string(),
			request_id: request_id.into(),
			max_retries: DEFAULT_MAX_RETRIES,
			state_tx,
			order_tx,
		}
	}

	/// Observable connection state.
	pub fn state(&self) -> watch::Receiver<WatchState> {
		self.state_tx.subscribe()
	}

	/// Observable order snapshot.
	pub fn order(&self) -> watch::Receiver<Option<Order>> {
		self.order_tx.subscribe()
	}

	/// Runs the watch loop until the order reaches the retry budget or
	/// the stream ends server-side.
	///
	/// Each successfully opened connection resets the retry counter, so
	/// the budget bounds consecutive failures, not total reconnects.
	pub async fn run(&self) -> Result<(), WatchError> {
		let mut attempt = 0u32;

		loop {
			if attempt == 0 {
				self.state_tx.send_replace(WatchState::Connecting);
			} else {
				self.state_tx
					.send_replace(WatchState::Retrying { attempt });
				tokio::time::sleep(backoff_delay(attempt)).await;
			}

			match self.consume_stream().await {
				Ok(()) => {
					// Server closed the stream cleanly (timeout event);
					// reconnect with a fresh budget.
					attempt = 0;
				}
				Err(message) => {
					tracing::warn!(
						request_id = %self.request_id,
						attempt,
						error = %message,
						"Live stream connection lost"
					);
					attempt += 1;
					if attempt > self.max_retries {
						self.state_tx.send_replace(WatchState::Failed);
						return Err(WatchError::ConnectionFailed {
							attempts: attempt,
							message,
						});
					}
				}
			}
		}
	}

	/// One-shot pull through the refresh endpoint, bypassing the stream.
	///
	/// Used to resynchronize immediately after the stream fails rather
	/// than waiting for a reconnect.
	pub async fn resync(&self) -> Result<CombinedView, WatchError> {
		let url = format!("{}/api/orders/{}", self.base_url, self.request_id);
		let response = self
			.http
			.get(&url)
			.send()
			.await
			.map_err(|e| WatchError::Resync(e.to_string()))?;
		let view: CombinedView = response
			.json()
			.await
			.map_err(|e| WatchError::Resync(e.to_string()))?;

		if let Some(order) = &view.order {
			self.order_tx.send_replace(Some(order.clone()));
		}
		Ok(view)
	}

	/// Opens one stream connection and consumes it to completion.
	///
	/// Returns Ok on a clean server-side close and Err with a message on
	/// any transport or protocol fault.
	async fn consume_stream(&self) -> Result<(), String> {
		let url = format!("{}/api/orders/{}/updates", self.base_url, self.request_id);
		let response = self
			.http
			.get(&url)
			.send()
			.await
			.map_err(|e| e.to_string())?;
		if !response.status().is_success() {
			return Err(format!("stream endpoint returned {}", response.status()));
		}

		self.state_tx.send_replace(WatchState::Open);

		let mut body = response.bytes_stream();
		let mut buffer = String::new();
		while let Some(chunk) = body.next().await {
			let chunk = chunk.map_err(|e| e.to_string())?;
			buffer.push_str(&String::from_utf8_lossy(&chunk));

			while let Some(newline) = buffer.find('\n') {
				let line: String = buffer.drain(..=newline).collect();
				let Some(event) = parse_event_line(&line) else {
					continue;
				};
				match &event {
					LiveEvent::Timeout { .. } => return Ok(()),
					LiveEvent::Error { message } => return Err(message.clone()),
					_ => {
						let mut snapshot = self.order_tx.borrow().clone();
						if apply_event(&mut snapshot, &event) {
							self.order_tx.send_replace(snapshot);
						}
					}
				}
			}
		}

		// Stream ended without a terminal event.
		Err("stream closed unexpectedly".to_string())
	}
}
