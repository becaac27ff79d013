//! Live update broadcaster.
//!
//! Fans out store-level changes for an order reference to subscribed
//! connections. Channels are indexed by request id in a concurrent map;
//! one broadcast channel exists per watched order and is pruned once the
//! last subscriber goes away.

use dashmap::DashMap;
use futures::Stream;
use gift_types::{LiveEvent, Order};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Broadcaster of live order events, keyed by request id.
///
/// Cloning is cheap; all clones share the same channel map.
#[derive(Clone)]
pub struct LiveUpdateBroadcaster {
	channels: Arc<DashMap<String, broadcast::Sender<LiveEvent>>>,
	capacity: usize,
}

impl LiveUpdateBroadcaster {
	/// Creates a broadcaster whose per-order channels buffer up to
	/// `capacity` undelivered events.
	pub fn new(capacity: usize) -> Self {
		Self {
			channels: Arc::new(DashMap::new()),
			capacity,
		}
	}

	/// Publishes an event to all subscribers of an order reference.
	///
	/// Returns how many subscribers received it. Publishing to an order
	/// nobody watches is a no-op, not an error.
	pub fn publish(&self, request_id: &str, event: LiveEvent) -> usize {
		match self.channels.get(request_id) {
			Some(sender) => sender.send(event).unwrap_or(0),
			None => 0,
		}
	}

	/// Subscribes to events for an order reference.
	pub fn subscribe(&self, request_id: &str) -> broadcast::Receiver<LiveEvent> {
		self.channels
			.entry(request_id.to_string())
			.or_insert_with(|| broadcast::channel(self.capacity).0)
			.subscribe()
	}

	/// Number of active subscribers for an order reference.
	pub fn subscriber_count(&self, request_id: &str) -> usize {
		self.channels
			.get(request_id)
			.map(|sender| sender.receiver_count())
			.unwrap_or(0)
	}

	/// Drops the channel for an order reference if nobody is subscribed.
	fn prune(&self, request_id: &str) {
		self.channels
			.remove_if(request_id, |_, sender| sender.receiver_count() == 0);
	}

	/// Builds the full event stream for one subscriber connection.
	///
	/// Emits `connected`, then the current snapshot as an `update` when
	/// one exists, then forwards published updates. A heartbeat fires
	/// every `heartbeat_every`; after `max_lifetime` the stream emits one
	/// `timeout` event and ends. A closed channel ends the stream with a
	/// single `error` event. Teardown prunes the channel exactly once,
	/// whichever path ends the stream.
	pub fn live_stream(
		&self,
		request_id: String,
		snapshot: Option<Order>,
		heartbeat_every: Duration,
		max_lifetime: Duration,
	) -> impl Stream<Item = LiveEvent> + Send {
		let broadcaster = self.clone();
		let mut rx = self.subscribe(&request_id);

		async_stream::stream! {
			yield LiveEvent::Connected {
				request_id: request_id.clone(),
			};
			if let Some(order) = snapshot {
				yield LiveEvent::Update { order };
			}

			// First tick is deferred one full period; the subscribe-time
			// snapshot already proved the connection alive.
			let start = tokio::time::Instant::now();
			let mut heartbeat =
				tokio::time::interval_at(start + heartbeat_every, heartbeat_every);
			let deadline = tokio::time::sleep(max_lifetime);
			tokio::pin!(deadline);

			loop {
				// Yielding is not allowed inside select arms, so each
				// branch resolves to an event first.
				let (event, last) = tokio::select! {
					() = &mut deadline => {
						let timeout = LiveEvent::Timeout {
							message: "connection lifetime exceeded".to_string(),
						};
						(Some(timeout), true)
					}
					_ = heartbeat.tick() => (Some(LiveEvent::Heartbeat), false),
					received = rx.recv() => match received {
						Ok(event) => {
							let terminal = event.is_terminal();
							(Some(event), terminal)
						}
						Err(broadcast::error::RecvError::Lagged(skipped)) => {
							tracing::warn!(
								request_id = %request_id,
								skipped,
								"Live update subscriber lagged"
							);
							(None, false)
						}
						Err(broadcast::error::RecvError::Closed) => {
							let error = LiveEvent::Error {
								message: "update channel closed".to_string(),
							};
							(Some(error), true)
						}
					},
				};

				if let Some(event) = event {
					yield event;
				}
				if last {
					break;
				}
			}

			drop(rx);
			broadcaster.prune(&request_id);
		}
	}
}
