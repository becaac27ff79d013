//! Order store module for the gift order service.
//!
//! This module provides the durable table of orders keyed by order
//! reference, the single source of truth for canonical status. Different
//! backend implementations are supported behind one trait; the store
//! service layers the partial-merge update semantics on top.

use async_trait::async_trait;
use chrono::Utc;
use gift_types::{Order, StatusPatch};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod file;
	pub mod memory;
}

/// Errors that can occur during order store operations.
#[derive(Debug, Error)]
pub enum StorageError {
	/// An order with the same request id already exists.
	#[error("Duplicate order: {0}")]
	Duplicate(String),
	/// No order exists for the given request id.
	#[error("Order not found: {0}")]
	NotFound(String),
	/// Error that occurs during serialization/deserialization.
	#[error("Serialization error: {0}")]
	Serialization(String),
	/// Error that occurs in the storage backend.
	#[error("Backend error: {0}")]
	Backend(String),
}

/// Mutation applied to a stored row under the backend's lock. Returns
/// whether the row actually changed.
pub type UpdateFn = Box<dyn FnOnce(&mut Order) -> bool + Send>;

/// Trait defining the low-level interface for order store backends.
///
/// Backends provide row-level operations only; merge semantics live in
/// [`OrderStore`]. Each operation on a single row is atomic with respect
/// to other operations on the same backend: in particular [`update`]
/// holds the row exclusively across read, mutation, and write, so
/// concurrent updates to one row serialize instead of clobbering each
/// other.
///
/// [`update`]: OrderStoreBackend::update
#[async_trait]
pub trait OrderStoreBackend: Send + Sync {
	/// Inserts a new order row. Fails with [`StorageError::Duplicate`]
	/// when a row for the same request id already exists.
	async fn insert(&self, order: &Order) -> Result<(), StorageError>;

	/// Retrieves an order row by request id.
	async fn get(&self, request_id: &str) -> Result<Option<Order>, StorageError>;

	/// Applies a mutation to an existing row as one atomic
	/// read-mutate-write. Fails with [`StorageError::NotFound`] when no
	/// row exists. Returns the post-mutation row and whether it changed.
	async fn update(
		&self,
		request_id: &str,
		apply: UpdateFn,
	) -> Result<(Order, bool), StorageError>;

	/// Returns all orders whose reveal email matches the given address.
	async fn find_by_reveal_email(&self, email: &str) -> Result<Vec<Order>, StorageError>;
}

/// High-level order store providing the canonical-status merge semantics.
///
/// All mutation goes through [`OrderStore::update_status`], which applies
/// a normalized patch as a single read-merge-write. The merge is
/// idempotent and priority-ordered, so concurrent deliveries for the
/// same order commute without locking.
pub struct OrderStore {
	backend: Box<dyn OrderStoreBackend>,
}

impl OrderStore {
	/// Creates a new OrderStore with the specified backend.
	pub fn new(backend: Box<dyn OrderStoreBackend>) -> Self {
		Self { backend }
	}

	/// Creates a new order row.
	///
	/// Fails with [`StorageError::Duplicate`] if the request id is
	/// already present; at most one row exists per request id.
	pub async fn create(&self, order: &Order) -> Result<(), StorageError> {
		self.backend.insert(order).await
	}

	/// Retrieves an order by request id.
	pub async fn get(&self, request_id: &str) -> Result<Option<Order>, StorageError> {
		self.backend.get(request_id).await
	}

	/// Applies a normalized status patch to the stored order.
	///
	/// Only fields present in the patch are overwritten; absent fields
	/// retain their prior values, so a tracking-only signal never erases
	/// known product or recipient data. `last_updated` is stamped only
	/// when the merge actually changed the row.
	///
	/// The merge runs inside the backend's atomic [`update`], so
	/// concurrent patches to the same order serialize and commute under
	/// the priority merge instead of overwriting each other.
	///
	/// Returns the post-merge order and whether anything changed.
	///
	/// [`update`]: OrderStoreBackend::update
	pub async fn update_status(
		&self,
		request_id: &str,
		patch: &StatusPatch,
	) -> Result<(Order, bool), StorageError> {
		let patch = patch.clone();
		self.backend
			.update(
				request_id,
				Box::new(move |order| {
					let changed = order.apply_patch(&patch);
					if changed {
						order.last_updated = Utc::now();
					}
					changed
				}),
			)
			.await
	}

	/// Returns all orders whose reveal email matches, newest first.
	pub async fn list_by_reveal_email(&self, email: &str) -> Result<Vec<Order>, StorageError> {
		let mut orders = self.backend.find_by_reveal_email(email).await?;
		orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
		Ok(orders)
	}
}

#[cfg(test)]
pub(crate) mod test_support {
	use chrono::Utc;
	use gift_types::{Order, OrderStatus};

	pub fn order(request_id: &str) -> Order {
		Order {
			request_id: request_id.to_string(),
			product_id: "B000TEST".into(),
			product_name: "Scented Candle".into(),
			price: 9.5,
			recipient_name: "Alex Doe".into(),
			message: Some("for you".into()),
			customer_email: "sender@example.com".into(),
			reveal_email: Some("sender@example.com".into()),
			status: OrderStatus::Pending,
			tracking_number: None,
			carrier: None,
			tracking_url: None,
			created_at: Utc::now(),
			last_updated: Utc::now(),
			raw_last_signal: None,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::implementations::memory::MemoryOrderStore;
	use super::test_support::order;
	use super::*;
	use gift_types::{OrderStatus, StatusPatch, TrackingInfo};
	use serde_json::json;

	fn store() -> OrderStore {
		OrderStore::new(Box::new(MemoryOrderStore::new()))
	}

	#[tokio::test]
	async fn create_rejects_duplicates() {
		let store = store();
		store.create(&order("req-1")).await.unwrap();
		let err = store.create(&order("req-1")).await.unwrap_err();
		assert!(matches!(err, StorageError::Duplicate(_)));
	}

	#[tokio::test]
	async fn update_status_merges_partially() {
		let store = store();
		store.create(&order("req-1")).await.unwrap();

		let tracking_patch = StatusPatch {
			status: Some(OrderStatus::Tracking),
			tracking: Some(TrackingInfo {
				tracking_number: "1Z999".into(),
				carrier: Some("ups".into()),
				url: Some("https://track.example/1Z999".into()),
			}),
			raw: json!({"_webhook_type": "tracking_obtained"}),
		};
		let (updated, changed) = store.update_status("req-1", &tracking_patch).await.unwrap();
		assert!(changed);
		assert_eq!(updated.status, OrderStatus::Tracking);

		// A later status-only patch must not erase tracking or product data.
		let status_patch = StatusPatch {
			status: Some(OrderStatus::Processing),
			tracking: None,
			raw: json!({"status": "processing"}),
		};
		let (updated, changed) = store.update_status("req-1", &status_patch).await.unwrap();
		assert!(!changed);
		assert_eq!(updated.status, OrderStatus::Tracking);
		assert_eq!(updated.tracking_number.as_deref(), Some("1Z999"));
		assert_eq!(updated.product_name, "Scented Candle");
	}

	#[tokio::test]
	async fn duplicate_patch_does_not_restamp() {
		let store = store();
		store.create(&order("req-1")).await.unwrap();

		let patch = StatusPatch {
			status: Some(OrderStatus::Processing),
			tracking: None,
			raw: json!({"status": "processing"}),
		};
		let (first, _) = store.update_status("req-1", &patch).await.unwrap();
		let (second, changed) = store.update_status("req-1", &patch).await.unwrap();
		assert!(!changed);
		assert_eq!(first.last_updated, second.last_updated);
	}

	#[tokio::test]
	async fn concurrent_signals_converge_on_tracking() {
		use std::sync::Arc;

		// Two signals racing on the same order must both land; the
		// lower-priority one must not clobber the tracking data.
		for _ in 0..32 {
			let store = Arc::new(OrderStore::new(Box::new(MemoryOrderStore::new())));
			store.create(&order("req-1")).await.unwrap();

			let tracking_patch = StatusPatch {
				status: Some(OrderStatus::Tracking),
				tracking: Some(TrackingInfo {
					tracking_number: "1Z999".into(),
					carrier: Some("ups".into()),
					url: None,
				}),
				raw: json!({"_webhook_type": "tracking_obtained"}),
			};
			let processing_patch = StatusPatch {
				status: Some(OrderStatus::Processing),
				tracking: None,
				raw: json!({"status": "processing"}),
			};

			let a = {
				let store = store.clone();
				tokio::spawn(
					async move { store.update_status("req-1", &tracking_patch).await },
				)
			};
			let b = {
				let store = store.clone();
				tokio::spawn(
					async move { store.update_status("req-1", &processing_patch).await },
				)
			};
			a.await.unwrap().unwrap();
			b.await.unwrap().unwrap();

			let final_order = store.get("req-1").await.unwrap().unwrap();
			assert_eq!(final_order.status, OrderStatus::Tracking);
			assert_eq!(final_order.tracking_number.as_deref(), Some("1Z999"));
		}
	}

	#[tokio::test]
	async fn update_status_for_unknown_order_fails() {
		let store = store();
		let patch = StatusPatch {
			status: Some(OrderStatus::Processing),
			tracking: None,
			raw: json!({}),
		};
		let err = store.update_status("missing", &patch).await.unwrap_err();
		assert!(matches!(err, StorageError::NotFound(_)));
	}

	#[tokio::test]
	async fn list_by_reveal_email_is_newest_first() {
		let store = store();
		let mut first = order("req-1");
		first.created_at = chrono::Utc::now() - chrono::Duration::hours(1);
		let second = order("req-2");
		store.create(&first).await.unwrap();
		store.create(&second).await.unwrap();

		let listed = store
			.list_by_reveal_email("sender@example.com")
			.await
			.unwrap();
		assert_eq!(listed.len(), 2);
		assert_eq!(listed[0].request_id, "req-2");

		let none = store.list_by_reveal_email("other@example.com").await.unwrap();
		assert!(none.is_empty());
	}
}
