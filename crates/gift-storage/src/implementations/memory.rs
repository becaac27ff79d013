//! In-memory order store backend.
//!
//! This backend keeps all rows in a HashMap behind a read-write lock,
//! providing fast access but no persistence across restarts. Useful for
//! testing and development.

use crate::{OrderStoreBackend, StorageError, UpdateFn};
use async_trait::async_trait;
use gift_types::Order;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory order store implementation.
pub struct MemoryOrderStore {
	rows: Arc<RwLock<HashMap<String, Order>>>,
}

impl MemoryOrderStore {
	/// Creates a new empty MemoryOrderStore.
	pub fn new() -> Self {
		Self {
			rows: Arc::new(RwLock::new(HashMap::new())),
		}
	}
}

impl Default for MemoryOrderStore {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl OrderStoreBackend for MemoryOrderStore {
	async fn insert(&self, order: &Order) -> Result<(), StorageError> {
		let mut rows = self.rows.write().await;
		if rows.contains_key(&order.request_id) {
			return Err(StorageError::Duplicate(order.request_id.clone()));
		}
		rows.insert(order.request_id.clone(), order.clone());
		Ok(())
	}

	async fn get(&self, request_id: &str) -> Result<Option<Order>, StorageError> {
		let rows = self.rows.read().await;
		Ok(rows.get(request_id).cloned())
	}

	async fn update(
		&self,
		request_id: &str,
		apply: UpdateFn,
	) -> Result<(Order, bool), StorageError> {
		// The write guard spans read, mutation, and write, so concurrent
		// updates to one row serialize.
		let mut rows = self.rows.write().await;
		let order = rows
			.get_mut(request_id)
			.ok_or_else(|| StorageError::NotFound(request_id.to_string()))?;
		let changed = apply(order);
		Ok((order.clone(), changed))
	}

	async fn find_by_reveal_email(&self, email: &str) -> Result<Vec<Order>, StorageError> {
		let rows = self.rows.read().await;
		Ok(rows
			.values()
			.filter(|order| order.reveal_email.as_deref() == Some(email))
			.cloned()
			.collect())
	}
}
