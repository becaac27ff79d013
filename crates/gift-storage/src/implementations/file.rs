//! File-based order store backend.
//!
//! Persists each order as one JSON document under a base directory so
//! orders survive restarts. Request ids are sanitized into file names;
//! the listing query scans the directory, which is acceptable at the
//! order volumes this service sees.

use crate::{OrderStoreBackend, StorageError, UpdateFn};
use async_trait::async_trait;
use dashmap::DashMap;
use gift_types::Order;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;

/// File-based order store implementation.
pub struct FileOrderStore {
	base_path: PathBuf,
	// Per-request-id locks so read-mutate-write cycles on one record
	// serialize.
	locks: DashMap<String, Arc<Mutex<()>>>,
}

impl FileOrderStore {
	/// Creates a new FileOrderStore rooted at the given directory,
	/// creating it if necessary.
	pub fn new(base_path: impl AsRef<Path>) -> Result<Self, StorageError> {
		let base_path = base_path.as_ref().to_path_buf();
		std::fs::create_dir_all(&base_path)
			.map_err(|e| StorageError::Backend(format!("create dir: {}", e)))?;
		Ok(Self {
			base_path,
			locks: DashMap::new(),
		})
	}

	fn lock_for(&self, request_id: &str) -> Arc<Mutex<()>> {
		self.locks
			.entry(request_id.to_string())
			.or_insert_with(|| Arc::new(Mutex::new(())))
			.clone()
	}

	fn path_for(&self, request_id: &str) -> PathBuf {
		// Request ids come from the upstream and are expected to be
		// URL-safe; anything else is escaped to keep file names valid.
		let safe: String = request_id
			.chars()
			.map(|c| {
				if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
					c
				} else {
					'_'
				}
			})
			.collect();
		self.base_path.join(format!("{}.json", safe))
	}

	async fn read_order(&self, path: &Path) -> Result<Order, StorageError> {
		let bytes = fs::read(path)
			.await
			.map_err(|e| StorageError::Backend(format!("read: {}", e)))?;
		serde_json::from_slice(&bytes).map_err(|e| StorageError::Serialization(e.to_string()))
	}

	async fn write_order(&self, order: &Order) -> Result<(), StorageError> {
		let bytes = serde_json::to_vec_pretty(order)
			.map_err(|e| StorageError::Serialization(e.to_string()))?;
		let path = self.path_for(&order.request_id);
		let tmp = path.with_extension("json.tmp");
		fs::write(&tmp, bytes)
			.await
			.map_err(|e| StorageError::Backend(format!("write: {}", e)))?;
		fs::rename(&tmp, &path)
			.await
			.map_err(|e| StorageError::Backend(format!("rename: {}", e)))?;
		Ok(())
	}
}

#[async_trait]
impl OrderStoreBackend for FileOrderStore {
	async fn insert(&self, order: &Order) -> Result<(), StorageError> {
		let path = self.path_for(&order.request_id);
		if fs::try_exists(&path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?
		{
			return Err(StorageError::Duplicate(order.request_id.clone()));
		}
		self.write_order(order).await
	}

	async fn get(&self, request_id: &str) -> Result<Option<Order>, StorageError> {
		let path = self.path_for(request_id);
		if !fs::try_exists(&path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?
		{
			return Ok(None);
		}
		Ok(Some(self.read_order(&path).await?))
	}

	async fn update(
		&self,
		request_id: &str,
		apply: UpdateFn,
	) -> Result<(Order, bool), StorageError> {
		let lock = self.lock_for(request_id);
		let _guard = lock.lock().await;

		let path = self.path_for(request_id);
		if !fs::try_exists(&path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?
		{
			return Err(StorageError::NotFound(request_id.to_string()));
		}
		let mut order = self.read_order(&path).await?;
		let changed = apply(&mut order);
		if changed {
			self.write_order(&order).await?;
		}
		Ok((order, changed))
	}

	async fn find_by_reveal_email(&self, email: &str) -> Result<Vec<Order>, StorageError> {
		let mut entries = fs::read_dir(&self.base_path)
			.await
			.map_err(|e| StorageError::Backend(format!("read dir: {}", e)))?;

		let mut matches = Vec::new();
		while let Some(entry) = entries
			.next_entry()
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?
		{
			let path = entry.path();
			if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
				continue;
			}
			match self.read_order(&path).await {
				Ok(order) if order.reveal_email.as_deref() == Some(email) => {
					matches.push(order);
				}
				Ok(_) => {}
				Err(e) => {
					// A corrupt row should not take down the whole listing.
					tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable order record");
				}
			}
		}
		Ok(matches)
	}
}
