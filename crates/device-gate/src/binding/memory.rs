//! In-memory binding store.

use super::{BindOutcome, BindingStore, DeviceBinding};
use crate::error::StoreError;
use async_trait::async_trait;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Process-local bindings, for tests and single-instance deployments.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<i64, DeviceBinding>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored bindings.
    pub async fn count(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl BindingStore for MemoryStore {
    async fn get(&self, user_id: i64) -> Result<Option<DeviceBinding>, StoreError> {
        Ok(self.records.read().await.get(&user_id).cloned())
    }

    async fn bind_if_absent(
        &self,
        user_id: i64,
        binding: DeviceBinding,
    ) -> Result<BindOutcome, StoreError> {
        let mut records = self.records.write().await;
        match records.entry(user_id) {
            Entry::Occupied(existing) => Ok(BindOutcome::Existing(existing.get().clone())),
            Entry::Vacant(slot) => Ok(BindOutcome::Created(slot.insert(binding).clone())),
        }
    }
}
