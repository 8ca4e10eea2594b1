//! In-memory backing store backed by DashMap.
//!
//! Default backend for development and tests. All data is lost on process exit.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde_json::Value;

use crate::error::{StoreError, StoreResult};
use crate::kind::ResourceKind;
use crate::resource::{ResourceManifest, ResourceRef};
use crate::store::BackingStore;

/// Concurrent in-memory store using a sharded hashmap.
#[derive(Debug)]
pub struct MemStore {
    data: DashMap<ResourceRef, Value>,
}

impl MemStore {
    /// Create an empty in-memory store.
    pub fn new() -> Self {
        Self {
            data: DashMap::new(),
        }
    }

    /// Number of stored resources across all kinds.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BackingStore for MemStore {
    fn get(&self, reference: &ResourceRef) -> StoreResult<Value> {
        self.data
            .get(reference)
            .map(|v| v.value().clone())
            .ok_or_else(|| StoreError::NotFound {
                key: reference.key(),
            })
    }

    fn create(&self, reference: &ResourceRef, body: &Value) -> StoreResult<()> {
        // The entry guard holds the shard lock, so check-and-insert is atomic.
        match self.data.entry(reference.clone()) {
            Entry::Occupied(_) => Err(StoreError::AlreadyExists {
                key: reference.key(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(body.clone());
                Ok(())
            }
        }
    }

    fn update(&self, reference: &ResourceRef, body: &Value) -> StoreResult<()> {
        match self.data.get_mut(reference) {
            Some(mut existing) => {
                *existing = body.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound {
                key: reference.key(),
            }),
        }
    }

    fn delete(&self, reference: &ResourceRef) -> StoreResult<()> {
        self.data
            .remove(reference)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound {
                key: reference.key(),
            })
    }

    fn list(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
    ) -> StoreResult<Vec<ResourceManifest>> {
        let mut items: Vec<ResourceManifest> = self
            .data
            .iter()
            .filter(|entry| {
                let r = entry.key();
                r.kind == kind && namespace.is_none_or(|ns| r.namespace == ns)
            })
            .map(|entry| ResourceManifest::new(entry.key(), entry.value().clone()))
            .collect();
        items.sort_by(|a, b| a.metadata.namespace.cmp(&b.metadata.namespace).then_with(|| a.metadata.name.cmp(&b.metadata.name)));
        Ok(items)
    }
}
