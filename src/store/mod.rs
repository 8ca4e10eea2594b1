//! Backing stores for resource bodies.
//!
//! The proxy never persists anything itself: it talks to a [`BackingStore`],
//! the capability interface of the system of record. Two local
//! implementations ship with the crate:
//!
//! - [`MemStore`]: concurrent in-memory map (DashMap), lost on exit
//! - [`DurableStore`]: ACID key-value file (redb), survives restarts
//!
//! Namespace + name uniqueness is enforced here, not by the callers:
//! `create` is an atomic check-and-insert.

pub mod durable;
pub mod mem;

use std::sync::Arc;

use serde_json::Value;

use crate::config::{StoreBackend, StoreConfig};
use crate::error::StoreResult;
use crate::kind::ResourceKind;
use crate::paths::ProxyPaths;
use crate::resource::{ResourceManifest, ResourceRef};

pub use durable::DurableStore;
pub use mem::MemStore;

/// The system of record, addressed by `(kind, namespace, name)`.
pub trait BackingStore: Send + Sync {
    /// Fetch a body. `StoreError::NotFound` if absent.
    fn get(&self, reference: &ResourceRef) -> StoreResult<Value>;

    /// Insert a new body. `StoreError::AlreadyExists` if present.
    fn create(&self, reference: &ResourceRef, body: &Value) -> StoreResult<()>;

    /// Replace an existing body. `StoreError::NotFound` if absent.
    fn update(&self, reference: &ResourceRef, body: &Value) -> StoreResult<()>;

    /// Remove a body. `StoreError::NotFound` if absent.
    fn delete(&self, reference: &ResourceRef) -> StoreResult<()>;

    /// All resources of `kind`, optionally restricted to one namespace,
    /// ordered by namespace then name.
    fn list(&self, kind: ResourceKind, namespace: Option<&str>)
    -> StoreResult<Vec<ResourceManifest>>;
}

/// Open the store selected by `config`.
///
/// The durable backend lives in `config.data_dir`, falling back to the XDG
/// data directory.
pub fn open(config: &StoreConfig, paths: &ProxyPaths) -> StoreResult<Arc<dyn BackingStore>> {
    match config.backend {
        StoreBackend::Memory => {
            tracing::info!("using in-memory backing store");
            Ok(Arc::new(MemStore::new()))
        }
        StoreBackend::Durable => {
            let dir = config
                .data_dir
                .clone()
                .unwrap_or_else(|| paths.store_dir());
            tracing::info!(dir = %dir.display(), "using durable backing store");
            Ok(Arc::new(DurableStore::open(&dir)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn test_paths(root: &std::path::Path) -> ProxyPaths {
        ProxyPaths {
            config_dir: root.join("config"),
            data_dir: root.join("data"),
        }
    }

    #[test]
    fn open_memory_backend() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = open(&StoreConfig::default(), &test_paths(dir.path())).unwrap();
        assert!(store.list(ResourceKind::Schema, None).unwrap().is_empty());
    }

    #[test]
    fn open_durable_backend_in_configured_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let data_dir: PathBuf = dir.path().join("custom");
        let config = StoreConfig {
            backend: StoreBackend::Durable,
            data_dir: Some(data_dir.clone()),
        };
        let store = open(&config, &test_paths(dir.path())).unwrap();
        let r = ResourceRef::new(ResourceKind::Schema, "ns1", "s1");
        store.create(&r, &serde_json::json!({"columns": []})).unwrap();
        assert!(data_dir.join(durable::DB_FILE).exists());
    }
}
