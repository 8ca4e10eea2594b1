//! ACID-durable backing store backed by redb.
//!
//! Resources live in one table keyed by `{kind}/{namespace}/{name}` with
//! JSON-encoded bodies. Every mutation runs in its own write transaction, so
//! `create` is an atomic check-and-insert.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableTable, TableDefinition};
use serde_json::Value;

use crate::error::{StoreError, StoreResult};
use crate::kind::ResourceKind;
use crate::resource::{ResourceManifest, ResourceRef};
use crate::store::BackingStore;

/// Database file name inside the data directory.
pub const DB_FILE: &str = "plantd-proxy.redb";

/// Table of resource bodies (store key → JSON bytes).
const RESOURCES: TableDefinition<&str, &[u8]> = TableDefinition::new("resources");

fn redb_err(context: &str, e: impl Into<redb::Error>) -> StoreError {
    StoreError::Redb {
        message: format!("{context} failed: {}", e.into()),
    }
}

/// ACID-durable store using redb.
pub struct DurableStore {
    db: Arc<Database>,
}

impl DurableStore {
    /// Open or create a durable store in the given directory.
    pub fn open(data_dir: &Path) -> StoreResult<Self> {
        std::fs::create_dir_all(data_dir).map_err(|e| StoreError::Io { source: e })?;
        let db_path = data_dir.join(DB_FILE);
        let db = Database::create(&db_path).map_err(|e| StoreError::Redb {
            message: format!("failed to open redb at {}: {e}", db_path.display()),
        })?;

        // Make sure the table exists so read transactions never see it missing.
        let txn = db.begin_write().map_err(|e| redb_err("begin_write", e))?;
        txn.open_table(RESOURCES)
            .map_err(|e| redb_err("open_table", e))?;
        txn.commit().map_err(|e| redb_err("commit", e))?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Run `f` inside a write transaction on the resources table and commit.
    fn write<T>(
        &self,
        f: impl FnOnce(&mut redb::Table<'_, &'static str, &'static [u8]>) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let txn = self
            .db
            .begin_write()
            .map_err(|e| redb_err("begin_write", e))?;
        let result = {
            let mut table = txn
                .open_table(RESOURCES)
                .map_err(|e| redb_err("open_table", e))?;
            f(&mut table)?
        };
        txn.commit().map_err(|e| redb_err("commit", e))?;
        Ok(result)
    }
}

fn encode(body: &Value) -> StoreResult<Vec<u8>> {
    serde_json::to_vec(body).map_err(|e| StoreError::Serialization {
        message: format!("failed to encode body: {e}"),
    })
}

fn decode(bytes: &[u8]) -> StoreResult<Value> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::Serialization {
        message: format!("failed to decode body: {e}"),
    })
}

impl BackingStore for DurableStore {
    fn get(&self, reference: &ResourceRef) -> StoreResult<Value> {
        let key = reference.key();
        let txn = self
            .db
            .begin_read()
            .map_err(|e| redb_err("begin_read", e))?;
        let table = txn
            .open_table(RESOURCES)
            .map_err(|e| redb_err("open_table", e))?;
        let guard = table
            .get(key.as_str())
            .map_err(|e| redb_err("get", e))?;
        match guard {
            Some(bytes) => decode(bytes.value()),
            None => Err(StoreError::NotFound { key }),
        }
    }

    fn create(&self, reference: &ResourceRef, body: &Value) -> StoreResult<()> {
        let key = reference.key();
        let bytes = encode(body)?;
        self.write(|table| {
            let exists = table
                .get(key.as_str())
                .map_err(|e| redb_err("get", e))?
                .is_some();
            if exists {
                return Err(StoreError::AlreadyExists { key: key.clone() });
            }
            table
                .insert(key.as_str(), bytes.as_slice())
                .map_err(|e| redb_err("insert", e))?;
            Ok(())
        })
    }

    fn update(&self, reference: &ResourceRef, body: &Value) -> StoreResult<()> {
        let key = reference.key();
        let bytes = encode(body)?;
        self.write(|table| {
            let exists = table
                .get(key.as_str())
                .map_err(|e| redb_err("get", e))?
                .is_some();
            if !exists {
                return Err(StoreError::NotFound { key: key.clone() });
            }
            table
                .insert(key.as_str(), bytes.as_slice())
                .map_err(|e| redb_err("insert", e))?;
            Ok(())
        })
    }

    fn delete(&self, reference: &ResourceRef) -> StoreResult<()> {
        let key = reference.key();
        self.write(|table| {
            let removed = table
                .remove(key.as_str())
                .map_err(|e| redb_err("remove", e))?
                .is_some();
            if removed {
                Ok(())
            } else {
                Err(StoreError::NotFound { key: key.clone() })
            }
        })
    }

    fn list(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
    ) -> StoreResult<Vec<ResourceManifest>> {
        let prefix = match namespace {
            Some(ns) => format!("{kind}/{ns}/"),
            None => format!("{kind}/"),
        };
        let txn = self
            .db
            .begin_read()
            .map_err(|e| redb_err("begin_read", e))?;
        let table = txn
            .open_table(RESOURCES)
            .map_err(|e| redb_err("open_table", e))?;
        let range = table
            .range(prefix.as_str()..)
            .map_err(|e| redb_err("range", e))?;

        let mut items = Vec::new();
        for entry in range {
            let (key, value) = entry.map_err(|e| redb_err("range", e))?;
            let key = key.value();
            let Some(rest) = key.strip_prefix(prefix.as_str()) else {
                break;
            };
            let reference = match namespace {
                Some(ns) => ResourceRef::new(kind, ns, rest),
                None => {
                    let Some((ns, name)) = rest.split_once('/') else {
                        continue;
                    };
                    ResourceRef::new(kind, ns, name)
                }
            };
            items.push(ResourceManifest::new(&reference, decode(value.value())?));
        }
        // Key order puts `ns-a/` before `ns/`, so re-sort on the parsed parts.
        items.sort_by(|a, b| {
            (&a.metadata.namespace, &a.metadata.name).cmp(&(&b.metadata.namespace, &b.metadata.name))
        });
        Ok(items)
    }
}

impl std::fmt::Debug for DurableStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurableStore").finish()
    }
}
