//! Object gateway: typed CRUD against the backing store.
//!
//! The gateway is the only path to the store. It consults the kind registry
//! before every call (operation support, body shape) and maps store failures
//! onto the proxy error taxonomy. Each call is independent; there is no
//! retrying and no caching here.

use std::sync::Arc;

use serde_json::Value;

use crate::config::CoreSeed;
use crate::error::{ErrorTag, ProxyError, ProxyResult};
use crate::kind::{Operation, ResourceKind};
use crate::resource::{ResourceManifest, ResourceRef, validate_name};
use crate::store::BackingStore;

/// Typed access to resources in a [`BackingStore`].
#[derive(Clone)]
pub struct ObjectGateway {
    store: Arc<dyn BackingStore>,
}

impl ObjectGateway {
    pub fn new(store: Arc<dyn BackingStore>) -> Self {
        Self { store }
    }

    fn check(reference: &ResourceRef, op: Operation) -> ProxyResult<()> {
        reference.kind.rules().ensure_supports(op)?;
        reference.validate()
    }

    pub fn get(&self, reference: &ResourceRef) -> ProxyResult<Value> {
        Self::check(reference, Operation::Get)?;
        self.store
            .get(reference)
            .map_err(|e| ProxyError::from_store(reference, e))
    }

    pub fn create(&self, reference: &ResourceRef, body: &Value) -> ProxyResult<()> {
        Self::check(reference, Operation::Create)?;
        reference.kind.rules().validate(body)?;
        self.store
            .create(reference, body)
            .map_err(|e| ProxyError::from_store(reference, e))?;
        tracing::debug!(resource = %reference, "created");
        Ok(())
    }

    pub fn update(&self, reference: &ResourceRef, body: &Value) -> ProxyResult<()> {
        Self::check(reference, Operation::Update)?;
        reference.kind.rules().validate(body)?;
        self.store
            .update(reference, body)
            .map_err(|e| ProxyError::from_store(reference, e))?;
        tracing::debug!(resource = %reference, "updated");
        Ok(())
    }

    pub fn delete(&self, reference: &ResourceRef) -> ProxyResult<()> {
        Self::check(reference, Operation::Delete)?;
        self.store
            .delete(reference)
            .map_err(|e| ProxyError::from_store(reference, e))?;
        tracing::debug!(resource = %reference, "deleted");
        Ok(())
    }

    /// Create a resource carried in by an archive or a config seed.
    ///
    /// Any registered kind may be restored, including kinds whose
    /// single-object routes never offer `create`. Identity and body rules
    /// still apply and an existing resource is never overwritten.
    pub fn restore(&self, reference: &ResourceRef, body: &Value) -> ProxyResult<()> {
        reference.validate()?;
        reference.kind.rules().validate(body)?;
        self.store
            .create(reference, body)
            .map_err(|e| ProxyError::from_store(reference, e))?;
        tracing::debug!(resource = %reference, "restored");
        Ok(())
    }

    /// Restore `reference` unless it already exists. Returns `true` if it was created.
    pub fn provision(&self, reference: &ResourceRef, body: &Value) -> ProxyResult<bool> {
        match self.restore(reference, body) {
            Ok(()) => Ok(true),
            Err(e) if e.tag() == ErrorTag::AlreadyExists => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Provision the CoreConfig singleton described by `seed`.
    pub fn seed_core(&self, seed: &CoreSeed) -> ProxyResult<bool> {
        if !seed.enabled {
            return Ok(false);
        }
        let reference = ResourceRef::new(ResourceKind::CoreConfig, &seed.namespace, &seed.name);
        let created = self.provision(&reference, &seed.spec)?;
        if created {
            tracing::info!(resource = %reference, "core config seeded");
        }
        Ok(created)
    }

    /// List resources of `kind`, across all namespaces when `namespace` is `None`.
    pub fn list(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
    ) -> ProxyResult<Vec<ResourceManifest>> {
        kind.rules().ensure_supports(Operation::List)?;
        if let Some(ns) = namespace {
            validate_name("namespace", ns)?;
        }
        self.store
            .list(kind, namespace)
            .map_err(|e| ProxyError::internal(e.to_string()))
    }
}

impl std::fmt::Debug for ObjectGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectGateway").finish()
    }
}
