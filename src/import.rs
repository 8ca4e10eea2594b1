//! Import engine: re-create every manifest in an archive, isolating failures.
//!
//! Only an archive that cannot be opened fails the call. Every other problem
//! (an entry that is not a valid manifest, a resource that already exists, a
//! body that fails validation, a store error) is recorded against its entry
//! in [`ImportStatistics`] and processing moves on to the next entry.
//! Entries are processed strictly in archive order, so failures are reported
//! in that order too.

use serde::{Deserialize, Serialize};

use crate::archive::Archive;
use crate::config::ArchiveLimits;
use crate::error::{ErrorTag, ProxyError, ProxyResult};
use crate::gateway::ObjectGateway;
use crate::resource::{ResourceManifest, ResourceRef};

/// One entry that could not be imported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportFailure {
    /// Archive entry name.
    pub entry: String,
    /// The resource, when the entry parsed far enough to name one.
    pub resource: Option<ResourceRef>,
    pub reason: ErrorTag,
    pub message: String,
}

/// Aggregate outcome of one import. `total == succeeded + failed`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportStatistics {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub failures: Vec<ImportFailure>,
}

impl ImportStatistics {
    fn record_success(&mut self) {
        self.total += 1;
        self.succeeded += 1;
    }

    fn record_failure(&mut self, entry: &str, resource: Option<ResourceRef>, error: &ProxyError) {
        self.total += 1;
        self.failed += 1;
        self.failures.push(ImportFailure {
            entry: entry.to_string(),
            resource,
            reason: error.tag(),
            message: error.to_string(),
        });
    }

    /// Resources whose import failed, for a targeted retry.
    pub fn failed_resources(&self) -> impl Iterator<Item = &ResourceRef> {
        self.failures.iter().filter_map(|f| f.resource.as_ref())
    }
}

/// Decode `bytes` and import every entry through `gateway`.
pub fn import_resources(
    gateway: &ObjectGateway,
    bytes: &[u8],
    limits: &ArchiveLimits,
) -> ProxyResult<ImportStatistics> {
    let archive = Archive::decode(bytes, limits).map_err(|e| {
        tracing::warn!(error = %e, "import rejected: archive could not be opened");
        ProxyError::from(e)
    })?;
    Ok(import_archive(gateway, &archive))
}

/// Import every entry of an already decoded archive.
pub fn import_archive(gateway: &ObjectGateway, archive: &Archive) -> ImportStatistics {
    let mut stats = ImportStatistics::default();

    for entry in archive.entries() {
        let manifest = std::str::from_utf8(&entry.data)
            .map_err(|e| ProxyError::decode(format!("entry is not UTF-8: {e}")))
            .and_then(ResourceManifest::from_yaml);
        let manifest = match manifest {
            Ok(m) => m,
            Err(e) => {
                tracing::debug!(entry = %entry.name, error = %e, "import: unparsable entry");
                stats.record_failure(&entry.name, None, &e);
                continue;
            }
        };

        let reference = manifest.reference();
        match gateway.restore(&reference, &manifest.body) {
            Ok(()) => stats.record_success(),
            Err(e) => {
                tracing::debug!(entry = %entry.name, resource = %reference, error = %e, "import: restore failed");
                stats.record_failure(&entry.name, Some(reference), &e);
            }
        }
    }

    tracing::info!(
        total = stats.total,
        succeeded = stats.succeeded,
        failed = stats.failed,
        "import complete"
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::ResourceKind;
    use crate::store::{BackingStore, MemStore};
    use serde_json::json;
    use std::sync::Arc;

    fn manifest(kind: ResourceKind, ns: &str, name: &str, body: serde_json::Value) -> Vec<u8> {
        ResourceManifest::new(&ResourceRef::new(kind, ns, name), body)
            .to_yaml()
            .unwrap()
            .into_bytes()
    }

    fn schema(name: &str) -> Vec<u8> {
        manifest(ResourceKind::Schema, "ns1", name, json!({"columns": []}))
    }

    fn encode(entries: Vec<(&str, Vec<u8>)>) -> Vec<u8> {
        let mut archive = Archive::new();
        for (name, data) in entries {
            archive.push(name, data).unwrap();
        }
        archive.encode().unwrap()
    }

    fn setup() -> (ObjectGateway, Arc<MemStore>) {
        let store = Arc::new(MemStore::new());
        (ObjectGateway::new(store.clone()), store)
    }

    #[test]
    fn imports_all_well_formed_entries() {
        let (gw, store) = setup();
        let bytes = encode(vec![("a.yaml", schema("a")), ("b.yaml", schema("b"))]);
        let stats = import_resources(&gw, &bytes, &ArchiveLimits::default()).unwrap();
        assert_eq!((stats.total, stats.succeeded, stats.failed), (2, 2, 0));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn malformed_entry_is_isolated() {
        let (gw, store) = setup();
        let bytes = encode(vec![
            ("a.yaml", schema("a")),
            ("broken.yaml", b"kind: [unterminated".to_vec()),
            ("binary.bin", vec![0xff, 0xfe, 0x00]),
            ("c.yaml", schema("c")),
        ]);
        let stats = import_resources(&gw, &bytes, &ArchiveLimits::default()).unwrap();
        assert_eq!((stats.total, stats.succeeded, stats.failed), (4, 2, 2));
        assert_eq!(stats.failures[0].entry, "broken.yaml");
        assert_eq!(stats.failures[0].reason, ErrorTag::DecodeError);
        assert_eq!(stats.failures[0].resource, None);
        assert_eq!(stats.failures[1].entry, "binary.bin");
        assert!(store.get(&ResourceRef::new(ResourceKind::Schema, "ns1", "c")).is_ok());
    }

    #[test]
    fn create_failures_carry_ref_and_reason() {
        let (gw, store) = setup();
        let existing = ResourceRef::new(ResourceKind::Schema, "ns1", "a");
        store.create(&existing, &json!({"columns": []})).unwrap();

        let bytes = encode(vec![
            ("a.yaml", schema("a")),
            ("bad-body.yaml", manifest(ResourceKind::Dataset, "ns1", "d", json!({"fileFormat": "csv"}))),
            ("widget.yaml", b"kind: Widget\nmetadata: {namespace: ns1, name: w}\nspec: {}\n".to_vec()),
            ("b.yaml", schema("b")),
        ]);
        let stats = import_resources(&gw, &bytes, &ArchiveLimits::default()).unwrap();
        assert_eq!((stats.total, stats.succeeded, stats.failed), (4, 1, 3));

        let reasons: Vec<ErrorTag> = stats.failures.iter().map(|f| f.reason).collect();
        assert_eq!(
            reasons,
            [ErrorTag::AlreadyExists, ErrorTag::ValidationError, ErrorTag::UnknownKind]
        );
        assert_eq!(stats.failures[2].resource, None);
        assert_eq!(stats.failed_resources().next(), Some(&existing));
        assert_eq!(stats.failed, stats.failures.len());
    }

    #[test]
    fn core_config_is_recreated_from_archive() {
        let (gw, store) = setup();
        let bytes = encode(vec![
            ("core.yaml", manifest(ResourceKind::CoreConfig, "plantd", "core", json!({"prometheusConfiguration": {}}))),
            ("s.yaml", schema("s")),
        ]);
        let stats = import_resources(&gw, &bytes, &ArchiveLimits::default()).unwrap();
        assert_eq!((stats.total, stats.succeeded, stats.failed), (2, 2, 0));
        let core = ResourceRef::new(ResourceKind::CoreConfig, "plantd", "core");
        assert_eq!(store.get(&core).unwrap(), json!({"prometheusConfiguration": {}}));
    }

    #[test]
    fn corrupt_container_is_top_level_decode_error() {
        let (gw, store) = setup();
        let err = import_resources(&gw, b"PK\x03\x04 not a tarball", &ArchiveLimits::default())
            .unwrap_err();
        assert_eq!(err.tag(), ErrorTag::DecodeError);
        assert!(store.is_empty());
    }

    #[test]
    fn statistics_serialize_for_transport() {
        let (gw, _) = setup();
        let bytes = encode(vec![("x.yaml", b"nope".to_vec())]);
        let stats = import_resources(&gw, &bytes, &ArchiveLimits::default()).unwrap();
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["total"], 1);
        assert_eq!(json["failures"][0]["reason"], "DecodeError");
    }
}
