//! Export engine: bundle an explicit selection of resources into one archive.
//!
//! Export is all-or-nothing. Every selected resource is read in order; the
//! first one that cannot be read aborts the whole call and no archive bytes
//! are produced. Export never mutates anything.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::archive::{self, Archive};
use crate::error::ProxyResult;
use crate::gateway::ObjectGateway;
use crate::resource::{ResourceManifest, ResourceRef, ResourceSelector};

/// Extension of every manifest entry.
pub const MANIFEST_EXTENSION: &str = "yaml";

/// Ordered, explicit list of resources to export. Duplicates are allowed and
/// each occurrence is exported as its own entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExportSelection(pub Vec<ResourceRef>);

impl ExportSelection {
    /// Resolve caller-supplied selectors. Fails on the first unknown kind or
    /// invalid identity, before any resource is read.
    pub fn resolve(selectors: &[ResourceSelector]) -> ProxyResult<Self> {
        selectors
            .iter()
            .map(ResourceSelector::resolve)
            .collect::<ProxyResult<Vec<_>>>()
            .map(ExportSelection)
    }

    pub fn refs(&self) -> &[ResourceRef] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<ResourceRef> for ExportSelection {
    fn from_iter<I: IntoIterator<Item = ResourceRef>>(iter: I) -> Self {
        ExportSelection(iter.into_iter().collect())
    }
}

/// Result of a successful export.
#[derive(Debug, Clone)]
pub struct ExportBundle {
    /// Encoded archive.
    pub bytes: Vec<u8>,
    /// Suggested download filename.
    pub filename: String,
    /// Entry names, in selection order.
    pub entries: Vec<String>,
}

/// Archive entry stem for a resource: `{kind}_{namespace}_{name}`.
pub fn entry_stem(reference: &ResourceRef) -> String {
    format!(
        "{}_{}_{}",
        reference.kind.as_str().to_lowercase(),
        reference.namespace,
        reference.name
    )
}

/// Suggested archive filename for an export taken at `now`.
pub fn archive_filename(now: DateTime<Utc>) -> String {
    format!("{}.{}", now.format("%Y-%m-%d-%H-%M-%S"), archive::EXTENSION)
}

/// Export `selection` through `gateway`.
pub fn export_resources(
    gateway: &ObjectGateway,
    selection: &ExportSelection,
) -> ProxyResult<ExportBundle> {
    let mut archive = Archive::new();
    let mut entries = Vec::with_capacity(selection.len());

    for reference in selection.refs() {
        let body = gateway.get(reference).inspect_err(|e| {
            tracing::warn!(resource = %reference, error = %e, "export aborted");
        })?;
        let yaml = ResourceManifest::new(reference, body).to_yaml()?;
        let name = archive.push_unique(&entry_stem(reference), MANIFEST_EXTENSION, yaml.into_bytes());
        entries.push(name);
    }

    let bytes = archive.encode()?;
    tracing::info!(resources = entries.len(), bytes = bytes.len(), "export complete");
    Ok(ExportBundle {
        bytes,
        filename: archive_filename(Utc::now()),
        entries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ArchiveLimits;
    use crate::error::ErrorTag;
    use crate::kind::ResourceKind;
    use crate::store::{BackingStore, MemStore};
    use chrono::TimeZone;
    use serde_json::json;
    use std::sync::Arc;

    fn seeded() -> ObjectGateway {
        let store = Arc::new(MemStore::new());
        store
            .create(
                &ResourceRef::new(ResourceKind::Dataset, "ns1", "d1"),
                &json!({"fileFormat": "csv", "schemas": []}),
            )
            .unwrap();
        store
            .create(
                &ResourceRef::new(ResourceKind::Pipeline, "ns1", "p1"),
                &json!({"pipelineEndpoints": []}),
            )
            .unwrap();
        ObjectGateway::new(store)
    }

    #[test]
    fn filename_from_timestamp() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(archive_filename(at), "2024-03-09-07-05-01.tar.gz");
    }

    #[test]
    fn entry_stem_is_lowercase_kind() {
        let r = ResourceRef::new(ResourceKind::CostExporter, "ns1", "c1");
        assert_eq!(entry_stem(&r), "costexporter_ns1_c1");
    }

    #[test]
    fn exports_selection_in_order() {
        let gw = seeded();
        let selection: ExportSelection = [
            ResourceRef::new(ResourceKind::Pipeline, "ns1", "p1"),
            ResourceRef::new(ResourceKind::Dataset, "ns1", "d1"),
        ]
        .into_iter()
        .collect();
        let bundle = export_resources(&gw, &selection).unwrap();
        assert_eq!(bundle.entries, ["pipeline_ns1_p1.yaml", "dataset_ns1_d1.yaml"]);
        assert!(bundle.filename.ends_with(".tar.gz"));

        let archive = Archive::decode(&bundle.bytes, &ArchiveLimits::default()).unwrap();
        let first = std::str::from_utf8(&archive.entries()[0].data).unwrap();
        let manifest = ResourceManifest::from_yaml(first).unwrap();
        assert_eq!(manifest.reference(), selection.refs()[0]);
    }

    #[test]
    fn duplicates_get_distinct_entries() {
        let gw = seeded();
        let d1 = ResourceRef::new(ResourceKind::Dataset, "ns1", "d1");
        let selection = ExportSelection(vec![d1.clone(), d1]);
        let bundle = export_resources(&gw, &selection).unwrap();
        assert_eq!(bundle.entries, ["dataset_ns1_d1.yaml", "dataset_ns1_d1-1.yaml"]);
    }

    #[test]
    fn missing_resource_fails_whole_export() {
        let gw = seeded();
        let selection = ExportSelection(vec![
            ResourceRef::new(ResourceKind::Dataset, "ns1", "d1"),
            ResourceRef::new(ResourceKind::Dataset, "ns1", "missing"),
            ResourceRef::new(ResourceKind::Pipeline, "ns1", "p1"),
        ]);
        let err = export_resources(&gw, &selection).unwrap_err();
        assert_eq!(err.tag(), ErrorTag::NotFound);
        assert!(err.to_string().contains("Dataset/ns1/missing"));
    }

    #[test]
    fn empty_selection_yields_empty_archive() {
        let bundle = export_resources(&seeded(), &ExportSelection::default()).unwrap();
        assert!(bundle.entries.is_empty());
        let archive = Archive::decode(&bundle.bytes, &ArchiveLimits::default()).unwrap();
        assert!(archive.is_empty());
    }

    #[test]
    fn resolve_rejects_unknown_kinds_up_front() {
        let selectors = vec![
            ResourceSelector {
                kind: "Dataset".into(),
                namespace: "ns1".into(),
                name: "d1".into(),
            },
            ResourceSelector {
                kind: "Gadget".into(),
                namespace: "ns1".into(),
                name: "g1".into(),
            },
        ];
        let err = ExportSelection::resolve(&selectors).unwrap_err();
        assert_eq!(err.tag(), ErrorTag::UnknownKind);
    }
}
