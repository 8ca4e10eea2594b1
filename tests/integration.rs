//! End-to-end tests for the proxy core.
//!
//! These exercise export and import together through the object gateway and
//! dispatcher, checking the bulk-transfer guarantees: round trips are
//! lossless, import isolates per-entry failures, and export is all-or-nothing.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::{Value, json};

use plantd_proxy::archive::Archive;
use plantd_proxy::config::ArchiveLimits;
use plantd_proxy::dispatch::{DispatchRequest, Dispatcher, Status};
use plantd_proxy::error::{ErrorTag, StoreResult};
use plantd_proxy::export::{ExportSelection, export_resources};
use plantd_proxy::gateway::ObjectGateway;
use plantd_proxy::import::import_resources;
use plantd_proxy::kind::{Operation, ResourceKind};
use plantd_proxy::resource::{ResourceManifest, ResourceRef};
use plantd_proxy::store::{BackingStore, MemStore};

/// Store wrapper that counts every call reaching the backing store.
#[derive(Default)]
struct CountingStore {
    inner: MemStore,
    calls: AtomicUsize,
}

impl CountingStore {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

impl BackingStore for CountingStore {
    fn get(&self, reference: &ResourceRef) -> StoreResult<Value> {
        self.hit();
        self.inner.get(reference)
    }

    fn create(&self, reference: &ResourceRef, body: &Value) -> StoreResult<()> {
        self.hit();
        self.inner.create(reference, body)
    }

    fn update(&self, reference: &ResourceRef, body: &Value) -> StoreResult<()> {
        self.hit();
        self.inner.update(reference, body)
    }

    fn delete(&self, reference: &ResourceRef) -> StoreResult<()> {
        self.hit();
        self.inner.delete(reference)
    }

    fn list(&self, kind: ResourceKind, namespace: Option<&str>) -> StoreResult<Vec<ResourceManifest>> {
        self.hit();
        self.inner.list(kind, namespace)
    }
}

/// A realistic population covering every kind, the core singleton included.
fn population() -> Vec<(ResourceRef, Value)> {
    vec![
        (
            ResourceRef::new(ResourceKind::Schema, "ns1", "orders"),
            json!({"columns": [
                {"name": "id", "type": "int"},
                {"name": "amount", "type": "float", "params": {"min": 0.5, "max": 99.5}}
            ]}),
        ),
        (
            ResourceRef::new(ResourceKind::Dataset, "ns1", "d1"),
            json!({
                "fileFormat": "csv",
                "compressPerSchema": true,
                "schemas": [{"name": "orders", "numRecords": {"min": 10, "max": 100}}]
            }),
        ),
        (
            ResourceRef::new(ResourceKind::LoadPattern, "ns1", "ramp"),
            json!({"stages": [{"target": 10, "duration": "30s"}, {"target": 50, "duration": "1m"}]}),
        ),
        (
            ResourceRef::new(ResourceKind::Pipeline, "ns1", "p1"),
            json!({
                "inCluster": false,
                "pipelineEndpoints": [{"name": "ingest", "http": {"url": "http://example.test/ingest"}}]
            }),
        ),
        (
            ResourceRef::new(ResourceKind::Experiment, "ns1", "e1"),
            json!({
                "pipelineRef": {"namespace": "ns1", "name": "p1"},
                "endpointSpecs": [{"endpointName": "ingest", "dataSpec": {"dataSetRef": {"name": "d1"}}}]
            }),
        ),
        (
            ResourceRef::new(ResourceKind::CostExporter, "ns2", "aws"),
            json!({"s3Bucket": "billing", "cloudServiceProvider": "aws"}),
        ),
        (
            ResourceRef::new(ResourceKind::CoreConfig, "plantd", "plantd-core"),
            json!({"prometheusConfiguration": {"scrapeInterval": "15s"}, "redisConfiguration": {}}),
        ),
    ]
}

fn seeded_gateway() -> (ObjectGateway, Vec<(ResourceRef, Value)>) {
    let gateway = ObjectGateway::new(Arc::new(MemStore::new()));
    let resources = population();
    for (reference, body) in &resources {
        gateway.restore(reference, body).unwrap();
    }
    (gateway, resources)
}

fn selection_of(resources: &[(ResourceRef, Value)]) -> ExportSelection {
    resources.iter().map(|(r, _)| r.clone()).collect()
}

#[test]
fn export_import_round_trip_is_lossless() {
    let (source, resources) = seeded_gateway();
    let bundle = export_resources(&source, &selection_of(&resources)).unwrap();

    let target = ObjectGateway::new(Arc::new(MemStore::new()));
    let stats = import_resources(&target, &bundle.bytes, &ArchiveLimits::default()).unwrap();

    let n = resources.len();
    assert_eq!((stats.total, stats.succeeded, stats.failed), (n, n, 0));
    assert!(stats.failures.is_empty());
    for (reference, body) in &resources {
        assert_eq!(&target.get(reference).unwrap(), body, "{reference} differs");
    }
}

#[test]
fn reimport_reports_every_item_as_already_existing() {
    let (source, resources) = seeded_gateway();
    let bundle = export_resources(&source, &selection_of(&resources)).unwrap();

    let stats = import_resources(&source, &bundle.bytes, &ArchiveLimits::default()).unwrap();
    let n = resources.len();
    assert_eq!((stats.total, stats.succeeded, stats.failed), (n, 0, n));
    assert!(stats.failures.iter().all(|f| f.reason == ErrorTag::AlreadyExists));

    // Failures come back in archive order, naming the resource each time.
    let failed: Vec<&ResourceRef> = stats.failed_resources().collect();
    let expected: Vec<&ResourceRef> = resources.iter().map(|(r, _)| r).collect();
    assert_eq!(failed, expected);
}

#[test]
fn one_malformed_entry_does_not_block_the_rest() {
    let (source, resources) = seeded_gateway();
    let bundle = export_resources(&source, &selection_of(&resources)).unwrap();

    // Rebuild the archive with one entry's content corrupted.
    let decoded = Archive::decode(&bundle.bytes, &ArchiveLimits::default()).unwrap();
    let mut tampered = Archive::new();
    for (i, entry) in decoded.entries().iter().enumerate() {
        let data = if i == 2 {
            b"apiVersion: [this is not a manifest".to_vec()
        } else {
            entry.data.clone()
        };
        tampered.push(entry.name.clone(), data).unwrap();
    }
    let bytes = tampered.encode().unwrap();

    let target = ObjectGateway::new(Arc::new(MemStore::new()));
    let stats = import_resources(&target, &bytes, &ArchiveLimits::default()).unwrap();
    let n = resources.len();
    assert_eq!((stats.total, stats.succeeded, stats.failed), (n, n - 1, 1));
    assert_eq!(stats.failures[0].entry, decoded.entries()[2].name);
    assert_eq!(stats.failures[0].reason, ErrorTag::DecodeError);

    for (i, (reference, body)) in resources.iter().enumerate() {
        if i == 2 {
            assert!(target.get(reference).is_err());
        } else {
            assert_eq!(&target.get(reference).unwrap(), body);
        }
    }
}

#[test]
fn export_with_a_missing_resource_produces_no_archive() {
    let (source, resources) = seeded_gateway();
    let mut refs: Vec<ResourceRef> = resources.iter().map(|(r, _)| r.clone()).collect();
    refs.insert(1, ResourceRef::new(ResourceKind::Dataset, "ns1", "ghost"));

    let err = export_resources(&source, &ExportSelection(refs)).unwrap_err();
    assert_eq!(err.tag(), ErrorTag::NotFound);
}

#[test]
fn dataset_and_pipeline_export_has_two_unique_entries() {
    let (source, _) = seeded_gateway();
    let selection = ExportSelection(vec![
        ResourceRef::new(ResourceKind::Dataset, "ns1", "d1"),
        ResourceRef::new(ResourceKind::Pipeline, "ns1", "p1"),
    ]);
    let bundle = export_resources(&source, &selection).unwrap();

    let archive = Archive::decode(&bundle.bytes, &ArchiveLimits::default()).unwrap();
    assert_eq!(archive.len(), 2);
    let names: Vec<&str> = archive.entries().iter().map(|e| e.name.as_str()).collect();
    assert_ne!(names[0], names[1]);
    assert_eq!(names, bundle.entries);
}

#[test]
fn unknown_kind_never_reaches_the_store() {
    let store = Arc::new(CountingStore::default());
    let dispatcher = Dispatcher::new(ObjectGateway::new(store.clone()));

    let result = dispatcher.dispatch(
        DispatchRequest::new(Operation::Create, "UnknownKind123")
            .namespace("ns1")
            .name("x")
            .body(json!({"columns": []})),
    );
    assert_eq!(result.as_ref().unwrap_err().tag(), ErrorTag::UnknownKind);
    assert_eq!(Status::of(&result), Status::BadRequest);
    assert_eq!(store.calls(), 0);

    // A known kind does reach it.
    dispatcher
        .dispatch(
            DispatchRequest::new(Operation::Create, "Schema")
                .namespace("ns1")
                .name("x")
                .body(json!({"columns": []})),
        )
        .unwrap();
    assert_eq!(store.calls(), 1);
}

#[test]
fn every_registered_tag_resolves() {
    for kind in ResourceKind::ALL {
        let rules = kind.rules();
        for tag in [kind.as_str(), rules.crd_kind, rules.plural] {
            assert_eq!(ResourceKind::from_tag(tag).unwrap(), kind, "tag {tag}");
        }
    }
    for tag in ["", "dataset ", "Gadget", "UnknownKind123"] {
        assert_eq!(
            ResourceKind::from_tag(tag).unwrap_err().tag(),
            ErrorTag::UnknownKind
        );
    }
}
