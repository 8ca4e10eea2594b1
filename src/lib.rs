// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # plantd-proxy
//!
//! Control-plane proxy for PlantD resources: typed single-object access to
//! every resource kind plus bulk export/import of resource manifests as
//! portable archives.
//!
//! ## Architecture
//!
//! - **Kind registry** (`kind`): closed set of kinds, aliases, supported operations, body rules
//! - **Object gateway** (`gateway`): validated CRUD over a pluggable [`store::BackingStore`]
//! - **Dispatcher** (`dispatch`): resolves a kind tag and routes one request to the gateway
//! - **Export / import** (`export`, `import`): fail-fast bundling, fail-soft re-creation
//! - **Archive** (`archive`): gzip-compressed tar container of YAML manifests
//! - **Server / client** (`server`, `client`): HTTP binding and its blocking client
//!
//! ## Library usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use plantd_proxy::config::ArchiveLimits;
//! use plantd_proxy::export::{ExportSelection, export_resources};
//! use plantd_proxy::gateway::ObjectGateway;
//! use plantd_proxy::import::import_resources;
//! use plantd_proxy::kind::ResourceKind;
//! use plantd_proxy::resource::ResourceRef;
//! use plantd_proxy::store::MemStore;
//!
//! let gateway = ObjectGateway::new(Arc::new(MemStore::new()));
//! let schema = ResourceRef::new(ResourceKind::Schema, "ns1", "orders");
//! gateway.create(&schema, &serde_json::json!({"columns": []})).unwrap();
//!
//! let bundle = export_resources(&gateway, &ExportSelection(vec![schema])).unwrap();
//! let target = ObjectGateway::new(Arc::new(MemStore::new()));
//! let stats = import_resources(&target, &bundle.bytes, &ArchiveLimits::default()).unwrap();
//! assert_eq!(stats.succeeded, 1);
//! ```

pub mod archive;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod export;
pub mod gateway;
pub mod import;
pub mod kind;
pub mod paths;
pub mod resource;
#[cfg(feature = "server")]
pub mod server;
pub mod store;
