//! Kind registry: the closed set of resource kinds the proxy understands.
//!
//! Every kind maps to a static [`KindRules`] entry describing its API group,
//! route segment, supported operations and the shape its body must have.
//! Tags are resolved with [`ResourceKind::from_tag`], which accepts the
//! canonical tag, the backing CRD kind name and the plural route segment.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ProxyError, ProxyResult};

/// API group/version shared by every PlantD resource.
pub const API_VERSION: &str = "windtunnel.plantd.org/v1alpha1";

/// A resource kind. Closed: adding a variant forces every match to be revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ResourceKind {
    Schema,
    Dataset,
    LoadPattern,
    Pipeline,
    Experiment,
    CostExporter,
    CoreConfig,
}

/// A single-object operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Get,
    Create,
    Update,
    Delete,
    List,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Operation::Get => "get",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::List => "list",
        };
        f.write_str(s)
    }
}

/// Coarse shape a required body field must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldShape {
    String,
    Array,
    Object,
    Any,
}

impl FieldShape {
    fn matches(self, value: &Value) -> bool {
        match self {
            FieldShape::String => value.is_string(),
            FieldShape::Array => value.is_array(),
            FieldShape::Object => value.is_object(),
            FieldShape::Any => !value.is_null(),
        }
    }

    fn describe(self) -> &'static str {
        match self {
            FieldShape::String => "a string",
            FieldShape::Array => "a list",
            FieldShape::Object => "a map",
            FieldShape::Any => "present",
        }
    }
}

/// A field the body of a kind must carry.
#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub name: &'static str,
    pub shape: FieldShape,
}

const fn field(name: &'static str, shape: FieldShape) -> FieldRule {
    FieldRule { name, shape }
}

const ALL_OPERATIONS: &[Operation] = &[
    Operation::Get,
    Operation::Create,
    Operation::Update,
    Operation::Delete,
    Operation::List,
];

/// Validation and routing rules for one kind.
#[derive(Debug)]
pub struct KindRules {
    pub kind: ResourceKind,
    /// CRD kind name in the backing store.
    pub crd_kind: &'static str,
    /// Lower-case plural used as the HTTP route segment.
    pub plural: &'static str,
    pub operations: &'static [Operation],
    pub required_fields: &'static [FieldRule],
}

static SCHEMA: KindRules = KindRules {
    kind: ResourceKind::Schema,
    crd_kind: "Schema",
    plural: "schemas",
    operations: ALL_OPERATIONS,
    required_fields: &[field("columns", FieldShape::Array)],
};

static DATASET: KindRules = KindRules {
    kind: ResourceKind::Dataset,
    crd_kind: "DataSet",
    plural: "datasets",
    operations: ALL_OPERATIONS,
    required_fields: &[
        field("fileFormat", FieldShape::String),
        field("schemas", FieldShape::Array),
    ],
};

static LOAD_PATTERN: KindRules = KindRules {
    kind: ResourceKind::LoadPattern,
    crd_kind: "LoadPattern",
    plural: "loadpatterns",
    operations: ALL_OPERATIONS,
    required_fields: &[field("stages", FieldShape::Array)],
};

static PIPELINE: KindRules = KindRules {
    kind: ResourceKind::Pipeline,
    crd_kind: "Pipeline",
    plural: "pipelines",
    operations: ALL_OPERATIONS,
    required_fields: &[field("pipelineEndpoints", FieldShape::Array)],
};

static EXPERIMENT: KindRules = KindRules {
    kind: ResourceKind::Experiment,
    crd_kind: "Experiment",
    plural: "experiments",
    operations: ALL_OPERATIONS,
    required_fields: &[field("pipelineRef", FieldShape::Object)],
};

static COST_EXPORTER: KindRules = KindRules {
    kind: ResourceKind::CostExporter,
    crd_kind: "CostExporter",
    plural: "costexporters",
    operations: ALL_OPERATIONS,
    required_fields: &[
        field("s3Bucket", FieldShape::String),
        field("cloudServiceProvider", FieldShape::String),
    ],
};

// The core configuration is a singleton managed by the operator: it can be
// read and edited, never created, deleted or enumerated through the proxy.
static CORE_CONFIG: KindRules = KindRules {
    kind: ResourceKind::CoreConfig,
    crd_kind: "PlantDCore",
    plural: "plantdcores",
    operations: &[Operation::Get, Operation::Update],
    required_fields: &[],
};

impl ResourceKind {
    /// Every kind, in registry order.
    pub const ALL: [ResourceKind; 7] = [
        ResourceKind::Schema,
        ResourceKind::Dataset,
        ResourceKind::LoadPattern,
        ResourceKind::Pipeline,
        ResourceKind::Experiment,
        ResourceKind::CostExporter,
        ResourceKind::CoreConfig,
    ];

    /// Canonical tag.
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Schema => "Schema",
            ResourceKind::Dataset => "Dataset",
            ResourceKind::LoadPattern => "LoadPattern",
            ResourceKind::Pipeline => "Pipeline",
            ResourceKind::Experiment => "Experiment",
            ResourceKind::CostExporter => "CostExporter",
            ResourceKind::CoreConfig => "CoreConfig",
        }
    }

    /// The registry entry for this kind.
    pub fn rules(self) -> &'static KindRules {
        match self {
            ResourceKind::Schema => &SCHEMA,
            ResourceKind::Dataset => &DATASET,
            ResourceKind::LoadPattern => &LOAD_PATTERN,
            ResourceKind::Pipeline => &PIPELINE,
            ResourceKind::Experiment => &EXPERIMENT,
            ResourceKind::CostExporter => &COST_EXPORTER,
            ResourceKind::CoreConfig => &CORE_CONFIG,
        }
    }

    /// Resolve a tag: canonical tag, CRD kind name, or plural route segment.
    pub fn from_tag(tag: &str) -> ProxyResult<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| {
                let rules = kind.rules();
                tag == kind.as_str() || tag == rules.crd_kind || tag == rules.plural
            })
            .ok_or_else(|| ProxyError::UnknownKind {
                kind: tag.to_string(),
            })
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ResourceKind {
    type Err = ProxyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_tag(s)
    }
}

impl TryFrom<String> for ResourceKind {
    type Error = ProxyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_tag(&value)
    }
}

impl From<ResourceKind> for String {
    fn from(kind: ResourceKind) -> Self {
        kind.as_str().to_string()
    }
}

/// Look up the rules for a tag. Fails with `UnknownKind` outside the closed set.
pub fn lookup(tag: &str) -> ProxyResult<&'static KindRules> {
    ResourceKind::from_tag(tag).map(ResourceKind::rules)
}

impl KindRules {
    pub fn supports(&self, op: Operation) -> bool {
        self.operations.contains(&op)
    }

    /// Fail with `ValidationError` if `op` is not offered for this kind.
    pub fn ensure_supports(&self, op: Operation) -> ProxyResult<()> {
        if self.supports(op) {
            Ok(())
        } else {
            Err(ProxyError::validation(format!(
                "operation {op} is not supported for kind {}",
                self.kind
            )))
        }
    }

    /// Check a body against this kind's shape rules.
    pub fn validate(&self, body: &Value) -> ProxyResult<()> {
        let Some(map) = body.as_object() else {
            return Err(ProxyError::validation(format!(
                "{} body must be a map, got {}",
                self.kind,
                value_type(body)
            )));
        };
        for rule in self.required_fields {
            match map.get(rule.name) {
                None | Some(Value::Null) => {
                    return Err(ProxyError::validation(format!(
                        "{} body is missing required field `{}`",
                        self.kind, rule.name
                    )));
                }
                Some(value) if !rule.shape.matches(value) => {
                    return Err(ProxyError::validation(format!(
                        "{} field `{}` must be {}, got {}",
                        self.kind,
                        rule.name,
                        rule.shape.describe(),
                        value_type(value)
                    )));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

fn value_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a map",
    }
}
