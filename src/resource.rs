//! Resource identity and the self-describing manifest format.
//!
//! A [`ResourceRef`] addresses one resource instance by kind, namespace and
//! name. A [`ResourceManifest`] is the YAML document that carries a resource
//! through an archive: it holds its own identity, so it can be re-created
//! without any surrounding context.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ProxyError, ProxyResult};
use crate::kind::{API_VERSION, ResourceKind};

/// Maximum length of a namespace or name (DNS-1123 subdomain).
const MAX_NAME_LEN: usize = 253;

/// Identity of one resource instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceRef {
    pub kind: ResourceKind,
    pub namespace: String,
    pub name: String,
}

impl ResourceRef {
    pub fn new(kind: ResourceKind, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Check namespace and name against the DNS-1123 subdomain rules.
    pub fn validate(&self) -> ProxyResult<()> {
        validate_name("namespace", &self.namespace)?;
        validate_name("name", &self.name)
    }

    /// Store key: `{kind}/{namespace}/{name}`.
    pub fn key(&self) -> String {
        format!("{}/{}/{}", self.kind, self.namespace, self.name)
    }
}

impl std::fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.kind, self.namespace, self.name)
    }
}

/// Validate a namespace or resource name.
///
/// Lower-case alphanumerics, `-` and `.`, starting and ending with an
/// alphanumeric. `_` is never allowed, which keeps archive entry names
/// (`{kind}_{namespace}_{name}.yaml`) unambiguous.
pub fn validate_name(field: &str, value: &str) -> ProxyResult<()> {
    if value.is_empty() {
        return Err(ProxyError::validation(format!("{field} must not be empty")));
    }
    if value.len() > MAX_NAME_LEN {
        return Err(ProxyError::validation(format!(
            "{field} \"{value}\" is longer than {MAX_NAME_LEN} characters"
        )));
    }
    let valid_char = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.';
    let alnum = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit();
    let first_last_ok = value.chars().next().is_some_and(alnum) && value.chars().last().is_some_and(alnum);
    if !value.chars().all(valid_char) || !first_last_ok {
        return Err(ProxyError::validation(format!(
            "{field} \"{value}\" must consist of lower-case alphanumerics, '-' or '.', \
             and start and end with an alphanumeric"
        )));
    }
    Ok(())
}

/// An unresolved `{kind, namespace, name}` triple as supplied by a caller.
///
/// The kind is still a free-form tag; [`ResourceSelector::resolve`] turns it
/// into a [`ResourceRef`] or fails with `UnknownKind`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSelector {
    pub kind: String,
    pub namespace: String,
    pub name: String,
}

impl ResourceSelector {
    pub fn resolve(&self) -> ProxyResult<ResourceRef> {
        let kind = ResourceKind::from_tag(&self.kind)?;
        let reference = ResourceRef::new(kind, &self.namespace, &self.name);
        reference.validate()?;
        Ok(reference)
    }
}

impl std::str::FromStr for ResourceSelector {
    type Err = ProxyError;

    /// Parse `kind/namespace/name`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, '/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(kind), Some(namespace), Some(name)) => Ok(Self {
                kind: kind.to_string(),
                namespace: namespace.to_string(),
                name: name.to_string(),
            }),
            _ => Err(ProxyError::validation(format!(
                "expected kind/namespace/name, got \"{s}\""
            ))),
        }
    }
}

/// Identity block of a manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub namespace: String,
    pub name: String,
}

/// Self-contained serialized form of one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceManifest {
    #[serde(default = "default_api_version")]
    pub api_version: String,
    pub kind: ResourceKind,
    pub metadata: ManifestMetadata,
    #[serde(rename = "spec")]
    pub body: Value,
}

fn default_api_version() -> String {
    API_VERSION.to_string()
}

impl ResourceManifest {
    pub fn new(reference: &ResourceRef, body: Value) -> Self {
        Self {
            api_version: default_api_version(),
            kind: reference.kind,
            metadata: ManifestMetadata {
                namespace: reference.namespace.clone(),
                name: reference.name.clone(),
            },
            body,
        }
    }

    pub fn reference(&self) -> ResourceRef {
        ResourceRef::new(
            self.kind,
            &self.metadata.namespace,
            &self.metadata.name,
        )
    }

    pub fn to_yaml(&self) -> ProxyResult<String> {
        serde_yaml::to_string(self)
            .map_err(|e| ProxyError::internal(format!("failed to serialize manifest: {e}")))
    }

    /// Parse a manifest.
    ///
    /// Malformed YAML, a foreign `apiVersion`, a non-map `spec` or invalid
    /// identity fields are decode errors. A kind outside the registry keeps
    /// its `UnknownKind` tag.
    pub fn from_yaml(text: &str) -> ProxyResult<Self> {
        let raw: RawManifest = serde_yaml::from_str(text)
            .map_err(|e| ProxyError::decode(format!("invalid manifest: {e}")))?;
        let api_version = match raw.api_version {
            Some(v) if v != API_VERSION => {
                return Err(ProxyError::decode(format!(
                    "unsupported apiVersion \"{v}\", expected \"{API_VERSION}\""
                )));
            }
            Some(v) => v,
            None => default_api_version(),
        };
        let kind = ResourceKind::from_tag(&raw.kind)?;
        if !raw.body.is_object() {
            return Err(ProxyError::decode("manifest `spec` must be a map"));
        }
        let manifest = Self {
            api_version,
            kind,
            metadata: raw.metadata,
            body: raw.body,
        };
        manifest
            .reference()
            .validate()
            .map_err(|e| ProxyError::decode(format!("invalid manifest identity: {e}")))?;
        Ok(manifest)
    }
}

/// Manifest as written, before the kind is resolved against the registry.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawManifest {
    #[serde(default)]
    api_version: Option<String>,
    kind: String,
    metadata: ManifestMetadata,
    #[serde(rename = "spec")]
    body: Value,
}
