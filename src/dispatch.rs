//! Generic dispatcher: one entry point for single-object operations on any kind.
//!
//! A [`DispatchRequest`] carries the kind as an opaque tag. The dispatcher
//! resolves it against the registry before anything else, checks that the
//! request is complete for the operation, delegates to the
//! [`ObjectGateway`], and hands back either a [`DispatchOutput`] or a typed
//! [`ProxyError`]. [`Status`] gives the transport-neutral status for either.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ErrorTag, ProxyError, ProxyResult};
use crate::gateway::ObjectGateway;
use crate::kind::{Operation, ResourceKind};
use crate::resource::{ResourceManifest, ResourceRef};

/// A single-object request as received from a transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchRequest {
    pub operation: Operation,
    pub kind: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub body: Option<Value>,
}

impl DispatchRequest {
    pub fn new(operation: Operation, kind: impl Into<String>) -> Self {
        Self {
            operation,
            kind: kind.into(),
            namespace: None,
            name: None,
            body: None,
        }
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Successful result of a dispatched operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DispatchOutput {
    /// Body of the fetched resource.
    Object(Value),
    /// Resources returned by `list`.
    List(Vec<ResourceManifest>),
    /// `create`, `update` or `delete` succeeded.
    Done,
}

/// Transport-neutral outcome class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    BadRequest,
    NotFound,
    Conflict,
    Internal,
}

impl Status {
    pub fn of(result: &ProxyResult<DispatchOutput>) -> Self {
        match result {
            Ok(_) => Status::Ok,
            Err(e) => Status::from(e.tag()),
        }
    }

    /// HTTP-equivalent status code.
    pub fn code(self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::BadRequest => 400,
            Status::NotFound => 404,
            Status::Conflict => 409,
            Status::Internal => 500,
        }
    }
}

impl From<ErrorTag> for Status {
    fn from(tag: ErrorTag) -> Self {
        match tag {
            ErrorTag::UnknownKind | ErrorTag::ValidationError | ErrorTag::DecodeError => {
                Status::BadRequest
            }
            ErrorTag::NotFound => Status::NotFound,
            ErrorTag::AlreadyExists => Status::Conflict,
            ErrorTag::Internal => Status::Internal,
        }
    }
}

/// Routes single-object requests to the gateway.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    gateway: ObjectGateway,
}

impl Dispatcher {
    pub fn new(gateway: ObjectGateway) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &ObjectGateway {
        &self.gateway
    }

    /// Resolve, check and delegate one request.
    pub fn dispatch(&self, request: DispatchRequest) -> ProxyResult<DispatchOutput> {
        // Unknown kinds are rejected before any store traffic.
        let kind = ResourceKind::from_tag(&request.kind)?;
        kind.rules().ensure_supports(request.operation)?;

        let result = self.delegate(kind, request);
        if let Err(e) = &result {
            tracing::debug!(kind = %kind, error = %e, tag = %e.tag(), "dispatch failed");
        }
        result
    }

    fn delegate(&self, kind: ResourceKind, request: DispatchRequest) -> ProxyResult<DispatchOutput> {
        let DispatchRequest {
            operation,
            namespace,
            name,
            body,
            ..
        } = request;

        match operation {
            Operation::List => {
                if name.is_some() {
                    return Err(ProxyError::validation("list does not take a name"));
                }
                let items = self.gateway.list(kind, namespace.as_deref())?;
                Ok(DispatchOutput::List(items))
            }
            Operation::Get => {
                let reference = target(kind, operation, namespace, name)?;
                self.gateway.get(&reference).map(DispatchOutput::Object)
            }
            Operation::Create => {
                let reference = target(kind, operation, namespace, name)?;
                let body = require_body(operation, body)?;
                self.gateway.create(&reference, &body)?;
                Ok(DispatchOutput::Done)
            }
            Operation::Update => {
                let reference = target(kind, operation, namespace, name)?;
                let body = require_body(operation, body)?;
                self.gateway.update(&reference, &body)?;
                Ok(DispatchOutput::Done)
            }
            Operation::Delete => {
                let reference = target(kind, operation, namespace, name)?;
                self.gateway.delete(&reference)?;
                Ok(DispatchOutput::Done)
            }
        }
    }
}

/// Single-object operations need both halves of the identity.
fn target(
    kind: ResourceKind,
    operation: Operation,
    namespace: Option<String>,
    name: Option<String>,
) -> ProxyResult<ResourceRef> {
    let namespace = namespace
        .ok_or_else(|| ProxyError::validation(format!("{operation} requires a namespace")))?;
    let name = name.ok_or_else(|| ProxyError::validation(format!("{operation} requires a name")))?;
    Ok(ResourceRef::new(kind, namespace, name))
}

fn require_body(operation: Operation, body: Option<Value>) -> ProxyResult<Value> {
    body.ok_or_else(|| ProxyError::validation(format!("{operation} requires a body")))
}
