//! Blocking HTTP client for a running `plantd-proxy` server.
//!
//! `ProxyClient` speaks the routes served by the `server` module. Error
//! responses are decoded back into their [`ErrorTag`] so callers can branch
//! on the same taxonomy the server uses.

use std::io::Read;

use miette::Diagnostic;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::error::ErrorTag;
use crate::import::ImportStatistics;
use crate::resource::{ResourceManifest, ResourceRef, ResourceSelector};

/// Environment variable naming the server base URL.
pub const URL_ENV: &str = "PLANTD_PROXY_URL";
/// Base URL used when nothing else is configured.
pub const DEFAULT_URL: &str = "http://127.0.0.1:5000";

// ---------------------------------------------------------------------------
// Client error
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ClientError {
    #[error("remote request failed: {message}")]
    #[diagnostic(code(plantd::client::request), help("Is plantd-proxy running?"))]
    Request { message: String },

    #[error("unexpected response from server: {message}")]
    #[diagnostic(code(plantd::client::response), help("Server version mismatch?"))]
    Response { message: String },

    #[error("{tag}: {message}")]
    #[diagnostic(code(plantd::client::api))]
    Api { tag: ErrorTag, message: String },
}

impl ClientError {
    /// Tag of a server-side error, if this is one.
    pub fn tag(&self) -> Option<ErrorTag> {
        match self {
            ClientError::Api { tag, .. } => Some(*tag),
            _ => None,
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

/// An archive downloaded from `export`.
#[derive(Debug, Clone)]
pub struct DownloadedArchive {
    pub filename: Option<String>,
    pub bytes: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// HTTP client bound to one server.
#[derive(Debug, Clone)]
pub struct ProxyClient {
    base_url: String,
    http: ureq::Agent,
}

impl ProxyClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: ureq::Agent::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{path}", self.base_url)
    }

    fn object_path(reference: &ResourceRef) -> String {
        format!(
            "/{}/{}/{}",
            reference.kind.rules().plural,
            reference.namespace,
            reference.name
        )
    }

    // -- helpers --

    fn call(&self, request: Result<ureq::Response, ureq::Error>) -> ClientResult<ureq::Response> {
        match request {
            Ok(resp) => Ok(resp),
            Err(ureq::Error::Status(status, resp)) => Err(api_error(status, resp)),
            Err(e) => Err(ClientError::Request {
                message: e.to_string(),
            }),
        }
    }

    fn json<T: DeserializeOwned>(resp: ureq::Response) -> ClientResult<T> {
        resp.into_json().map_err(|e| ClientError::Response {
            message: format!("failed to parse JSON: {e}"),
        })
    }

    fn send_json<B: Serialize>(&self, method: &str, path: &str, body: &B) -> ClientResult<ureq::Response> {
        self.call(self.http.request(method, &self.url(path)).send_json(body))
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    /// `GET /api/health`.
    pub fn health(&self) -> ClientResult<String> {
        let resp = self.call(self.http.get(&self.url("/health")).call())?;
        resp.into_string().map_err(|e| ClientError::Response {
            message: e.to_string(),
        })
    }

    pub fn get(&self, reference: &ResourceRef) -> ClientResult<Value> {
        let resp = self.call(self.http.get(&self.url(&Self::object_path(reference))).call())?;
        Self::json(resp)
    }

    pub fn list(&self, kind: &str, namespace: Option<&str>) -> ClientResult<Vec<ResourceManifest>> {
        let path = match namespace {
            Some(ns) => format!("/{kind}/{ns}"),
            None => format!("/{kind}"),
        };
        let resp = self.call(self.http.get(&self.url(&path)).call())?;
        Self::json(resp)
    }

    pub fn create(&self, reference: &ResourceRef, body: &Value) -> ClientResult<()> {
        self.send_json("POST", &Self::object_path(reference), body)?;
        Ok(())
    }

    pub fn update(&self, reference: &ResourceRef, body: &Value) -> ClientResult<()> {
        self.send_json("PUT", &Self::object_path(reference), body)?;
        Ok(())
    }

    pub fn delete(&self, reference: &ResourceRef) -> ClientResult<()> {
        self.call(
            self.http
                .delete(&self.url(&Self::object_path(reference)))
                .call(),
        )?;
        Ok(())
    }

    /// `POST /api/export`: download an archive of `selection`.
    pub fn export(&self, selection: &[ResourceSelector]) -> ClientResult<DownloadedArchive> {
        let resp = self.send_json("POST", "/export", &selection)?;
        let filename = resp
            .header("Content-Disposition")
            .and_then(filename_from_disposition);
        let mut bytes = Vec::new();
        resp.into_reader()
            .read_to_end(&mut bytes)
            .map_err(|e| ClientError::Response {
                message: format!("failed to read archive: {e}"),
            })?;
        Ok(DownloadedArchive { filename, bytes })
    }

    /// `POST /api/import`: upload archive bytes.
    pub fn import(&self, archive: &[u8]) -> ClientResult<ImportStatistics> {
        let resp = self.call(
            self.http
                .post(&self.url("/import"))
                .set("Content-Type", crate::archive::CONTENT_TYPE)
                .send_bytes(archive),
        )?;
        Self::json(resp)
    }
}

fn api_error(status: u16, resp: ureq::Response) -> ClientError {
    let text = resp.into_string().unwrap_or_default();
    match serde_json::from_str::<Value>(&text) {
        Ok(body) => {
            let tag = body
                .get("error")
                .cloned()
                .and_then(|t| serde_json::from_value::<ErrorTag>(t).ok());
            let message = body
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            match tag {
                Some(tag) => ClientError::Api { tag, message },
                None => ClientError::Response {
                    message: format!("HTTP {status}: {text}"),
                },
            }
        }
        Err(_) => ClientError::Response {
            message: format!("HTTP {status}: {text}"),
        },
    }
}

/// Pull `filename=...` out of a `Content-Disposition` header value.
fn filename_from_disposition(value: &str) -> Option<String> {
    value
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("filename="))
        .map(|name| name.trim_matches('"').to_string())
        .filter(|name| !name.is_empty())
}
