//! HTTP binding for the proxy.
//!
//! **Single-object operations** (`{kind}` is any registry alias):
//! - `GET    /api/{kind}`: list across namespaces
//! - `GET    /api/{kind}/{namespace}`: list within a namespace
//! - `GET    /api/{kind}/{namespace}/{name}`: fetch body
//! - `POST   /api/{kind}/{namespace}/{name}`: create from JSON body
//! - `PUT    /api/{kind}/{namespace}/{name}`: replace body
//! - `DELETE /api/{kind}/{namespace}/{name}`: delete
//!
//! **Bulk transfer:**
//! - `POST /api/export`: JSON array of `{kind, namespace, name}`, responds with an archive.
//!   POST rather than GET because the selection travels in the request body.
//! - `POST /api/import`: raw archive bytes, responds with import statistics
//!
//! **Health:**
//! - `GET  /api/health`
//!
//! Errors are `{"error": <tag>, "message": <text>}` with a status derived from the tag.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::archive;
use crate::config::ArchiveLimits;
use crate::dispatch::{DispatchOutput, DispatchRequest, Dispatcher, Status};
use crate::error::{ErrorTag, ProxyError, ProxyResult};
use crate::export::{ExportSelection, export_resources};
use crate::import::{ImportStatistics, import_resources};
use crate::kind::Operation;
use crate::resource::ResourceSelector;

/// Shared state behind every handler.
#[derive(Debug)]
pub struct AppState {
    pub dispatcher: Dispatcher,
    pub limits: ArchiveLimits,
}

impl AppState {
    pub fn new(dispatcher: Dispatcher, limits: ArchiveLimits) -> Self {
        Self { dispatcher, limits }
    }
}

// ── Error responses ───────────────────────────────────────────────────────

/// Wire shape of every error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorTag,
    pub message: String,
}

/// A [`ProxyError`] on its way out as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub ProxyError);

impl From<ProxyError> for ApiError {
    fn from(err: ProxyError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let tag = self.0.tag();
        let status = StatusCode::from_u16(Status::from(tag).code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        let body = ErrorBody {
            error: tag,
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

fn parse_json<T: serde::de::DeserializeOwned>(bytes: &[u8], what: &str) -> ProxyResult<T> {
    serde_json::from_slice(bytes)
        .map_err(|e| ProxyError::validation(format!("{what} is not valid JSON: {e}")))
}

fn respond(output: DispatchOutput) -> Response {
    match output {
        DispatchOutput::Object(body) => Json(body).into_response(),
        DispatchOutput::List(items) => Json(items).into_response(),
        DispatchOutput::Done => StatusCode::OK.into_response(),
    }
}

fn run(state: &AppState, request: DispatchRequest) -> ApiResult<Response> {
    Ok(respond(state.dispatcher.dispatch(request)?))
}

// ── Handlers ──────────────────────────────────────────────────────────────

async fn health() -> &'static str {
    "Healthy"
}

async fn list_all(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
) -> ApiResult<Response> {
    run(&state, DispatchRequest::new(Operation::List, kind))
}

async fn list_namespace(
    State(state): State<Arc<AppState>>,
    Path((kind, namespace)): Path<(String, String)>,
) -> ApiResult<Response> {
    run(&state, DispatchRequest::new(Operation::List, kind).namespace(namespace))
}

async fn get_object(
    State(state): State<Arc<AppState>>,
    Path((kind, namespace, name)): Path<(String, String, String)>,
) -> ApiResult<Response> {
    run(
        &state,
        DispatchRequest::new(Operation::Get, kind)
            .namespace(namespace)
            .name(name),
    )
}

async fn create_object(
    State(state): State<Arc<AppState>>,
    Path((kind, namespace, name)): Path<(String, String, String)>,
    body: Bytes,
) -> ApiResult<Response> {
    with_body(&state, Operation::Create, kind, namespace, name, &body)
}

async fn update_object(
    State(state): State<Arc<AppState>>,
    Path((kind, namespace, name)): Path<(String, String, String)>,
    body: Bytes,
) -> ApiResult<Response> {
    with_body(&state, Operation::Update, kind, namespace, name, &body)
}

fn with_body(
    state: &AppState,
    operation: Operation,
    kind: String,
    namespace: String,
    name: String,
    body: &[u8],
) -> ApiResult<Response> {
    let request = DispatchRequest::new(operation, kind)
        .namespace(namespace)
        .name(name);
    // Resolve the kind before looking at the body so unknown kinds win.
    crate::kind::lookup(&request.kind)?;
    let body: Value = parse_json(body, "request body")?;
    run(state, request.body(body))
}

async fn delete_object(
    State(state): State<Arc<AppState>>,
    Path((kind, namespace, name)): Path<(String, String, String)>,
) -> ApiResult<Response> {
    run(
        &state,
        DispatchRequest::new(Operation::Delete, kind)
            .namespace(namespace)
            .name(name),
    )
}

async fn export_handler(State(state): State<Arc<AppState>>, body: Bytes) -> ApiResult<Response> {
    let selectors: Vec<ResourceSelector> = parse_json(&body, "export selection")?;
    let selection = ExportSelection::resolve(&selectors)?;

    let bundle = tokio::task::spawn_blocking(move || {
        export_resources(state.dispatcher.gateway(), &selection)
    })
    .await
    .map_err(|e| ProxyError::internal(format!("export task failed: {e}")))??;

    let headers = [
        (header::CONTENT_TYPE, archive::CONTENT_TYPE.to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename={}", bundle.filename),
        ),
    ];
    Ok((headers, bundle.bytes).into_response())
}

/// Run an import on a blocking worker.
///
/// The worker is detached from the returned handle: dropping the handle (for
/// instance because the client disconnected and axum dropped the handler)
/// does not stop it, and the import runs to completion with its result
/// discarded.
pub fn spawn_import(state: Arc<AppState>, bytes: Bytes) -> JoinHandle<ProxyResult<ImportStatistics>> {
    tokio::task::spawn_blocking(move || {
        import_resources(state.dispatcher.gateway(), &bytes, &state.limits)
    })
}

async fn import_handler(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<Json<ImportStatistics>> {
    let stats = spawn_import(state, body)
        .await
        .map_err(|e| ProxyError::internal(format!("import task failed: {e}")))??;
    Ok(Json(stats))
}

// ── Router ────────────────────────────────────────────────────────────────

/// Build the proxy router.
pub fn router(state: Arc<AppState>, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/import", post(import_handler))
        .route("/api/export", post(export_handler))
        .route("/api/{kind}", get(list_all))
        .route("/api/{kind}/{namespace}", get(list_namespace))
        .route(
            "/api/{kind}/{namespace}/{name}",
            get(get_object)
                .post(create_object)
                .put(update_object)
                .delete(delete_object),
        )
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
