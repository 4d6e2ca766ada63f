//! HTTP control surface
//!
//! The boundary consumed by the admin UI: descriptor CRUD against the
//! registry and latest-record retrieval. Registration also opens the
//! scanner's connection, removal closes it, so the connection set always
//! tracks the registry.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::ScanRelayError;
use crate::ingest::IngestSupervisor;
use crate::record::Record;
use crate::registry::{ScannerDescriptor, ScannerRegistry};
use crate::snapshot::RecordSnapshot;
use crate::store::FileStore;

/// Shared state for the HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ScannerRegistry>,
    pub store: FileStore,
    pub snapshot: RecordSnapshot,
    pub supervisor: Arc<IngestSupervisor>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz_handler))
        .route("/config", get(get_config_handler).post(post_config_handler))
        .route("/remove", post(remove_handler))
        .route("/selected-scanners", post(selected_scanners_handler))
        .with_state(state)
}

fn api_error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

async fn healthz_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Full descriptor set, sorted by name.
async fn get_config_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.registry.list())
}

/// Register a scanner and open its connection.
async fn post_config_handler(
    State(state): State<AppState>,
    Json(descriptor): Json<ScannerDescriptor>,
) -> Response {
    let name = descriptor.name.trim().to_string();
    if name.is_empty() {
        return api_error_response(StatusCode::BAD_REQUEST, "scanner name must not be empty");
    }
    let descriptor = ScannerDescriptor { name, ..descriptor };

    match state.registry.add(descriptor.clone()) {
        Ok(()) => {
            state.supervisor.connect(descriptor.clone());
            (StatusCode::OK, Json(descriptor)).into_response()
        }
        Err(ScanRelayError::DuplicateScanner { name }) => api_error_response(
            StatusCode::CONFLICT,
            &format!("scanner '{name}' is already registered"),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to register scanner");
            api_error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to persist registry",
            )
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RemoveRequest {
    pub name: String,
}

/// Unregister a scanner and close its connection.
///
/// Removing an unknown name reports `removed: false` rather than an error.
async fn remove_handler(
    State(state): State<AppState>,
    Json(request): Json<RemoveRequest>,
) -> Response {
    match state.registry.remove(&request.name) {
        Ok(removed) => {
            if removed {
                state.supervisor.disconnect(&request.name).await;
                state.snapshot.remove(&request.name);
            }
            Json(json!({ "removed": removed })).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to unregister scanner");
            api_error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to persist registry",
            )
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedScannersRequest {
    pub selected_scanners: Vec<String>,
}

/// Latest parsed records for one scanner
#[derive(Debug, Serialize)]
pub struct ScannerRecords {
    pub scanner: String,
    #[serde(rename = "xmlData")]
    pub xml_data: Vec<Record>,
}

/// Latest records for each requested scanner.
///
/// Unknown names are skipped. A scanner whose latest file cannot be read
/// or parsed contributes an empty list; the failure is logged and never
/// aborts the other scanners in the request.
async fn selected_scanners_handler(
    State(state): State<AppState>,
    Json(request): Json<SelectedScannersRequest>,
) -> impl IntoResponse {
    let mut results = Vec::new();
    for name in &request.selected_scanners {
        let Some(descriptor) = state.registry.get(name) else {
            continue;
        };
        let records = match state.snapshot.get(&descriptor.name) {
            Some(records) => records,
            None => match state.store.latest(&descriptor.name) {
                Ok(records) => records,
                Err(e) => {
                    tracing::error!(
                        scanner = %descriptor.name,
                        error = %e,
                        "Failed to load latest records"
                    );
                    Vec::new()
                }
            },
        };
        results.push(ScannerRecords {
            scanner: descriptor.name,
            xml_data: records,
        });
    }
    Json(results)
}
