//! JSON HTTP API
//!
//! Thin axum layer over [`ServerRegistry`]. Every handler answers with
//! `{"success": true, "data": ...}` or `{"success": false, "error": {...}}`.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use register_model::{RegisterBlock, RegisterRow};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::{ConfigFile, ServerConfig};
use crate::error::Result;
use crate::registry::ServerRegistry;
use crate::server::ServerStatus;

/// API state
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ServerRegistry>,
}

impl AppState {
    pub fn new(registry: Arc<ServerRegistry>) -> Self {
        Self { registry }
    }
}

/// Standard success response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> SuccessResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Standard error information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// HTTP status code
    pub code: u16,
    pub message: String,
}

/// Standard error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorInfo,
}

impl ErrorResponse {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: ErrorInfo {
                code: status.as_u16(),
                message: message.into(),
            },
        }
    }
}

/// Body of `POST /api/servers/{id}/config`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlocksRequest {
    #[serde(default)]
    pub register_blocks: Vec<RegisterBlock>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthData {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub servers: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportData {
    pub imported: usize,
}

/// Create API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/servers", get(list_servers).post(add_server))
        .route("/api/servers/{id}", get(server_registers).delete(remove_server))
        .route("/api/servers/{id}/status", get(server_status))
        .route(
            "/api/servers/{id}/config",
            get(server_config).post(apply_server_config),
        )
        .route("/api/config", get(export_config).post(import_config))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(SuccessResponse::new(HealthData {
        status: "healthy",
        service: crate::SERVICE_NAME,
        version: crate::SERVICE_VERSION,
        servers: state.registry.len().await,
    }))
}

async fn list_servers(State(state): State<AppState>) -> Json<SuccessResponse<Vec<ServerStatus>>> {
    Json(SuccessResponse::new(state.registry.statuses().await))
}

async fn add_server(
    State(state): State<AppState>,
    Json(config): Json<ServerConfig>,
) -> Result<(StatusCode, Json<SuccessResponse<ServerStatus>>)> {
    let server = state.registry.add(config).await?;
    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::new(server.status().await)),
    ))
}

async fn server_registers(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse<Vec<RegisterRow>>>> {
    let server = state.registry.get(&id).await?;
    Ok(Json(SuccessResponse::new(server.snapshot().await?)))
}

async fn remove_server(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse<String>>> {
    state.registry.remove(&id).await?;
    Ok(Json(SuccessResponse::new(format!("Server {} removed", id))))
}

async fn server_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse<ServerStatus>>> {
    let server = state.registry.get(&id).await?;
    Ok(Json(SuccessResponse::new(server.status().await)))
}

async fn server_config(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse<ServerConfig>>> {
    let server = state.registry.get(&id).await?;
    Ok(Json(SuccessResponse::new(server.config().await)))
}

async fn apply_server_config(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<BlocksRequest>,
) -> Result<Json<SuccessResponse<ServerConfig>>> {
    let server = state.registry.get(&id).await?;
    server.apply_blocks(&request.register_blocks).await?;
    Ok(Json(SuccessResponse::new(server.config().await)))
}

async fn export_config(State(state): State<AppState>) -> Json<SuccessResponse<ConfigFile>> {
    Json(SuccessResponse::new(state.registry.export().await))
}

async fn import_config(
    State(state): State<AppState>,
    Json(file): Json<ConfigFile>,
) -> Result<Json<SuccessResponse<ImportData>>> {
    let imported = state.registry.import(file).await?;
    Ok(Json(SuccessResponse::new(ImportData { imported })))
}
