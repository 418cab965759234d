//! # HTTP Route Handlers
//!
//! Both translate endpoints share `run_translation`. Errors come back as a status
//! code with the error message as the body:
//!
//! - 400 Bad Request: malformed task id, or a fragment using something the
//!   translator does not support
//! - 500 Internal Server Error: an inconsistent fragment the coordinator should
//!   never have produced

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use pvx_convert::filter::domain_to_filter;
use pvx_convert::{ConvertError, ConverterConfig, PlanConverter};
use pvx_core::plan::PlanFragment as PhysicalFragment;
use pvx_protocol::domain::Domain;
use pvx_protocol::fragment::{PlanFragment, TableWriteInfo};
use pvx_protocol::task_id::TaskId;
use tracing::warn;

use crate::state::AppState;

type HandlerError = (StatusCode, String);

/// GET /health
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

/// GET /node-kinds
pub async fn node_kinds(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(NodeKindsResponse {
        kinds: state
            .registry
            .kinds()
            .into_iter()
            .map(str::to_string)
            .collect(),
    })
}

#[derive(Serialize)]
pub struct NodeKindsResponse {
    pub kinds: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateRequest {
    pub fragment: PlanFragment,
    #[serde(default)]
    pub table_write_info: Option<TableWriteInfo>,
    pub task_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchTranslateRequest {
    #[serde(flatten)]
    pub request: TranslateRequest,
    /// Opaque shuffle write configuration, passed through to the shuffle writer.
    #[serde(default)]
    pub shuffle_write_info: Option<String>,
}

/// POST /translate
pub async fn translate(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TranslateRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let fragment = run_translation(&state, ConverterConfig::interactive(), &req)?;
    Ok(Json(fragment))
}

/// POST /translate/batch
pub async fn translate_batch(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BatchTranslateRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let shuffle_name = state.config.shuffle_name.clone().ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            "Batch translation is disabled: PVX_SHUFFLE_NAME is not set".to_string(),
        )
    })?;
    let config = ConverterConfig::batch(shuffle_name, req.shuffle_write_info);
    let fragment = run_translation(&state, config, &req.request)?;
    Ok(Json(fragment))
}

#[derive(Deserialize)]
pub struct FilterRequest {
    pub domain: Domain,
}

/// POST /filter
pub async fn domain_filter(
    State(state): State<Arc<AppState>>,
    Json(req): Json<FilterRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let filter = domain_to_filter(&req.domain, &state.exprs).map_err(to_status)?;
    Ok(Json(filter))
}

fn run_translation(
    state: &AppState,
    config: ConverterConfig,
    req: &TranslateRequest,
) -> Result<PhysicalFragment, HandlerError> {
    let task_id = TaskId::parse(&req.task_id)
        .map_err(|e| to_status(ConvertError::from(e)))?;
    let converter = PlanConverter::new(&state.exprs, config);
    converter
        .to_physical_fragment(&req.fragment, req.table_write_info.as_ref(), &task_id)
        .map_err(|e| {
            warn!(fragment_id = %req.fragment.id, task_id = %task_id, error = %e, "Translation failed");
            to_status(e)
        })
}

fn to_status(err: ConvertError) -> HandlerError {
    let status = if err.is_user_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, err.to_string())
}
