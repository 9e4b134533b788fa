use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::dataset::{Record, RowId};
use crate::error::ContractError;
use crate::interface::{ContractField, ContractInterface};
use crate::resolver::IdentityValues;

type Shared = Arc<ContractInterface>;

#[derive(Deserialize)]
pub struct PickRequest {
    #[serde(flatten)]
    pub values: BTreeMap<String, String>,
}

#[derive(Serialize)]
pub struct RecordBody {
    pub row_id: RowId,
    pub fields: BTreeMap<String, String>,
}
impl From<&Record> for RecordBody {
    fn from(record: &Record) -> Self {
        Self {
            row_id: record.row_id(),
            fields: record
                .fields()
                .map(|(c, v)| (c.to_owned(), v.to_owned()))
                .collect(),
        }
    }
}

#[derive(Serialize)]
pub struct PickResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_id: Option<RowId>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<RecordBody>,
    pub truncated: bool,
}

#[derive(Serialize)]
pub struct ClusterResponse {
    pub seed: RecordBody,
    pub rows: Vec<RecordBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_col: Option<String>,
}

#[derive(Serialize)]
pub struct FieldBody {
    pub safe: String,
    pub label: String,
    pub value: String,
    pub current: String,
}

impl From<ContractField> for FieldBody {
    fn from(field: ContractField) -> Self {
        Self {
            safe: field.safe,
            label: field.label,
            value: field.value,
            current: field.current,
        }
    }
}

#[derive(Serialize)]
pub struct ContractResponse {
    pub row_id: RowId,
    pub fields: Vec<FieldBody>,
    pub edits: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_edited_at: Option<String>,
    pub pdf_filename: String,
    pub pdf_exists: bool,
}

#[derive(Serialize)]
pub struct UpdateResponse {
    pub status: String,
    pub row_id: RowId,
    pub edited_at: String,
    pub journal: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dropped: Vec<String>,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub status: String,
    pub error: String,
}

// Recoverable errors become client errors; everything else is on us.
pub struct ApiError(ContractError);
impl From<ContractError> for ApiError {
    fn from(e: ContractError) -> Self { Self(e) }
}
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            ContractError::NotFound(_) => StatusCode::NOT_FOUND,
            ContractError::Validation(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let msg = self.0.to_string();
        warn!(%msg, code = %status.as_u16(), "request error");
        let body = ErrorResponse { status: "error".into(), error: msg };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

async fn pick(State(iface): State<Shared>, Json(req): Json<PickRequest>) -> ApiResult<PickResponse> {
    // form input is trimmed before it is compared
    let values: IdentityValues = req
        .values
        .into_iter()
        .map(|(k, v)| (k, v.trim().to_owned()))
        .collect();
    match iface.exact_match(&values) {
        Ok(record) => Ok(Json(PickResponse {
            status: "exact".into(),
            row_id: Some(record.row_id()),
            candidates: Vec::new(),
            truncated: false,
        })),
        Err(ContractError::NotFound(_)) => {
            let partial = iface.partial_match(&values)?;
            let status = if partial.is_empty() { "none" } else { "partial" };
            Ok(Json(PickResponse {
                status: status.into(),
                row_id: None,
                candidates: partial.records.iter().map(|r| RecordBody::from(r.as_ref())).collect(),
                truncated: partial.truncated,
            }))
        }
        Err(e) => Err(e.into()),
    }
}

async fn cluster(State(iface): State<Shared>, Path(row_id): Path<RowId>) -> ApiResult<ClusterResponse> {
    let snapshot = iface.snapshot()?;
    let (seed, members) = snapshot.cluster_of(row_id)?;
    let id_col = snapshot.cluster_engine().primary_id().map(str::to_owned);
    Ok(Json(ClusterResponse {
        seed: RecordBody::from(seed.as_ref()),
        rows: members.iter().map(|r| RecordBody::from(r.as_ref())).collect(),
        id_col,
    }))
}

async fn contract(State(iface): State<Shared>, Path(row_id): Path<RowId>) -> ApiResult<ContractResponse> {
    // replaying the journal reads a file, so keep it off the async workers
    let view = tokio::task::spawn_blocking(move || iface.contract(row_id))
        .await
        .map_err(|e| ContractError::Journal(format!("join error: {e}")))??;
    Ok(Json(ContractResponse {
        row_id: view.row_id,
        fields: view.fields.into_iter().map(FieldBody::from).collect(),
        edits: view.current.edits,
        last_edited_at: view.current.last_edited_at.as_ref().map(crate::journal::format_timestamp),
        pdf_filename: view.attachment.filename,
        pdf_exists: view.attachment.exists,
    }))
}

async fn update(
    State(iface): State<Shared>,
    Path(row_id): Path<RowId>,
    Json(form): Json<BTreeMap<String, String>>,
) -> ApiResult<UpdateResponse> {
    let iface_for_task = Arc::clone(&iface);
    let (entry, dropped) = tokio::task::spawn_blocking(move || iface_for_task.append_form(row_id, form))
        .await
        .map_err(|e| ContractError::Journal(format!("join error: {e}")))??;
    Ok(Json(UpdateResponse {
        status: "ok".into(),
        row_id,
        edited_at: crate::journal::format_timestamp(&entry.edited_at()),
        journal: iface.journal().path().display().to_string(),
        dropped,
    }))
}

async fn reload(State(iface): State<Shared>) -> ApiResult<serde_json::Value> {
    let rows = tokio::task::spawn_blocking(move || iface.reload())
        .await
        .map_err(|e| ContractError::Journal(format!("join error: {e}")))??;
    info!(rows, "reload requested over http");
    Ok(Json(serde_json::json!({ "status": "ok", "rows": rows })))
}

pub fn router(interface: Shared) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers(Any);
    Router::new()
        .route("/v1/pick", post(pick))
        .route("/v1/cluster/:row_id", get(cluster))
        .route("/v1/contract/:row_id", get(contract))
        .route("/v1/contract/:row_id/update", post(update))
        .route("/v1/reload", post(reload))
        .layer(cors)
        .with_state(interface)
}
