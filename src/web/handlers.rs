use super::error::ApiError;
use super::AppState;
use crate::db::{ConnectionState, ManagerStatus};
use crate::export::{self, ExportFormat};
use crate::translate::{self, TranslationError, TranslationRequest};
use crate::types::{QueryResult, TableInfo, TableSchema};
use crate::upload::{validate_file_name, UploadError};
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

const DEFAULT_PREVIEW_ROWS: usize = 10;
const UPLOAD_FIELD: &str = "db_file";

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    connection: ManagerStatus,
    translator_configured: bool,
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    query: String,
}

#[derive(Debug, Deserialize)]
pub struct PreviewParams {
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct ExportRequest {
    query: String,
    format: ExportFormat,
}

#[derive(Debug, Serialize)]
pub struct TranslateResponse {
    natural_language: String,
    sql: String,
    editor_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<QueryResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Outcome of a database swap or reset
#[derive(Debug, Serialize)]
pub struct SwitchResponse {
    success: bool,
    message: String,
}

impl SwitchResponse {
    fn reply(status: StatusCode, success: bool, message: String) -> (StatusCode, Json<Self>) {
        (status, Json(Self { success, message }))
    }
}

fn non_empty(query: &str) -> Result<&str, ApiError> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(ApiError::bad_request("Please enter a query"));
    }
    Ok(trimmed)
}

/// GET /api/health
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    let connection = state.worker.status().await?;
    let status = match connection.state {
        ConnectionState::Broken => "degraded",
        ConnectionState::Uninitialized | ConnectionState::Open => "healthy",
    };
    Ok(Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        connection,
        translator_configured: state.translator.is_configured(),
    }))
}

/// GET /api/tables
pub async fn list_tables(State(state): State<AppState>) -> Result<Json<Vec<TableInfo>>, ApiError> {
    Ok(Json(state.worker.list_tables().await?))
}

/// GET /api/tables/:table_name
pub async fn describe_table(
    State(state): State<AppState>,
    Path(table_name): Path<String>,
) -> Result<Json<TableSchema>, ApiError> {
    Ok(Json(state.worker.describe_table(&table_name).await?))
}

/// GET /api/tables/:table_name/preview?limit=N
pub async fn preview_table(
    State(state): State<AppState>,
    Path(table_name): Path<String>,
    Query(params): Query<PreviewParams>,
) -> Result<Json<QueryResult>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_PREVIEW_ROWS);
    Ok(Json(state.worker.preview_table(&table_name, limit).await?))
}

/// POST /api/query
pub async fn run_query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResult>, ApiError> {
    let query = non_empty(&request.query)?;
    Ok(Json(state.worker.execute_query(query, state.max_rows).await?))
}

/// POST /api/translate - translate a question into SQL, then run it
pub async fn translate_query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<TranslateResponse>, ApiError> {
    let question = non_empty(&request.query)?;
    if !state.translator.is_configured() {
        return Err(TranslationError::MissingApiKey.into());
    }

    let schema_summary = state
        .worker
        .schema_summary()
        .await
        .map_err(|e| TranslationError::Schema(e.to_string()))?;

    let sql = state
        .translator
        .translate(&TranslationRequest {
            natural_language_query: question.to_string(),
            schema_summary,
        })
        .await?;

    let (result, error) = match state.worker.execute_query(&sql, state.max_rows).await {
        Ok(result) => (Some(result), None),
        Err(e) => {
            warn!("Query execution error: {}", e);
            (None, Some(e.to_string()))
        }
    };

    Ok(Json(TranslateResponse {
        natural_language: question.to_string(),
        editor_text: translate::editor_text(question, &sql),
        sql,
        result,
        error,
    }))
}

/// POST /api/export - run a query without the row cap and download it
pub async fn export_query(
    State(state): State<AppState>,
    Json(request): Json<ExportRequest>,
) -> Result<Response, ApiError> {
    let query = non_empty(&request.query)?;
    let result = state.worker.execute_query(query, None).await?;
    let body = export::export(&result, request.format)?;

    Ok((
        [
            (header::CONTENT_TYPE, request.format.content_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", request.format.file_name()),
            ),
        ],
        body,
    )
        .into_response())
}

/// POST /api/reset-connection
pub async fn reset_connection(State(state): State<AppState>) -> (StatusCode, Json<SwitchResponse>) {
    match state.worker.reset().await {
        Ok(()) => SwitchResponse::reply(
            StatusCode::OK,
            true,
            "The database connection has been successfully reset.".to_string(),
        ),
        Err(e) => {
            warn!("Connection reset failed: {}", e);
            SwitchResponse::reply(
                StatusCode::SERVICE_UNAVAILABLE,
                false,
                format!("Failed to reset the database connection: {}", e),
            )
        }
    }
}

/// POST /api/database - upload a database file and switch to it
pub async fn change_database(
    State(state): State<AppState>,
    multipart: Multipart,
) -> (StatusCode, Json<SwitchResponse>) {
    match switch_database(&state, multipart).await {
        Ok(message) => SwitchResponse::reply(StatusCode::OK, true, message),
        Err(err) => {
            warn!("Error in change-database: {}", err.message);
            SwitchResponse::reply(err.status, false, err.message)
        }
    }
}

async fn switch_database(state: &AppState, multipart: Multipart) -> Result<String, ApiError> {
    let (file_name, bytes) = read_upload(multipart).await?;
    let stored = state.scratch.persist(&file_name, &bytes)?;

    match state.worker.swap(stored.clone()).await {
        Ok(()) => {
            info!("Switched database to upload {}", file_name);
            Ok(format!("Successfully connected to {}", file_name))
        }
        Err(e) => {
            state.scratch.discard(&stored);
            Err(ApiError {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                message: format!("Failed to connect: {}", e),
            })
        }
    }
}

/// Pull the database file out of the multipart body. The file name is
/// checked before its contents are read.
async fn read_upload(mut multipart: Multipart) -> Result<(String, Vec<u8>), ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Failed to read upload: {}", e)))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let file_name = validate_file_name(field.file_name().unwrap_or(""))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to read file data: {}", e)))?;
        return Ok((file_name, bytes.to_vec()));
    }

    Err(UploadError::MissingFile.into())
}
