use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse},
    Json,
};
use ecg_session::{
    AnalysisView, ExportKind, GenerationOutput, GenerationRequest, Handlers, SessionError,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::ApiError;
use super::AppState;

const INDEX_HTML: &str = include_str!("page.html");

/// Run a session operation on the blocking pool.
async fn blocking<T, F>(state: &AppState, op: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&Handlers) -> Result<T, SessionError> + Send + 'static,
{
    let handlers = state.handlers.clone();
    let result = tokio::task::spawn_blocking(move || op(&handlers))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(result?)
}

#[derive(Serialize)]
pub(super) struct HealthResponse {
    status: &'static str,
    sessions: usize,
}

pub(super) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        sessions: state.handlers.store().len(),
    })
}

pub(super) async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

#[derive(Serialize)]
pub(super) struct CreateSessionResponse {
    session_id: String,
    #[serde(flatten)]
    output: GenerationOutput,
}

pub(super) async fn create_session(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let session_id = Uuid::new_v4().to_string();
    let id = session_id.clone();
    let output = blocking(&state, move |handlers| {
        let output = handlers.load(&id);
        if output.is_err() {
            handlers.unload(&id);
        }
        output
    })
    .await?;
    Ok((
        StatusCode::CREATED,
        Json(CreateSessionResponse { session_id, output }),
    ))
}

pub(super) async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    blocking(&state, move |handlers| {
        handlers.unload(&id);
        Ok(())
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn generate(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<GenerationRequest>,
) -> Result<Json<GenerationOutput>, ApiError> {
    let output = blocking(&state, move |handlers| handlers.generate(&id, &request)).await?;
    Ok(Json(output))
}

#[derive(Deserialize)]
pub(super) struct SelectRequest {
    index: usize,
}

pub(super) async fn select(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<SelectRequest>,
) -> Result<Json<AnalysisView>, ApiError> {
    let view = blocking(&state, move |handlers| handlers.select(&id, request.index)).await?;
    Ok(Json(view))
}

pub(super) async fn download(
    State(state): State<AppState>,
    Path((id, kind)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let kind: ExportKind = kind.parse().map_err(ApiError::BadRequest)?;
    let path = blocking(&state, move |handlers| handlers.export(&id, kind)).await?;
    if !state.handlers.store().contains_path(&path) {
        return Err(ApiError::Forbidden);
    }
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| ApiError::Internal(format!("reading {}: {e}", path.display())))?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok((
        [
            (header::CONTENT_TYPE, kind.content_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        bytes,
    ))
}
