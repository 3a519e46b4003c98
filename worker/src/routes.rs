//! HTTP handlers for the Processing Worker's surface (§4.3, §6).

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use tracing::instrument;

use tripwhisper::wire::{
    BatchItemErr, BatchItemOk, BatchItemRequest, BatchItemResult, DetectLanguageRequest,
    DetectLanguageResponse, EmbedRequest, EmbedResponse, HealthResponse, HealthStatus,
    ProcessBatchRequest, ProcessBatchResponse, TranslateRequest, TranslateResponse,
};

use crate::error::{AppError, AppJson};
use crate::state::AppState;

/// Cheap readiness probe; never touches the models (§4.3). Returns
/// non-2xx while loading so callers (e.g. the wake probe) can tell
/// "process up" from "ready to serve" from the status code alone.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let loaded = state.models_loaded();
    let status = if loaded {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(HealthResponse {
            status: if loaded {
                HealthStatus::Ready
            } else {
                HealthStatus::Loading
            },
            models_loaded: loaded,
        }),
    )
}

pub async fn detect_language(
    State(state): State<AppState>,
    AppJson(req): AppJson<DetectLanguageRequest>,
) -> Result<Json<DetectLanguageResponse>, AppError> {
    require_models_loaded(&state)?;
    let language = state.models.detect_language(&req.text);
    Ok(Json(DetectLanguageResponse { language }))
}

pub async fn translate(
    State(state): State<AppState>,
    AppJson(req): AppJson<TranslateRequest>,
) -> Result<Json<TranslateResponse>, AppError> {
    require_models_loaded(&state)?;
    let source_language = req
        .source_language
        .unwrap_or_else(|| state.models.detect_language(&req.text));
    let translated_text = state.models.translate(&req.text, &source_language);
    Ok(Json(TranslateResponse {
        translated_text,
        source_language,
    }))
}

pub async fn embed(
    State(state): State<AppState>,
    AppJson(req): AppJson<EmbedRequest>,
) -> Result<Json<EmbedResponse>, AppError> {
    require_models_loaded(&state)?;
    let vector = state.models.embed(&req.text);
    Ok(Json(EmbedResponse { vector }))
}

/// The only endpoint the Coordinator uses in steady state (§4.3).
/// Per-item failures stay in-band as `BatchItemResult::Err`; only
/// model-not-loaded or a malformed request fails the whole batch.
#[instrument(skip(state, req))]
pub async fn process_batch(
    State(state): State<AppState>,
    AppJson(req): AppJson<ProcessBatchRequest>,
) -> Result<Json<ProcessBatchResponse>, AppError> {
    require_models_loaded(&state)?;

    let results = req
        .items
        .into_iter()
        .map(|item| process_item(&state, item))
        .collect();

    Ok(Json(ProcessBatchResponse { results }))
}

fn process_item(state: &AppState, item: BatchItemRequest) -> BatchItemResult {
    if item.text.trim().is_empty() {
        return BatchItemResult::Err(BatchItemErr {
            id: item.id,
            error: "empty_text".to_string(),
        });
    }

    let detected_language = item
        .source_language
        .clone()
        .unwrap_or_else(|| state.models.detect_language(&item.text));
    let translated_text = state.models.translate(&item.text, &detected_language);
    let vector = state.models.embed(&translated_text);

    BatchItemResult::Ok(BatchItemOk {
        id: item.id,
        detected_language,
        translated_text,
        vector,
    })
}

fn require_models_loaded(state: &AppState) -> Result<(), AppError> {
    if state.models_loaded() {
        Ok(())
    } else {
        Err(AppError::ModelsNotLoaded)
    }
}
