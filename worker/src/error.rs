//! Catastrophic (whole-batch) error handling for the worker's HTTP
//! surface (§4.3: "a batch fails as a whole only on catastrophic
//! error"). Per-item failures never reach here; they're represented
//! in-band as `BatchItemResult::Err` (§6).

use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{async_trait, Json};
use thiserror::Error;
use tripwhisper::wire::ErrorResponse;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("models not yet loaded")]
    ModelsNotLoaded,

    #[error("malformed request: {0}")]
    MalformedRequest(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::ModelsNotLoaded => StatusCode::SERVICE_UNAVAILABLE,
            AppError::MalformedRequest(_) => StatusCode::BAD_REQUEST,
        };
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

/// Request-body extractor used in place of bare `axum::Json` so that a
/// malformed or non-JSON body surfaces as the §6 `{"error": ...}`
/// envelope (via `AppError::MalformedRequest`) instead of axum's default
/// rejection body.
pub struct AppJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for AppJson<T>
where
    T: serde::de::DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| AppError::MalformedRequest(e.to_string()))?;
        Ok(AppJson(value))
    }
}
