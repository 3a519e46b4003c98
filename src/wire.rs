//! JSON wire schemas for the Processing Worker's HTTP surface (§6).
//!
//! Shared by the coordinator's [`crate::worker_client`] and the
//! `tripwhisper-worker` binary so both sides parse/serialize the same
//! explicit, tagged shapes rather than ad hoc `serde_json::Value`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub models_loaded: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ready,
    Loading,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectLanguageRequest {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectLanguageResponse {
    pub language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslateRequest {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_language: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslateResponse {
    pub translated_text: String,
    pub source_language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedRequest {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedResponse {
    pub vector: Vec<f32>,
}

/// One item of a `/process-batch` request (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItemRequest {
    pub id: i64,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_language: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessBatchRequest {
    pub items: Vec<BatchItemRequest>,
}

/// One item of a `/process-batch` response: either success or a
/// per-item error, tagged so the two shapes never conflate (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BatchItemResult {
    Ok(BatchItemOk),
    Err(BatchItemErr),
}

impl BatchItemResult {
    pub fn id(&self) -> i64 {
        match self {
            BatchItemResult::Ok(ok) => ok.id,
            BatchItemResult::Err(err) => err.id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItemOk {
    pub id: i64,
    pub detected_language: String,
    pub translated_text: String,
    pub vector: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItemErr {
    pub id: i64,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessBatchResponse {
    pub results: Vec<BatchItemResult>,
}

/// Body returned on a 4xx/5xx from the worker (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_item_result_round_trips_ok_variant() {
        let ok = BatchItemResult::Ok(BatchItemOk {
            id: 7,
            detected_language: "fra_Latn".into(),
            translated_text: "avoid the tourist spots".into(),
            vector: vec![0.0; 384],
        });
        let json = serde_json::to_string(&ok).unwrap();
        let parsed: BatchItemResult = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id(), 7);
        assert!(matches!(parsed, BatchItemResult::Ok(_)));
    }

    #[test]
    fn batch_item_result_round_trips_err_variant() {
        let err = BatchItemResult::Err(BatchItemErr {
            id: 2,
            error: "translation_failed".into(),
        });
        let json = serde_json::to_string(&err).unwrap();
        let parsed: BatchItemResult = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id(), 2);
        assert!(matches!(parsed, BatchItemResult::Err(_)));
    }
}
