//! Persistence Gateway (§4.1): idempotent reads/writes of tips,
//! embeddings, and promotions against a transactional store.

pub mod postgres;

pub use postgres::PostgresGateway;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{LocationId, Promotion, Tip, TipId};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("tip {0:?} not found")]
    TipNotFound(TipId),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// A fetched, translated tip ready for clustering (§4.1 `list_processed`).
#[derive(Debug, Clone)]
pub struct ProcessedTip {
    pub tip_id: TipId,
    pub translated_text: String,
    pub vector: Vec<f32>,
    pub submitted_at: chrono::DateTime<chrono::Utc>,
}

/// Transactional interface the Coordinator and Promotion Engine depend
/// on. A trait (rather than a concrete `PostgresGateway` everywhere) so
/// the coordinator and promotion engine can be unit-tested against an
/// in-memory fake.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Claims up to `limit` pending tips atomically, transitioning them
    /// to `processing`, ordered by `submitted_at` ascending. When
    /// `location_id` is given, only tips at that location are eligible,
    /// supporting an operator rerun scoped to a single location.
    async fn claim_pending(
        &self,
        limit: i64,
        location_id: Option<LocationId>,
    ) -> GatewayResult<Vec<Tip>>;

    /// Upserts the embedding, updates the tip's translation fields, and
    /// marks it `processed`. Idempotent by `tip_id`.
    async fn record_result(
        &self,
        tip_id: TipId,
        detected_language: &str,
        translated_text: &str,
        vector: &[f32],
    ) -> GatewayResult<()>;

    /// Marks a tip `failed` with an opaque reason.
    async fn record_failure(&self, tip_id: TipId, reason: &str) -> GatewayResult<()>;

    /// Reverts a tip from `processing` back to `pending` (compensation,
    /// §4.4 step 2, §7 `CancelledByOperator`).
    async fn revert_to_pending(&self, tip_id: TipId) -> GatewayResult<()>;

    /// Stable iteration over all processed tips for a location, for
    /// promotion.
    async fn list_processed(&self, location_id: LocationId) -> GatewayResult<Vec<ProcessedTip>>;

    /// Replaces the promotion set for a location atomically.
    async fn replace_promotions(
        &self,
        location_id: LocationId,
        promotions: &[Promotion],
    ) -> GatewayResult<()>;
}
