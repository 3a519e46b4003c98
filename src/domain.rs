//! Core entities of §3: Location, Tip, Embedding, Promotion.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fixed embedding dimensionality; a process-wide constant per §3.
pub const EMBEDDING_DIM: usize = 384;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocationId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TipId(pub i64);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub name: String,
    pub country: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Lifecycle state of a `Tip`, per §3: created `Pending`, terminal at
/// `Processed` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TipStatus {
    Pending,
    Processing,
    Processed,
    Failed,
}

impl TipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TipStatus::Pending => "pending",
            TipStatus::Processing => "processing",
            TipStatus::Processed => "processed",
            TipStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for TipStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TipStatus::Pending),
            "processing" => Ok(TipStatus::Processing),
            "processed" => Ok(TipStatus::Processed),
            "failed" => Ok(TipStatus::Failed),
            other => Err(format!("unrecognized tip status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tip {
    pub id: TipId,
    pub raw_text: String,
    pub detected_language: Option<String>,
    pub translated_text: Option<String>,
    pub location_id: LocationId,
    pub submitted_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub status: TipStatus,
}

/// A 384-dim single-precision embedding, one per processed tip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    pub tip_id: TipId,
    pub vector: Vec<f32>,
    pub created_at: DateTime<Utc>,
}

impl Embedding {
    /// Returns the vector's L2 norm, used when defensively re-normalizing
    /// embeddings before clustering (§4.5: "the engine normalizes
    /// defensively").
    pub fn norm(&self) -> f32 {
        self.vector.iter().map(|x| x * x).sum::<f32>().sqrt()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Promotion {
    pub location_id: LocationId,
    pub tip_text: String,
    pub mention_count: usize,
    pub similarity_score: f32,
    pub promoted_at: DateTime<Utc>,
}
