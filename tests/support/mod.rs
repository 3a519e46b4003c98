//! In-memory `PersistenceGateway` fake, used by the coordinator
//! integration tests so they exercise real scheduling/retry/promotion
//! logic without a live Postgres instance.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use tripwhisper::domain::{LocationId, Tip, TipId, TipStatus};
use tripwhisper::gateway::{GatewayResult, PersistenceGateway, ProcessedTip};

pub struct FakeGateway {
    tips: Mutex<HashMap<i64, Tip>>,
    embeddings: Mutex<HashMap<i64, Vec<f32>>>,
    promotions: Mutex<HashMap<i64, Vec<tripwhisper::domain::Promotion>>>,
}

impl FakeGateway {
    pub fn new(tips: Vec<Tip>) -> Self {
        let by_id = tips.into_iter().map(|t| (t.id.0, t)).collect();
        Self {
            tips: Mutex::new(by_id),
            embeddings: Mutex::new(HashMap::new()),
            promotions: Mutex::new(HashMap::new()),
        }
    }

    pub fn tip_status(&self, id: i64) -> TipStatus {
        self.tips.lock().unwrap().get(&id).unwrap().status
    }

    pub fn promotions_for(&self, location_id: i64) -> Vec<tripwhisper::domain::Promotion> {
        self.promotions
            .lock()
            .unwrap()
            .get(&location_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl PersistenceGateway for FakeGateway {
    async fn claim_pending(
        &self,
        limit: i64,
        location_id: Option<LocationId>,
    ) -> GatewayResult<Vec<Tip>> {
        let mut tips = self.tips.lock().unwrap();
        let mut pending: Vec<&mut Tip> = tips
            .values_mut()
            .filter(|t| {
                t.status == TipStatus::Pending
                    && location_id.map(|l| l == t.location_id).unwrap_or(true)
            })
            .collect();
        pending.sort_by_key(|t| t.submitted_at);

        let claimed: Vec<Tip> = pending
            .into_iter()
            .take(limit.max(0) as usize)
            .map(|t| {
                t.status = TipStatus::Processing;
                t.clone()
            })
            .collect();
        Ok(claimed)
    }

    async fn record_result(
        &self,
        tip_id: TipId,
        detected_language: &str,
        translated_text: &str,
        vector: &[f32],
    ) -> GatewayResult<()> {
        self.embeddings
            .lock()
            .unwrap()
            .insert(tip_id.0, vector.to_vec());
        let mut tips = self.tips.lock().unwrap();
        if let Some(tip) = tips.get_mut(&tip_id.0) {
            tip.detected_language = Some(detected_language.to_string());
            tip.translated_text = Some(translated_text.to_string());
            tip.status = TipStatus::Processed;
            tip.processed_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn record_failure(&self, tip_id: TipId, _reason: &str) -> GatewayResult<()> {
        let mut tips = self.tips.lock().unwrap();
        if let Some(tip) = tips.get_mut(&tip_id.0) {
            tip.status = TipStatus::Failed;
            tip.processed_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn revert_to_pending(&self, tip_id: TipId) -> GatewayResult<()> {
        let mut tips = self.tips.lock().unwrap();
        if let Some(tip) = tips.get_mut(&tip_id.0) {
            if tip.status == TipStatus::Processing {
                tip.status = TipStatus::Pending;
            }
        }
        Ok(())
    }

    async fn list_processed(&self, location_id: LocationId) -> GatewayResult<Vec<ProcessedTip>> {
        let tips = self.tips.lock().unwrap();
        let embeddings = self.embeddings.lock().unwrap();

        let mut out: Vec<ProcessedTip> = tips
            .values()
            .filter(|t| t.location_id == location_id && t.status == TipStatus::Processed)
            .map(|t| ProcessedTip {
                tip_id: t.id,
                translated_text: t.translated_text.clone().unwrap_or_default(),
                vector: embeddings.get(&t.id.0).cloned().unwrap_or_default(),
                submitted_at: t.submitted_at,
            })
            .collect();
        out.sort_by_key(|t| t.tip_id.0);
        Ok(out)
    }

    async fn replace_promotions(
        &self,
        location_id: LocationId,
        promotions: &[tripwhisper::domain::Promotion],
    ) -> GatewayResult<()> {
        self.promotions
            .lock()
            .unwrap()
            .insert(location_id.0, promotions.to_vec());
        Ok(())
    }
}

pub fn tip(id: i64, location_id: i64, raw_text: &str, submitted_at: chrono::DateTime<Utc>) -> Tip {
    Tip {
        id: TipId(id),
        raw_text: raw_text.to_string(),
        detected_language: None,
        translated_text: None,
        location_id: LocationId(location_id),
        submitted_at,
        processed_at: None,
        status: TipStatus::Pending,
    }
}
