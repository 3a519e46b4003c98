//! Shared application state for the worker's axum router.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::models::Models;

#[derive(Clone)]
pub struct AppState {
    pub models: Arc<Models>,
    models_loaded: Arc<AtomicBool>,
}

impl AppState {
    pub fn new(models: Models) -> Self {
        Self {
            models: Arc::new(models),
            models_loaded: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Spawns the one-time model load and flips the readiness flag when
    /// it completes.
    pub fn spawn_model_load(&self) {
        let models = self.models.clone();
        let loaded = self.models_loaded.clone();
        tokio::spawn(async move {
            models.load().await;
            loaded.store(true, Ordering::SeqCst);
            tracing::info!("models loaded");
        });
    }

    pub fn models_loaded(&self) -> bool {
        self.models_loaded.load(Ordering::SeqCst)
    }
}
