//! Coordinator (§4.4): drains the pending queue, wakes the worker if
//! needed, fans batches out concurrently, persists results, retries
//! transient failures, and advances status.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{error, info, instrument, warn};

use crate::config::Config;
use crate::domain::{LocationId, Tip, TipId};
use crate::gateway::PersistenceGateway;
use crate::promotion::cluster_location;
use crate::wake::{self, WakeError};
use crate::wire::BatchItemRequest;
use crate::worker_client::WorkerClient;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("worker unavailable: pipeline aborted")]
    PipelineAborted,

    #[error("gateway error: {0}")]
    Gateway(#[from] crate::gateway::GatewayError),

    /// §7 `PersistenceTransient`: a per-tip write exhausted its local DB
    /// retries. The affected tips were compensated back to `pending`
    /// (never left `processing`), but the run as a whole did not fully
    /// succeed.
    #[error("{count} tip(s) failed to persist after exhausting retries")]
    PersistenceFailures { count: usize },
}

/// Outcome of one coordinator run, logged by the operator binary and
/// usable by callers that want more than an exit code.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub claimed: usize,
    pub processed: usize,
    pub failed: usize,
    pub locations_promoted: usize,
    pub aborted: bool,
}

/// Runs one end-to-end coordinator pass (§4.4) against `gateway`,
/// optionally skipping promotion when `run_promotion` is false (the
/// operator entry point's `--no-promotion` flag), and optionally
/// restricted to a single location for manual reruns via
/// `location_filter` (the operator entry point's `--location-id` flag).
#[instrument(skip(gateway, config))]
pub async fn run_once(
    gateway: &dyn PersistenceGateway,
    config: &Config,
    run_promotion: bool,
    location_filter: Option<LocationId>,
) -> Result<RunSummary, CoordinatorError> {
    let claimed = gateway
        .claim_pending(config.per_run_limit, location_filter)
        .await?;
    if claimed.is_empty() {
        info!("no pending tips; nothing to do");
        return Ok(RunSummary::default());
    }

    info!(count = claimed.len(), "claimed pending tips");

    let http_client = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .build()
        .expect("reqwest client configuration is valid");

    if let Err(WakeError::WorkerUnavailable) = wake::ensure_ready(
        &http_client,
        &config.worker_base_url,
        config.worker_mac,
        config.worker_ip.as_deref(),
        config.wake_enabled,
    )
    .await
    {
        warn!("worker unavailable; compensating claimed tips back to pending");
        compensate(gateway, &claimed).await;
        return Err(CoordinatorError::PipelineAborted);
    }

    let worker_client = Arc::new(WorkerClient::new(
        config.worker_base_url.clone(),
        config.request_timeout,
        config.max_attempts_per_batch,
    ));

    let batches: Vec<Vec<Tip>> = claimed
        .chunks(config.batch_size)
        .map(|chunk| chunk.to_vec())
        .collect();

    let semaphore = Arc::new(Semaphore::new(config.fanout));
    let mut handles: Vec<tokio::task::JoinHandle<BatchOutcome>> = Vec::with_capacity(batches.len());

    for batch in batches {
        let semaphore = semaphore.clone();
        let worker_client = worker_client.clone();

        handles.push(tokio::spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .expect("semaphore is never closed");
            dispatch_batch(&worker_client, batch).await
        }));
    }

    let mut touched_locations: HashSet<i64> = HashSet::new();
    for tip in &claimed {
        touched_locations.insert(tip.location_id.0);
    }

    let (outcomes, cancelled) =
        await_batches_cancellable(handles, config.shutdown_grace_period).await;

    let mut processed = 0usize;
    let mut failed = 0usize;
    let mut persistence_failures = 0usize;
    let mut completed_tip_ids: HashSet<i64> = HashSet::new();

    for outcome in outcomes {
        for item in outcome.items {
            completed_tip_ids.insert(item.tip_id.0);
            match item.result {
                Ok((detected_language, translated_text, vector)) => {
                    match gateway
                        .record_result(item.tip_id, &detected_language, &translated_text, &vector)
                        .await
                    {
                        Ok(()) => processed += 1,
                        Err(e) => {
                            // `record_result` already retried transient
                            // errors locally (§7 `PersistenceTransient`);
                            // this is exhaustion, not the first failure.
                            // The tip is still `processing` in the DB, so
                            // it must be compensated back to `pending`
                            // rather than left stranded (§7, §8).
                            error!(
                                tip_id = ?item.tip_id,
                                error = %e,
                                "failed to record result after exhausting retries; compensating"
                            );
                            persistence_failures += 1;
                            if let Err(e) = gateway.revert_to_pending(item.tip_id).await {
                                error!(
                                    tip_id = ?item.tip_id,
                                    error = %e,
                                    "failed to compensate tip back to pending"
                                );
                            }
                        }
                    }
                }
                Err(reason) => match gateway.record_failure(item.tip_id, &reason).await {
                    Ok(()) => failed += 1,
                    Err(e) => {
                        error!(
                            tip_id = ?item.tip_id,
                            error = %e,
                            "failed to record failure after exhausting retries; compensating"
                        );
                        persistence_failures += 1;
                        if let Err(e) = gateway.revert_to_pending(item.tip_id).await {
                            error!(
                                tip_id = ?item.tip_id,
                                error = %e,
                                "failed to compensate tip back to pending"
                            );
                        }
                    }
                },
            }
        }
    }

    if cancelled {
        warn!("shutdown signal received; compensating tips abandoned mid-batch");
        let abandoned: Vec<&Tip> = claimed
            .iter()
            .filter(|tip| !completed_tip_ids.contains(&tip.id.0))
            .collect();
        for tip in abandoned {
            if let Err(e) = gateway.revert_to_pending(tip.id).await {
                error!(tip_id = ?tip.id, error = %e, "failed to compensate tip back to pending");
            }
        }
    }

    let mut summary = RunSummary {
        claimed: claimed.len(),
        processed,
        failed,
        locations_promoted: 0,
        aborted: cancelled,
    };

    if run_promotion && !cancelled {
        for location_id in touched_locations {
            if let Err(e) = promote_location(gateway, config, LocationId(location_id)).await {
                error!(location_id, error = %e, "promotion failed for location");
                continue;
            }
            summary.locations_promoted += 1;
        }
    }

    // Compensated tips are never left `processing` (§7, §8), but a
    // persistence layer that could not durably record results is still a
    // run failure, not a silent success (§7 `PersistenceTransient`).
    if persistence_failures > 0 {
        return Err(CoordinatorError::PersistenceFailures {
            count: persistence_failures,
        });
    }

    Ok(summary)
}

/// One resolved batch item: either the (detected_language,
/// translated_text, vector) triple for success, or an opaque failure
/// reason (§6, §7).
struct BatchItemOutcome {
    tip_id: TipId,
    result: Result<(String, String, Vec<f32>), String>,
}

struct BatchOutcome {
    items: Vec<BatchItemOutcome>,
}

/// Submits one batch to the worker and maps the response back onto
/// per-item outcomes. On total batch failure after retries (§7
/// `BatchTransportError`), every item in the batch is marked
/// `batch_exhausted`.
async fn dispatch_batch(worker_client: &WorkerClient, batch: Vec<Tip>) -> BatchOutcome {
    let requests: Vec<BatchItemRequest> = batch
        .iter()
        .map(|tip| BatchItemRequest {
            id: tip.id.0,
            text: tip.raw_text.clone(),
            source_language: tip.detected_language.clone(),
        })
        .collect();

    match worker_client.process_batch(requests).await {
        Ok(response) => {
            let mut by_id: std::collections::HashMap<i64, crate::wire::BatchItemResult> =
                response.results.into_iter().map(|r| (r.id(), r)).collect();

            let items = batch
                .into_iter()
                .map(|tip| {
                    let result = match by_id.remove(&tip.id.0) {
                        Some(crate::wire::BatchItemResult::Ok(ok)) => {
                            Ok((ok.detected_language, ok.translated_text, ok.vector))
                        }
                        Some(crate::wire::BatchItemResult::Err(err)) => Err(err.error),
                        None => Err("missing_from_batch_response".to_string()),
                    };
                    BatchItemOutcome {
                        tip_id: tip.id,
                        result,
                    }
                })
                .collect();

            BatchOutcome { items }
        }
        Err(_) => {
            let items = batch
                .into_iter()
                .map(|tip| BatchItemOutcome {
                    tip_id: tip.id,
                    result: Err("batch_exhausted".to_string()),
                })
                .collect();
            BatchOutcome { items }
        }
    }
}

/// Runs the Promotion Engine for one location and replaces its
/// promotion set (§4.5, §4.1). A location with zero processed tips is a
/// silent no-op (§7 `PromotionInputEmpty`): existing promotions are
/// retained, since `list_processed` simply returns empty and
/// `replace_promotions` is not called for it.
async fn promote_location(
    gateway: &dyn PersistenceGateway,
    config: &Config,
    location_id: LocationId,
) -> Result<(), CoordinatorError> {
    let processed = gateway.list_processed(location_id).await?;
    if processed.is_empty() {
        return Ok(());
    }

    let promotions = cluster_location(
        location_id,
        processed,
        config.similarity_threshold,
        config.min_mentions,
    );
    gateway.replace_promotions(location_id, &promotions).await?;
    Ok(())
}

/// Reverts every tip in `tips` back to `pending` (§4.4 step 2, §7).
/// Individual failures are logged but do not stop compensation of the
/// rest; on shutdown or worker-unavailability every tip should get a
/// best-effort revert.
async fn compensate(gateway: &dyn PersistenceGateway, tips: &[Tip]) {
    for tip in tips {
        if let Err(e) = gateway.revert_to_pending(tip.id).await {
            error!(tip_id = ?tip.id, error = %e, "failed to compensate tip back to pending");
        }
    }
}

/// Awaits all in-flight batch tasks, but if an operator shutdown signal
/// (SIGINT) arrives first, stops waiting for new completions once
/// `grace_period` elapses and aborts whatever is still running (§4.4
/// cancellation, §7 `CancelledByOperator`). Returns the outcomes that
/// did complete plus whether the run was cancelled.
async fn await_batches_cancellable(
    handles: Vec<tokio::task::JoinHandle<BatchOutcome>>,
    grace_period: Duration,
) -> (Vec<BatchOutcome>, bool) {
    let mut outcomes = Vec::with_capacity(handles.len());
    let mut in_flight: FuturesUnordered<_> = handles.into_iter().collect();

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut shutdown_received = false;

    loop {
        if in_flight.is_empty() {
            return (outcomes, shutdown_received);
        }

        if !shutdown_received {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    shutdown_received = true;
                    warn!(
                        in_flight = in_flight.len(),
                        grace_period_secs = grace_period.as_secs(),
                        "shutdown signal received; awaiting in-flight batches with grace period"
                    );
                }
                Some(result) = in_flight.next() => {
                    if let Ok(outcome) = result {
                        outcomes.push(outcome);
                    }
                }
            }
            continue;
        }

        let deadline = tokio::time::sleep(grace_period);
        tokio::pin!(deadline);
        loop {
            if in_flight.is_empty() {
                return (outcomes, true);
            }
            tokio::select! {
                _ = &mut deadline => {
                    warn!(abandoned = in_flight.len(), "grace period expired; abandoning in-flight batches");
                    for handle in in_flight {
                        handle.abort();
                    }
                    return (outcomes, true);
                }
                Some(result) = in_flight.next() => {
                    if let Ok(outcome) = result {
                        outcomes.push(outcome);
                    }
                }
            }
        }
    }
}
