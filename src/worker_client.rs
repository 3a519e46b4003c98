//! HTTP client the Coordinator uses to call the Processing Worker's
//! `/process-batch` endpoint, with retry/backoff on transport errors and
//! 5xx responses (§4.4 step 4, §7, §9).

use rand::Rng;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::wire::{BatchItemRequest, ProcessBatchRequest, ProcessBatchResponse};

const BACKOFF_BASE: Duration = Duration::from_secs(1);
const BACKOFF_FACTOR: u32 = 2;
const JITTER_FRACTION: f64 = 0.20;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("transport error calling worker: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("worker returned server error: {status}: {body}")]
    ServerError {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("worker returned client error: {status}: {body}")]
    ClientError {
        status: reqwest::StatusCode,
        body: String,
    },

    /// §7 `BatchTransportError`: retries exhausted.
    #[error("batch exhausted after {attempts} attempts")]
    BatchExhausted { attempts: u32 },
}

pub struct WorkerClient {
    client: reqwest::Client,
    base_url: String,
    max_attempts: u32,
}

impl WorkerClient {
    pub fn new(base_url: String, request_timeout: Duration, max_attempts: u32) -> Self {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .expect("reqwest client configuration is valid");

        Self {
            client,
            base_url,
            max_attempts,
        }
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Submits one batch, retrying transport errors and 5xx responses
    /// with exponential backoff (base 1s, factor 2, jitter ±20%) up to
    /// `max_attempts`. 4xx responses and successful 200s are never
    /// retried (§9).
    pub async fn process_batch(
        &self,
        items: Vec<BatchItemRequest>,
    ) -> Result<ProcessBatchResponse, WorkerError> {
        let url = format!("{}/process-batch", self.base_url);
        let body = ProcessBatchRequest { items };

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_once(&url, &body).await {
                Ok(response) => return Ok(response),
                Err(err) if is_retryable(&err) && attempt < self.max_attempts => {
                    let delay = backoff_delay(attempt);
                    warn!(attempt, ?delay, error = %err, "retrying batch after error");
                    tokio::time::sleep(delay).await;
                }
                Err(err) if is_retryable(&err) => {
                    warn!(attempt, "batch exhausted retries");
                    return Err(WorkerError::BatchExhausted { attempts: attempt });
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn try_once(
        &self,
        url: &str,
        body: &ProcessBatchRequest,
    ) -> Result<ProcessBatchResponse, WorkerError> {
        let resp = self.client.post(url).json(body).send().await?;
        let status = resp.status();

        if status.is_success() {
            let parsed = resp.json::<ProcessBatchResponse>().await?;
            return Ok(parsed);
        }

        let text = resp.text().await.unwrap_or_default();
        debug!(%status, body = %text, "worker returned non-success");

        if status.is_server_error() {
            Err(WorkerError::ServerError { status, body: text })
        } else {
            Err(WorkerError::ClientError { status, body: text })
        }
    }
}

fn is_retryable(err: &WorkerError) -> bool {
    matches!(
        err,
        WorkerError::Transport(_) | WorkerError::ServerError { .. }
    )
}

/// `base * factor^(attempt-1)`, jittered by ±20% (§9).
fn backoff_delay(attempt: u32) -> Duration {
    let exp = BACKOFF_FACTOR.pow(attempt.saturating_sub(1));
    let base = BACKOFF_BASE * exp;

    let jitter = rand::thread_rng().gen_range(-JITTER_FRACTION..=JITTER_FRACTION);
    let factor = (1.0 + jitter).max(0.0);
    base.mul_f64(factor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_exponentially_before_jitter() {
        // jitter is bounded at ±20%, so attempt 2's delay is always
        // greater than attempt 1's worst case (1s * 1.2 = 1.2s) is not
        // guaranteed; instead assert the unjittered base relationship.
        let exp1 = BACKOFF_FACTOR.pow(0);
        let exp2 = BACKOFF_FACTOR.pow(1);
        let exp3 = BACKOFF_FACTOR.pow(2);
        assert_eq!(exp1, 1);
        assert_eq!(exp2, 2);
        assert_eq!(exp3, 4);
    }

    #[test]
    fn backoff_delay_stays_within_jitter_bounds() {
        for attempt in 1..=4 {
            let base_secs = BACKOFF_BASE.as_secs_f64() * (BACKOFF_FACTOR.pow(attempt - 1) as f64);
            let delay = backoff_delay(attempt).as_secs_f64();
            assert!(delay >= base_secs * 0.79, "attempt {attempt}: {delay} too small");
            assert!(delay <= base_secs * 1.21, "attempt {attempt}: {delay} too large");
        }
    }

    #[test]
    fn server_and_transport_errors_are_retryable_client_errors_are_not() {
        let server_err = WorkerError::ServerError {
            status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            body: String::new(),
        };
        let client_err = WorkerError::ClientError {
            status: reqwest::StatusCode::BAD_REQUEST,
            body: String::new(),
        };
        assert!(is_retryable(&server_err));
        assert!(!is_retryable(&client_err));
    }
}
