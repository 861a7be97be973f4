use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::timeout;
use url::Url;

use super::checker::{ProbeError, ProbeRequest, Prober};
use super::types::{FailureReason, Outcome};
use crate::models::{Check, now_millis};

/// Check executor - probes one check and classifies the result
///
/// `execute` never fails: every error becomes a `down` outcome.
pub struct CheckExecutor {
    prober: Arc<dyn Prober>,
}

impl CheckExecutor {
    pub fn new(prober: Arc<dyn Prober>) -> Self {
        Self { prober }
    }

    /// Execute a monitoring check within its timeout budget
    pub async fn execute(&self, check: &Check) -> Outcome {
        let checked_at = now_millis();
        let start = Instant::now();
        let elapsed_ms = |start: Instant| start.elapsed().as_millis() as u64;

        let url = match Url::parse(&check.target_url()) {
            Ok(url) => url,
            Err(e) => {
                return Outcome::down(&check.id, FailureReason::Network, 0)
                    .with_error(format!("invalid target url: {e}"))
                    .at(checked_at);
            }
        };
        let request = ProbeRequest { method: check.method, url };
        let budget = Duration::from_secs(check.timeout_seconds);

        // Dropping the probe future on elapse abandons the in-flight request
        let outcome = match timeout(budget, self.prober.probe(&request)).await {
            Err(_) | Ok(Err(ProbeError::Timeout)) => {
                Outcome::down(&check.id, FailureReason::Timeout, elapsed_ms(start))
                    .with_error(format!("no response within {}s", check.timeout_seconds))
            }
            Ok(Err(e)) => {
                Outcome::down(&check.id, FailureReason::Network, elapsed_ms(start))
                    .with_error(e.to_string())
            }
            Ok(Ok(response)) if check.accepts(response.status_code) => {
                Outcome::up(&check.id, response.status_code, elapsed_ms(start))
            }
            Ok(Ok(response)) => {
                Outcome::down(&check.id, FailureReason::UnexpectedStatus, elapsed_ms(start))
                    .with_status_code(response.status_code)
            }
        };

        outcome.at(checked_at)
    }
}
