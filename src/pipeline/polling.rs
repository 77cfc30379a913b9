//! Bounded polling for callers waiting on another request's generation.

use std::future::Future;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info, instrument};

use crate::domain::ProblemDetails;
use crate::error::AppError;
use crate::layers::ProcessingResult;
use crate::state::AppState;

use super::practice::get_practice_data;

/// Delay schedule between status checks. One check runs before the first
/// delay and one after each delay, so `delays_ms.len() + 1` checks in total.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PollPolicy {
  pub delays_ms: Vec<u64>,
}

impl Default for PollPolicy {
  fn default() -> Self {
    Self { delays_ms: vec![1_000, 2_000, 4_000, 8_000, 8_000, 8_000] }
  }
}

impl PollPolicy {
  pub fn immediate(attempts: usize) -> Self {
    Self { delays_ms: vec![0; attempts] }
  }
}

#[derive(Clone, Debug, PartialEq)]
pub enum PollOutcome {
  Ready(Box<ProblemDetails>),
  StillProcessing,
  NotFound,
}

/// Re-run `check` on the schedule until it stops reporting `Processing`.
/// Running out of delays is not an error.
pub async fn poll_until_ready<F, Fut>(policy: &PollPolicy, mut check: F) -> Result<PollOutcome, AppError>
where
  F: FnMut() -> Fut,
  Fut: Future<Output = Result<ProcessingResult, AppError>>,
{
  let mut delays = policy.delays_ms.iter();
  loop {
    match check().await? {
      ProcessingResult::Complete(d) => return Ok(PollOutcome::Ready(d)),
      ProcessingResult::NotFound => return Ok(PollOutcome::NotFound),
      ProcessingResult::Processing => {}
    }
    match delays.next() {
      Some(ms) => {
        debug!(delay_ms = ms, "Still processing; waiting");
        tokio::time::sleep(Duration::from_millis(*ms)).await;
      }
      None => return Ok(PollOutcome::StillProcessing),
    }
  }
}

/// Practice data for `slug`: generate it if nobody else is, otherwise wait
/// for the other request within the configured schedule.
#[instrument(level = "info", skip(state), fields(%slug))]
pub async fn ensure_practice_data(state: &AppState, slug: &str) -> Result<PollOutcome, AppError> {
  match super::practice::generate_practice_data(state, slug).await? {
    super::GenerationOutcome::Ready(d) => return Ok(PollOutcome::Ready(Box::new(d))),
    super::GenerationOutcome::Processing => {}
  }
  info!(target: "pipeline", %slug, "Practice data in progress elsewhere; polling");
  poll_until_ready(&state.settings.poll, || get_practice_data(state, slug)).await
}
