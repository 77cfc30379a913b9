//! Generation orchestrators. Each stage owns a fixed layer set:
//!
//! - preview: `framing` (plus the source fetch and example extraction)
//! - practice: `testCases`, `edgeCases`, `hints`, `pitfalls`
//! - feedback data: `solutions`, `gradingCriteria`
//!
//! A stage claims what is stale, derives only the claimed layers, writes each
//! layer as soon as it lands and returns the re-read record. A claim is
//! released only when the post-claim dependency re-check fails; a layer whose
//! generation failed or crashed is recovered by the staleness window.

pub mod feedback_data;
pub mod polling;
pub mod practice;
pub mod preview;

use tracing::{error, info, warn};

use crate::domain::{Derived, LayerMeta, LayerName, Problem, ProblemDetails};
use crate::error::AppError;
use crate::layers::{LayerSet, ProcessingResult};
use crate::state::AppState;
use crate::util::now_millis;

/// Result of a generate call. `Processing` means another request holds the claim.
#[derive(Clone, Debug, PartialEq)]
pub enum GenerationOutcome {
  Ready(ProblemDetails),
  Processing,
}

pub(crate) async fn load_problem(state: &AppState, slug: &str) -> Result<Problem, AppError> {
  state.problems.get(slug).await?.ok_or_else(|| AppError::ProblemNotFound(slug.to_string()))
}

pub(crate) async fn load_details(state: &AppState, slug: &str) -> Result<ProblemDetails, AppError> {
  state.details.get(slug).await?.ok_or_else(|| AppError::DetailsNotFound(slug.to_string()))
}

/// Status of a layer set without claiming anything.
pub(crate) async fn status_of(state: &AppState, slug: &str, set: &LayerSet) -> Result<ProcessingResult, AppError> {
  Ok(set.summarize(state.details.get(slug).await?))
}

/// Answer for a claim that found nothing to do.
pub(crate) async fn already_complete(state: &AppState, slug: &str, set: &LayerSet) -> Result<GenerationOutcome, AppError> {
  match status_of(state, slug, set).await? {
    ProcessingResult::Complete(d) => Ok(GenerationOutcome::Ready(*d)),
    _ => Ok(GenerationOutcome::Processing),
  }
}

/// Write one layer's data, then mark it complete.
pub(crate) async fn persist_layer(
  state: &AppState,
  slug: &str,
  layer: LayerName,
  data: Derived,
  model: &str,
  prompt_version: u32,
) -> Result<(), AppError> {
  state.details.update_derived(slug, data).await?;
  let meta = LayerMeta::Complete { updated_at: now_millis(), model: model.to_string(), prompt_version };
  state.details.update_layer_meta(slug, layer, meta).await?;
  info!(target: "pipeline", %slug, %layer, %model, prompt_version, "Layer complete");
  Ok(())
}

/// Pass `checked` through, releasing the claim on `claimed` first when it is an error.
pub(crate) async fn release_on_error<T>(
  state: &AppState,
  slug: &str,
  claimed: &[LayerName],
  checked: Result<T, AppError>,
) -> Result<T, AppError> {
  if let Err(e) = &checked {
    warn!(target: "pipeline", %slug, claimed = ?claimed, error = %e, "Dependency re-check failed; releasing claim");
    if let Err(release) = state.details.release_layers(slug, claimed).await {
      error!(target: "pipeline", %slug, error = %release, "Failed to release claim");
    }
  }
  checked
}

/// Log failed sibling tasks; their layers stay claimable for a later run.
pub(crate) fn log_failures(slug: &str, results: &[(&'static str, Option<Result<(), AppError>>)]) {
  for (task, res) in results {
    if let Some(Err(e)) = res {
      error!(target: "pipeline", %slug, task = *task, error = %e, "Layer generation failed");
    }
  }
}
