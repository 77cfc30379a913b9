//! Per-layer cache state machine.
//!
//! A layer moves `absent -> processing -> complete`. A `processing` entry is
//! an exclusive claim; it can only be taken over once it is older than the
//! staleness window. A `complete` entry is reopened only when the record's
//! schema version or the layer's prompt version moves past it.
//!
//! Everything here is pure: the store runs `plan_claim` + `apply_claim`
//! inside its single atomic section.

use std::time::Duration;

use serde::Serialize;

use crate::domain::{LayerMeta, LayerName, ProblemDetails};
use crate::error::AppError;

/// Bumped when the `ProblemDetails` shape changes; invalidates every layer.
pub const PROBLEM_SCHEMA_VERSION: u32 = 1;

pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(5 * 60);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerState {
  Complete,
  Processing,
  NeedsGeneration,
}

/// Classify one layer's metadata against the current versions.
pub fn layer_state(meta: Option<&LayerMeta>, current_prompt_version: u32, schema_outdated: bool) -> LayerState {
  match meta {
    Some(LayerMeta::Complete { prompt_version, .. })
      if !schema_outdated && *prompt_version >= current_prompt_version =>
    {
      LayerState::Complete
    }
    Some(LayerMeta::Processing { .. }) => LayerState::Processing,
    _ => LayerState::NeedsGeneration,
  }
}

/// A named group of layers resolved together, with their current prompt versions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayerSet {
  pub layers: Vec<(LayerName, u32)>,
  pub schema_version: u32,
}

impl LayerSet {
  pub fn new(layers: &[(LayerName, u32)]) -> Self {
    Self { layers: layers.to_vec(), schema_version: PROBLEM_SCHEMA_VERSION }
  }

  pub fn names(&self) -> Vec<LayerName> {
    self.layers.iter().map(|(l, _)| *l).collect()
  }

  pub fn schema_outdated(&self, details: &ProblemDetails) -> bool {
    details.processing_meta.schema_version < self.schema_version
  }

  pub fn states(&self, details: &ProblemDetails) -> Vec<(LayerName, LayerState)> {
    let outdated = self.schema_outdated(details);
    self
      .layers
      .iter()
      .map(|(layer, pv)| (*layer, layer_state(details.layer_meta(*layer), *pv, outdated)))
      .collect()
  }

  /// Read-only verdict for a status query: never claims anything.
  pub fn summarize(&self, details: Option<ProblemDetails>) -> ProcessingResult {
    let Some(details) = details else {
      return ProcessingResult::NotFound;
    };
    let states = self.states(&details);
    if states.iter().all(|(_, s)| *s == LayerState::Complete) {
      ProcessingResult::Complete(Box::new(details))
    } else if states.iter().any(|(_, s)| *s == LayerState::Processing) {
      ProcessingResult::Processing
    } else {
      ProcessingResult::NotFound
    }
  }
}

/// Caller-facing status of a layer set.
#[derive(Clone, Debug, PartialEq)]
pub enum ProcessingResult {
  Complete(Box<ProblemDetails>),
  Processing,
  NotFound,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClaimOutcome {
  Claimed(Vec<LayerName>),
  AlreadyComplete,
  AlreadyProcessing,
}

/// Decide the outcome of a claim without mutating anything.
///
/// Any fresh `processing` entry aborts the whole claim so two callers never
/// split one layer set between them.
pub fn plan_claim(details: &ProblemDetails, set: &LayerSet, stale_after: Duration, now_ms: i64) -> ClaimOutcome {
  let stale_ms = i64::try_from(stale_after.as_millis()).unwrap_or(i64::MAX);
  let mut claimed = Vec::new();
  for (layer, state) in set.states(details) {
    match state {
      LayerState::Complete => {}
      LayerState::Processing => {
        let updated_at = details.layer_meta(layer).map(LayerMeta::updated_at).unwrap_or(0);
        if now_ms.saturating_sub(updated_at) < stale_ms {
          return ClaimOutcome::AlreadyProcessing;
        }
        claimed.push(layer);
      }
      LayerState::NeedsGeneration => claimed.push(layer),
    }
  }
  if claimed.is_empty() {
    ClaimOutcome::AlreadyComplete
  } else {
    ClaimOutcome::Claimed(claimed)
  }
}

/// Mark `claimed` as processing. An outdated schema drops every layer's
/// metadata first, so all layers regenerate under the new shape.
pub fn apply_claim(details: &mut ProblemDetails, claimed: &[LayerName], schema_version: u32, now_ms: i64) {
  let meta = &mut details.processing_meta;
  if meta.schema_version < schema_version {
    meta.layers.clear();
    meta.schema_version = schema_version;
  }
  for layer in claimed {
    meta.layers.insert(*layer, LayerMeta::Processing { updated_at: now_ms });
  }
}

/// Fail loudly when an upstream layer a stage depends on is not complete.
pub fn require_complete(
  details: &ProblemDetails,
  stage: &'static str,
  layer: LayerName,
  prompt_version: u32,
) -> Result<(), AppError> {
  let outdated = details.processing_meta.schema_version < PROBLEM_SCHEMA_VERSION;
  let state = layer_state(details.layer_meta(layer), prompt_version, outdated);
  if state == LayerState::Complete && details.derived.has(layer) {
    Ok(())
  } else {
    Err(AppError::MissingDependency { stage, slug: details.title_slug.clone(), layer })
  }
}
