//! Feedback-data stage: reference solutions, then grading criteria built on
//! them. Needs the framing and both case layers from earlier stages.

use tracing::{info, instrument};

use crate::derive::{cases, framing as framing_layer, grading, solutions, versioned, ProblemContext};
use crate::domain::{Derived, LayerName, ProblemDetails, Solution};
use crate::error::AppError;
use crate::layers::{require_complete, ClaimOutcome, LayerSet, ProcessingResult};
use crate::state::AppState;

use super::{already_complete, load_details, load_problem, persist_layer, release_on_error, status_of, GenerationOutcome};

const STAGE: &str = "feedback data";

pub const FEEDBACK_LAYERS: [LayerName; 2] = [LayerName::Solutions, LayerName::GradingCriteria];

pub fn feedback_layers() -> LayerSet {
  LayerSet::new(&versioned(&FEEDBACK_LAYERS))
}

pub async fn get_feedback_data(state: &AppState, slug: &str) -> Result<ProcessingResult, AppError> {
  status_of(state, slug, &feedback_layers()).await
}

fn check_upstream(details: &ProblemDetails) -> Result<(), AppError> {
  require_complete(details, STAGE, LayerName::Framing, framing_layer::PROMPT_VERSION)?;
  require_complete(details, STAGE, LayerName::TestCases, cases::PROMPT_VERSION)?;
  require_complete(details, STAGE, LayerName::EdgeCases, cases::PROMPT_VERSION)
}

fn missing(slug: &str, layer: LayerName) -> AppError {
  AppError::MissingDependency { stage: STAGE, slug: slug.to_string(), layer }
}

#[instrument(level = "info", skip(state), fields(%slug))]
pub async fn generate_feedback_data(state: &AppState, slug: &str) -> Result<GenerationOutcome, AppError> {
  let problem = load_problem(state, slug).await?;
  check_upstream(&load_details(state, slug).await?)?;

  let set = feedback_layers();
  let claimed = match state.details.claim_layers(slug, &set, state.stale_after()).await? {
    ClaimOutcome::AlreadyComplete => return already_complete(state, slug, &set).await,
    ClaimOutcome::AlreadyProcessing => return Ok(GenerationOutcome::Processing),
    ClaimOutcome::Claimed(layers) => layers,
  };

  let rechecked = async {
    let details = load_details(state, slug).await?;
    check_upstream(&details)?;
    Ok::<_, AppError>(details)
  }
  .await;
  let details = release_on_error(state, slug, &claimed, rechecked).await?;
  let derived = &details.derived;
  let framing = derived.framing.as_ref().ok_or_else(|| missing(slug, LayerName::Framing))?;
  let test_cases = derived.test_cases.as_deref().ok_or_else(|| missing(slug, LayerName::TestCases))?;
  let edge_cases = derived.edge_cases.as_deref().ok_or_else(|| missing(slug, LayerName::EdgeCases))?;
  let ctx = ProblemContext::new(&problem, &details.source.original_content);
  info!(target: "pipeline", %slug, claimed = ?claimed, "Generating feedback layers");

  // Solutions are only regenerated when claimed; otherwise the stored ones are read.
  let solutions: Vec<Solution> = if claimed.contains(&LayerName::Solutions) {
    let out = solutions::generate(&state.llm, &ctx, framing, test_cases, edge_cases).await?;
    let data = Derived { solutions: Some(out.data.clone()), ..Default::default() };
    persist_layer(state, slug, LayerName::Solutions, data, &out.model, out.prompt_version).await?;
    out.data
  } else {
    let stored = require_complete(&details, STAGE, LayerName::Solutions, solutions::PROMPT_VERSION)
      .and_then(|()| derived.solutions.clone().ok_or_else(|| missing(slug, LayerName::Solutions)));
    release_on_error(state, slug, &claimed, stored).await?
  };

  if claimed.contains(&LayerName::GradingCriteria) {
    let out = grading::generate(&state.llm, &ctx, framing, test_cases, edge_cases, &solutions).await?;
    let data = Derived { grading_criteria: Some(out.data), ..Default::default() };
    persist_layer(state, slug, LayerName::GradingCriteria, data, &out.model, out.prompt_version).await?;
  }

  Ok(GenerationOutcome::Ready(load_details(state, slug).await?))
}
