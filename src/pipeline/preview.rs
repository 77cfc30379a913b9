//! Preview stage: source material, examples and the framing layer.

use tracing::{info, instrument, warn};

use crate::derive::{examples, framing, versioned, ProblemContext};
use crate::domain::{Derived, LayerName, SourceContent};
use crate::error::AppError;
use crate::layers::{ClaimOutcome, LayerSet, ProcessingResult};
use crate::state::AppState;
use crate::util::strip_html;

use super::{already_complete, load_details, load_problem, persist_layer, status_of, GenerationOutcome};

pub const PREVIEW_LAYERS: [LayerName; 1] = [LayerName::Framing];

pub fn preview_layers() -> LayerSet {
  LayerSet::new(&versioned(&PREVIEW_LAYERS))
}

pub async fn get_preview_data(state: &AppState, slug: &str) -> Result<ProcessingResult, AppError> {
  status_of(state, slug, &preview_layers()).await
}

#[instrument(level = "info", skip(state), fields(%slug))]
pub async fn generate_preview_data(state: &AppState, slug: &str) -> Result<GenerationOutcome, AppError> {
  let problem = load_problem(state, slug).await?;
  let set = preview_layers();
  state.details.create_if_missing(slug, SourceContent::default()).await?;

  match state.details.claim_layers(slug, &set, state.stale_after()).await? {
    ClaimOutcome::AlreadyComplete => return already_complete(state, slug, &set).await,
    ClaimOutcome::AlreadyProcessing => return Ok(GenerationOutcome::Processing),
    ClaimOutcome::Claimed(_) => {}
  }

  let details = load_details(state, slug).await?;
  let source = resolve_source(state, slug, &details.source).await?;
  state.details.update_source(slug, source.clone()).await?;

  let ctx = ProblemContext::new(&problem, &source.original_content);
  let examples = if source.examples.is_empty() {
    match examples::extract(&state.llm, &ctx).await {
      Ok(extracted) => {
        let found = extracted.data;
        if !found.is_empty() {
          state
            .details
            .update_source(slug, SourceContent { examples: found.clone(), ..Default::default() })
            .await?;
        }
        found
      }
      Err(e) => {
        warn!(target: "pipeline", %slug, error = %e, "Example extraction failed; framing without examples");
        Vec::new()
      }
    }
  } else {
    source.examples.clone()
  };

  let generated = framing::generate(&state.llm, &ctx, &examples).await?;
  persist_layer(
    state,
    slug,
    LayerName::Framing,
    Derived { framing: Some(generated.data), ..Default::default() },
    &generated.model,
    generated.prompt_version,
  )
  .await?;

  Ok(GenerationOutcome::Ready(load_details(state, slug).await?))
}

/// Stored source wins; only missing pieces are fetched, concurrently.
async fn resolve_source(state: &AppState, slug: &str, stored: &SourceContent) -> Result<SourceContent, AppError> {
  let need_statement = stored.original_content.trim().is_empty();
  let need_snippets = stored.code_snippets.is_empty();

  let statement = async {
    if need_statement {
      state.source.fetch_problem_statement(slug).await.map(Some)
    } else {
      Ok(None)
    }
  };
  let snippets = async {
    if need_snippets {
      state.source.fetch_code_snippets(slug).await.map(Some)
    } else {
      Ok::<_, AppError>(None)
    }
  };
  let (statement, snippets) = tokio::try_join!(statement, snippets)?;

  let mut source = stored.clone();
  if let Some(html) = statement {
    source.original_content = strip_html(&html);
  }
  if let Some(found) = snippets {
    source.merge_missing(SourceContent { code_snippets: found, ..Default::default() });
  }
  if source.original_content.is_empty() {
    return Err(AppError::Source(format!("no statement available for {slug}")));
  }
  info!(
    target: "pipeline",
    %slug,
    fetched_statement = need_statement,
    fetched_snippets = need_snippets,
    langs = source.code_snippets.len(),
    "Source resolved"
  );
  Ok(source)
}
