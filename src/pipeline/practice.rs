//! Practice stage: test/edge cases, hints and pitfalls. All four depend only
//! on the framing, so the claimed ones are generated concurrently and each
//! persists on its own.

use std::collections::BTreeSet;

use tracing::{info, instrument};

use crate::derive::{cases, framing as framing_layer, guidance, versioned, ProblemContext};
use crate::domain::{Derived, LayerName};
use crate::error::AppError;
use crate::layers::{require_complete, ClaimOutcome, LayerSet, ProcessingResult};
use crate::state::AppState;

use super::{
  already_complete, load_details, load_problem, log_failures, persist_layer, release_on_error, status_of, GenerationOutcome,
};

const STAGE: &str = "practice data";

pub const PRACTICE_LAYERS: [LayerName; 4] =
  [LayerName::TestCases, LayerName::EdgeCases, LayerName::Hints, LayerName::Pitfalls];

pub fn practice_layers() -> LayerSet {
  LayerSet::new(&versioned(&PRACTICE_LAYERS))
}

pub async fn get_practice_data(state: &AppState, slug: &str) -> Result<ProcessingResult, AppError> {
  status_of(state, slug, &practice_layers()).await
}

#[instrument(level = "info", skip(state), fields(%slug))]
pub async fn generate_practice_data(state: &AppState, slug: &str) -> Result<GenerationOutcome, AppError> {
  let problem = load_problem(state, slug).await?;
  let details = load_details(state, slug).await?;
  require_complete(&details, STAGE, LayerName::Framing, framing_layer::PROMPT_VERSION)?;

  let set = practice_layers();
  let layers = match state.details.claim_layers(slug, &set, state.stale_after()).await? {
    ClaimOutcome::AlreadyComplete => return already_complete(state, slug, &set).await,
    ClaimOutcome::AlreadyProcessing => return Ok(GenerationOutcome::Processing),
    ClaimOutcome::Claimed(layers) => layers,
  };

  // Re-read: the framing may have been regenerated since the pre-check.
  let rechecked = async {
    let details = load_details(state, slug).await?;
    require_complete(&details, STAGE, LayerName::Framing, framing_layer::PROMPT_VERSION)?;
    let framing = details.derived.framing.clone().ok_or_else(|| AppError::MissingDependency {
      stage: STAGE,
      slug: slug.to_string(),
      layer: LayerName::Framing,
    })?;
    Ok::<_, AppError>((details, framing))
  }
  .await;
  let (details, framing) = release_on_error(state, slug, &layers, rechecked).await?;
  let claimed: BTreeSet<LayerName> = layers.into_iter().collect();
  let ctx = ProblemContext::new(&problem, &details.source.original_content);
  info!(target: "pipeline", %slug, claimed = ?claimed, "Generating practice layers");

  let wants_cases = claimed.contains(&LayerName::TestCases) || claimed.contains(&LayerName::EdgeCases);
  let cases_task = async {
    if !wants_cases {
      return None;
    }
    Some(
      async {
        let out = cases::generate(&state.llm, &ctx, &framing, &details.source.examples).await?;
        if claimed.contains(&LayerName::TestCases) {
          let data = Derived { test_cases: Some(out.data.test_cases.clone()), ..Default::default() };
          persist_layer(state, slug, LayerName::TestCases, data, &out.model, out.prompt_version).await?;
        }
        if claimed.contains(&LayerName::EdgeCases) {
          let data = Derived { edge_cases: Some(out.data.edge_cases.clone()), ..Default::default() };
          persist_layer(state, slug, LayerName::EdgeCases, data, &out.model, out.prompt_version).await?;
        }
        Ok::<(), AppError>(())
      }
      .await,
    )
  };

  let hints_task = async {
    if !claimed.contains(&LayerName::Hints) {
      return None;
    }
    Some(
      async {
        let out = guidance::generate_hints(&state.llm, &ctx, &framing).await?;
        let data = Derived { hints: Some(out.data), ..Default::default() };
        persist_layer(state, slug, LayerName::Hints, data, &out.model, out.prompt_version).await
      }
      .await,
    )
  };

  let pitfalls_task = async {
    if !claimed.contains(&LayerName::Pitfalls) {
      return None;
    }
    Some(
      async {
        let out = guidance::generate_pitfalls(&state.llm, &ctx, &framing).await?;
        let data = Derived { pitfalls: Some(out.data), ..Default::default() };
        persist_layer(state, slug, LayerName::Pitfalls, data, &out.model, out.prompt_version).await
      }
      .await,
    )
  };

  let (cases_res, hints_res, pitfalls_res) = tokio::join!(cases_task, hints_task, pitfalls_task);
  log_failures(slug, &[("cases", cases_res), ("hints", hints_res), ("pitfalls", pitfalls_res)]);

  Ok(GenerationOutcome::Ready(load_details(state, slug).await?))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::{LayerMeta, ProblemDetails, SourceContent};
  use crate::error::StoreError;
  use crate::store::{MemoryStore, ProblemDetailsStore};
  use crate::testing::{seed_previewed, test_state};
  use crate::util::now_millis;
  use async_trait::async_trait;
  use std::sync::atomic::{AtomicBool, Ordering};
  use std::sync::Arc;
  use std::time::Duration;

  /// Details store that, once armed, outdates the framing inside every claim,
  /// as a concurrent framing regeneration would.
  struct FramingChangesOnClaim {
    inner: MemoryStore,
    armed: AtomicBool,
  }

  #[async_trait]
  impl ProblemDetailsStore for FramingChangesOnClaim {
    async fn get(&self, slug: &str) -> Result<Option<ProblemDetails>, StoreError> {
      ProblemDetailsStore::get(&self.inner, slug).await
    }

    async fn create_if_missing(&self, slug: &str, source: SourceContent) -> Result<(), StoreError> {
      self.inner.create_if_missing(slug, source).await
    }

    async fn update_source(&self, slug: &str, source: SourceContent) -> Result<(), StoreError> {
      self.inner.update_source(slug, source).await
    }

    async fn update_derived(&self, slug: &str, partial: Derived) -> Result<(), StoreError> {
      self.inner.update_derived(slug, partial).await
    }

    async fn update_layer_meta(&self, slug: &str, layer: LayerName, meta: LayerMeta) -> Result<(), StoreError> {
      self.inner.update_layer_meta(slug, layer, meta).await
    }

    async fn claim_layers(&self, slug: &str, set: &LayerSet, stale_after: Duration) -> Result<ClaimOutcome, StoreError> {
      let outcome = self.inner.claim_layers(slug, set, stale_after).await?;
      if self.armed.load(Ordering::SeqCst) {
        let outdated = LayerMeta::Complete { updated_at: now_millis(), model: "old".into(), prompt_version: 0 };
        self.inner.update_layer_meta(slug, LayerName::Framing, outdated).await?;
      }
      Ok(outcome)
    }

    async fn release_layers(&self, slug: &str, layers: &[LayerName]) -> Result<(), StoreError> {
      self.inner.release_layers(slug, layers).await
    }
  }

  #[tokio::test]
  async fn second_call_is_served_from_cache() {
    let (state, llm) = test_state().await;
    seed_previewed(&state, "two-sum").await;

    let GenerationOutcome::Ready(first) = generate_practice_data(&state, "two-sum").await.unwrap() else {
      panic!("expected ready");
    };
    let calls_after_first = llm.total_calls();
    assert_eq!(llm.calls("cases"), 1);
    assert_eq!(llm.calls("hints"), 1);
    assert_eq!(llm.calls("pitfalls"), 1);

    let GenerationOutcome::Ready(second) = generate_practice_data(&state, "two-sum").await.unwrap() else {
      panic!("expected ready");
    };
    assert_eq!(llm.total_calls(), calls_after_first);
    assert_eq!(first.derived, second.derived);
    assert!(matches!(get_practice_data(&state, "two-sum").await.unwrap(), ProcessingResult::Complete(_)));
  }

  #[tokio::test]
  async fn one_failing_layer_does_not_block_siblings() {
    let (state, llm) = test_state().await;
    seed_previewed(&state, "two-sum").await;
    llm.fail_schema("hints");

    let GenerationOutcome::Ready(d) = generate_practice_data(&state, "two-sum").await.unwrap() else {
      panic!("expected ready");
    };
    assert!(d.derived.test_cases.is_some());
    assert!(d.derived.pitfalls.is_some());
    assert!(d.derived.hints.is_none());
    assert!(matches!(d.layer_meta(LayerName::Hints), Some(LayerMeta::Processing { .. })));
    assert!(matches!(d.layer_meta(LayerName::Pitfalls), Some(LayerMeta::Complete { .. })));
  }

  #[tokio::test]
  async fn missing_framing_fails_before_claiming() {
    let (state, llm) = test_state().await;
    state.details.create_if_missing("two-sum", Default::default()).await.unwrap();

    let err = generate_practice_data(&state, "two-sum").await.unwrap_err();
    assert!(matches!(err, AppError::MissingDependency { layer: LayerName::Framing, .. }));
    let d = load_details(&state, "two-sum").await.unwrap();
    assert!(d.processing_meta.layers.is_empty());
    assert_eq!(llm.total_calls(), 0);
  }

  #[tokio::test]
  async fn failed_recheck_releases_the_claim() {
    let (mut state, llm) = test_state().await;
    let store = Arc::new(FramingChangesOnClaim { inner: MemoryStore::new(), armed: AtomicBool::new(false) });
    state.details = store.clone() as Arc<dyn ProblemDetailsStore>;
    seed_previewed(&state, "two-sum").await;
    store.armed.store(true, Ordering::SeqCst);

    let err = generate_practice_data(&state, "two-sum").await.unwrap_err();
    assert!(matches!(err, AppError::MissingDependency { layer: LayerName::Framing, .. }));
    assert_eq!(llm.total_calls(), 0);

    let d = load_details(&state, "two-sum").await.unwrap();
    for layer in PRACTICE_LAYERS {
      assert_eq!(d.layer_meta(layer), None, "{layer} still claimed");
    }
    assert_eq!(get_practice_data(&state, "two-sum").await.unwrap(), ProcessingResult::NotFound);
  }

  #[tokio::test]
  async fn concurrent_requests_generate_once() {
    let (state, llm) = test_state().await;
    seed_previewed(&state, "two-sum").await;

    let (a, b) = tokio::join!(generate_practice_data(&state, "two-sum"), generate_practice_data(&state, "two-sum"));
    let outcomes = [a.unwrap(), b.unwrap()];
    assert!(outcomes.iter().any(|o| matches!(o, GenerationOutcome::Ready(_))));
    assert_eq!(llm.calls("cases"), 1);
    assert_eq!(llm.calls("hints"), 1);
  }
}
