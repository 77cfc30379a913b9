//! Document store boundary and its in-memory implementation.
//!
//! Each collection gets its own trait so orchestrators depend only on what
//! they touch. `MemoryStore` implements all of them on top of
//! `Arc<RwLock<HashMap<..>>>` maps; the write lock is the transaction
//! boundary for `claim_layers`.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::domain::{Derived, LayerMeta, LayerName, Problem, ProblemDetails, SourceContent};
use crate::error::StoreError;
use crate::layers::{apply_claim, plan_claim, ClaimOutcome, LayerSet};
use crate::session::SessionRecord;
use crate::util::now_millis;

#[async_trait]
pub trait ProblemStore: Send + Sync {
  async fn get(&self, slug: &str) -> Result<Option<Problem>, StoreError>;
  async fn get_many(&self, slugs: &[String]) -> Result<Vec<Problem>, StoreError>;
  async fn list(&self) -> Result<Vec<Problem>, StoreError>;
  async fn upsert(&self, problem: Problem) -> Result<(), StoreError>;
}

#[async_trait]
pub trait ProblemDetailsStore: Send + Sync {
  async fn get(&self, slug: &str) -> Result<Option<ProblemDetails>, StoreError>;

  /// Create the record if absent; an existing record is left untouched.
  async fn create_if_missing(&self, slug: &str, source: SourceContent) -> Result<(), StoreError>;

  /// Fill in missing source pieces; never overwrites stored ones.
  async fn update_source(&self, slug: &str, source: SourceContent) -> Result<(), StoreError>;

  /// Shallow merge into the derived bag.
  async fn update_derived(&self, slug: &str, partial: Derived) -> Result<(), StoreError>;

  /// Overwrite one layer's metadata.
  async fn update_layer_meta(&self, slug: &str, layer: LayerName, meta: LayerMeta) -> Result<(), StoreError>;

  /// Atomically claim the stale or missing layers of `set`.
  async fn claim_layers(&self, slug: &str, set: &LayerSet, stale_after: Duration) -> Result<ClaimOutcome, StoreError>;
  /// Drop the `processing` meta of `layers`. Complete metas are left alone.
  async fn release_layers(&self, slug: &str, layers: &[LayerName]) -> Result<(), StoreError>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
  async fn create(&self, record: SessionRecord) -> Result<(), StoreError>;
  async fn get(&self, id: &str) -> Result<Option<SessionRecord>, StoreError>;
  /// Newest first.
  async fn list_by_user(&self, user_id: &str) -> Result<Vec<SessionRecord>, StoreError>;
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
  #[serde(default)]
  pub completed_problems: BTreeSet<String>,
  #[serde(default)]
  pub saved_problems: BTreeSet<String>,
}

#[async_trait]
pub trait UserStore: Send + Sync {
  async fn get(&self, user_id: &str) -> Result<Option<UserRecord>, StoreError>;
  /// Set-union append. Returns true when the user record was created by this call.
  async fn add_completed_problem(&self, user_id: &str, slug: &str) -> Result<bool, StoreError>;
  /// Add or remove `slug` from the saved set. Returns true when the user record was created by this call.
  async fn set_problem_saved(&self, user_id: &str, slug: &str, saved: bool) -> Result<bool, StoreError>;
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
  pub session_count: u64,
  pub user_count: u64,
}

#[async_trait]
pub trait StatsStore: Send + Sync {
  async fn get(&self) -> Result<Stats, StoreError>;
  async fn increment_session_count(&self) -> Result<(), StoreError>;
  async fn increment_user_count(&self) -> Result<(), StoreError>;
}

/// In-process store for every collection.
#[derive(Clone, Default)]
pub struct MemoryStore {
  problems: Arc<RwLock<HashMap<String, Problem>>>,
  details: Arc<RwLock<HashMap<String, ProblemDetails>>>,
  sessions: Arc<RwLock<HashMap<String, SessionRecord>>>,
  users: Arc<RwLock<HashMap<String, UserRecord>>>,
  stats: Arc<RwLock<Stats>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Replace a details record wholesale.
  #[cfg(test)]
  pub async fn put_details(&self, details: ProblemDetails) {
    self.details.write().await.insert(details.title_slug.clone(), details);
  }
}

#[async_trait]
impl ProblemStore for MemoryStore {
  async fn get(&self, slug: &str) -> Result<Option<Problem>, StoreError> {
    Ok(self.problems.read().await.get(slug).cloned())
  }

  async fn get_many(&self, slugs: &[String]) -> Result<Vec<Problem>, StoreError> {
    let map = self.problems.read().await;
    Ok(slugs.iter().filter_map(|s| map.get(s).cloned()).collect())
  }

  async fn list(&self) -> Result<Vec<Problem>, StoreError> {
    let mut all: Vec<Problem> = self.problems.read().await.values().cloned().collect();
    all.sort_by(|a, b| a.id.cmp(&b.id).then_with(|| a.title_slug.cmp(&b.title_slug)));
    Ok(all)
  }

  async fn upsert(&self, problem: Problem) -> Result<(), StoreError> {
    self.problems.write().await.insert(problem.title_slug.clone(), problem);
    Ok(())
  }
}

#[async_trait]
impl ProblemDetailsStore for MemoryStore {
  async fn get(&self, slug: &str) -> Result<Option<ProblemDetails>, StoreError> {
    Ok(self.details.read().await.get(slug).cloned())
  }

  async fn create_if_missing(&self, slug: &str, source: SourceContent) -> Result<(), StoreError> {
    let mut map = self.details.write().await;
    map.entry(slug.to_string()).or_insert_with(|| {
      let mut d = ProblemDetails::new(slug);
      d.source = source;
      d
    });
    Ok(())
  }

  async fn update_source(&self, slug: &str, source: SourceContent) -> Result<(), StoreError> {
    let mut map = self.details.write().await;
    let d = map.entry(slug.to_string()).or_insert_with(|| ProblemDetails::new(slug));
    d.source.merge_missing(source);
    Ok(())
  }

  async fn update_derived(&self, slug: &str, partial: Derived) -> Result<(), StoreError> {
    let mut map = self.details.write().await;
    let d = map.entry(slug.to_string()).or_insert_with(|| ProblemDetails::new(slug));
    d.derived.merge(partial);
    Ok(())
  }

  async fn update_layer_meta(&self, slug: &str, layer: LayerName, meta: LayerMeta) -> Result<(), StoreError> {
    let mut map = self.details.write().await;
    let d = map.entry(slug.to_string()).or_insert_with(|| ProblemDetails::new(slug));
    debug!(%slug, %layer, "Layer metadata updated");
    d.processing_meta.layers.insert(layer, meta);
    Ok(())
  }

  #[instrument(level = "debug", skip(self, set), fields(%slug, layers = ?set.names()))]
  async fn claim_layers(&self, slug: &str, set: &LayerSet, stale_after: Duration) -> Result<ClaimOutcome, StoreError> {
    let mut map = self.details.write().await;
    let d = map.entry(slug.to_string()).or_insert_with(|| ProblemDetails::new(slug));
    let now = now_millis();
    let outcome = plan_claim(d, set, stale_after, now);
    if let ClaimOutcome::Claimed(layers) = &outcome {
      apply_claim(d, layers, set.schema_version, now);
      info!(%slug, claimed = ?layers, "Layers claimed");
    }
    Ok(outcome)
  }

  async fn release_layers(&self, slug: &str, layers: &[LayerName]) -> Result<(), StoreError> {
    let mut map = self.details.write().await;
    let Some(d) = map.get_mut(slug) else {
      return Ok(());
    };
    let metas = &mut d.processing_meta.layers;
    for layer in layers {
      if matches!(metas.get(layer), Some(LayerMeta::Processing { .. })) {
        metas.remove(layer);
      }
    }
    info!(%slug, released = ?layers, "Layer claims released");
    Ok(())
  }
}

#[async_trait]
impl SessionStore for MemoryStore {
  async fn create(&self, record: SessionRecord) -> Result<(), StoreError> {
    let mut map = self.sessions.write().await;
    if map.contains_key(&record.id) {
      return Err(StoreError::Conflict { collection: "sessions", key: record.id });
    }
    map.insert(record.id.clone(), record);
    Ok(())
  }

  async fn get(&self, id: &str) -> Result<Option<SessionRecord>, StoreError> {
    Ok(self.sessions.read().await.get(id).cloned())
  }

  async fn list_by_user(&self, user_id: &str) -> Result<Vec<SessionRecord>, StoreError> {
    let mut out: Vec<SessionRecord> = self
      .sessions
      .read()
      .await
      .values()
      .filter(|s| s.user_id == user_id)
      .cloned()
      .collect();
    out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(out)
  }
}

#[async_trait]
impl UserStore for MemoryStore {
  async fn get(&self, user_id: &str) -> Result<Option<UserRecord>, StoreError> {
    Ok(self.users.read().await.get(user_id).cloned())
  }

  async fn add_completed_problem(&self, user_id: &str, slug: &str) -> Result<bool, StoreError> {
    let mut map = self.users.write().await;
    let created = !map.contains_key(user_id);
    map.entry(user_id.to_string()).or_default().completed_problems.insert(slug.to_string());
    Ok(created)
  }

  async fn set_problem_saved(&self, user_id: &str, slug: &str, saved: bool) -> Result<bool, StoreError> {
    let mut map = self.users.write().await;
    let created = !map.contains_key(user_id);
    let user = map.entry(user_id.to_string()).or_default();
    if saved {
      user.saved_problems.insert(slug.to_string());
    } else {
      user.saved_problems.remove(slug);
    }
    Ok(created)
  }
}

#[async_trait]
impl StatsStore for MemoryStore {
  async fn get(&self) -> Result<Stats, StoreError> {
    Ok(*self.stats.read().await)
  }

  async fn increment_session_count(&self) -> Result<(), StoreError> {
    self.stats.write().await.session_count += 1;
    Ok(())
  }

  async fn increment_user_count(&self) -> Result<(), StoreError> {
    self.stats.write().await.user_count += 1;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::layers::PROBLEM_SCHEMA_VERSION;

  fn practice_set() -> LayerSet {
    LayerSet::new(&[
      (LayerName::TestCases, 1),
      (LayerName::EdgeCases, 1),
      (LayerName::Hints, 1),
      (LayerName::Pitfalls, 1),
    ])
  }

  #[tokio::test]
  async fn concurrent_claims_never_overlap() {
    let store = MemoryStore::new();
    let set = practice_set();

    let claims = futures::future::join_all((0..16).map(|_| {
      let store = store.clone();
      let set = set.clone();
      tokio::spawn(async move { store.claim_layers("two-sum", &set, Duration::from_secs(300)).await })
    }))
    .await;

    let mut seen: Vec<LayerName> = Vec::new();
    let mut winners = 0;
    for joined in claims {
      match joined.unwrap().unwrap() {
        ClaimOutcome::Claimed(layers) => {
          winners += 1;
          for l in layers {
            assert!(!seen.contains(&l), "layer {l} claimed twice");
            seen.push(l);
          }
        }
        ClaimOutcome::AlreadyProcessing => {}
        ClaimOutcome::AlreadyComplete => panic!("nothing is complete yet"),
      }
    }
    assert_eq!(winners, 1);
    assert_eq!(seen.len(), 4);
  }

  #[tokio::test]
  async fn stale_claims_are_reclaimable() {
    let store = MemoryStore::new();
    let mut d = ProblemDetails::new("two-sum");
    d.processing_meta.schema_version = PROBLEM_SCHEMA_VERSION;
    for (l, _) in practice_set().layers {
      d.processing_meta.layers.insert(l, LayerMeta::Processing { updated_at: now_millis() - 10 * 60 * 1000 });
    }
    store.put_details(d).await;

    let outcome = store.claim_layers("two-sum", &practice_set(), Duration::from_secs(300)).await.unwrap();
    assert!(matches!(outcome, ClaimOutcome::Claimed(ref ls) if ls.len() == 4));

    let again = store.claim_layers("two-sum", &practice_set(), Duration::from_secs(300)).await.unwrap();
    assert_eq!(again, ClaimOutcome::AlreadyProcessing);
  }

  #[tokio::test]
  async fn release_drops_only_processing_metas() {
    let store = MemoryStore::new();
    let set = practice_set();
    store.claim_layers("two-sum", &set, Duration::from_secs(300)).await.unwrap();
    let done = LayerMeta::Complete { updated_at: now_millis(), model: "m".into(), prompt_version: 1 };
    store.update_layer_meta("two-sum", LayerName::Hints, done.clone()).await.unwrap();

    store.release_layers("two-sum", &[LayerName::TestCases, LayerName::Hints]).await.unwrap();
    let d = ProblemDetailsStore::get(&store, "two-sum").await.unwrap().unwrap();
    assert_eq!(d.layer_meta(LayerName::TestCases), None);
    assert_eq!(d.layer_meta(LayerName::Hints), Some(&done));
    assert!(matches!(d.layer_meta(LayerName::EdgeCases), Some(LayerMeta::Processing { .. })));
    let blocked = store.claim_layers("two-sum", &set, Duration::from_secs(300)).await.unwrap();
    assert_eq!(blocked, ClaimOutcome::AlreadyProcessing);

    // Released layers are claimable again without waiting out the staleness window.
    store.release_layers("two-sum", &[LayerName::EdgeCases, LayerName::Pitfalls]).await.unwrap();
    let again = store.claim_layers("two-sum", &set, Duration::from_secs(300)).await.unwrap();
    assert_eq!(again, ClaimOutcome::Claimed(vec![LayerName::TestCases, LayerName::EdgeCases, LayerName::Pitfalls]));

    store.release_layers("unknown", &[LayerName::Hints]).await.unwrap();
  }

  #[tokio::test]
  async fn merge_writes_keep_other_layers() {
    let store = MemoryStore::new();
    store.create_if_missing("two-sum", SourceContent { original_content: "stmt".into(), ..Default::default() }).await.unwrap();
    store.create_if_missing("two-sum", SourceContent { original_content: "other".into(), ..Default::default() }).await.unwrap();
    store
      .update_derived("two-sum", Derived { hints: Some(vec![]), ..Default::default() })
      .await
      .unwrap();
    store
      .update_derived("two-sum", Derived { pitfalls: Some(vec![]), ..Default::default() })
      .await
      .unwrap();

    let d = ProblemDetailsStore::get(&store, "two-sum").await.unwrap().unwrap();
    assert_eq!(d.source.original_content, "stmt");
    assert!(d.derived.has(LayerName::Hints) && d.derived.has(LayerName::Pitfalls));
  }

  #[tokio::test]
  async fn user_append_is_a_set_union() {
    let store = MemoryStore::new();
    assert!(store.add_completed_problem("u1", "two-sum").await.unwrap());
    assert!(!store.add_completed_problem("u1", "two-sum").await.unwrap());
    let user = UserStore::get(&store, "u1").await.unwrap().unwrap();
    assert_eq!(user.completed_problems.len(), 1);
  }

  #[tokio::test]
  async fn batch_get_skips_unknown_slugs() {
    let store = MemoryStore::new();
    for p in crate::seeds::seed_problems() {
      store.upsert(p).await.unwrap();
    }
    let slugs = vec!["two-sum".to_string(), "missing".to_string(), "valid-parentheses".to_string()];
    let found = store.get_many(&slugs).await.unwrap();
    let names: Vec<&str> = found.iter().map(|p| p.title_slug.as_str()).collect();
    assert_eq!(names, ["two-sum", "valid-parentheses"]);
  }

  fn record(id: &str, user: &str, created_ms: i64) -> SessionRecord {
    use crate::session::{CategoryFeedback, SessionFeedback};
    SessionRecord {
      id: id.into(),
      user_id: user.into(),
      problem_title_slug: "two-sum".into(),
      created_at: chrono::DateTime::from_timestamp_millis(created_ms).unwrap(),
      fields: Default::default(),
      snapshots: Default::default(),
      chat_log: Vec::new(),
      feedback: SessionFeedback {
        sections: Default::default(),
        interviewer_communication: CategoryFeedback::not_assessable("No chat."),
        summary: "ok".into(),
      },
      prompt_version: 1,
    }
  }

  #[tokio::test]
  async fn sessions_are_create_only_and_listed_newest_first() {
    let store = MemoryStore::new();
    store.create(record("a", "u1", 1_000)).await.unwrap();
    store.create(record("b", "u1", 2_000)).await.unwrap();
    store.create(record("c", "u2", 3_000)).await.unwrap();

    let err = store.create(record("a", "u1", 5_000)).await.unwrap_err();
    assert!(matches!(err, StoreError::Conflict { collection: "sessions", ref key } if key == "a"));

    let ids: Vec<String> = store.list_by_user("u1").await.unwrap().into_iter().map(|r| r.id).collect();
    assert_eq!(ids, ["b", "a"]);
  }

  #[tokio::test]
  async fn saved_problems_toggle() {
    let store = MemoryStore::new();
    assert!(store.set_problem_saved("u1", "two-sum", true).await.unwrap());
    assert!(!store.set_problem_saved("u1", "valid-parentheses", true).await.unwrap());
    assert!(!store.set_problem_saved("u1", "two-sum", false).await.unwrap());

    let user = UserStore::get(&store, "u1").await.unwrap().unwrap();
    assert_eq!(user.saved_problems.iter().collect::<Vec<_>>(), ["valid-parentheses"]);
    assert!(user.completed_problems.is_empty());
  }
}
