//! Application state: store handles, LLM boundary, problem source, settings.
//!
//! Every collaborator sits behind a trait object so tests can swap in the
//! in-memory store, a scripted LLM, or a failing store.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, instrument, warn};

use crate::config::{load_settings_from_env, Settings};
use crate::llm::{Llm, LlmClient, UnconfiguredLlm};
use crate::openai::OpenAI;
use crate::seeds::seed_problems;
use crate::source::{LeetCodeSource, ProblemSource};
use crate::store::{MemoryStore, ProblemDetailsStore, ProblemStore, SessionStore, StatsStore, UserStore};

#[derive(Clone)]
pub struct AppState {
    pub problems: Arc<dyn ProblemStore>,
    pub details: Arc<dyn ProblemDetailsStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub users: Arc<dyn UserStore>,
    pub stats: Arc<dyn StatsStore>,
    pub llm: Llm,
    pub source: Arc<dyn ProblemSource>,
    pub settings: Settings,
}

impl AppState {
    /// Build state from env: load settings, seed the catalog, init OpenAI and the problem source.
    #[instrument(level = "info", skip_all)]
    pub async fn from_env() -> Result<Self, crate::error::AppError> {
        let settings = load_settings_from_env();

        let client: Arc<dyn LlmClient> = match OpenAI::from_settings(&settings.openai, settings.llm.timeout()) {
            Some(oa) => {
                info!(target: "flowcode_backend", base_url = %oa.base_url, model = %oa.model, chat_model = %oa.chat_model, "OpenAI enabled.");
                Arc::new(oa)
            }
            None => {
                warn!(target: "flowcode_backend", "OpenAI disabled (no OPENAI_API_KEY). Generation and grading will fail.");
                Arc::new(UnconfiguredLlm)
            }
        };
        let source = LeetCodeSource::new(
            settings.source.endpoint.clone(),
            Duration::from_secs(settings.source.timeout_secs),
        )?;

        let store = MemoryStore::new();
        let state = Self::with_parts(store, Llm::new(client, settings.llm.clone()), Arc::new(source), settings);
        state.seed_catalog().await?;
        Ok(state)
    }

    /// Wire every collection to one `MemoryStore`.
    pub fn with_parts(store: MemoryStore, llm: Llm, source: Arc<dyn ProblemSource>, settings: Settings) -> Self {
        let store = Arc::new(store);
        Self {
            problems: store.clone(),
            details: store.clone(),
            sessions: store.clone(),
            users: store.clone(),
            stats: store,
            llm,
            source,
            settings,
        }
    }

    /// Insert built-in and configured catalog entries. Configured ones win.
    #[instrument(level = "info", skip(self))]
    pub async fn seed_catalog(&self) -> Result<(), crate::error::AppError> {
        let builtin = seed_problems();
        let configured = self.settings.problems.clone();
        let (n_builtin, n_configured) = (builtin.len(), configured.len());
        for p in builtin.into_iter().chain(configured) {
            self.problems.upsert(p).await?;
        }
        info!(target: "flowcode_backend", builtin = n_builtin, configured = n_configured, "Problem catalog seeded");
        Ok(())
    }

    pub fn stale_after(&self) -> Duration {
        self.settings.cache.stale_after()
    }
}
