//! Loading service settings from TOML plus environment overrides.
//!
//! See `Settings` for the expected schema. Every section is optional;
//! missing values fall back to defaults.

use std::time::Duration;

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::Problem;
use crate::llm::LlmPolicy;
use crate::pipeline::polling::PollPolicy;
use crate::source::LEETCODE_GRAPHQL;

#[derive(Clone, Debug, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
  pub openai: OpenAiSettings,
  pub llm: LlmPolicy,
  pub cache: CacheSettings,
  pub poll: PollPolicy,
  pub source: SourceSettings,
  /// Catalog entries seeded into the problem store at startup.
  pub problems: Vec<Problem>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct OpenAiSettings {
  /// Only ever taken from the environment.
  #[serde(skip)]
  pub api_key: Option<String>,
  pub base_url: String,
  /// Model for structured generation and grading.
  pub model: String,
  /// Model for the interviewer chat.
  pub chat_model: String,
}

impl Default for OpenAiSettings {
  fn default() -> Self {
    Self {
      api_key: None,
      base_url: "https://api.openai.com/v1".into(),
      model: "gpt-4o-mini".into(),
      chat_model: "gpt-4o-mini".into(),
    }
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
  /// Age after which a `processing` claim is considered abandoned.
  pub stale_after_secs: u64,
}

impl Default for CacheSettings {
  fn default() -> Self {
    Self { stale_after_secs: crate::layers::DEFAULT_STALE_AFTER.as_secs() }
  }
}

impl CacheSettings {
  pub fn stale_after(&self) -> Duration {
    Duration::from_secs(self.stale_after_secs)
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
  pub endpoint: String,
  pub timeout_secs: u64,
}

impl Default for SourceSettings {
  fn default() -> Self {
    Self { endpoint: LEETCODE_GRAPHQL.into(), timeout_secs: 20 }
  }
}

impl Settings {
  /// Overlay OPENAI_* variables on top of file values.
  pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
    let non_empty = |k: &str| lookup(k).filter(|v| !v.trim().is_empty());
    if let Some(v) = non_empty("OPENAI_API_KEY") {
      self.openai.api_key = Some(v);
    }
    if let Some(v) = non_empty("OPENAI_BASE_URL") {
      self.openai.base_url = v;
    }
    if let Some(v) = non_empty("OPENAI_MODEL") {
      self.openai.model = v;
    }
    if let Some(v) = non_empty("OPENAI_CHAT_MODEL") {
      self.openai.chat_model = v;
    }
  }
}

/// Read `Settings` from APP_CONFIG_PATH (if set) and the environment.
/// A missing or malformed file is logged and replaced by defaults.
pub fn load_settings_from_env() -> Settings {
  let mut settings = std::env::var("APP_CONFIG_PATH")
    .ok()
    .and_then(|path| match std::fs::read_to_string(&path) {
      Ok(s) => match toml::from_str::<Settings>(&s) {
        Ok(cfg) => {
          info!(target: "flowcode_backend", %path, problems = cfg.problems.len(), "Loaded settings (TOML)");
          Some(cfg)
        }
        Err(e) => {
          error!(target: "flowcode_backend", %path, error = %e, "Failed to parse TOML settings");
          None
        }
      },
      Err(e) => {
        error!(target: "flowcode_backend", %path, error = %e, "Failed to read TOML settings file");
        None
      }
    })
    .unwrap_or_default();
  settings.apply_env(|k| std::env::var(k).ok());
  settings
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn toml_sections_override_defaults() {
    let raw = r#"
      [llm]
      max_attempts = 5

      [cache]
      stale_after_secs = 60

      [poll]
      delays_ms = [0, 0]

      [[problems]]
      id = "1"
      title = "Two Sum"
      titleSlug = "two-sum"
      difficulty = "Easy"
    "#;
    let s: Settings = toml::from_str(raw).unwrap();
    assert_eq!(s.llm.max_attempts, 5);
    assert_eq!(s.llm.timeout_secs, 60);
    assert_eq!(s.cache.stale_after(), Duration::from_secs(60));
    assert_eq!(s.poll.delays_ms, vec![0, 0]);
    assert_eq!(s.problems[0].title_slug, "two-sum");
    assert_eq!(s.openai.model, "gpt-4o-mini");
  }

  #[test]
  fn env_overrides_ignore_blank_values() {
    let mut s = Settings::default();
    s.apply_env(|k| match k {
      "OPENAI_API_KEY" => Some("sk-test".into()),
      "OPENAI_MODEL" => Some("  ".into()),
      "OPENAI_CHAT_MODEL" => Some("gpt-4o".into()),
      _ => None,
    });
    assert_eq!(s.openai.api_key.as_deref(), Some("sk-test"));
    assert_eq!(s.openai.model, "gpt-4o-mini");
    assert_eq!(s.openai.chat_model, "gpt-4o");
  }
}
