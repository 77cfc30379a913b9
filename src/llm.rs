//! Structured LLM boundary.
//!
//! `LlmClient` is the raw transport seam (one implementation talks to OpenAI,
//! tests use a scripted double). `Llm` wraps it with the call policy: a
//! per-attempt timeout, a bounded retry budget, and strict schema validation
//! of JSON output. The only tolerated provider quirk is the string literal
//! `"null"` in a field the schema declares nullable; it is rewritten to JSON
//! `null` before deserializing. Anything else that does not fit is rejected.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::error::LlmError;
use crate::util::strip_code_fences;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
  System,
  User,
  Assistant,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
  pub role: Role,
  pub content: String,
}

impl ChatMessage {
  pub fn system(content: impl Into<String>) -> Self {
    Self { role: Role::System, content: content.into() }
  }
  pub fn user(content: impl Into<String>) -> Self {
    Self { role: Role::User, content: content.into() }
  }
  pub fn assistant(content: impl Into<String>) -> Self {
    Self { role: Role::Assistant, content: content.into() }
  }
}

/// A request for JSON output matching the schema called `schema`.
#[derive(Clone, Debug)]
pub struct JsonRequest<'a> {
  pub schema: &'a str,
  pub prompt: &'a str,
  pub temperature: f32,
}

/// Unvalidated completion text plus the model that produced it.
#[derive(Clone, Debug)]
pub struct RawCompletion {
  pub text: String,
  pub model: String,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
  async fn complete_json(&self, req: &JsonRequest<'_>) -> Result<RawCompletion, LlmError>;

  async fn complete_chat(&self, messages: &[ChatMessage], temperature: f32) -> Result<String, LlmError>;
}

/// Placeholder used when no API key is configured; every call fails fast.
pub struct UnconfiguredLlm;

#[async_trait]
impl LlmClient for UnconfiguredLlm {
  async fn complete_json(&self, _req: &JsonRequest<'_>) -> Result<RawCompletion, LlmError> {
    Err(LlmError::Unconfigured)
  }

  async fn complete_chat(&self, _messages: &[ChatMessage], _temperature: f32) -> Result<String, LlmError> {
    Err(LlmError::Unconfigured)
  }
}

/// Output types the LLM may be asked to produce.
pub trait Schema: DeserializeOwned {
  /// Name sent to the provider and used in logs/errors.
  const NAME: &'static str;

  /// Object keys that are allowed to be null.
  const NULLABLE: &'static [&'static str] = &[];

  /// Semantic checks beyond the shape serde already enforces.
  fn validate(&self) -> Result<(), String> {
    Ok(())
  }
}

/// Validated structured output.
#[derive(Clone, Debug)]
pub struct Structured<T> {
  pub data: T,
  pub model: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LlmPolicy {
  pub timeout_secs: u64,
  pub max_attempts: u32,
  pub retry_base_ms: u64,
}

impl Default for LlmPolicy {
  fn default() -> Self {
    Self { timeout_secs: 60, max_attempts: 3, retry_base_ms: 500 }
  }
}

impl LlmPolicy {
  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_secs)
  }

  fn backoff(&self, attempt: u32) -> Duration {
    if self.retry_base_ms == 0 {
      return Duration::ZERO;
    }
    let base = self.retry_base_ms.saturating_mul(1 << attempt.min(6));
    let jitter = rand::thread_rng().gen_range(0..=self.retry_base_ms / 2);
    Duration::from_millis(base + jitter)
  }
}

#[derive(Clone)]
pub struct Llm {
  client: Arc<dyn LlmClient>,
  policy: LlmPolicy,
}

impl Llm {
  pub fn new(client: Arc<dyn LlmClient>, policy: LlmPolicy) -> Self {
    Self { client, policy }
  }

  /// Prompt in, validated `T` out.
  #[instrument(level = "info", skip(self, prompt), fields(schema = T::NAME, prompt_len = prompt.len()))]
  pub async fn call_structured<T: Schema>(&self, prompt: &str, temperature: f32) -> Result<Structured<T>, LlmError> {
    let req = JsonRequest { schema: T::NAME, prompt, temperature };
    let attempts = self.policy.max_attempts.max(1);
    let mut last_err = LlmError::EmptyResponse { schema: T::NAME.to_string() };

    for attempt in 1..=attempts {
      let start = std::time::Instant::now();
      let outcome = match tokio::time::timeout(self.policy.timeout(), self.client.complete_json(&req)).await {
        Ok(res) => res.and_then(|raw| parse_structured::<T>(&raw.text).map(|data| Structured { data, model: raw.model })),
        Err(_) => Err(LlmError::Timeout(self.policy.timeout())),
      };
      match outcome {
        Ok(out) => {
          info!(attempt, elapsed = ?start.elapsed(), model = %out.model, "Structured output accepted");
          return Ok(out);
        }
        Err(e) if e.is_retryable() && attempt < attempts => {
          warn!(attempt, error = %e, "Structured call failed; retrying");
          tokio::time::sleep(self.policy.backoff(attempt)).await;
          last_err = e;
        }
        Err(e) => return Err(e),
      }
    }
    Err(last_err)
  }

  /// Free-text chat completion under the same timeout/retry policy.
  #[instrument(level = "info", skip(self, messages), fields(turns = messages.len()))]
  pub async fn call_chat(&self, messages: &[ChatMessage], temperature: f32) -> Result<String, LlmError> {
    let attempts = self.policy.max_attempts.max(1);
    let mut last_err = LlmError::EmptyResponse { schema: "chat".into() };

    for attempt in 1..=attempts {
      let outcome = match tokio::time::timeout(self.policy.timeout(), self.client.complete_chat(messages, temperature)).await {
        Ok(Ok(text)) if text.trim().is_empty() => Err(LlmError::EmptyResponse { schema: "chat".into() }),
        Ok(res) => res,
        Err(_) => Err(LlmError::Timeout(self.policy.timeout())),
      };
      match outcome {
        Ok(text) => return Ok(text.trim().to_string()),
        Err(e) if e.is_retryable() && attempt < attempts => {
          warn!(attempt, error = %e, "Chat call failed; retrying");
          tokio::time::sleep(self.policy.backoff(attempt)).await;
          last_err = e;
        }
        Err(e) => return Err(e),
      }
    }
    Err(last_err)
  }
}

/// Parse, normalize and validate one completion.
pub fn parse_structured<T: Schema>(text: &str) -> Result<T, LlmError> {
  let cleaned = strip_code_fences(text);
  if cleaned.is_empty() {
    return Err(LlmError::EmptyResponse { schema: T::NAME.to_string() });
  }
  let mut value: Value = serde_json::from_str(cleaned).map_err(|e| LlmError::InvalidJson {
    schema: T::NAME.to_string(),
    message: e.to_string(),
  })?;
  normalize_null_literals(&mut value, T::NULLABLE);

  let data: T = serde_json::from_value(value).map_err(|e| LlmError::SchemaMismatch {
    schema: T::NAME.to_string(),
    reason: e.to_string(),
  })?;
  data.validate().map_err(|reason| LlmError::SchemaMismatch { schema: T::NAME.to_string(), reason })?;
  Ok(data)
}

/// Rewrite `"null"` to `null` for the listed keys, at any depth.
pub fn normalize_null_literals(value: &mut Value, nullable: &[&str]) {
  if nullable.is_empty() {
    return;
  }
  match value {
    Value::Object(map) => {
      for (k, v) in map.iter_mut() {
        if nullable.contains(&k.as_str()) {
          if let Value::String(s) = v {
            if s.trim().eq_ignore_ascii_case("null") {
              *v = Value::Null;
              continue;
            }
          }
        }
        normalize_null_literals(v, nullable);
      }
    }
    Value::Array(items) => {
      for v in items {
        normalize_null_literals(v, nullable);
      }
    }
    _ => {}
  }
}
