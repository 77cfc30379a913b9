//! Minimal OpenAI client implementing the `LlmClient` seam.
//!
//! We only call chat.completions and request either plain text or a strict JSON object.
//! Calls are instrumented and log model names, latencies, and response sizes (not contents).
//!
//! NOTE: We never log the API key or prompt text.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::config::OpenAiSettings;
use crate::error::LlmError;
use crate::llm::{ChatMessage, JsonRequest, LlmClient, RawCompletion, Role};
use crate::util::trunc_for_log;

const JSON_SYSTEM: &str = "You are a precise JSON-producing assistant. Respond with a single JSON object and nothing else.";

#[derive(Clone)]
pub struct OpenAI {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub model: String,
  pub chat_model: String,
}

impl OpenAI {
  /// Build the client if an API key is configured; otherwise return None.
  pub fn from_settings(cfg: &OpenAiSettings, timeout: Duration) -> Option<Self> {
    let api_key = cfg.api_key.clone().filter(|k| !k.trim().is_empty())?;
    let client = reqwest::Client::builder().timeout(timeout).build().ok()?;
    Some(Self {
      client,
      api_key,
      base_url: cfg.base_url.trim_end_matches('/').to_string(),
      model: cfg.model.clone(),
      chat_model: cfg.chat_model.clone(),
    })
  }

  #[instrument(level = "info", skip(self, messages, response_format), fields(model = %model, turns = messages.len()))]
  async fn chat_completion(
    &self,
    model: &str,
    messages: Vec<ChatMessageReq>,
    temperature: f32,
    response_format: Option<ResponseFormat>,
  ) -> Result<(String, String), LlmError> {
    let url = format!("{}/chat/completions", self.base_url);
    let req = ChatCompletionRequest {
      model: model.to_string(),
      messages,
      temperature,
      response_format,
      max_tokens: None,
    };

    let start = std::time::Instant::now();
    let res = self.client.post(&url)
      .header(USER_AGENT, "flowcode-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await
      .map_err(|e| if e.is_timeout() { LlmError::Timeout(start.elapsed()) } else { LlmError::Transport(e.to_string()) })?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let message = extract_openai_error(&body).unwrap_or_else(|| trunc_for_log(&body, 300));
      return Err(LlmError::Http { status: status.as_u16(), message });
    }

    let body: ChatCompletionResponse = res.json().await.map_err(|e| LlmError::Transport(e.to_string()))?;
    if let Some(usage) = &body.usage {
      info!(prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, elapsed = ?start.elapsed(), "OpenAI usage");
    }
    let text = body.choices.first()
      .and_then(|c| c.message.content.clone())
      .unwrap_or_default();
    let served_by = body.model.unwrap_or_else(|| model.to_string());
    Ok((text, served_by))
  }
}

#[async_trait]
impl LlmClient for OpenAI {
  async fn complete_json(&self, req: &JsonRequest<'_>) -> Result<RawCompletion, LlmError> {
    let messages = vec![
      ChatMessageReq { role: "system".into(), content: JSON_SYSTEM.into() },
      ChatMessageReq { role: "user".into(), content: req.prompt.into() },
    ];
    let format = Some(ResponseFormat { r#type: "json_object".into() });
    let (text, model) = self.chat_completion(&self.model, messages, req.temperature, format).await?;
    if text.trim().is_empty() {
      return Err(LlmError::EmptyResponse { schema: req.schema.to_string() });
    }
    info!(schema = %req.schema, response_len = text.len(), "Structured completion received");
    Ok(RawCompletion { text, model })
  }

  async fn complete_chat(&self, messages: &[ChatMessage], temperature: f32) -> Result<String, LlmError> {
    let messages = messages.iter().map(ChatMessageReq::from).collect();
    let (text, _model) = self.chat_completion(&self.chat_model, messages, temperature, None).await?;
    Ok(text.trim().to_string())
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_format: Option<ResponseFormat>,
  #[serde(skip_serializing_if = "Option::is_none")]
  max_tokens: Option<u32>,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }
impl From<&ChatMessage> for ChatMessageReq {
  fn from(m: &ChatMessage) -> Self {
    let role = match m.role {
      Role::System => "system",
      Role::User => "user",
      Role::Assistant => "assistant",
    };
    Self { role: role.into(), content: m.content.clone() }
  }
}
#[derive(Serialize)]
struct ResponseFormat { #[serde(rename = "type")] r#type: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  #[serde(default)] model: Option<String>,
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  match serde_json::from_str::<EWrap>(body) {
    Ok(w) => Some(w.error.message),
    Err(_) => None,
  }
}
