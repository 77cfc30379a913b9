//! Error types for every boundary the backend talks to (LLM, document store,
//! problem source) plus the top-level `AppError` surfaced by handlers.
//!
//! "Not ready yet" is never an error: orchestrators report it as a status.
//! Everything here is a caller mistake (400/404), a write that collided with
//! an existing record (409), or a genuine invariant violation (500).

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::domain::{LayerName, SectionKey};

/// Failures of the structured/plain LLM boundary.
#[derive(Debug, Error)]
pub enum LlmError {
  #[error("LLM client is not configured (missing OPENAI_API_KEY)")]
  Unconfigured,

  #[error("LLM transport error: {0}")]
  Transport(String),

  #[error("LLM HTTP {status}: {message}")]
  Http { status: u16, message: String },

  #[error("LLM call timed out after {0:?}")]
  Timeout(std::time::Duration),

  #[error("LLM returned an empty response for `{schema}`")]
  EmptyResponse { schema: String },

  #[error("LLM output for `{schema}` was not valid JSON: {message}")]
  InvalidJson { schema: String, message: String },

  #[error("LLM output for `{schema}` did not match the schema: {reason}")]
  SchemaMismatch { schema: String, reason: String },
}

impl LlmError {
  /// Whether another attempt could plausibly succeed.
  pub fn is_retryable(&self) -> bool {
    match self {
      LlmError::Unconfigured => false,
      LlmError::Http { status, .. } => *status == 429 || *status >= 500,
      LlmError::Transport(_)
      | LlmError::Timeout(_)
      | LlmError::EmptyResponse { .. }
      | LlmError::InvalidJson { .. }
      | LlmError::SchemaMismatch { .. } => true,
    }
  }
}

/// Document store failures.
#[derive(Debug, Error)]
pub enum StoreError {
  /// A create-only write hit an existing key.
  #[error("record already exists: {collection}/{key}")]
  Conflict { collection: &'static str, key: String },
}

/// Top-level error returned by orchestrators and handlers.
#[derive(Debug, Error)]
pub enum AppError {
  #[error("problem not found: {0}")]
  ProblemNotFound(String),

  #[error("problem details not found: {0}")]
  DetailsNotFound(String),

  #[error("session not found: {0}")]
  SessionNotFound(String),

  /// A required upstream layer is absent or stale. The caller skipped a stage.
  #[error("{stage} for `{slug}` requires layer `{layer}` to be complete")]
  MissingDependency {
    stage: &'static str,
    slug: String,
    layer: LayerName,
  },

  #[error("grading criterion missing for section `{0}`")]
  MissingCriterion(SectionKey),

  #[error("invalid request: {0}")]
  InvalidInput(String),

  #[error("problem source error: {0}")]
  Source(String),

  #[error(transparent)]
  Llm(#[from] LlmError),

  #[error(transparent)]
  Store(#[from] StoreError),
}

impl AppError {
  pub fn status_code(&self) -> StatusCode {
    match self {
      AppError::ProblemNotFound(_) | AppError::DetailsNotFound(_) | AppError::SessionNotFound(_) => {
        StatusCode::NOT_FOUND
      }
      AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
      AppError::Store(StoreError::Conflict { .. }) => StatusCode::CONFLICT,
      AppError::MissingDependency { .. } | AppError::MissingCriterion(_) | AppError::Source(_) | AppError::Llm(_) => {
        StatusCode::INTERNAL_SERVER_ERROR
      }
    }
  }
}

impl IntoResponse for AppError {
  fn into_response(self) -> Response {
    let status = self.status_code();
    if status.is_server_error() {
      error!(target: "flowcode_backend", error = %self, "Request failed");
    }
    (status, Json(json!({ "error": self.to_string() }))).into_response()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn retry_classification_follows_status() {
    assert!(LlmError::Http { status: 503, message: String::new() }.is_retryable());
    assert!(LlmError::Http { status: 429, message: String::new() }.is_retryable());
    assert!(!LlmError::Http { status: 401, message: String::new() }.is_retryable());
    assert!(!LlmError::Unconfigured.is_retryable());
    assert!(LlmError::SchemaMismatch { schema: "x".into(), reason: "y".into() }.is_retryable());
  }

  #[test]
  fn not_found_maps_to_404_and_dependency_to_500() {
    assert_eq!(AppError::ProblemNotFound("two-sum".into()).status_code(), StatusCode::NOT_FOUND);
    let dep = AppError::MissingDependency { stage: "practice data", slug: "two-sum".into(), layer: LayerName::Framing };
    assert_eq!(dep.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(dep.to_string().contains("framing"));
  }

  #[test]
  fn store_conflict_maps_to_409() {
    let err = AppError::from(StoreError::Conflict { collection: "sessions", key: "s1".into() });
    assert_eq!(err.status_code(), StatusCode::CONFLICT);
    assert!(err.to_string().contains("sessions/s1"));
  }
}
