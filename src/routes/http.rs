//! HTTP endpoint handlers. These are thin wrappers that forward to core logic
//! and map its outcomes to status codes:
//! complete -> 200, processing -> 202, not found -> 404, errors via `AppError`.

use std::sync::Arc;

use axum::{
  extract::{Path, Query, State},
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use tracing::{info, instrument};

use crate::chat::interviewer_reply;
use crate::error::AppError;
use crate::feedback::generate_session_feedback;
use crate::layers::ProcessingResult;
use crate::pipeline::feedback_data::{generate_feedback_data, get_feedback_data};
use crate::pipeline::polling::{ensure_practice_data, PollOutcome};
use crate::pipeline::practice::{generate_practice_data, get_practice_data};
use crate::pipeline::preview::{generate_preview_data, get_preview_data};
use crate::pipeline::{load_problem, GenerationOutcome};
use crate::protocol::*;
use crate::state::AppState;
use crate::users::{completed_problems, saved_problems, set_problem_saved};

fn processing() -> Response {
  (StatusCode::ACCEPTED, Json(StatusOut::processing())).into_response()
}

fn status_response(result: ProcessingResult) -> Response {
  match result {
    ProcessingResult::Complete(d) => Json(*d).into_response(),
    ProcessingResult::Processing => processing(),
    ProcessingResult::NotFound => (StatusCode::NOT_FOUND, Json(StatusOut::not_found())).into_response(),
  }
}

fn generation_response(outcome: GenerationOutcome) -> Response {
  match outcome {
    GenerationOutcome::Ready(d) => Json(d).into_response(),
    GenerationOutcome::Processing => processing(),
  }
}

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse {
  Json(HealthOut { ok: true })
}

#[instrument(level = "info", skip(state))]
pub async fn http_list_problems(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
  let problems = state.problems.list().await?;
  info!(target: "flowcode_backend", count = problems.len(), "HTTP problems listed");
  Ok(Json(ProblemsOut { problems }).into_response())
}

#[instrument(level = "info", skip(state), fields(%slug))]
pub async fn http_get_problem(State(state): State<Arc<AppState>>, Path(slug): Path<String>) -> Result<Response, AppError> {
  Ok(Json(load_problem(&state, &slug).await?).into_response())
}

#[instrument(level = "info", skip(state), fields(%slug))]
pub async fn http_get_preview(State(state): State<Arc<AppState>>, Path(slug): Path<String>) -> Result<Response, AppError> {
  Ok(status_response(get_preview_data(&state, &slug).await?))
}

#[instrument(level = "info", skip(state), fields(%slug))]
pub async fn http_post_preview(State(state): State<Arc<AppState>>, Path(slug): Path<String>) -> Result<Response, AppError> {
  Ok(generation_response(generate_preview_data(&state, &slug).await?))
}

#[instrument(level = "info", skip(state), fields(%slug))]
pub async fn http_get_practice(State(state): State<Arc<AppState>>, Path(slug): Path<String>) -> Result<Response, AppError> {
  Ok(status_response(get_practice_data(&state, &slug).await?))
}

#[instrument(level = "info", skip(state), fields(%slug, wait = q.wait))]
pub async fn http_post_practice(
  State(state): State<Arc<AppState>>,
  Path(slug): Path<String>,
  Query(q): Query<PracticeQuery>,
) -> Result<Response, AppError> {
  if !q.wait {
    return Ok(generation_response(generate_practice_data(&state, &slug).await?));
  }
  Ok(match ensure_practice_data(&state, &slug).await? {
    PollOutcome::Ready(d) => Json(*d).into_response(),
    PollOutcome::StillProcessing => processing(),
    PollOutcome::NotFound => (StatusCode::NOT_FOUND, Json(StatusOut::not_found())).into_response(),
  })
}

#[instrument(level = "info", skip(state), fields(%slug))]
pub async fn http_get_feedback(State(state): State<Arc<AppState>>, Path(slug): Path<String>) -> Result<Response, AppError> {
  Ok(status_response(get_feedback_data(&state, &slug).await?))
}

#[instrument(level = "info", skip(state), fields(%slug))]
pub async fn http_post_feedback(State(state): State<Arc<AppState>>, Path(slug): Path<String>) -> Result<Response, AppError> {
  Ok(generation_response(generate_feedback_data(&state, &slug).await?))
}

#[instrument(level = "info", skip(state, body), fields(user = %body.user_id, slug = %body.problem_title_slug))]
pub async fn http_post_session_feedback(
  State(state): State<Arc<AppState>>,
  Json(body): Json<SessionFeedbackIn>,
) -> Result<Response, AppError> {
  let record = generate_session_feedback(&state, body).await?;
  info!(target: "feedback", session = %record.id, "HTTP session graded");
  Ok(Json(SessionFeedbackOut::from(record)).into_response())
}

#[instrument(level = "info", skip(state), fields(%id))]
pub async fn http_get_session(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<Response, AppError> {
  let record = state.sessions.get(&id).await?.ok_or_else(|| AppError::SessionNotFound(id.clone()))?;
  Ok(Json(record).into_response())
}

#[instrument(level = "info", skip(state), fields(%uid))]
pub async fn http_list_user_sessions(
  State(state): State<Arc<AppState>>,
  Path(uid): Path<String>,
) -> Result<Response, AppError> {
  let sessions = state.sessions.list_by_user(&uid).await?;
  Ok(Json(SessionsOut { sessions }).into_response())
}

/// Catalog entries for the problems a user has completed. Unknown users get an empty list.
#[instrument(level = "info", skip(state), fields(%uid))]
pub async fn http_list_user_problems(
  State(state): State<Arc<AppState>>,
  Path(uid): Path<String>,
) -> Result<Response, AppError> {
  let problems = completed_problems(&state, &uid).await?;
  Ok(Json(ProblemsOut { problems }).into_response())
}

/// Catalog entries the user saved for later. Unknown users get an empty list.
#[instrument(level = "info", skip(state), fields(%uid))]
pub async fn http_list_saved_problems(
  State(state): State<Arc<AppState>>,
  Path(uid): Path<String>,
) -> Result<Response, AppError> {
  let problems = saved_problems(&state, &uid).await?;
  Ok(Json(ProblemsOut { problems }).into_response())
}

#[instrument(level = "info", skip(state), fields(%uid, %slug))]
pub async fn http_put_saved_problem(
  State(state): State<Arc<AppState>>,
  Path((uid, slug)): Path<(String, String)>,
) -> Result<Response, AppError> {
  Ok(Json(set_problem_saved(&state, &uid, &slug, true).await?).into_response())
}

#[instrument(level = "info", skip(state), fields(%uid, %slug))]
pub async fn http_delete_saved_problem(
  State(state): State<Arc<AppState>>,
  Path((uid, slug)): Path<(String, String)>,
) -> Result<Response, AppError> {
  Ok(Json(set_problem_saved(&state, &uid, &slug, false).await?).into_response())
}

#[instrument(level = "info", skip(state, body), fields(slug = %body.problem_title_slug, section = %body.section))]
pub async fn http_post_chat(State(state): State<Arc<AppState>>, Json(body): Json<ChatIn>) -> Result<Response, AppError> {
  let reply = interviewer_reply(&state, &body).await?;
  Ok(Json(ChatOut { reply }).into_response())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::pipeline::practice::practice_layers;
  use crate::routes::build_router;
  use crate::testing::{seed_complete, seed_previewed, test_state};
  use axum::body::{to_bytes, Body};
  use axum::http::Request;
  use serde_json::{json, Value};
  use std::time::Duration;
  use tower::ServiceExt;

  async fn send(state: &AppState, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let app = build_router(Arc::new(state.clone()));
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
      Some(v) => builder.header("content-type", "application/json").body(Body::from(v.to_string())).unwrap(),
      None => builder.body(Body::empty()).unwrap(),
    };
    let res = app.oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, value)
  }

  #[tokio::test]
  async fn health_and_catalog() {
    let (state, _) = test_state().await;
    let (status, body) = send(&state, "GET", "/api/v1/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);

    let (status, body) = send(&state, "GET", "/api/v1/problems", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["problems"].as_array().unwrap().iter().any(|p| p["titleSlug"] == "two-sum"));

    let (status, _) = send(&state, "GET", "/api/v1/problems/no-such-problem", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn preview_is_404_until_generated() {
    let (state, _) = test_state().await;
    let (status, body) = send(&state, "GET", "/api/v1/problems/two-sum/preview", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], "not_found");

    let (status, body) = send(&state, "POST", "/api/v1/problems/two-sum/preview", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["derived"]["framing"]["canonical"].is_string());

    let (status, _) = send(&state, "GET", "/api/v1/problems/two-sum/preview", None).await;
    assert_eq!(status, StatusCode::OK);
  }

  #[tokio::test]
  async fn claimed_practice_layers_answer_202() {
    let (state, _) = test_state().await;
    seed_previewed(&state, "two-sum").await;
    state.details.claim_layers("two-sum", &practice_layers(), Duration::from_secs(300)).await.unwrap();

    let (status, body) = send(&state, "GET", "/api/v1/problems/two-sum/practice", None).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body, json!({"status": "processing"}));

    let (status, _) = send(&state, "POST", "/api/v1/problems/two-sum/practice?wait=true", None).await;
    assert_eq!(status, StatusCode::ACCEPTED);
  }

  #[tokio::test]
  async fn feedback_data_without_practice_layers_is_a_server_error() {
    let (state, llm) = test_state().await;
    seed_previewed(&state, "two-sum").await;
    let (status, body) = send(&state, "POST", "/api/v1/problems/two-sum/feedback", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("testCases"));
    assert_eq!(llm.total_calls(), 0);
  }

  #[tokio::test]
  async fn graded_session_is_retrievable() {
    let (state, _) = test_state().await;
    seed_complete(&state, "two-sum").await;
    let payload = json!({
      "userId": "u1",
      "problemTitleSlug": "two-sum",
      "session": {
        "sections": {
          "complexity_analysis": { "snapshots": [ { "data": { "time": "O(n)", "space": "O(n)" } } ] }
        },
        "messages": []
      }
    });

    let (status, body) = send(&state, "POST", "/api/v1/sessions/feedback", Some(payload)).await;
    assert_eq!(status, StatusCode::OK);
    let id = body["sessionId"].as_str().unwrap().to_string();
    assert!(body["feedback"]["sections"]["problem_understanding"]["score"].is_null());
    assert!(body["feedback"]["sections"]["complexity_analysis"]["score"].is_number());

    let (status, body) = send(&state, "GET", &format!("/api/v1/sessions/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["userId"], "u1");

    let (_, body) = send(&state, "GET", "/api/v1/users/u1/sessions", None).await;
    assert_eq!(body["sessions"].as_array().unwrap().len(), 1);

    let (_, body) = send(&state, "GET", "/api/v1/users/u1/problems", None).await;
    assert_eq!(body["problems"][0]["titleSlug"], "two-sum");

    let (status, _) = send(&state, "GET", "/api/v1/sessions/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn saved_problems_round_trip_over_http() {
    let (state, _) = test_state().await;
    let (status, body) = send(&state, "PUT", "/api/v1/users/u1/saved/two-sum", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["savedProblems"], json!(["two-sum"]));

    let (_, body) = send(&state, "GET", "/api/v1/users/u1/saved", None).await;
    assert_eq!(body["problems"][0]["titleSlug"], "two-sum");

    let (status, body) = send(&state, "DELETE", "/api/v1/users/u1/saved/two-sum", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["savedProblems"], json!([]));

    let (status, _) = send(&state, "PUT", "/api/v1/users/u1/saved/no-such-problem", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn chat_returns_interviewer_reply() {
    let (state, llm) = test_state().await;
    seed_previewed(&state, "two-sum").await;
    llm.push_chat("What should happen when no pair exists?");
    let payload = json!({
      "problemTitleSlug": "two-sum",
      "section": "problem_understanding",
      "messages": [ { "role": "user", "content": "Is there always exactly one answer?" } ]
    });

    let (status, body) = send(&state, "POST", "/api/v1/chat", Some(payload)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reply"], "What should happen when no pair exists?");
  }
}
