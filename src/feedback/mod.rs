//! Session grading.
//!
//! Grades every section in parallel against its criterion, rolls the results
//! into a summary, persists one immutable `SessionRecord`, then runs the
//! best-effort counter updates. Requires the feedback-data layers to exist
//! already; this stage never generates them.

pub mod prompts;

use std::collections::BTreeMap;

use chrono::Utc;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::{Framing, GradingCriterion, LayerName, Problem, SectionKey};
use crate::error::{AppError, LlmError};
use crate::llm::{Llm, Schema};
use crate::pipeline::{load_details, load_problem};
use crate::session::{CategoryFeedback, SessionFeedback, SessionMessage, SessionRecord, SessionState, Snapshot, SnapshotData};
use crate::snapshots;
use crate::state::AppState;

use prompts::{build_section_prompt, build_summary_prompt, SectionPromptInput, PROMPT_VERSION};

const STAGE: &str = "session feedback";

/// Temperature for section grading and the summary.
const GRADING_TEMPERATURE: f32 = 0.0;

const NO_SECTION_WORK: &str = "No work was submitted in this section, so it could not be assessed.";
const NO_CHAT: &str = "The candidate did not use the interviewer chat during the session.";

fn check_score(score: Option<f32>) -> Result<(), String> {
  match score {
    Some(s) if !s.is_finite() || !(1.0..=5.0).contains(&s) => Err(format!("score {s} outside 1-5")),
    _ => Ok(()),
  }
}

impl Schema for CategoryFeedback {
  const NAME: &'static str = "section_feedback";
  const NULLABLE: &'static [&'static str] = &["score"];

  fn validate(&self) -> Result<(), String> {
    check_score(self.score)
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
  pub interviewer_communication: CategoryFeedback,
  pub summary: String,
}

impl Schema for SessionSummary {
  const NAME: &'static str = "session_summary";
  const NULLABLE: &'static [&'static str] = &["score"];

  fn validate(&self) -> Result<(), String> {
    if self.summary.trim().is_empty() {
      return Err("summary is empty".into());
    }
    check_score(self.interviewer_communication.score)
  }
}

/// Body of a grading request.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionFeedbackRequest {
  pub user_id: String,
  pub problem_title_slug: String,
  #[serde(default)]
  pub session: SessionState,
}

/// Everything one section's grader sees.
struct SectionInput<'a> {
  criterion: &'a GradingCriterion,
  snapshots: Vec<Snapshot>,
  chat: Vec<SessionMessage>,
}

impl SectionInput<'_> {
  fn assessable(&self) -> bool {
    !self.snapshots.is_empty() || self.chat.iter().any(SessionMessage::is_candidate_input)
  }
}

fn criterion_for(criteria: &[GradingCriterion], key: SectionKey) -> Result<&GradingCriterion, AppError> {
  criteria.iter().find(|c| c.category == key).ok_or(AppError::MissingCriterion(key))
}

async fn grade_section(
  llm: &Llm,
  problem: &Problem,
  statement: &str,
  framing: &Framing,
  input: &SectionInput<'_>,
) -> Result<CategoryFeedback, LlmError> {
  let key = input.criterion.category;
  if !input.assessable() {
    info!(target: "feedback", section = %key, "Section empty; not assessable");
    return Ok(CategoryFeedback::not_assessable(NO_SECTION_WORK));
  }
  let prompt = build_section_prompt(&SectionPromptInput {
    problem,
    statement,
    framing,
    criterion: input.criterion,
    snapshots: &input.snapshots,
    chat: &input.chat,
  });
  let out = llm.call_structured::<CategoryFeedback>(&prompt, GRADING_TEMPERATURE).await?;
  info!(target: "feedback", section = %key, score = ?out.data.score, model = %out.model, "Section graded");
  Ok(out.data)
}

/// Grade a finished session and persist it. Returns the stored record.
#[instrument(level = "info", skip(state, req), fields(user = %req.user_id, slug = %req.problem_title_slug))]
pub async fn generate_session_feedback(state: &AppState, req: SessionFeedbackRequest) -> Result<SessionRecord, AppError> {
  if req.user_id.trim().is_empty() {
    return Err(AppError::InvalidInput("userId is required".into()));
  }
  let slug = req.problem_title_slug.trim();
  if slug.is_empty() {
    return Err(AppError::InvalidInput("problemTitleSlug is required".into()));
  }

  let problem = load_problem(state, slug).await?;
  let details = load_details(state, slug).await?;
  let missing = |layer| AppError::MissingDependency { stage: STAGE, slug: slug.to_string(), layer };
  let framing = details.derived.framing.as_ref().ok_or_else(|| missing(LayerName::Framing))?;
  let criteria = details
    .derived
    .grading_criteria
    .as_deref()
    .filter(|c| !c.is_empty())
    .ok_or_else(|| missing(LayerName::GradingCriteria))?;

  let mut inputs = Vec::with_capacity(SectionKey::ALL.len());
  for key in SectionKey::ALL {
    inputs.push(SectionInput {
      criterion: criterion_for(criteria, key)?,
      snapshots: snapshots::prune(req.session.snapshots(key)),
      chat: req.session.messages_for(key),
    });
  }

  let statement = details.source.original_content.as_str();
  let graded = join_all(inputs.iter().map(|input| grade_section(&state.llm, &problem, statement, framing, input))).await;
  let mut sections = BTreeMap::new();
  for (input, result) in inputs.iter().zip(graded) {
    sections.insert(input.criterion.category, result?);
  }

  let summary_prompt = build_summary_prompt(&problem, &sections, &req.session.messages);
  let summary = state.llm.call_structured::<SessionSummary>(&summary_prompt, GRADING_TEMPERATURE).await?.data;
  let mut communication = summary.interviewer_communication;
  if !req.session.has_candidate_chat() {
    let comments = if communication.comments.trim().is_empty() { NO_CHAT.to_string() } else { communication.comments };
    communication = CategoryFeedback::not_assessable(comments);
  }

  let record = SessionRecord {
    id: Uuid::new_v4().to_string(),
    user_id: req.user_id.clone(),
    problem_title_slug: slug.to_string(),
    created_at: Utc::now(),
    fields: final_fields(&inputs),
    snapshots: inputs.iter().map(|i| (i.criterion.category, i.snapshots.clone())).collect(),
    chat_log: req.session.messages.clone(),
    feedback: SessionFeedback { sections, interviewer_communication: communication, summary: summary.summary },
    prompt_version: PROMPT_VERSION,
  };
  state.sessions.create(record.clone()).await?;
  info!(target: "feedback", session = %record.id, prompt_version = PROMPT_VERSION, "Session persisted");

  record_side_effects(state, &record.user_id, slug).await;
  Ok(record)
}

/// Last pruned snapshot per section, i.e. what the candidate submitted.
/// Every section gets an entry; untouched ones map to an empty object.
fn final_fields(inputs: &[SectionInput<'_>]) -> BTreeMap<SectionKey, SnapshotData> {
  inputs
    .iter()
    .map(|i| {
      let data = i.snapshots.last().map(|s| s.data.clone()).unwrap_or_default();
      (i.criterion.category, data)
    })
    .collect()
}

/// Counter and user-set updates. Failures are logged, never surfaced.
async fn record_side_effects(state: &AppState, user_id: &str, slug: &str) {
  let sessions = async {
    if let Err(e) = state.stats.increment_session_count().await {
      warn!(target: "feedback", error = %e, "Failed to increment session count");
    }
  };
  let user = async {
    match state.users.add_completed_problem(user_id, slug).await {
      Ok(true) => {
        if let Err(e) = state.stats.increment_user_count().await {
          warn!(target: "feedback", error = %e, "Failed to increment user count");
        }
      }
      Ok(false) => {}
      Err(e) => warn!(target: "feedback", %user_id, %slug, error = %e, "Failed to record completed problem"),
    }
  };
  futures::join!(sessions, user);
}
