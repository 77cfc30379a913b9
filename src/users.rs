//! Per-user problem lists: problems saved for later and problems completed in
//! a graded session. Both resolve to catalog entries through one batch read.

use tracing::{info, instrument, warn};

use crate::domain::Problem;
use crate::error::AppError;
use crate::pipeline::load_problem;
use crate::state::AppState;
use crate::store::UserRecord;

fn require_user(user_id: &str) -> Result<&str, AppError> {
  let user_id = user_id.trim();
  if user_id.is_empty() {
    return Err(AppError::InvalidInput("userId is required".into()));
  }
  Ok(user_id)
}

/// Add `slug` to (or remove it from) the user's saved set and return the updated record.
/// Only catalog problems can be saved.
#[instrument(level = "info", skip(state), fields(%user_id, %slug, saved))]
pub async fn set_problem_saved(state: &AppState, user_id: &str, slug: &str, saved: bool) -> Result<UserRecord, AppError> {
  let user_id = require_user(user_id)?;
  let problem = load_problem(state, slug).await?;
  let created = state.users.set_problem_saved(user_id, &problem.title_slug, saved).await?;
  if created {
    if let Err(e) = state.stats.increment_user_count().await {
      warn!(target: "flowcode_backend", error = %e, "Failed to increment user count");
    }
  }
  info!(target: "flowcode_backend", %user_id, slug = %problem.title_slug, saved, "Saved problems updated");
  Ok(state.users.get(user_id).await?.unwrap_or_default())
}

/// Catalog entries the user saved. Unknown users get an empty list.
pub async fn saved_problems(state: &AppState, user_id: &str) -> Result<Vec<Problem>, AppError> {
  let slugs: Vec<String> = match state.users.get(user_id).await? {
    Some(user) => user.saved_problems.into_iter().collect(),
    None => Vec::new(),
  };
  Ok(state.problems.get_many(&slugs).await?)
}

/// Catalog entries for the problems the user has completed. Unknown users get an empty list.
pub async fn completed_problems(state: &AppState, user_id: &str) -> Result<Vec<Problem>, AppError> {
  let slugs: Vec<String> = match state.users.get(user_id).await? {
    Some(user) => user.completed_problems.into_iter().collect(),
    None => Vec::new(),
  };
  Ok(state.problems.get_many(&slugs).await?)
}
