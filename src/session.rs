//! Practice-session models: the client's local session state submitted for
//! grading, and the immutable record persisted once grading completes.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::SectionKey;

/// Field name -> text, e.g. `{"clarifications": "...", "edgeCases": "..."}`.
pub type SnapshotData = BTreeMap<String, String>;

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Snapshot {
  pub data: SnapshotData,
  #[serde(default)]
  pub timestamp: i64,
}

impl Snapshot {
  pub fn new<K: Into<String>, V: Into<String>>(fields: impl IntoIterator<Item = (K, V)>) -> Self {
    Self {
      data: fields.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
      timestamp: 0,
    }
  }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SectionState {
  #[serde(default)]
  pub snapshots: Vec<Snapshot>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
  User,
  Assistant,
}

/// One chat turn, tagged with the section it happened in.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionMessage {
  pub role: MessageRole,
  pub content: String,
  pub section: SectionKey,
  #[serde(default)]
  pub timestamp: i64,
}

impl SessionMessage {
  pub fn is_candidate_input(&self) -> bool {
    self.role == MessageRole::User && !self.content.trim().is_empty()
  }
}

/// Everything the client accumulated during a session.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionState {
  #[serde(default)]
  pub sections: BTreeMap<SectionKey, SectionState>,
  #[serde(default)]
  pub messages: Vec<SessionMessage>,
}

impl SessionState {
  pub fn snapshots(&self, key: SectionKey) -> &[Snapshot] {
    self.sections.get(&key).map(|s| s.snapshots.as_slice()).unwrap_or(&[])
  }

  pub fn messages_for(&self, key: SectionKey) -> Vec<SessionMessage> {
    self.messages.iter().filter(|m| m.section == key).cloned().collect()
  }

  pub fn has_candidate_chat(&self) -> bool {
    self.messages.iter().any(SessionMessage::is_candidate_input)
  }
}

/// Graded result for one category. `score: None` means "not assessable",
/// which is different from a low score.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CategoryFeedback {
  pub score: Option<f32>,
  pub comments: String,
  pub compliments: String,
  pub advice: String,
}

impl CategoryFeedback {
  pub fn not_assessable(comments: impl Into<String>) -> Self {
    Self {
      score: None,
      comments: comments.into(),
      compliments: String::new(),
      advice: String::new(),
    }
  }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionFeedback {
  pub sections: BTreeMap<SectionKey, CategoryFeedback>,
  pub interviewer_communication: CategoryFeedback,
  pub summary: String,
}

/// A completed practice attempt. Created once, never mutated.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
  pub id: String,
  pub user_id: String,
  pub problem_title_slug: String,
  pub created_at: DateTime<Utc>,
  /// Final field values per section.
  pub fields: BTreeMap<SectionKey, SnapshotData>,
  /// Pruned snapshot history per section, as graded.
  pub snapshots: BTreeMap<SectionKey, Vec<Snapshot>>,
  pub chat_log: Vec<SessionMessage>,
  pub feedback: SessionFeedback,
  /// Version of the grading prompts that produced `feedback`.
  #[serde(default)]
  pub prompt_version: u32,
}
