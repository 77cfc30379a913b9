//! Interviewer chat: system prompts around the candidate transcript,
//! answered by a free-text completion.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::domain::{ProblemDetails, SectionKey};
use crate::error::AppError;
use crate::llm::ChatMessage;
use crate::pipeline::load_problem;
use crate::feedback::prompts::field_label;
use crate::session::{MessageRole, SnapshotData};
use crate::state::AppState;

const INTERVIEWER_ROLE: &str = "You are the interviewer in a simulated coding interview. The user is the candidate.

Where things come from:
- The problem is described in the problem context message.
- How to behave in the current section is described in the section message.
- Notes from earlier sections, if any, are in the prior sections message. Treat them as given and do not ask the candidate to repeat them.
- The candidate's notes for the current section, if any, are in the current notes message. Use them for context but do not grade them unless asked.

How to behave:
- The session runs through problem understanding, approach and reasoning, algorithm design, implementation and complexity analysis.
- Be brief; a simple question gets one sentence.
- Do not give solutions or code unless asked a direct syntax or language question.
- Give hints or guiding questions only when the candidate is stuck, asks for help, or makes a clear mistake.
- When an answer is correct and reasonably complete, confirm briefly and move on.
- Do not push for detail that is not needed for correctness, and stay in the current section.";

fn section_prompt(key: SectionKey) -> &'static str {
  match key {
    SectionKey::ProblemUnderstanding => {
      "Current section: Problem Understanding. The candidate is restating the problem and listing inputs, outputs, constraints and edge cases in a form next to this chat. Answer clarifying questions about inputs, output format and which edge cases are in scope. Do not confirm whether their understanding is right and do not hint at an approach. Answer only what is asked."
    }
    SectionKey::ApproachAndReasoning => {
      "Current section: Approach & Reasoning. The candidate explains the approach they intend to take, with candidate algorithms, data structures and tradeoffs. Respond only when they ask for feedback or make a clear mistake; a short guiding question is enough. If the approach is sound, encourage them to continue."
    }
    SectionKey::AlgorithmDesign => {
      "Current section: Algorithm Design. The candidate writes high-level pseudocode in an editor next to this chat. Comment only when the structure is unclear or contradicts the approach they described, and keep it high-level. If it looks good, prompt them to continue."
    }
    SectionKey::Implementation => {
      "Current section: Implementation. The candidate writes code in an editor next to this chat. Never provide a full solution. Speak up when asked or when there is a clear problem such as a syntax error or a mismatch with their pseudocode. When they are stuck on a bug, ask questions that help them find it. If the code looks correct, encourage them to continue."
    }
    SectionKey::ComplexityAnalysis => {
      "Current section: Complexity Analysis. The candidate analyses time and space complexity in their own words. If they are unsure or wrong, ask one or two focused questions; never state the answer. If the analysis is correct and reasonably complete, confirm briefly."
    }
  }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatTurn {
  pub role: MessageRole,
  pub content: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
  pub problem_title_slug: String,
  pub section: SectionKey,
  pub messages: Vec<ChatTurn>,
  #[serde(default)]
  pub prior_sections: BTreeMap<SectionKey, SnapshotData>,
  #[serde(default)]
  pub current_notes: SnapshotData,
}

fn format_notes(data: &SnapshotData) -> String {
  data
    .iter()
    .filter(|(_, v)| !v.trim().is_empty())
    .map(|(k, v)| format!("{}: {}", field_label(k), v.trim()))
    .collect::<Vec<_>>()
    .join("\n")
}

fn problem_context(title: &str, difficulty: &str, details: Option<&ProblemDetails>) -> String {
  let mut out = format!("Problem context.\nTitle: {title}\nDifficulty: {difficulty}");
  if let Some(d) = details {
    if let Some(f) = &d.derived.framing {
      out.push_str(&format!("\nTask as presented to the candidate:\n{}", f.canonical));
    } else if !d.source.original_content.is_empty() {
      out.push_str(&format!("\nStatement:\n{}", d.source.original_content));
    }
  }
  out
}

/// System messages followed by the transcript.
pub fn build_messages(req: &ChatRequest, context: String) -> Vec<ChatMessage> {
  let mut messages = vec![
    ChatMessage::system(INTERVIEWER_ROLE),
    ChatMessage::system(section_prompt(req.section)),
    ChatMessage::system(context),
  ];

  let prior: Vec<String> = req
    .prior_sections
    .iter()
    .filter(|(key, _)| **key < req.section)
    .map(|(key, data)| (key, format_notes(data)))
    .filter(|(_, notes)| !notes.is_empty())
    .map(|(key, notes)| format!("{}:\n{}", key.title(), notes))
    .collect();
  if !prior.is_empty() {
    messages.push(ChatMessage::system(format!("Prior sections.\n{}", prior.join("\n\n"))));
  }

  let current = format_notes(&req.current_notes);
  if !current.is_empty() {
    messages.push(ChatMessage::system(format!("Current section notes.\n{current}")));
  }

  for turn in &req.messages {
    messages.push(match turn.role {
      MessageRole::User => ChatMessage::user(turn.content.clone()),
      MessageRole::Assistant => ChatMessage::assistant(turn.content.clone()),
    });
  }
  messages
}

#[instrument(level = "info", skip(state, req), fields(slug = %req.problem_title_slug, section = %req.section, turns = req.messages.len()))]
pub async fn interviewer_reply(state: &AppState, req: &ChatRequest) -> Result<String, AppError> {
  if !req.messages.iter().any(|m| m.role == MessageRole::User && !m.content.trim().is_empty()) {
    return Err(AppError::InvalidInput("at least one candidate message is required".into()));
  }
  let problem = load_problem(state, &req.problem_title_slug).await?;
  let details = state.details.get(&req.problem_title_slug).await?;
  let context = problem_context(&problem.title, &problem.difficulty.to_string(), details.as_ref());

  let reply = state.llm.call_chat(&build_messages(req, context), 0.4).await?;
  info!(target: "chat", reply_len = reply.len(), "Interviewer replied");
  Ok(reply)
}
