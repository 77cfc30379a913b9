//! Prompt text for session grading.

use std::collections::BTreeMap;

use crate::domain::{Framing, GradingCriterion, Problem, SectionKey};
use crate::session::{CategoryFeedback, MessageRole, SessionMessage, Snapshot};
use crate::util::fill_template;

pub const PROMPT_VERSION: u32 = 2;

const TONE: &str = "TONE:
- Write the way an interviewer writes a debrief after the loop, not like a chatbot.
- No emojis, no cheerleading openers or closers, no hedging filler.
- Prefer one honest sentence over two padded ones.
- If a field has nothing real to say, write one direct sentence instead of generic encouragement.
- A low score with a clear reason beats a generous score with vague praise.";

fn section_guidance(key: SectionKey) -> &'static str {
  match key {
    SectionKey::ProblemUnderstanding => {
      "- Strong: asks concrete factual questions (bounds, return shape, empty or null input) instead of asking for reassurance; names the constraint the problem hinges on; states assumptions when something is ambiguous; raises non-obvious edge cases unprompted.
- Weak: repeats the statement without adding anything; asks \"is my understanding right?\" rather than clarifying facts; misses a constraint that changes the solution.
- Listing an edge case is enough to show awareness. Only penalize a missing edge case when it is non-obvious and would make the candidate's solution wrong."
    }
    SectionKey::ApproachAndReasoning => {
      "- Strong: starts from a baseline and says why it falls short; justifies the chosen structure by the operation it makes cheap; sanity-checks the idea on an example; notes tradeoffs unprompted.
- Weak: jumps to the optimal answer with no reasoning chain; cannot say why it beats the naive approach; switches strategy without explaining why.
- Complexity has its own section. Mentioning it here is a bonus, never a requirement."
    }
    SectionKey::AlgorithmDesign => {
      "- Strong: every step maps to a concrete operation; control flow covers loops, branches, base cases and early exits; edge cases raised earlier are handled.
- Weak: vague steps such as \"process the data\"; pseudocode that contradicts the stated approach; missing termination conditions.
- An edge case the structure already handles needs no explicit guard. Explanations given in chat count."
    }
    SectionKey::Implementation => {
      "- Strong: code follows the pseudocode and any deviation is deliberate and mentioned; clear names; the visible cases pass; earlier edge cases show up in the code.
- Debugging by tracing values and narrowing scope is a good signal even if the bug survives; guessing at fixes is not.
- Weak: silent divergence from the plan; trial-and-error patching; edge cases identified earlier are missing.
- Do not ask for guards against inputs the problem rules out."
    }
    SectionKey::ComplexityAnalysis => {
      "- Strong: derives the bounds by walking the algorithm and finding the dominant operation; keeps time and space apart; counts auxiliary structures; drops lower-order terms for the right reason.
- Weak: states a figure without derivation; mixes up time and space; overlooks a nested loop or the cost of a structure operation."
    }
  }
}

const SECTION_TEMPLATE: &str = "You are grading the {section_title} section of a coding interview.

{tone}

Problem: {title} ({difficulty})
{framing}

Problem statement:
{statement}

---

GENERAL STANDARDS FOR {section_title}:
{guidance}

CRITERION FOR THIS PROBLEM:
{criterion}

RUBRIC FOR THIS PROBLEM:
{rubric}

---

CANDIDATE WORK, SNAPSHOTS (oldest first; the last one is what they submitted):
{snapshots}

CANDIDATE CHAT (this section only):
{chat}

---

SCORING:
- If the candidate left no work in this section (no snapshots and no chat showing engagement), set score to null, explain in one sentence in comments what was missing and leave compliments and advice empty. Null means not assessable, which is not the same as a low score.
- Otherwise score from 1 to 5 with the rubric's anchors and adjustments, using the general standards where the rubric is silent. Quarter steps (2.25, 2.5, 2.75) are fine; nothing finer.
- For implementation, weigh the whole progression: fixing a bug mid-session counts in their favour, breaking working code counts against.
- Points made clearly in chat count even if they never reached the written fields.
- Judge only what is there. comments: 1 to 3 sentences citing evidence. compliments: only if genuine. advice: one concrete gap, or empty when the score is 4 or above and there is nothing real to add.

Respond with JSON of the form:
{\"score\": number | null, \"comments\": string, \"compliments\": string, \"advice\": string}";

const SUMMARY_TEMPLATE: &str = "You are writing the final assessment of a candidate's whole coding interview.

{tone}

Problem: {title} ({difficulty})

SECTION RESULTS (already graded; do not regrade them):
{results}

FULL CHAT (all sections, in order):
{chat}

---

Produce two things.

1. interviewerCommunication: how the candidate used the interviewer.
   Good: targeted clarifying questions, explaining reasoning when asked, debugging questions that show their own thinking.
   Bad: repeatedly asking for validation, leaning on the interviewer to find bugs, asking for hints before trying to self-correct.
   Working independently and using the interviewer selectively is a positive signal and can score 4 to 5.
   Score 1 to 5 in quarter steps. If the candidate never used the chat, score is null, comments is one sentence saying so, compliments and advice are empty.

2. summary: 2 to 4 sentences on overall performance. Name the strongest section, the biggest gap and any recurring pattern without restating the scores. Be precise about narrow issues and do not draw character conclusions from a single deduction.

Respond with JSON of the form:
{\"interviewerCommunication\": {\"score\": number | null, \"comments\": string, \"compliments\": string, \"advice\": string}, \"summary\": string}";

/// `edgeCases` / `edge_cases` -> `Edge Cases`.
pub fn field_label(key: &str) -> String {
  let mut words: Vec<String> = Vec::new();
  let mut current = String::new();
  for c in key.chars() {
    if c == '_' || c == '-' || c == ' ' {
      if !current.is_empty() {
        words.push(std::mem::take(&mut current));
      }
    } else if c.is_uppercase() && !current.is_empty() {
      words.push(std::mem::take(&mut current));
      current.push(c);
    } else {
      current.push(c);
    }
  }
  if !current.is_empty() {
    words.push(current);
  }
  words
    .iter()
    .map(|w| {
      let mut chars = w.chars();
      match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
      }
    })
    .collect::<Vec<_>>()
    .join(" ")
}

pub fn format_snapshots(snapshots: &[Snapshot]) -> String {
  if snapshots.is_empty() {
    return "The candidate wrote nothing in this section.".into();
  }
  let last = snapshots.len() - 1;
  snapshots
    .iter()
    .enumerate()
    .map(|(i, snap)| {
      let header = if i == last { format!("[Snapshot {} (final)]", i + 1) } else { format!("[Snapshot {}]", i + 1) };
      let fields: Vec<String> = snap
        .data
        .iter()
        .filter(|(_, v)| !v.trim().is_empty())
        .map(|(k, v)| {
          let body: Vec<String> = v.lines().map(|l| format!("    {l}")).collect();
          format!("  {}:\n{}", field_label(k), body.join("\n"))
        })
        .collect();
      if fields.is_empty() {
        format!("{header}\n  (no content)")
      } else {
        format!("{header}\n{}", fields.join("\n"))
      }
    })
    .collect::<Vec<_>>()
    .join("\n\n")
}

fn speaker(role: MessageRole) -> &'static str {
  match role {
    MessageRole::User => "Candidate",
    MessageRole::Assistant => "Interviewer",
  }
}

pub fn format_section_chat(messages: &[SessionMessage]) -> String {
  if messages.is_empty() {
    return "The candidate did not use the chat in this section.".into();
  }
  messages.iter().map(|m| format!("{}: {}", speaker(m.role), m.content)).collect::<Vec<_>>().join("\n")
}

pub fn format_full_chat(messages: &[SessionMessage]) -> String {
  if messages.is_empty() {
    return "The candidate did not use the chat at any point.".into();
  }
  messages
    .iter()
    .map(|m| format!("[{}] {}: {}", m.section.title(), speaker(m.role), m.content))
    .collect::<Vec<_>>()
    .join("\n")
}

pub fn format_results(results: &BTreeMap<SectionKey, CategoryFeedback>) -> String {
  results
    .iter()
    .map(|(key, fb)| {
      let score = match fb.score {
        Some(s) => format!("score: {s}/5"),
        None => "not submitted".to_string(),
      };
      format!("{} - {}\n  {}", key.title(), score, fb.comments)
    })
    .collect::<Vec<_>>()
    .join("\n\n")
}

pub struct SectionPromptInput<'a> {
  pub problem: &'a Problem,
  pub statement: &'a str,
  pub framing: &'a Framing,
  pub criterion: &'a GradingCriterion,
  pub snapshots: &'a [Snapshot],
  pub chat: &'a [SessionMessage],
}

pub fn build_section_prompt(input: &SectionPromptInput<'_>) -> String {
  let key = input.criterion.category;
  let difficulty = input.problem.difficulty.to_string();
  let snapshots = format_snapshots(input.snapshots);
  let chat = format_section_chat(input.chat);
  fill_template(
    SECTION_TEMPLATE,
    &[
      ("section_title", key.title()),
      ("tone", TONE),
      ("title", input.problem.title.as_str()),
      ("difficulty", difficulty.as_str()),
      ("framing", input.framing.canonical.as_str()),
      ("statement", input.statement),
      ("guidance", section_guidance(key)),
      ("criterion", input.criterion.description.as_str()),
      ("rubric", input.criterion.rubric.as_str()),
      ("snapshots", snapshots.as_str()),
      ("chat", chat.as_str()),
    ],
  )
}

pub fn build_summary_prompt(
  problem: &Problem,
  results: &BTreeMap<SectionKey, CategoryFeedback>,
  messages: &[SessionMessage],
) -> String {
  let difficulty = problem.difficulty.to_string();
  let results = format_results(results);
  let chat = format_full_chat(messages);
  fill_template(
    SUMMARY_TEMPLATE,
    &[
      ("tone", TONE),
      ("title", problem.title.as_str()),
      ("difficulty", difficulty.as_str()),
      ("results", results.as_str()),
      ("chat", chat.as_str()),
    ],
  )
}
