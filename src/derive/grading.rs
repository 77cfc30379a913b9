//! Grading criteria: one rubric per session section, informed by the
//! reference solutions.

use serde::Deserialize;
use tracing::instrument;

use crate::domain::{Framing, GradingCriterion, SectionKey, Solution, TestCase};
use crate::error::LlmError;
use crate::llm::{Llm, Schema};
use crate::util::fill_template;

use super::{format_cases, format_solutions, Generated, ProblemContext};

pub const PROMPT_VERSION: u32 = 3;

const TEMPLATE: &str = r#"You write the grading rubric for a coding interview problem. It is applied after a practice session to score the candidate.

The problem, restated as an engineering task:
{framing}

Stick to the vocabulary of that restatement throughout.

Test cases:
{test_cases}

Edge cases:
{edge_cases}

Reference solutions (least to most optimal):
{solutions}

The reference solutions show which structures, insights and complexity targets matter here. They describe what good looks like, not the only acceptable answer: a different valid approach with sound reasoning can still earn a 5.

Write exactly one criterion for each of these section keys:
{sections}

For each criterion give:
- "category": the section key, spelled exactly as above.
- "description": 2 to 3 sentences on what a strong candidate shows in that section for this problem.
- "rubric": first the anchors (what earns 1, 3 and 5 on this problem, naming concrete structures and steps), then 3 to 6 adjustment rules written as "<mistake or standout moment>: <delta>", e.g. "Misses empty input: -0.5".

Respond with JSON of the form:
{"gradingCriteria": [{"category": string, "description": string, "rubric": string}]}

Problem title: {title}
Difficulty: {difficulty}
Problem statement:
{statement}
"#;

fn section_focus(key: SectionKey) -> &'static str {
  match key {
    SectionKey::ProblemUnderstanding => "clarifying questions, the input/output contract, constraints and edge cases",
    SectionKey::ApproachAndReasoning => "explaining the strategy, comparing approaches, articulating tradeoffs",
    SectionKey::AlgorithmDesign => "correct and complete pseudocode that covers the edge cases",
    SectionKey::Implementation => "correct, clean code that handles the edge cases",
    SectionKey::ComplexityAnalysis => "deriving, not just stating, time and space complexity",
  }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradingOutput {
  pub grading_criteria: Vec<GradingCriterion>,
}

impl Schema for GradingOutput {
  const NAME: &'static str = "grading_criteria";

  fn validate(&self) -> Result<(), String> {
    for key in SectionKey::ALL {
      let n = self.grading_criteria.iter().filter(|c| c.category == key).count();
      if n != 1 {
        return Err(format!("expected one criterion for `{key}`, got {n}"));
      }
    }
    if self.grading_criteria.iter().any(|c| c.rubric.trim().is_empty()) {
      return Err("criterion with empty rubric".into());
    }
    Ok(())
  }
}

pub fn build_prompt(
  ctx: &ProblemContext<'_>,
  framing: &Framing,
  test_cases: &[TestCase],
  edge_cases: &[TestCase],
  solutions: &[Solution],
) -> String {
  let difficulty = ctx.difficulty();
  let tests = format_cases(test_cases);
  let edges = format_cases(edge_cases);
  let sols = format_solutions(solutions);
  let sections = SectionKey::ALL
    .iter()
    .map(|k| format!("- \"{}\": {}", k.as_str(), section_focus(*k)))
    .collect::<Vec<_>>()
    .join("\n");
  fill_template(
    TEMPLATE,
    &[
      ("framing", framing.canonical.as_str()),
      ("test_cases", tests.as_str()),
      ("edge_cases", edges.as_str()),
      ("solutions", sols.as_str()),
      ("sections", sections.as_str()),
      ("title", ctx.problem.title.as_str()),
      ("difficulty", difficulty.as_str()),
      ("statement", ctx.statement),
    ],
  )
}

#[instrument(level = "info", skip_all, fields(slug = %ctx.problem.title_slug, solutions = solutions.len()))]
pub async fn generate(
  llm: &Llm,
  ctx: &ProblemContext<'_>,
  framing: &Framing,
  test_cases: &[TestCase],
  edge_cases: &[TestCase],
  solutions: &[Solution],
) -> Result<Generated<Vec<GradingCriterion>>, LlmError> {
  let prompt = build_prompt(ctx, framing, test_cases, edge_cases, solutions);
  let out = llm.call_structured::<GradingOutput>(&prompt, 0.2).await?;
  Ok(Generated::from_structured(out, PROMPT_VERSION, |o| {
    let mut criteria = o.grading_criteria;
    criteria.sort_by_key(|c| c.category);
    criteria
  }))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::llm::parse_structured;

  fn criteria_json(keys: &[&str]) -> String {
    let items: Vec<String> = keys
      .iter()
      .map(|k| format!(r#"{{"category": "{k}", "description": "d", "rubric": "1: x, 3: y, 5: z"}}"#))
      .collect();
    format!(r#"{{"gradingCriteria": [{}]}}"#, items.join(","))
  }

  #[test]
  fn every_section_needs_exactly_one_criterion() {
    let all: Vec<&str> = SectionKey::ALL.iter().map(|k| k.as_str()).collect();
    assert!(parse_structured::<GradingOutput>(&criteria_json(&all)).is_ok());

    let missing = &all[..4];
    assert!(parse_structured::<GradingOutput>(&criteria_json(missing)).is_err());

    let mut doubled = all.clone();
    doubled[4] = "implementation";
    assert!(parse_structured::<GradingOutput>(&criteria_json(&doubled)).is_err());
  }

  #[test]
  fn unknown_category_is_a_schema_mismatch() {
    let mut keys: Vec<&str> = SectionKey::ALL.iter().map(|k| k.as_str()).collect();
    keys.push("communication");
    let err = parse_structured::<GradingOutput>(&criteria_json(&keys)).unwrap_err();
    assert!(matches!(err, LlmError::SchemaMismatch { .. }));
  }
}
