//! Reference solutions, least to most optimal.

use serde::Deserialize;
use tracing::instrument;

use crate::domain::{Framing, Solution, TestCase};
use crate::error::LlmError;
use crate::llm::{Llm, Schema};
use crate::util::fill_template;

use super::{format_cases, Generated, ProblemContext};

pub const PROMPT_VERSION: u32 = 3;

const TEMPLATE: &str = r#"You write reference solutions for a coding interview problem. They are used afterwards to assess how a candidate did.

The problem, restated as an engineering task:
{framing}

Stick to the vocabulary of that restatement throughout.

Test cases:
{test_cases}

Edge cases:
{edge_cases}

Write 2 or 3 solutions ordered from least to most optimal. For each one give:
- "approach": a short label such as "Brute Force" or "Hash Map".
- "explanation": 2 to 4 sentences on the idea, why it is correct and when to prefer it.
- "algorithm": step-by-step pseudocode using real line breaks (\n) and leading spaces for nesting; not actual code and not one long sentence.
- "tradeoffs": what it gives up compared with the alternatives.
- "timeComplexity" and "spaceComplexity": Big-O with a short justification.

Respond with JSON of the form:
{"solutions": [{"approach": string, "explanation": string, "algorithm": string, "tradeoffs": string, "timeComplexity": string, "spaceComplexity": string}]}

Problem title: {title}
Difficulty: {difficulty}
Problem statement:
{statement}
"#;

#[derive(Debug, Deserialize)]
pub struct SolutionsOutput {
  pub solutions: Vec<Solution>,
}

impl Schema for SolutionsOutput {
  const NAME: &'static str = "solutions";

  fn validate(&self) -> Result<(), String> {
    if self.solutions.is_empty() {
      return Err("no solutions".into());
    }
    if self.solutions.iter().any(|s| s.approach.trim().is_empty() || s.algorithm.trim().is_empty()) {
      return Err("solution without approach or algorithm".into());
    }
    Ok(())
  }
}

pub fn build_prompt(ctx: &ProblemContext<'_>, framing: &Framing, test_cases: &[TestCase], edge_cases: &[TestCase]) -> String {
  let difficulty = ctx.difficulty();
  let tests = format_cases(test_cases);
  let edges = format_cases(edge_cases);
  fill_template(
    TEMPLATE,
    &[
      ("framing", framing.canonical.as_str()),
      ("test_cases", tests.as_str()),
      ("edge_cases", edges.as_str()),
      ("title", ctx.problem.title.as_str()),
      ("difficulty", difficulty.as_str()),
      ("statement", ctx.statement),
    ],
  )
}

#[instrument(level = "info", skip_all, fields(slug = %ctx.problem.title_slug))]
pub async fn generate(
  llm: &Llm,
  ctx: &ProblemContext<'_>,
  framing: &Framing,
  test_cases: &[TestCase],
  edge_cases: &[TestCase],
) -> Result<Generated<Vec<Solution>>, LlmError> {
  let prompt = build_prompt(ctx, framing, test_cases, edge_cases);
  let out = llm.call_structured::<SolutionsOutput>(&prompt, 0.3).await?;
  Ok(Generated::from_structured(out, PROMPT_VERSION, |o| o.solutions))
}
