//! Hints and pitfalls: leveled lists that depend only on the framing.

use serde::Deserialize;
use tracing::instrument;

use crate::domain::{Framing, LeveledText};
use crate::error::LlmError;
use crate::llm::{Llm, Schema};
use crate::util::fill_template;

use super::{check_levels, Generated, ProblemContext};

pub const HINTS_PROMPT_VERSION: u32 = 1;
pub const PITFALLS_PROMPT_VERSION: u32 = 1;

const HINTS_TEMPLATE: &str = r#"You write hints for a coding interview problem. They help a stuck early-career candidate move forward without handing over the answer.

The problem, restated as an engineering task:
{framing}

Write 3 to 5 hints ordered from general (level 1) to specific (highest level).
- Level 1 points at the kind of approach or data structure to think about.
- Middle levels narrow it down.
- The last hint states the key insight in words, still without code.
Make each hint specific to this problem and scale the depth to its difficulty. Never give the full solution or any code.

Respond with JSON of the form:
{"hints": [{"level": number, "text": string}]}

Problem title: {title}
Difficulty: {difficulty}
Problem statement:
{statement}
"#;

const PITFALLS_TEMPLATE: &str = r#"You list the mistakes candidates commonly make on a coding interview problem, phrased as direct warnings.

The problem, restated as an engineering task:
{framing}

Write 3 to 5 pitfalls ordered from most common (level 1) to most subtle (highest level).
- Low levels: misreading the task or missing a constraint.
- Middle levels: implementation slips such as off-by-one bounds or the wrong container.
- High levels: complexity traps, edge cases that break an otherwise correct solution, overflow.
Use an imperative voice ("Don't assume...", "Check that..."), say briefly why the mistake is wrong, stay specific to this problem and do not reveal the approach.

Respond with JSON of the form:
{"pitfalls": [{"level": number, "text": string}]}

Problem title: {title}
Difficulty: {difficulty}
Problem statement:
{statement}
"#;

#[derive(Debug, Deserialize)]
pub struct HintsOutput {
  pub hints: Vec<LeveledText>,
}

impl Schema for HintsOutput {
  const NAME: &'static str = "hints";

  fn validate(&self) -> Result<(), String> {
    check_levels(&self.hints, "hint")
  }
}

#[derive(Debug, Deserialize)]
pub struct PitfallsOutput {
  pub pitfalls: Vec<LeveledText>,
}

impl Schema for PitfallsOutput {
  const NAME: &'static str = "pitfalls";

  fn validate(&self) -> Result<(), String> {
    check_levels(&self.pitfalls, "pitfall")
  }
}

fn build(template: &str, ctx: &ProblemContext<'_>, framing: &Framing) -> String {
  let difficulty = ctx.difficulty();
  fill_template(
    template,
    &[
      ("framing", framing.canonical.as_str()),
      ("title", ctx.problem.title.as_str()),
      ("difficulty", difficulty.as_str()),
      ("statement", ctx.statement),
    ],
  )
}

#[instrument(level = "info", skip_all, fields(slug = %ctx.problem.title_slug))]
pub async fn generate_hints(
  llm: &Llm,
  ctx: &ProblemContext<'_>,
  framing: &Framing,
) -> Result<Generated<Vec<LeveledText>>, LlmError> {
  let out = llm.call_structured::<HintsOutput>(&build(HINTS_TEMPLATE, ctx, framing), 0.7).await?;
  Ok(Generated::from_structured(out, HINTS_PROMPT_VERSION, |o| o.hints))
}

#[instrument(level = "info", skip_all, fields(slug = %ctx.problem.title_slug))]
pub async fn generate_pitfalls(
  llm: &Llm,
  ctx: &ProblemContext<'_>,
  framing: &Framing,
) -> Result<Generated<Vec<LeveledText>>, LlmError> {
  let out = llm.call_structured::<PitfallsOutput>(&build(PITFALLS_TEMPLATE, ctx, framing), 0.7).await?;
  Ok(Generated::from_structured(out, PITFALLS_PROMPT_VERSION, |o| o.pitfalls))
}
