//! Test and edge cases. Both layers come out of a single call.

use serde::Deserialize;
use tracing::instrument;

use crate::domain::{Example, Framing, TestCase};
use crate::error::LlmError;
use crate::llm::{Llm, Schema};
use crate::util::fill_template;

use super::{format_examples, Generated, ProblemContext};

pub const PROMPT_VERSION: u32 = 1;

const TEMPLATE: &str = r#"You write test cases for a coding interview problem. Candidates will run them against their own implementation while practicing.

The problem, restated as an engineering task:
{framing}

Produce two groups:
- "testCases": 3 to 5 typical inputs that exercise the main behaviour.
- "edgeCases": 3 to 5 boundary inputs (empty, single element, extremes, duplicates, anything candidates usually get wrong).
Every case needs "input" (the function arguments as text) and "expectedOutput" (the correct return value as text).
"description" is an optional 2-4 word noun phrase such as "Single element array". "explanation" is an optional sentence on why the output is right. Use null when omitted.
No case may repeat a statement example or appear in both groups. All inputs must respect the original constraints.
{examples}
Respond with JSON of the form:
{"testCases": [{"input": string, "expectedOutput": string, "description": string | null, "explanation": string | null}],
 "edgeCases": [{"input": string, "expectedOutput": string, "description": string | null, "explanation": string | null}]}

Problem title: {title}
Problem statement:
{statement}
"#;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CasesOutput {
  pub test_cases: Vec<TestCase>,
  pub edge_cases: Vec<TestCase>,
}

impl Schema for CasesOutput {
  const NAME: &'static str = "cases";
  const NULLABLE: &'static [&'static str] = &["description", "explanation"];

  fn validate(&self) -> Result<(), String> {
    if self.test_cases.is_empty() || self.edge_cases.is_empty() {
      return Err("both testCases and edgeCases must be non-empty".into());
    }
    let blank = |c: &TestCase| c.input.trim().is_empty() || c.expected_output.trim().is_empty();
    if self.test_cases.iter().chain(&self.edge_cases).any(blank) {
      return Err("case with empty input or expectedOutput".into());
    }
    Ok(())
  }
}

pub fn build_prompt(ctx: &ProblemContext<'_>, framing: &Framing, examples: &[Example]) -> String {
  let examples_block = if examples.is_empty() {
    String::new()
  } else {
    format!("\nStatement examples (do not repeat these):\n{}\n", format_examples(examples))
  };
  fill_template(
    TEMPLATE,
    &[
      ("framing", framing.canonical.as_str()),
      ("examples", examples_block.as_str()),
      ("title", ctx.problem.title.as_str()),
      ("statement", ctx.statement),
    ],
  )
}

#[instrument(level = "info", skip_all, fields(slug = %ctx.problem.title_slug))]
pub async fn generate(
  llm: &Llm,
  ctx: &ProblemContext<'_>,
  framing: &Framing,
  examples: &[Example],
) -> Result<Generated<CasesOutput>, LlmError> {
  let out = llm.call_structured::<CasesOutput>(&build_prompt(ctx, framing, examples), 0.4).await?;
  Ok(Generated::from_structured(out, PROMPT_VERSION, |c| c))
}
