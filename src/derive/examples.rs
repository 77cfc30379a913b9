//! Example extraction: pull the worked examples out of the statement text.
//! Runs once in the preview stage; the result lands in the append-only source.

use serde::Deserialize;
use tracing::instrument;

use crate::domain::Example;
use crate::error::LlmError;
use crate::llm::{Llm, Schema};
use crate::util::fill_template;

use super::{Generated, ProblemContext};

pub const PROMPT_VERSION: u32 = 1;

const TEMPLATE: &str = r#"Copy the worked examples out of the coding problem statement below.

- Only return examples that literally appear in the statement; never make one up.
- Do not solve the problem.
- Keep the input and output text as close to the original formatting as possible.
- Include the explanation when the statement gives one, otherwise use null.
- If the statement has no examples, return an empty list.

Respond with JSON of the form:
{"examples": [{"input": string, "output": string, "explanation": string | null}]}

Problem title:
{title}

Problem statement:
{statement}
"#;

#[derive(Debug, Deserialize)]
pub struct ExamplesOutput {
  pub examples: Vec<Example>,
}

impl Schema for ExamplesOutput {
  const NAME: &'static str = "examples";
  const NULLABLE: &'static [&'static str] = &["explanation"];

  fn validate(&self) -> Result<(), String> {
    if self.examples.iter().any(|e| e.input.trim().is_empty() || e.output.trim().is_empty()) {
      return Err("example with empty input or output".into());
    }
    Ok(())
  }
}

pub fn build_prompt(ctx: &ProblemContext<'_>) -> String {
  fill_template(TEMPLATE, &[("title", ctx.problem.title.as_str()), ("statement", ctx.statement)])
}

#[instrument(level = "info", skip_all, fields(slug = %ctx.problem.title_slug))]
pub async fn extract(llm: &Llm, ctx: &ProblemContext<'_>) -> Result<Generated<Vec<Example>>, LlmError> {
  let out = llm.call_structured::<ExamplesOutput>(&build_prompt(ctx), 0.0).await?;
  Ok(Generated::from_structured(out, PROMPT_VERSION, |o| o.examples))
}
