//! Framing layer: restate the problem as a real engineering task.

use tracing::instrument;

use crate::domain::{Example, Framing};
use crate::error::LlmError;
use crate::llm::{Llm, Schema};
use crate::util::fill_template;

use super::{format_examples, Generated, ProblemContext};

pub const PROMPT_VERSION: u32 = 3;

const TEMPLATE: &str = r#"You restate coding interview problems as everyday software engineering work for early-career engineers.

Write up to three framings of the problem below. All of them describe the same underlying algorithmic task.
- Use entirely your own wording. Do not reuse sentences, identifiers or phrasing from the original.
- The candidate still writes a single function, so phrase every framing as "write a function that ..." in some engineering context.
- "canonical" is required.
- "backend" and "systems" are optional. Include one only if it offers a genuinely different mental model with its own vocabulary; otherwise leave it out.
- Keep every constraint of the original: input bounds, complexity requirements, guarantees the candidate may rely on.
- Keep the exact mathematical relationship. If the original asks for an exact sum or match, the framing must too; never relax equality into a bound.
- Briefly define any domain term the candidate may not know.
- Do not include input/output formats or examples and do not hint at the solution.
- Separate the constraints into their own paragraph using \n.

Respond with JSON of the form:
{"canonical": string, "backend": string | null, "systems": string | null}

Problem title: {title}
Difficulty: {difficulty}
{examples}
Problem statement:
{statement}
"#;

impl Schema for Framing {
  const NAME: &'static str = "framing";
  const NULLABLE: &'static [&'static str] = &["backend", "systems"];

  fn validate(&self) -> Result<(), String> {
    if self.canonical.trim().is_empty() {
      return Err("canonical framing is empty".into());
    }
    Ok(())
  }
}

pub fn build_prompt(ctx: &ProblemContext<'_>, examples: &[Example]) -> String {
  let examples_block = if examples.is_empty() {
    String::new()
  } else {
    format!("\nExamples:\n{}\n", format_examples(examples))
  };
  let difficulty = ctx.difficulty();
  fill_template(
    TEMPLATE,
    &[
      ("title", ctx.problem.title.as_str()),
      ("difficulty", difficulty.as_str()),
      ("examples", examples_block.as_str()),
      ("statement", ctx.statement),
    ],
  )
}

#[instrument(level = "info", skip_all, fields(slug = %ctx.problem.title_slug))]
pub async fn generate(llm: &Llm, ctx: &ProblemContext<'_>, examples: &[Example]) -> Result<Generated<Framing>, LlmError> {
  let out = llm.call_structured::<Framing>(&build_prompt(ctx, examples), 0.7).await?;
  Ok(Generated::from_structured(out, PROMPT_VERSION, |mut f| {
    // Blank alternates are the same as absent ones.
    f.backend = f.backend.filter(|s| !s.trim().is_empty());
    f.systems = f.systems.filter(|s| !s.trim().is_empty());
    f
  }))
}
