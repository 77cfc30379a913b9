//! Derivation functions: one per cached layer.
//!
//! Each takes the problem plus the upstream artifacts it depends on and
//! returns validated data tagged with the model and the prompt version that
//! produced it. Idempotence is the cache's job, not theirs.

pub mod cases;
pub mod examples;
pub mod framing;
pub mod grading;
pub mod guidance;
pub mod solutions;

use crate::domain::{Example, LayerName, Problem, Solution, TestCase};
use crate::llm::Structured;

/// Output of a derivation function.
#[derive(Clone, Debug)]
pub struct Generated<T> {
  pub data: T,
  pub model: String,
  pub prompt_version: u32,
}

impl<T> Generated<T> {
  pub(crate) fn from_structured<S>(out: Structured<S>, prompt_version: u32, f: impl FnOnce(S) -> T) -> Self {
    Self { data: f(out.data), model: out.model, prompt_version }
  }
}

/// Current prompt version for a layer; a stored layer older than this is regenerated.
pub fn prompt_version_for(layer: LayerName) -> u32 {
  match layer {
    LayerName::Framing => framing::PROMPT_VERSION,
    LayerName::TestCases | LayerName::EdgeCases => cases::PROMPT_VERSION,
    LayerName::Hints => guidance::HINTS_PROMPT_VERSION,
    LayerName::Pitfalls => guidance::PITFALLS_PROMPT_VERSION,
    LayerName::Solutions => solutions::PROMPT_VERSION,
    LayerName::GradingCriteria => grading::PROMPT_VERSION,
  }
}

/// `(layer, current prompt version)` pairs for a stage's layer list.
pub fn versioned(layers: &[LayerName]) -> Vec<(LayerName, u32)> {
  layers.iter().map(|l| (*l, prompt_version_for(*l))).collect()
}

/// Problem fields every prompt starts from.
#[derive(Clone, Copy, Debug)]
pub struct ProblemContext<'a> {
  pub problem: &'a Problem,
  pub statement: &'a str,
}

impl<'a> ProblemContext<'a> {
  pub fn new(problem: &'a Problem, statement: &'a str) -> Self {
    Self { problem, statement }
  }

  pub fn difficulty(&self) -> String {
    self.problem.difficulty.to_string()
  }
}

pub(crate) fn format_examples(examples: &[Example]) -> String {
  examples
    .iter()
    .enumerate()
    .map(|(i, e)| format!("  {}. Input: {} -> Output: {}", i + 1, e.input, e.output))
    .collect::<Vec<_>>()
    .join("\n")
}

pub(crate) fn format_cases(cases: &[TestCase]) -> String {
  let mut out = Vec::with_capacity(cases.len());
  for (i, tc) in cases.iter().enumerate() {
    let mut entry = format!("  {}. Input: {} -> Expected: {}", i + 1, tc.input, tc.expected_output);
    if let Some(d) = &tc.description {
      entry.push_str(&format!("\n     ({d})"));
    }
    if let Some(x) = &tc.explanation {
      entry.push_str(&format!("\n     Why: {x}"));
    }
    out.push(entry);
  }
  out.join("\n")
}

pub(crate) fn format_solutions(solutions: &[Solution]) -> String {
  solutions
    .iter()
    .enumerate()
    .map(|(i, s)| {
      format!(
        "  {}. {}\n     Time: {}\n     Space: {}\n     Explanation: {}\n     Tradeoffs: {}",
        i + 1,
        s.approach,
        s.time_complexity,
        s.space_complexity,
        s.explanation,
        s.tradeoffs
      )
    })
    .collect::<Vec<_>>()
    .join("\n\n")
}

/// Levels must run general to specific, never backwards.
pub(crate) fn check_levels(items: &[crate::domain::LeveledText], what: &str) -> Result<(), String> {
  if items.is_empty() {
    return Err(format!("{what} list is empty"));
  }
  if items.iter().any(|i| i.text.trim().is_empty()) {
    return Err(format!("{what} entry has empty text"));
  }
  if items.windows(2).any(|w| w[1].level < w[0].level) {
    return Err(format!("{what} levels are not ordered"));
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::LeveledText;

  #[test]
  fn case_listing_includes_optional_labels() {
    let cases = vec![TestCase {
      input: "nums = [3,3], target = 6".into(),
      expected_output: "[0,1]".into(),
      description: Some("Duplicate values".into()),
      explanation: None,
    }];
    let text = format_cases(&cases);
    assert!(text.contains("1. Input: nums = [3,3], target = 6 -> Expected: [0,1]"));
    assert!(text.contains("(Duplicate values)"));
    assert!(!text.contains("Why:"));
  }

  #[test]
  fn levels_must_not_decrease() {
    let ok = vec![LeveledText { level: 1, text: "a".into() }, LeveledText { level: 2, text: "b".into() }];
    assert!(check_levels(&ok, "hint").is_ok());
    let bad = vec![LeveledText { level: 2, text: "a".into() }, LeveledText { level: 1, text: "b".into() }];
    assert!(check_levels(&bad, "hint").is_err());
    assert!(check_levels(&[], "hint").is_err());
  }

  #[test]
  fn both_case_layers_share_one_prompt_version() {
    assert_eq!(prompt_version_for(LayerName::TestCases), prompt_version_for(LayerName::EdgeCases));
  }
}
