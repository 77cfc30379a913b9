//! Domain models for problems and their layered, LLM-derived artifacts.
//!
//! `ProblemDetails` is the per-slug cache record. Its `source` half is fetched
//! once and only ever filled in; its `derived` half is a sparse bag of layers,
//! each guarded by a `LayerMeta` entry in `processing_meta.layers`.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum Difficulty {
  Easy,
  Medium,
  Hard,
}

impl fmt::Display for Difficulty {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      Difficulty::Easy => "Easy",
      Difficulty::Medium => "Medium",
      Difficulty::Hard => "Hard",
    };
    f.write_str(s)
  }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tag {
  pub id: String,
  pub name: String,
  pub slug: String,
}

/// Catalog entry. Written once at ingestion, read-only afterwards.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
  pub id: String,
  pub title: String,
  pub title_slug: String,
  pub difficulty: Difficulty,
  #[serde(default)]
  pub is_paid_only: bool,
  #[serde(default)]
  pub topic_tags: Vec<Tag>,
}

/// The fixed, ordered sections of a practice session.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SectionKey {
  ProblemUnderstanding,
  ApproachAndReasoning,
  AlgorithmDesign,
  Implementation,
  ComplexityAnalysis,
}

impl SectionKey {
  pub const ALL: [SectionKey; 5] = [
    SectionKey::ProblemUnderstanding,
    SectionKey::ApproachAndReasoning,
    SectionKey::AlgorithmDesign,
    SectionKey::Implementation,
    SectionKey::ComplexityAnalysis,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      SectionKey::ProblemUnderstanding => "problem_understanding",
      SectionKey::ApproachAndReasoning => "approach_and_reasoning",
      SectionKey::AlgorithmDesign => "algorithm_design",
      SectionKey::Implementation => "implementation",
      SectionKey::ComplexityAnalysis => "complexity_analysis",
    }
  }

  /// Human-readable grading category title.
  pub fn title(&self) -> &'static str {
    match self {
      SectionKey::ProblemUnderstanding => "Problem Understanding & Clarification",
      SectionKey::ApproachAndReasoning => "Approach & Reasoning",
      SectionKey::AlgorithmDesign => "Algorithm Design / Pseudocode",
      SectionKey::Implementation => "Implementation Correctness",
      SectionKey::ComplexityAnalysis => "Time & Space Complexity",
    }
  }
}

impl fmt::Display for SectionKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// One independently cached artifact of a problem.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "camelCase")]
pub enum LayerName {
  Framing,
  TestCases,
  EdgeCases,
  Hints,
  Pitfalls,
  Solutions,
  GradingCriteria,
}

impl LayerName {
  pub fn as_str(&self) -> &'static str {
    match self {
      LayerName::Framing => "framing",
      LayerName::TestCases => "testCases",
      LayerName::EdgeCases => "edgeCases",
      LayerName::Hints => "hints",
      LayerName::Pitfalls => "pitfalls",
      LayerName::Solutions => "solutions",
      LayerName::GradingCriteria => "gradingCriteria",
    }
  }
}

impl fmt::Display for LayerName {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Example {
  pub input: String,
  pub output: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub explanation: Option<String>,
}

/// Real-world restatement of the problem. `canonical` is always present;
/// the alternates are only kept when they add a distinct mental model.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Framing {
  pub canonical: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub backend: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub systems: Option<String>,
}

impl Framing {
  pub fn alternates(&self) -> impl Iterator<Item = &str> {
    [self.backend.as_deref(), self.systems.as_deref()]
      .into_iter()
      .flatten()
      .filter(|s| !s.trim().is_empty())
  }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
  pub input: String,
  pub expected_output: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub explanation: Option<String>,
}

/// A hint or pitfall. Lists are ordered by `level`, general to specific.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LeveledText {
  pub level: u32,
  pub text: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Solution {
  pub approach: String,
  pub explanation: String,
  pub algorithm: String,
  pub tradeoffs: String,
  pub time_complexity: String,
  pub space_complexity: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct GradingCriterion {
  pub category: SectionKey,
  pub description: String,
  pub rubric: String,
}

/// Raw problem material. Filled once; later writes only add missing pieces.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SourceContent {
  #[serde(default)]
  pub original_content: String,
  #[serde(default)]
  pub code_snippets: BTreeMap<String, String>,
  #[serde(default)]
  pub examples: Vec<Example>,
}

impl SourceContent {
  /// Append-only merge: existing values win.
  pub fn merge_missing(&mut self, incoming: SourceContent) {
    if self.original_content.trim().is_empty() {
      self.original_content = incoming.original_content;
    }
    for (lang, code) in incoming.code_snippets {
      self.code_snippets.entry(lang).or_insert(code);
    }
    if self.examples.is_empty() {
      self.examples = incoming.examples;
    }
  }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Derived {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub framing: Option<Framing>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub test_cases: Option<Vec<TestCase>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub edge_cases: Option<Vec<TestCase>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub hints: Option<Vec<LeveledText>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub pitfalls: Option<Vec<LeveledText>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub solutions: Option<Vec<Solution>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub grading_criteria: Option<Vec<GradingCriterion>>,
}

impl Derived {
  /// Shallow merge: every layer present in `partial` replaces ours.
  pub fn merge(&mut self, partial: Derived) {
    if partial.framing.is_some() {
      self.framing = partial.framing;
    }
    if partial.test_cases.is_some() {
      self.test_cases = partial.test_cases;
    }
    if partial.edge_cases.is_some() {
      self.edge_cases = partial.edge_cases;
    }
    if partial.hints.is_some() {
      self.hints = partial.hints;
    }
    if partial.pitfalls.is_some() {
      self.pitfalls = partial.pitfalls;
    }
    if partial.solutions.is_some() {
      self.solutions = partial.solutions;
    }
    if partial.grading_criteria.is_some() {
      self.grading_criteria = partial.grading_criteria;
    }
  }

  /// Whether the data slot for `layer` is populated.
  pub fn has(&self, layer: LayerName) -> bool {
    match layer {
      LayerName::Framing => self.framing.is_some(),
      LayerName::TestCases => self.test_cases.is_some(),
      LayerName::EdgeCases => self.edge_cases.is_some(),
      LayerName::Hints => self.hints.is_some(),
      LayerName::Pitfalls => self.pitfalls.is_some(),
      LayerName::Solutions => self.solutions.is_some(),
      LayerName::GradingCriteria => self.grading_criteria.is_some(),
    }
  }
}

/// Persisted per-layer status. Wire shape:
/// `{status: "processing", updatedAt}` or
/// `{status: "complete", updatedAt, model, promptVersion}`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LayerMeta {
  Processing {
    #[serde(rename = "updatedAt")]
    updated_at: i64,
  },
  Complete {
    #[serde(rename = "updatedAt")]
    updated_at: i64,
    model: String,
    #[serde(rename = "promptVersion")]
    prompt_version: u32,
  },
}

impl LayerMeta {
  pub fn updated_at(&self) -> i64 {
    match self {
      LayerMeta::Processing { updated_at } | LayerMeta::Complete { updated_at, .. } => *updated_at,
    }
  }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingMeta {
  #[serde(default)]
  pub schema_version: u32,
  #[serde(default)]
  pub layers: BTreeMap<LayerName, LayerMeta>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProblemDetails {
  pub title_slug: String,
  #[serde(default)]
  pub source: SourceContent,
  #[serde(default)]
  pub derived: Derived,
  #[serde(default)]
  pub processing_meta: ProcessingMeta,
}

impl ProblemDetails {
  pub fn new(title_slug: impl Into<String>) -> Self {
    Self {
      title_slug: title_slug.into(),
      source: SourceContent::default(),
      derived: Derived::default(),
      processing_meta: ProcessingMeta::default(),
    }
  }

  pub fn layer_meta(&self, layer: LayerName) -> Option<&LayerMeta> {
    self.processing_meta.layers.get(&layer)
  }
}
