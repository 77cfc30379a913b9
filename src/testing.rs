//! Test doubles and seeded state shared by the unit tests.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::config::Settings;
use crate::derive::{prompt_version_for, versioned};
use crate::domain::{
  Derived, Example, Framing, GradingCriterion, LayerMeta, LayerName, LeveledText, Problem, SectionKey, Solution,
  SourceContent, TestCase,
};
use crate::error::{AppError, LlmError, StoreError};
use crate::layers::LayerSet;
use crate::llm::{ChatMessage, JsonRequest, Llm, LlmClient, LlmPolicy, RawCompletion};
use crate::pipeline::polling::PollPolicy;
use crate::seeds::seed_problems;
use crate::source::ProblemSource;
use crate::state::AppState;
use crate::store::{MemoryStore, Stats, StatsStore};
use crate::util::now_millis;

pub const TWO_SUM_HTML: &str = "<p>Given an array of integers <code>nums</code>&nbsp;and an integer <code>target</code>, return <em>indices of the two numbers such that they add up to <code>target</code></em>.</p>\n<p><strong class=\"example\">Example 1:</strong></p>\n<pre><strong>Input:</strong> nums = [2,7,11,15], target = 9\n<strong>Output:</strong> [0,1]</pre>";

const MODEL: &str = "scripted-model";

fn default_json(schema: &str) -> Option<String> {
  let value = match schema {
    "framing" => json!({
      "canonical": "Write a function that takes a list of integers and a target and returns the indices of the two entries that sum to the target.",
      "backend": "null"
    }),
    "examples" => json!({
      "examples": [{ "input": "nums = [2,7,11,15], target = 9", "output": "[0,1]", "explanation": "nums[0] + nums[1] == 9" }]
    }),
    "cases" => json!({
      "testCases": [{ "input": "nums = [3,2,4], target = 6", "expectedOutput": "[1,2]" }],
      "edgeCases": [{ "input": "nums = [3,3], target = 6", "expectedOutput": "[0,1]", "description": "duplicates" }]
    }),
    "hints" => json!({ "hints": [
      { "level": 1, "text": "Think about what you need to remember while scanning." },
      { "level": 2, "text": "A lookup from value to index answers the complement question in O(1)." }
    ]}),
    "pitfalls" => json!({ "pitfalls": [
      { "level": 1, "text": "Using the same element twice." }
    ]}),
    "solutions" => json!({ "solutions": [{
      "approach": "Hash map",
      "explanation": "Store each value's index and look up the complement.",
      "algorithm": "for i, x in enumerate(nums): if target - x in seen: return [seen[target - x], i]; seen[x] = i",
      "tradeoffs": "O(n) extra space for one pass.",
      "timeComplexity": "O(n)",
      "spaceComplexity": "O(n)"
    }]}),
    "grading_criteria" => {
      let criteria: Vec<_> = SectionKey::ALL
        .iter()
        .map(|k| json!({ "category": k.as_str(), "description": format!("{} for two sum", k.title()), "rubric": "1: nothing; 3: partial; 5: complete" }))
        .collect();
      json!({ "gradingCriteria": criteria })
    }
    "section_feedback" => json!({
      "score": 3.5,
      "comments": "Asked about reuse of elements.",
      "compliments": "Clear restatement.",
      "advice": "Mention the empty input."
    }),
    "session_summary" => json!({
      "interviewerCommunication": { "score": 4, "comments": "Targeted questions.", "compliments": "", "advice": "" },
      "summary": "Solid understanding; implementation was not attempted."
    }),
    _ => return None,
  };
  Some(value.to_string())
}

/// Scripted `LlmClient`: queued responses per schema, then a valid default.
#[derive(Default)]
pub struct ScriptedLlm {
  queued: Mutex<HashMap<String, VecDeque<String>>>,
  chat: Mutex<VecDeque<String>>,
  failing: Mutex<BTreeSet<String>>,
  calls: Mutex<HashMap<String, usize>>,
  temperatures: Mutex<HashMap<String, Vec<f32>>>,
}

impl ScriptedLlm {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push_json(&self, schema: &str, text: &str) {
    self.queued.lock().unwrap().entry(schema.to_string()).or_default().push_back(text.to_string());
  }

  pub fn push_chat(&self, text: &str) {
    self.chat.lock().unwrap().push_back(text.to_string());
  }

  /// Every call for `schema` fails with a retryable provider error.
  pub fn fail_schema(&self, schema: &str) {
    self.failing.lock().unwrap().insert(schema.to_string());
  }

  pub fn calls(&self, schema: &str) -> usize {
    self.calls.lock().unwrap().get(schema).copied().unwrap_or(0)
  }

  pub fn total_calls(&self) -> usize {
    self.calls.lock().unwrap().values().sum()
  }

  /// Temperatures of the structured calls made for `schema`, in call order.
  pub fn temperatures(&self, schema: &str) -> Vec<f32> {
    self.temperatures.lock().unwrap().get(schema).cloned().unwrap_or_default()
  }

  fn record(&self, schema: &str) {
    *self.calls.lock().unwrap().entry(schema.to_string()).or_default() += 1;
  }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
  async fn complete_json(&self, req: &JsonRequest<'_>) -> Result<RawCompletion, LlmError> {
    self.record(req.schema);
    self.temperatures.lock().unwrap().entry(req.schema.to_string()).or_default().push(req.temperature);
    // Yield so concurrent callers interleave like real requests.
    tokio::task::yield_now().await;
    if self.failing.lock().unwrap().contains(req.schema) {
      return Err(LlmError::Http { status: 503, message: "scripted failure".into() });
    }
    let queued = self.queued.lock().unwrap().get_mut(req.schema).and_then(VecDeque::pop_front);
    let text = queued
      .or_else(|| default_json(req.schema))
      .ok_or_else(|| LlmError::EmptyResponse { schema: req.schema.to_string() })?;
    Ok(RawCompletion { text, model: MODEL.into() })
  }

  async fn complete_chat(&self, _messages: &[ChatMessage], _temperature: f32) -> Result<String, LlmError> {
    self.record("chat");
    let reply = self.chat.lock().unwrap().pop_front();
    Ok(reply.unwrap_or_else(|| "Go on.".into()))
  }
}

/// Canned problem source that counts fetches.
pub struct StaticSource {
  html: String,
  fetches: AtomicUsize,
}

impl StaticSource {
  pub fn new(html: &str) -> Self {
    Self { html: html.to_string(), fetches: AtomicUsize::new(0) }
  }

  pub fn fetches(&self) -> usize {
    self.fetches.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl ProblemSource for StaticSource {
  async fn fetch_problem_statement(&self, _slug: &str) -> Result<String, AppError> {
    self.fetches.fetch_add(1, Ordering::SeqCst);
    Ok(self.html.clone())
  }

  async fn fetch_code_snippets(&self, _slug: &str) -> Result<BTreeMap<String, String>, AppError> {
    self.fetches.fetch_add(1, Ordering::SeqCst);
    let mut out = BTreeMap::new();
    out.insert(
      "python3".to_string(),
      "class Solution:\n    def twoSum(self, nums: List[int], target: int) -> List[int]:\n        ".to_string(),
    );
    Ok(out)
  }
}

/// Stats store whose every call fails.
pub struct FailingStats;

#[async_trait]
impl StatsStore for FailingStats {
  async fn get(&self) -> Result<Stats, StoreError> {
    Err(StoreError::Conflict { collection: "stats", key: "global".into() })
  }

  async fn increment_session_count(&self) -> Result<(), StoreError> {
    Err(StoreError::Conflict { collection: "stats", key: "global".into() })
  }

  async fn increment_user_count(&self) -> Result<(), StoreError> {
    Err(StoreError::Conflict { collection: "stats", key: "global".into() })
  }
}

pub fn two_sum_problem() -> Problem {
  seed_problems().into_iter().find(|p| p.title_slug == "two-sum").expect("two-sum is seeded")
}

pub async fn test_state() -> (AppState, Arc<ScriptedLlm>) {
  let scripted = Arc::new(ScriptedLlm::new());
  let llm = Llm::new(scripted.clone(), LlmPolicy { timeout_secs: 5, max_attempts: 2, retry_base_ms: 0 });
  let settings = Settings { poll: PollPolicy::immediate(2), ..Default::default() };
  let state = AppState::with_parts(MemoryStore::new(), llm, Arc::new(StaticSource::new(TWO_SUM_HTML)), settings);
  state.seed_catalog().await.expect("seed catalog");
  (state, scripted)
}

/// Claim `layers` the normal way, then mark them complete at current versions.
async fn seed_layers(state: &AppState, slug: &str, derived: Derived, layers: &[LayerName]) {
  let set = LayerSet::new(&versioned(layers));
  state.details.claim_layers(slug, &set, Duration::from_secs(300)).await.expect("claim");
  state.details.update_derived(slug, derived).await.expect("derived");
  for layer in layers {
    let meta = LayerMeta::Complete {
      updated_at: now_millis(),
      model: MODEL.into(),
      prompt_version: prompt_version_for(*layer),
    };
    state.details.update_layer_meta(slug, *layer, meta).await.expect("meta");
  }
}

fn case(input: &str, expected: &str) -> TestCase {
  TestCase { input: input.into(), expected_output: expected.into(), description: None, explanation: None }
}

/// Source plus a complete framing layer.
pub async fn seed_previewed(state: &AppState, slug: &str) {
  let source = SourceContent {
    original_content: "Given an array of integers nums and an integer target, return indices of the two numbers such that they add up to target.".into(),
    code_snippets: [("python3".to_string(), "class Solution: ...".to_string())].into(),
    examples: vec![Example { input: "nums = [2,7,11,15], target = 9".into(), output: "[0,1]".into(), explanation: None }],
  };
  state.details.update_source(slug, source).await.expect("source");
  let framing = Framing {
    canonical: "Return the indices of the two entries that sum to the target.".into(),
    backend: None,
    systems: None,
  };
  seed_layers(state, slug, Derived { framing: Some(framing), ..Default::default() }, &[LayerName::Framing]).await;
}

/// Previewed plus every practice layer.
pub async fn seed_practiced(state: &AppState, slug: &str) {
  seed_previewed(state, slug).await;
  let derived = Derived {
    test_cases: Some(vec![case("nums = [3,2,4], target = 6", "[1,2]")]),
    edge_cases: Some(vec![case("nums = [3,3], target = 6", "[0,1]")]),
    hints: Some(vec![LeveledText { level: 1, text: "Remember what you have seen.".into() }]),
    pitfalls: Some(vec![LeveledText { level: 1, text: "Reusing one element.".into() }]),
    ..Default::default()
  };
  let layers = [LayerName::TestCases, LayerName::EdgeCases, LayerName::Hints, LayerName::Pitfalls];
  seed_layers(state, slug, derived, &layers).await;
}

/// Every layer, ready for session grading.
pub async fn seed_complete(state: &AppState, slug: &str) {
  seed_practiced(state, slug).await;
  let derived = Derived {
    solutions: Some(vec![Solution {
      approach: "Hash map".into(),
      explanation: "Look up each complement.".into(),
      algorithm: "one pass with a value -> index map".into(),
      tradeoffs: "O(n) space".into(),
      time_complexity: "O(n)".into(),
      space_complexity: "O(n)".into(),
    }]),
    grading_criteria: Some(
      SectionKey::ALL
        .iter()
        .map(|k| GradingCriterion {
          category: *k,
          description: format!("{} for {slug}", k.title()),
          rubric: "1: nothing; 3: partial; 5: complete".into(),
        })
        .collect(),
    ),
    ..Default::default()
  };
  seed_layers(state, slug, derived, &[LayerName::Solutions, LayerName::GradingCriteria]).await;
}
