//! Problem source boundary: raw statement and starter code for a slug.
//!
//! `LeetCodeSource` talks to the public GraphQL endpoint. Statement HTML is
//! returned as-is; callers reduce it to text with `util::strip_html`.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, instrument};

use crate::error::AppError;

pub const LEETCODE_GRAPHQL: &str = "https://leetcode.com/graphql";

const CONTENT_QUERY: &str = "query questionContent($titleSlug: String!) { question(titleSlug: $titleSlug) { content } }";
const SNIPPETS_QUERY: &str =
  "query questionEditorData($titleSlug: String!) { question(titleSlug: $titleSlug) { codeSnippets { lang langSlug code } } }";

#[async_trait]
pub trait ProblemSource: Send + Sync {
  /// Raw statement (HTML for LeetCode).
  async fn fetch_problem_statement(&self, slug: &str) -> Result<String, AppError>;

  /// Starter code keyed by language slug.
  async fn fetch_code_snippets(&self, slug: &str) -> Result<BTreeMap<String, String>, AppError>;
}

#[derive(Clone)]
pub struct LeetCodeSource {
  client: reqwest::Client,
  endpoint: String,
}

impl LeetCodeSource {
  pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, AppError> {
    let client = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| AppError::Source(e.to_string()))?;
    Ok(Self { client, endpoint: endpoint.into() })
  }

  async fn query(&self, query: &str, slug: &str) -> Result<Value, AppError> {
    let body = GraphQlRequest { query, variables: json!({ "titleSlug": slug }) };
    let res = self
      .client
      .post(&self.endpoint)
      .header(USER_AGENT, "flowcode-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .json(&body)
      .send()
      .await
      .map_err(|e| AppError::Source(e.to_string()))?;
    if !res.status().is_success() {
      return Err(AppError::Source(format!("GraphQL HTTP {}", res.status())));
    }
    let v: Value = res.json().await.map_err(|e| AppError::Source(e.to_string()))?;
    match v.pointer("/data/question") {
      Some(q) if !q.is_null() => Ok(q.clone()),
      _ => Err(AppError::ProblemNotFound(slug.to_string())),
    }
  }
}

#[derive(Serialize)]
struct GraphQlRequest<'a> {
  query: &'a str,
  variables: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
  lang_slug: String,
  code: String,
}

fn snippets_from(question: &Value) -> Result<BTreeMap<String, String>, AppError> {
  let raw = question.get("codeSnippets").cloned().unwrap_or(Value::Null);
  if raw.is_null() {
    return Ok(BTreeMap::new());
  }
  let list: Vec<Snippet> = serde_json::from_value(raw).map_err(|e| AppError::Source(e.to_string()))?;
  Ok(list.into_iter().map(|s| (s.lang_slug, s.code)).collect())
}

#[async_trait]
impl ProblemSource for LeetCodeSource {
  #[instrument(level = "info", skip(self))]
  async fn fetch_problem_statement(&self, slug: &str) -> Result<String, AppError> {
    let q = self.query(CONTENT_QUERY, slug).await?;
    let content = q.get("content").and_then(Value::as_str).unwrap_or_default().to_string();
    if content.trim().is_empty() {
      return Err(AppError::Source(format!("empty statement for {slug}")));
    }
    info!(target: "source", %slug, content_len = content.len(), "Statement fetched");
    Ok(content)
  }

  #[instrument(level = "info", skip(self))]
  async fn fetch_code_snippets(&self, slug: &str) -> Result<BTreeMap<String, String>, AppError> {
    let q = self.query(SNIPPETS_QUERY, slug).await?;
    let snippets = snippets_from(&q)?;
    info!(target: "source", %slug, langs = snippets.len(), "Code snippets fetched");
    Ok(snippets)
  }
}
