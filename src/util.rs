//! Small utility helpers used across modules.

use std::sync::OnceLock;

use regex::Regex;

/// Very small and safe string templating.
/// Replaces `{key}` with the matching value in a single pass; inserted values
/// are never rescanned, and braces that name no key are kept verbatim.
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = String::with_capacity(tpl.len());
  let mut rest = tpl;
  while let Some(open) = rest.find('{') {
    out.push_str(&rest[..open]);
    let after = &rest[open + 1..];
    let hit = after.find('}').and_then(|close| {
      let key = &after[..close];
      pairs.iter().find(|(k, _)| *k == key).map(|(_, v)| (close, *v))
    });
    match hit {
      Some((close, value)) => {
        out.push_str(value);
        rest = &after[close + 1..];
      }
      None => {
        out.push('{');
        rest = after;
      }
    }
  }
  out.push_str(rest);
  out
}

/// Milliseconds since the Unix epoch; the unit of every persisted timestamp.
pub fn now_millis() -> i64 {
  chrono::Utc::now().timestamp_millis()
}

/// Log-safe truncation for large strings.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.chars().count() <= max {
    s.to_string()
  } else {
    let head: String = s.chars().take(max).collect();
    format!("{}… ({} bytes total)", head, s.len())
  }
}

/// Remove a single wrapping markdown code fence (```json ... ```), if any.
pub fn strip_code_fences(raw: &str) -> &str {
  let trimmed = raw.trim();
  let Some(rest) = trimmed.strip_prefix("```") else {
    return trimmed;
  };
  // Drop the optional language tag on the opening fence line.
  let body = match rest.find('\n') {
    Some(idx) if rest[..idx].trim().chars().all(|c| c.is_ascii_alphanumeric()) => &rest[idx + 1..],
    _ => rest,
  };
  body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

fn html_patterns() -> &'static [Regex; 3] {
  static PATTERNS: OnceLock<[Regex; 3]> = OnceLock::new();
  PATTERNS.get_or_init(|| {
    [
      Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</(script|style)>").expect("static regex"),
      Regex::new(r"(?s)</?[^>]+>").expect("static regex"),
      Regex::new(r"\s+").expect("static regex"),
    ]
  })
}

/// Reduce problem HTML to plain text: drop script/style blocks, strip tags,
/// collapse whitespace.
pub fn strip_html(html: &str) -> String {
  let [blocks, tags, spaces] = html_patterns();
  let text = blocks.replace_all(html, "");
  let text = tags.replace_all(&text, "");
  let text = decode_entities(&text);
  spaces.replace_all(&text, " ").trim().to_string()
}

fn decode_entities(s: &str) -> String {
  s.replace("&nbsp;", " ")
    .replace("&lt;", "<")
    .replace("&gt;", ">")
    .replace("&quot;", "\"")
    .replace("&#39;", "'")
    .replace("&amp;", "&")
}
