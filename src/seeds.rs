//! Built-in catalog entries so the service is usable without a config file.

use crate::domain::{Difficulty, Problem, Tag};

fn tag(id: &str, name: &str, slug: &str) -> Tag {
  Tag { id: id.into(), name: name.into(), slug: slug.into() }
}

/// A handful of well-known problems across difficulties.
pub fn seed_problems() -> Vec<Problem> {
  vec![
    Problem {
      id: "1".into(),
      title: "Two Sum".into(),
      title_slug: "two-sum".into(),
      difficulty: Difficulty::Easy,
      is_paid_only: false,
      topic_tags: vec![tag("VG9waWNUYWdOb2RlOjU=", "Array", "array"), tag("VG9waWNUYWdOb2RlOjY=", "Hash Table", "hash-table")],
    },
    Problem {
      id: "20".into(),
      title: "Valid Parentheses".into(),
      title_slug: "valid-parentheses".into(),
      difficulty: Difficulty::Easy,
      is_paid_only: false,
      topic_tags: vec![tag("VG9waWNUYWdOb2RlOjEw", "String", "string"), tag("VG9waWNUYWdOb2RlOjE1", "Stack", "stack")],
    },
    Problem {
      id: "3".into(),
      title: "Longest Substring Without Repeating Characters".into(),
      title_slug: "longest-substring-without-repeating-characters".into(),
      difficulty: Difficulty::Medium,
      is_paid_only: false,
      topic_tags: vec![tag("VG9waWNUYWdOb2RlOjEw", "String", "string"), tag("VG9waWNUYWdOb2RlOjU1ODIx", "Sliding Window", "sliding-window")],
    },
    Problem {
      id: "42".into(),
      title: "Trapping Rain Water".into(),
      title_slug: "trapping-rain-water".into(),
      difficulty: Difficulty::Hard,
      is_paid_only: false,
      topic_tags: vec![tag("VG9waWNUYWdOb2RlOjU=", "Array", "array"), tag("VG9waWNUYWdOb2RlOjk=", "Two Pointers", "two-pointers")],
    },
  ]
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn seed_slugs_are_unique() {
    let mut slugs: Vec<String> = seed_problems().into_iter().map(|p| p.title_slug).collect();
    let n = slugs.len();
    slugs.sort();
    slugs.dedup();
    assert_eq!(slugs.len(), n);
  }
}
