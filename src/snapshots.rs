//! Snapshot history pruning.
//!
//! A section's history keeps only meaningfully distinct edits: empty captures
//! are dropped, an exact repeat of the latest capture is dropped, and any
//! earlier capture whose every field is a prefix of the incoming one is
//! removed. Comparisons ignore surrounding whitespace.

use crate::session::{Snapshot, SnapshotData};

pub fn is_empty(data: &SnapshotData) -> bool {
  data.values().all(|v| v.trim().is_empty())
}

pub fn is_equal(a: &SnapshotData, b: &SnapshotData) -> bool {
  a.len() == b.len()
    && a.iter().all(|(k, v)| b.get(k).map(|o| o.trim() == v.trim()).unwrap_or(false))
}

/// True when `newer` carries everything `older` does.
pub fn is_subsumed_by(older: &SnapshotData, newer: &SnapshotData) -> bool {
  older.iter().all(|(k, v)| {
    newer
      .get(k)
      .map(|n| n.trim().starts_with(v.trim()))
      .unwrap_or_else(|| v.trim().is_empty())
  })
}

/// Push `incoming` onto `history`, applying the pruning rules.
/// Returns whether the snapshot was kept.
pub fn push(history: &mut Vec<Snapshot>, incoming: Snapshot) -> bool {
  if is_empty(&incoming.data) {
    return false;
  }
  if let Some(last) = history.last() {
    if is_equal(&last.data, &incoming.data) {
      return false;
    }
  }
  history.retain(|s| !is_subsumed_by(&s.data, &incoming.data));
  history.push(incoming);
  true
}

/// Reduce a raw, possibly redundant history to its minimal form.
pub fn prune(history: &[Snapshot]) -> Vec<Snapshot> {
  let mut out = Vec::with_capacity(history.len());
  for snap in history {
    push(&mut out, snap.clone());
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  fn snap(v: &str) -> Snapshot {
    Snapshot::new([("notes", v)])
  }

  #[test]
  fn prefix_and_duplicate_collapse_to_latest() {
    let pruned = prune(&[snap("a"), snap("ab"), snap("ab")]);
    assert_eq!(pruned, vec![snap("ab")]);
  }

  #[test]
  fn empty_snapshots_are_dropped() {
    let pruned = prune(&[snap("   "), Snapshot::new([("notes", ""), ("code", "\n")])]);
    assert!(pruned.is_empty());
  }

  #[test]
  fn rewrites_keep_distinct_history() {
    let pruned = prune(&[snap("use sorting"), snap("use a hash map"), snap("use a hash map, one pass")]);
    assert_eq!(pruned, vec![snap("use sorting"), snap("use a hash map, one pass")]);
  }

  #[test]
  fn subsumption_requires_every_field() {
    let older = Snapshot::new([("time", "O(n)"), ("space", "O(1)")]);
    let newer = Snapshot::new([("time", "O(n) because one pass"), ("space", "O(n)")]);
    assert!(!is_subsumed_by(&older.data, &newer.data));
    let pruned = prune(&[older.clone(), newer.clone()]);
    assert_eq!(pruned.len(), 2);
  }

  #[test]
  fn trailing_whitespace_does_not_defeat_dedup() {
    let mut history = vec![snap("abc")];
    assert!(!push(&mut history, snap("abc  \n")));
    assert_eq!(history.len(), 1);
  }
}
