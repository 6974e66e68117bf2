//! Sorted set storage: a member->score map plus a score-ordered index, so
//! `ZRANGE`/`ZRANK`-style reads don't need a full scan.

use std::collections::BTreeSet;

use bytes::Bytes;
use indexmap::IndexMap;
use ordered_float::OrderedFloat;

/// `(score, member)` ordering matches the wire contract: primary by
/// ascending score, secondary by ascending lexicographic member bytes.
type ScoreKey = (OrderedFloat<f64>, Bytes);

#[derive(Debug, Clone, Default)]
pub struct SortedSet {
    scores: IndexMap<Bytes, f64>,
    by_score: BTreeSet<ScoreKey>,
}

impl SortedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn score(&self, member: &[u8]) -> Option<f64> {
        self.scores.get(member).copied()
    }

    /// Inserts or updates `member`'s score. Returns `true` if the member
    /// was newly added (the count ZADD reports excludes score updates).
    pub fn insert(&mut self, member: Bytes, score: f64) -> bool {
        if let Some(old) = self.scores.get(&member).copied() {
            self.by_score.remove(&(OrderedFloat(old), member.clone()));
            self.by_score.insert((OrderedFloat(score), member.clone()));
            self.scores.insert(member, score);
            false
        } else {
            self.by_score.insert((OrderedFloat(score), member.clone()));
            self.scores.insert(member, score);
            true
        }
    }

    pub fn remove(&mut self, member: &[u8]) -> bool {
        if let Some((_, old)) = self.scores.shift_remove_entry(member) {
            self.by_score.remove(&(OrderedFloat(old), Bytes::copy_from_slice(member)));
            true
        } else {
            false
        }
    }

    /// Members in canonical (score, member) order.
    pub fn iter_ordered(&self) -> impl DoubleEndedIterator<Item = (&Bytes, f64)> {
        self.by_score.iter().map(|(s, m)| (m, s.0))
    }

    pub fn rank(&self, member: &[u8]) -> Option<usize> {
        let score = self.score(member)?;
        self.by_score
            .iter()
            .position(|(s, m)| s.0 == score && m.as_ref() == member)
    }

    pub fn range_by_score(&self, min: f64, max: f64) -> Vec<(Bytes, f64)> {
        self.by_score
            .iter()
            .filter(|(s, _)| s.0 >= min && s.0 <= max)
            .map(|(s, m)| (m.clone(), s.0))
            .collect()
    }

    pub fn count_by_score(&self, min: f64, max: f64) -> usize {
        self.by_score
            .iter()
            .filter(|(s, _)| s.0 >= min && s.0 <= max)
            .count()
    }

    pub fn remove_range_by_score(&mut self, min: f64, max: f64) -> usize {
        let doomed: Vec<Bytes> = self
            .by_score
            .iter()
            .filter(|(s, _)| s.0 >= min && s.0 <= max)
            .map(|(_, m)| m.clone())
            .collect();
        for m in &doomed {
            self.remove(m);
        }
        doomed.len()
    }
}

/// Renders a score the way the wire contract expects: the shortest
/// round-trip decimal, with no trailing `.0` for integral values.
pub fn format_score(score: f64) -> String {
    if score.fract() == 0.0 && score.is_finite() && score.abs() < 1e17 {
        let mut buf = itoa::Buffer::new();
        buf.format(score as i64).to_string()
    } else {
        let mut buf = ryu::Buffer::new();
        buf.format(score).to_string()
    }
}
