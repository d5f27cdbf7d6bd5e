//! Per-category qualification rules.
//!
//! Pure functions of a candidate and its category's thresholds. Two rule
//! shapes are expressed by the same struct: "over" rules use an exclusive
//! minute bound and a set of low-scoring states, BTTS rules an inclusive
//! bound and `0-0` only.

use std::collections::BTreeSet;

use serde::Deserialize;

use crate::config::RulesConfig;
use crate::feed::models::MatchCandidate;

/// Earliest minute at which a match may qualify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MinuteBound {
    /// minute > n
    Exclusive(u16),
    /// minute >= n
    Inclusive(u16),
}

impl MinuteBound {
    pub fn admits(&self, minute: u16) -> bool {
        match *self {
            MinuteBound::Exclusive(n) => minute > n,
            MinuteBound::Inclusive(n) => minute >= n,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RuleConfig {
    pub min_probability: u8,
    pub minute_bound: MinuteBound,
    /// Scores in "H-A" form.
    pub allowed_scores: BTreeSet<String>,
}

impl RuleConfig {
    pub fn new(min_probability: u8, minute_bound: MinuteBound, scores: &[&str]) -> Self {
        Self {
            min_probability,
            minute_bound,
            allowed_scores: scores.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn qualifies(&self, candidate: &MatchCandidate) -> bool {
        candidate.probability >= self.min_probability
            && self.minute_bound.admits(candidate.minute)
            && self.allowed_scores.contains(&candidate.score.to_string())
    }
}

/// Rule lookup by candidate category.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: RulesConfig,
}

impl RuleSet {
    pub fn new(rules: RulesConfig) -> Self {
        Self { rules }
    }

    pub fn rule_for(&self, candidate: &MatchCandidate) -> &RuleConfig {
        self.rules.for_category(candidate.category)
    }

    pub fn qualifies(&self, candidate: &MatchCandidate) -> bool {
        self.rule_for(candidate).qualifies(candidate)
    }
}
