use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Prediction type tracked on its own forebet page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Over 2.5 goals.
    #[default]
    Over25,
    /// Both teams to score.
    Btts,
}

impl Category {
    /// Headline used in the alert text.
    pub fn headline(&self) -> &'static str {
        match self {
            Category::Over25 => "OVER 2.5",
            Category::Btts => "BTTS",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Over25 => write!(f, "OVER25"),
            Category::Btts => write!(f, "BTTS"),
        }
    }
}

/// Page content as returned by a source. Consumed by one extraction pass.
#[derive(Debug, Clone)]
pub struct RawDocument {
    /// Category URL or dataset key the content came from.
    pub source_id: String,
    pub category: Category,
    pub body: String,
    pub fetched_at: DateTime<Utc>,
}

impl RawDocument {
    pub fn new(source_id: impl Into<String>, category: Category, body: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            category,
            body: body.into(),
            fetched_at: Utc::now(),
        }
    }
}

/// Live score, home goals first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Score {
    pub home: u8,
    pub away: u8,
}

impl Score {
    /// Highest goal count per side accepted from page text.
    pub const MAX_GOALS: u8 = 20;

    pub fn new(home: u8, away: u8) -> Self {
        Self { home, away }
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.home, self.away)
    }
}

/// One extracted match row, prior to rule evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub display_name: String,
    /// 0..=130
    pub minute: u16,
    pub score: Score,
    /// 0..=100
    pub probability: u8,
    pub category: Category,
}

impl MatchCandidate {
    pub const MAX_MINUTE: u16 = 130;

    pub fn alert_key(&self) -> AlertKey {
        AlertKey::from(self)
    }
}

/// Deduplication identity of a qualifying candidate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AlertKey(String);

impl AlertKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&MatchCandidate> for AlertKey {
    fn from(c: &MatchCandidate) -> Self {
        AlertKey(format!(
            "{}|{}|{}|{}|{}",
            c.category, c.display_name, c.minute, c.score, c.probability
        ))
    }
}

impl fmt::Display for AlertKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
