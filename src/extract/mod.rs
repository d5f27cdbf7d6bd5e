//! Candidate extraction from forebet prediction pages.
//!
//! A page is cut into per-match blocks (`blocks`), then each block runs
//! through the field stages in `fields`. Blocks that miss any field are
//! dropped; partial candidates are never produced.

pub mod blocks;
pub mod fields;

use anyhow::{anyhow, Result};
use scraper::Selector;
use tracing::{debug, warn};

use crate::config::ExtractionConfig;
use crate::feed::models::{Category, MatchCandidate, RawDocument};

pub use fields::{is_challenge, ScorePick};

pub struct Extractor {
    row_selector: Selector,
    fallback_selector: Selector,
    score_pick: ScorePick,
}

impl Extractor {
    pub fn new(config: &ExtractionConfig) -> Result<Self> {
        Ok(Self {
            row_selector: parse_selector(&config.row_selector)?,
            fallback_selector: parse_selector(&config.fallback_selector)?,
            score_pick: config.score_pick,
        })
    }

    /// Split `doc` into blocks. Candidates are produced lazily from the
    /// returned value and can be iterated any number of times.
    pub fn extract(&self, doc: &RawDocument) -> Candidates {
        if is_challenge(&doc.body) {
            warn!(source = %doc.source_id, "Anti-bot challenge page, nothing to extract");
            return Candidates::empty(doc.category, self.score_pick);
        }

        let blocks = blocks::split_blocks(&doc.body, &self.row_selector, &self.fallback_selector);
        debug!(source = %doc.source_id, blocks = blocks.len(), "Page split into blocks");

        Candidates {
            blocks,
            category: doc.category,
            score_pick: self.score_pick,
        }
    }
}

fn parse_selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("Invalid CSS selector '{css}': {e}"))
}

/// Per-match text blocks of one page.
#[derive(Debug, Clone)]
pub struct Candidates {
    blocks: Vec<String>,
    category: Category,
    score_pick: ScorePick,
}

impl Candidates {
    fn empty(category: Category, score_pick: ScorePick) -> Self {
        Self {
            blocks: Vec::new(),
            category,
            score_pick,
        }
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = MatchCandidate> + '_ {
        self.blocks.iter().filter_map(move |block| {
            let candidate = extract_block(block, self.category, self.score_pick);
            if candidate.is_none() {
                debug!(block = %block, "Block dropped, incomplete fields");
            }
            candidate
        })
    }
}

/// Run every stage over one block.
pub fn extract_block(text: &str, category: Category, pick: ScorePick) -> Option<MatchCandidate> {
    fields::live(text)?;
    let (head, tail) = fields::split_at_stamp(text);
    let display_name = fields::display_name(head)?;
    let probability = fields::probability(tail)?;
    let (score, range) = fields::score(tail, pick)?;
    let minute = fields::minute(tail, range.start)?;

    Some(MatchCandidate {
        display_name,
        minute,
        score,
        probability,
        category,
    })
}
