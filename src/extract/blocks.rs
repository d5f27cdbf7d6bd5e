//! Splitting a page into per-match text blocks.

use lazy_static::lazy_static;
use regex::Regex;
use scraper::{Html, Selector};

use super::fields::{normalize_whitespace, STAMP_RE};

lazy_static! {
    static ref SCRIPT_RE: Regex = Regex::new(r"(?is)<(script|style|noscript)\b.*?</(script|style|noscript)>").unwrap();
    static ref TAG_RE: Regex = Regex::new(r"(?s)<[^>]*>").unwrap();
    // where a row's data ends: a minute marker, a halftime score, or the
    // probability pair with an optional trailing score, then an optional FT
    static ref ROW_END_RE: Regex = Regex::new(
        r"(?:\b\d{1,3}\s?['’′]|\(\s*\d{1,2}\s?-\s?\d{1,2}\s*\)|%(?:\s*\d{1,2}\s?-\s?\d{1,2}\b)?)(?:\s*FT\b)?"
    ).unwrap();
}

/// Row text for every element matching `primary`, or `fallback` when the
/// primary selector finds nothing. Pages without either are split on their
/// date/time stamps instead.
pub fn split_blocks(html: &str, primary: &Selector, fallback: &Selector) -> Vec<String> {
    let document = Html::parse_document(html);

    for selector in [primary, fallback] {
        let rows: Vec<String> = document
            .select(selector)
            .map(|row| normalize_whitespace(&row.text().collect::<Vec<_>>().join(" ")))
            .filter(|text| !text.is_empty())
            .collect();
        if !rows.is_empty() {
            return rows;
        }
    }

    split_on_stamps(&strip_tags(html))
}

/// Visible text of a markup fragment.
pub fn strip_tags(html: &str) -> String {
    let without_scripts = SCRIPT_RE.replace_all(html, " ");
    let text = TAG_RE.replace_all(&without_scripts, " ");
    let decoded = text
        .replace("&nbsp;", " ")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&");
    normalize_whitespace(&decoded)
}

/// Cut flat text into blocks, each starting at the name run that precedes
/// a date/time stamp. The name run begins where the previous row's data
/// ends, so digits inside team names ("Schalke 04") stay with the name.
pub fn split_on_stamps(text: &str) -> Vec<String> {
    let stamps: Vec<(usize, usize)> = STAMP_RE.find_iter(text).map(|m| (m.start(), m.end())).collect();
    if stamps.is_empty() {
        return Vec::new();
    }

    let mut starts = Vec::with_capacity(stamps.len());
    let mut floor = 0;
    for &(stamp_start, stamp_end) in &stamps {
        let start = ROW_END_RE
            .find_iter(&text[floor..stamp_start])
            .last()
            .map(|m| floor + m.end())
            .unwrap_or(floor);
        starts.push(start);
        floor = stamp_end;
    }

    starts
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = starts.get(i + 1).copied().unwrap_or(text.len());
            normalize_whitespace(&text[start..end])
        })
        .filter(|block| !block.is_empty())
        .collect()
}
