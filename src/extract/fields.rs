//! Named extraction stages.
//!
//! Each stage looks at one normalized block of row text and returns `None`
//! when its field is absent or out of range. The pipeline in `extract`
//! chains them with `?`, so a block missing any field yields nothing.

use std::ops::Range;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;

use crate::feed::models::{MatchCandidate, Score};

lazy_static! {
    /// "18/10 20:00", "18/10/2026 20:00"
    pub(crate) static ref STAMP_RE: Regex =
        Regex::new(r"\b\d{1,2}/\d{1,2}(?:/\d{2,4})?\s+\d{1,2}:\d{2}\b").unwrap();
    static ref PERCENT_PAIR_RE: Regex = Regex::new(r"\b(\d{1,3})\s?%\s*(\d{1,3})\s?%").unwrap();
    static ref PERCENT_RE: Regex = Regex::new(r"\d{1,3}\s?%").unwrap();
    static ref DECIMAL_RE: Regex = Regex::new(r"\d+[.,]\d+").unwrap();
    // live score, optional halftime score in parentheses
    static ref SCORE_RE: Regex = Regex::new(
        r"\b(\d{1,2})\s?-\s?(\d{1,2})\b(?:\s*\(\s*\d{1,2}\s?-\s?\d{1,2}\s*\))?"
    ).unwrap();
    static ref MARKED_MINUTE_RE: Regex = Regex::new(r"\b(\d{1,3})\s?['’′]").unwrap();
    static ref INTEGER_RE: Regex = Regex::new(r"\b(\d{1,3})\b").unwrap();
    static ref FINISHED_RE: Regex = Regex::new(
        r"\bFT\b|(?i)\b(?:finished|finalizado|terminado|postponed|aplazado|suspendido)\b"
    ).unwrap();
}

/// Lowercased fragments specific to bot-protection interstitials. Generic
/// words such as "captcha" also show up on real pages (reCAPTCHA scripts,
/// login forms) and are not listed.
const CHALLENGE_MARKERS: &[&str] = &[
    "<title>just a moment",
    "just a moment...",
    "checking your browser",
    "cf-chl",
    "cf_chl",
    "attention required! | cloudflare",
    "verify you are human",
];

/// Longest display name kept in alerts and keys.
const MAX_NAME_CHARS: usize = 80;

/// Which score occurrence is authoritative when a block holds several.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScorePick {
    #[default]
    First,
    Last,
}

/// Whether `text` looks like an anti-bot challenge instead of content.
/// Text carrying a kickoff stamp has match rows and is never a challenge.
pub fn is_challenge(text: &str) -> bool {
    if STAMP_RE.is_match(text) {
        return false;
    }
    let lower = text.to_lowercase();
    CHALLENGE_MARKERS.iter().any(|m| lower.contains(m))
}

/// Collapse runs of whitespace into single spaces.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `Some(())` for rows that may still be in play.
pub fn live(text: &str) -> Option<()> {
    if FINISHED_RE.is_match(text) || is_challenge(text) {
        return None;
    }
    Some(())
}

/// Split a block into the leading name text and the remainder after the
/// date/time stamp. Without a stamp, the head runs up to the first digit.
pub fn split_at_stamp(text: &str) -> (&str, &str) {
    if let Some(m) = STAMP_RE.find(text) {
        return (&text[..m.start()], &text[m.end()..]);
    }
    let cut = text.find(|c: char| c.is_ascii_digit()).unwrap_or(text.len());
    (&text[..cut], &text[cut..])
}

pub fn display_name(head: &str) -> Option<String> {
    let name = head
        .trim()
        .trim_matches(|c: char| c == '-' || c == '|' || c == ':' || c.is_whitespace());
    if !name.chars().any(char::is_alphabetic) {
        return None;
    }
    Some(name.chars().take(MAX_NAME_CHARS).collect::<String>().trim_end().to_string())
}

/// Second value of the first adjacent percentage pair.
pub fn probability(tail: &str) -> Option<u8> {
    let caps = PERCENT_PAIR_RE.captures(tail)?;
    let first: u16 = caps[1].parse().ok()?;
    let second: u16 = caps[2].parse().ok()?;
    if first > 100 || second > 100 {
        return None;
    }
    u8::try_from(second).ok()
}

/// Live score and the byte range it occupies in `tail`.
pub fn score(tail: &str, pick: ScorePick) -> Option<(Score, Range<usize>)> {
    let mut found = SCORE_RE.captures_iter(tail).filter_map(|caps| {
        let home: u8 = caps[1].parse().ok()?;
        let away: u8 = caps[2].parse().ok()?;
        if home > Score::MAX_GOALS || away > Score::MAX_GOALS {
            return None;
        }
        let range = caps.get(0)?.range();
        Some((Score::new(home, away), range))
    });

    match pick {
        ScorePick::First => found.next(),
        ScorePick::Last => found.last(),
    }
}

/// Match minute. A marked minute (`67'`) anywhere wins; otherwise the last
/// plain integer in range before the score. Percentages and decimals are
/// masked out first so they are never mistaken for a minute.
pub fn minute(tail: &str, score_start: usize) -> Option<u16> {
    let in_range = |m: u16| m <= MatchCandidate::MAX_MINUTE;

    let marked = MARKED_MINUTE_RE
        .captures_iter(tail)
        .filter_map(|caps| caps[1].parse::<u16>().ok())
        .find(|m| in_range(*m));
    if marked.is_some() {
        return marked;
    }

    let before = mask(&mask(&tail[..score_start], &PERCENT_RE), &DECIMAL_RE);
    INTEGER_RE
        .captures_iter(&before)
        .filter_map(|caps| caps[1].parse::<u16>().ok())
        .filter(|m| *m >= 1 && in_range(*m))
        .last()
}

fn mask(text: &str, re: &Regex) -> String {
    re.replace_all(text, |caps: &regex::Captures| " ".repeat(caps[0].len()))
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_live_rejects_finished_rows() {
        assert!(live("Lanus Tigre FT 2-1").is_none());
        assert!(live("Lanus Tigre Finalizado 2-1").is_none());
        assert!(live("Lanus Tigre 2-1 67'").is_some());
    }

    #[test]
    fn test_live_rejects_challenge_text() {
        assert!(live("Just a moment... Checking your browser").is_none());
    }

    #[test]
    fn test_challenge_markers() {
        assert!(is_challenge("<title>Just a moment...</title>"));
        assert!(is_challenge("<form id=\"challenge-form\" action=\"/?__cf_chl_f_tk=x\">"));
        assert!(!is_challenge("<p>Please solve the captcha to log in</p>"));
    }

    #[test]
    fn test_rows_with_recaptcha_are_not_challenge() {
        let page = "<script src=\"https://www.google.com/recaptcha/api.js\"></script>\
                    <div class=\"rcnt\">Lanus - Tigre 18/10 20:00 45% 55% 0-1 31'</div>\
                    <p>Verify you are human to comment</p>";
        assert!(!is_challenge(page));
    }

    #[test]
    fn test_ft_only_matches_as_word() {
        // "Nottingham Forest" must not read as full time
        assert!(live("Nottingham FOREST - Leeds 18/10 20:00 40% 60% 0-0 35'").is_some());
    }

    #[test]
    fn test_split_at_stamp() {
        let (head, tail) = split_at_stamp("Lanus - Tigre 18/10 20:00 45% 55% 0-1 67'");
        assert_eq!(head.trim(), "Lanus - Tigre");
        assert_eq!(tail.trim(), "45% 55% 0-1 67'");
    }

    #[test]
    fn test_split_without_stamp_cuts_at_first_digit() {
        let (head, tail) = split_at_stamp("Lanus - Tigre 45% 55% 0-1");
        assert_eq!(head.trim(), "Lanus - Tigre");
        assert!(tail.starts_with("45%"));
    }

    #[test]
    fn test_display_name_requires_letters() {
        assert_eq!(display_name("  Lanus - Tigre  ").as_deref(), Some("Lanus - Tigre"));
        assert!(display_name(" - ").is_none());
        assert!(display_name("").is_none());
    }

    #[test]
    fn test_display_name_truncated() {
        let long = "A".repeat(200);
        assert_eq!(display_name(&long).unwrap().len(), MAX_NAME_CHARS);
    }

    #[test]
    fn test_probability_takes_second_of_first_pair() {
        assert_eq!(probability("45% 55% 0-1 30% 70%"), Some(55));
        assert_eq!(probability("45 % 55 %"), Some(55));
    }

    #[test]
    fn test_probability_requires_pair() {
        assert_eq!(probability("55% 0-1"), None);
        assert_eq!(probability("145% 155%"), None);
    }

    #[test]
    fn test_score_with_halftime() {
        let (score, _) = score("45% 55% 1 - 0 (0-0) 67'", ScorePick::First).unwrap();
        assert_eq!(score, Score::new(1, 0));
    }

    #[test]
    fn test_score_first_or_last() {
        let tail = "pred 2-1 live 0-0 35'";
        assert_eq!(score(tail, ScorePick::First).unwrap().0, Score::new(2, 1));
        assert_eq!(score(tail, ScorePick::Last).unwrap().0, Score::new(0, 0));
    }

    #[test]
    fn test_score_absent() {
        assert!(score("45% 55% 67'", ScorePick::First).is_none());
    }

    #[test]
    fn test_minute_marked_wins() {
        let tail = "45% 55% 12 0-1 67'";
        let (_, range) = score(tail, ScorePick::First).unwrap();
        assert_eq!(minute(tail, range.start), Some(67));
    }

    #[test]
    fn test_minute_last_integer_before_score() {
        let tail = "45% 55% 1.85 12 31 0-1";
        let (_, range) = score(tail, ScorePick::First).unwrap();
        assert_eq!(minute(tail, range.start), Some(31));
    }

    #[test]
    fn test_minute_ignores_percentages() {
        let tail = "45% 55% 0-1";
        let (_, range) = score(tail, ScorePick::First).unwrap();
        assert_eq!(minute(tail, range.start), None);
    }

    #[test]
    fn test_minute_out_of_range() {
        let tail = "45% 55% 0-1 200'";
        let (_, range) = score(tail, ScorePick::First).unwrap();
        assert_eq!(minute(tail, range.start), None);
    }

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("  a \n\t b  "), "a b");
    }
}
