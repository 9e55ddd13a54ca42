//! Turning free-form model output into typed rows.

use regex::Regex;
use std::sync::OnceLock;

use super::GenerationError;
use crate::record::IncidentScore;

/// `Label: impact, likelihood` with a digit-free label and single-digit scores.
const SCORED_LINE: &str = r"^([^\d:]+):\s*([0-9]),\s*([0-9])$";

fn scored_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(SCORED_LINE).expect("scored line pattern compiles"))
}

fn enumeration_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?:[-*•]+\s*|\d+[.)]\s*)").expect("enumeration pattern compiles"))
}

/// Parse one line of scored output. Lines that do not match exactly are
/// rejected, never repaired.
pub fn parse_scored_line(line: &str) -> Option<IncidentScore> {
    let caps = scored_line_regex().captures(line)?;
    let label = caps.get(1)?.as_str().trim();
    if label.is_empty() {
        return None;
    }
    let impact = caps.get(2)?.as_str().parse::<u8>().ok()?;
    let likelihood = caps.get(3)?.as_str().parse::<u8>().ok()?;
    Some(IncidentScore::new(label, impact, likelihood))
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedText<T> {
    pub accepted: Vec<T>,
    pub lines: usize,
}

/// Accepted triples in line order. No deduplication.
pub fn parse_scored_text(text: &str) -> ParsedText<IncidentScore> {
    let mut lines = 0usize;
    let mut accepted = Vec::new();
    for line in text.trim().lines() {
        lines += 1;
        if let Some(score) = parse_scored_line(line) {
            accepted.push(score);
        }
    }
    ParsedText { accepted, lines }
}

/// Parse one line of label-only output: list markers are stripped, and lines
/// that are blank or still carry digits are dropped.
pub fn parse_label_line(line: &str) -> Option<String> {
    let trimmed = line.trim();
    let label = enumeration_regex().replace(trimmed, "");
    let label = label.trim();
    if label.is_empty() || label.chars().any(|c| c.is_numeric()) {
        return None;
    }
    Some(label.to_string())
}

pub fn parse_label_text(text: &str) -> ParsedText<String> {
    let mut lines = 0usize;
    let mut accepted = Vec::new();
    for line in text.trim().lines() {
        lines += 1;
        if let Some(label) = parse_label_line(line) {
            accepted.push(label);
        }
    }
    ParsedText { accepted, lines }
}

/// Pad `accepted` to `n` by cycling through the accepted rows in order, then
/// truncate to `n`.
///
/// Fails with [`GenerationError::NoUsableOutput`] when nothing was accepted
/// and padding would be needed.
pub fn backfill<T: Clone>(accepted: Vec<T>, n: usize, lines: usize) -> Result<Vec<T>, GenerationError> {
    let k = accepted.len();
    if k >= n {
        let mut out = accepted;
        out.truncate(n);
        return Ok(out);
    }
    if k == 0 {
        return Err(GenerationError::NoUsableOutput { lines });
    }
    let mut out = accepted;
    out.reserve(n - k);
    while out.len() < n {
        let next = out[out.len() % k].clone();
        out.push(next);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_plain_line() {
        assert_eq!(
            parse_scored_line("Pressure Ulcer: 4, 5"),
            Some(IncidentScore::new("Pressure Ulcer", 4, 5))
        );
        assert_eq!(
            parse_scored_line("  Equipment Failure :5,3"),
            Some(IncidentScore::new("Equipment Failure", 5, 3))
        );
    }

    #[test]
    fn test_rejects_numbered_and_wide_lines() {
        assert_eq!(parse_scored_line("3. Fall Incident: 10, 11"), None);
        assert_eq!(parse_scored_line("Fall Incident: 10, 11"), None);
        assert_eq!(parse_scored_line("Fall Incident: 4, 5 "), None);
        assert_eq!(parse_scored_line("Fall Incident: 4"), None);
        assert_eq!(parse_scored_line("Fall Incident 4, 5"), None);
        assert_eq!(parse_scored_line("   : 4, 5"), None);
        assert_eq!(parse_scored_line("Incident Type: Impact, Likelihood"), None);
    }

    #[test]
    fn test_parse_text_counts_lines_and_keeps_order() {
        let text = "Here you go:\nFall: 2, 3\nBurn: 4, 4\n\nFall: 2, 3\n";
        let parsed = parse_scored_text(text);
        assert_eq!(parsed.lines, 5);
        assert_eq!(
            parsed.accepted,
            vec![
                IncidentScore::new("Fall", 2, 3),
                IncidentScore::new("Burn", 4, 4),
                IncidentScore::new("Fall", 2, 3),
            ]
        );
    }

    #[test]
    fn test_crlf_lines() {
        let parsed = parse_scored_text("Fall: 2, 3\r\nBurn: 1, 1\r\n");
        assert_eq!(parsed.accepted.len(), 2);
    }

    #[test]
    fn test_label_lines() {
        assert_eq!(parse_label_line("  Medication Error "), Some("Medication Error".to_string()));
        assert_eq!(parse_label_line("1. Patient Fall"), Some("Patient Fall".to_string()));
        assert_eq!(parse_label_line("- Wrong Site Surgery"), Some("Wrong Site Surgery".to_string()));
        assert_eq!(parse_label_line("42"), None);
        assert_eq!(parse_label_line("   "), None);
        assert_eq!(parse_label_line("Code 99 Event"), None);
    }

    #[test]
    fn test_backfill_cycles_in_order() {
        let out = backfill(vec!['a', 'b', 'c'], 8, 3).unwrap();
        assert_eq!(out, vec!['a', 'b', 'c', 'a', 'b', 'c', 'a', 'b']);
    }

    #[test]
    fn test_backfill_truncates_surplus() {
        let out = backfill(vec![1, 2, 3, 4, 5], 2, 5).unwrap();
        assert_eq!(out, vec![1, 2]);
    }

    #[test]
    fn test_backfill_counts_are_balanced() {
        for k in 1..6usize {
            for n in k..30usize {
                let accepted: Vec<usize> = (0..k).collect();
                let out = backfill(accepted, n, k).unwrap();
                assert_eq!(out.len(), n);
                for v in 0..k {
                    let count = out.iter().filter(|x| **x == v).count();
                    assert!(count >= n / k, "k={} n={} v={} count={}", k, n, v, count);
                }
            }
        }
    }

    #[test]
    fn test_backfill_without_accepted_rows_fails() {
        let err = backfill(Vec::<u8>::new(), 3, 7).unwrap_err();
        assert!(matches!(err, GenerationError::NoUsableOutput { lines: 7 }));
    }
}
