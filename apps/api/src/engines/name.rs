//! Candidate name extraction.
//!
//! A deterministic heuristic over the leading lines of the CV: the name is
//! almost always the first short line of capitalized words. Confidence decays
//! the further down the document the match is found.

use crate::engines::NameGuess;

/// Name extraction needs at least this much text to be meaningful.
const MIN_TEXT_CHARS: usize = 50;

/// How many leading non-empty lines are scanned for a name.
const SCAN_LINES: usize = 10;

pub fn extract_candidate_name(cv_text: &str) -> NameGuess {
    if cv_text.trim().chars().count() < MIN_TEXT_CHARS {
        return NameGuess::unknown();
    }

    for (index, line) in cv_text
        .lines()
        .map(clean_line)
        .filter(|l| !l.is_empty())
        .take(SCAN_LINES)
        .enumerate()
    {
        if looks_like_name(&line) {
            return NameGuess {
                name: line,
                confidence: confidence_at(index),
            };
        }
    }

    NameGuess::unknown()
}

/// Confidence for a match on the nth scanned line: 0.9 on the first line,
/// decaying to a 0.3 floor.
fn confidence_at(line_index: usize) -> f64 {
    (0.9 - 0.08 * line_index as f64).max(0.3)
}

/// Strips markdown headers, label prefixes and surplus whitespace from a
/// candidate line.
fn clean_line(raw: &str) -> String {
    let mut cleaned = raw.trim().trim_start_matches('#').trim_start();

    for label in ["Name:", "Nom:", "Candidate:"] {
        if let Some(rest) = strip_prefix_ignore_case(cleaned, label) {
            cleaned = rest.trim_start();
        }
    }

    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    match text.get(..prefix.len()) {
        Some(head) if head.eq_ignore_ascii_case(prefix) => Some(&text[prefix.len()..]),
        _ => None,
    }
}

/// Lowercase connector words that may appear inside a name ("Bob van Dijk").
const NAME_PARTICLES: &[&str] = &[
    "van", "von", "de", "der", "den", "da", "di", "del", "la", "le", "bin", "al",
];

/// A plausible name line: two to four words made of letters (plus hyphens,
/// apostrophes and trailing dots), no digits or emails. First and last words
/// must be capitalized; inner words may be lowercase particles.
fn looks_like_name(line: &str) -> bool {
    if line.len() > 60 || line.contains('@') || line.chars().any(|c| c.is_ascii_digit()) {
        return false;
    }

    let words: Vec<&str> = line.split_whitespace().collect();
    if !(2..=4).contains(&words.len()) {
        return false;
    }

    let last = words.len() - 1;
    words.iter().enumerate().all(|(index, word)| {
        let mut chars = word.chars();
        let Some(first) = chars.next() else {
            return false;
        };
        if !chars.all(|c| c.is_alphabetic() || matches!(c, '-' | '\'' | '.')) {
            return false;
        }
        first.is_uppercase()
            || (index != 0 && index != last && NAME_PARTICLES.contains(word))
    })
}
