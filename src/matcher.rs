//! Output pattern matching.
//!
//! Pulls group-1 payloads out of free-form build logs and lines two
//! extractions up index by index. Extraction is stateless: every call walks
//! the text from the start, so the same input always yields the same
//! sequence in the same order.

use crate::model::{MatchRule, Pattern};
use serde::Serialize;
use std::fmt::{self, Write as _};

/// Characters of searched text kept in a no-match diagnostic.
pub const SNIPPET_CHARS: usize = 200;

/// Which tool produced a piece of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Candidate,
    Reference,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Candidate => "candidate",
            Self::Reference => "reference",
        })
    }
}

/// A pattern that found nothing in the text it was given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Miss {
    pub side: Side,
    pub pattern: String,
    pub text_len: usize,
    pub snippet: String,
}

impl Miss {
    fn new(side: Side, pattern: &Pattern, text: &str) -> Self {
        Self {
            side,
            pattern: pattern.as_str().to_string(),
            text_len: text.len(),
            snippet: text.chars().take(SNIPPET_CHARS).collect(),
        }
    }
}

/// One index where the two capture sequences disagree.
///
/// `None` means that side has no element at this index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaptureDifference {
    pub index: usize,
    pub candidate: Option<String>,
    pub reference: Option<String>,
}

/// Result of applying a match rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum PatternCheck {
    /// Every side matched and, where compared, the captures agree.
    Matched { captures: usize },
    /// At least one side produced no match at all.
    NoMatch { misses: Vec<Miss> },
    /// Sequences have different lengths.
    LengthMismatch {
        candidate_len: usize,
        reference_len: usize,
        differences: Vec<CaptureDifference>,
    },
    /// Same length, different payloads.
    ValueMismatch { differences: Vec<CaptureDifference> },
}

impl PatternCheck {
    #[must_use]
    pub const fn passed(&self) -> bool {
        matches!(self, Self::Matched { .. })
    }

    #[must_use]
    pub const fn is_no_match(&self) -> bool {
        matches!(self, Self::NoMatch { .. })
    }

    /// Multi-line human description. Lists every difference.
    #[must_use]
    pub fn describe(&self) -> String {
        let mut out = String::new();
        match self {
            Self::Matched { captures } => {
                let _ = write!(out, "matched ({captures} captures)");
            }
            Self::NoMatch { misses } => {
                out.push_str("pattern did not match");
                for miss in misses {
                    let _ = write!(
                        out,
                        "\n  {} text ({} bytes) has no match for /{}/; starts with: {:?}",
                        miss.side, miss.text_len, miss.pattern, miss.snippet
                    );
                }
            }
            Self::LengthMismatch {
                candidate_len,
                reference_len,
                differences,
            } => {
                let _ = write!(
                    out,
                    "capture count differs: candidate {candidate_len}, reference {reference_len}"
                );
                write_differences(&mut out, differences);
            }
            Self::ValueMismatch { differences } => {
                let _ = write!(out, "{} captured values differ", differences.len());
                write_differences(&mut out, differences);
            }
        }
        out
    }
}

fn write_differences(out: &mut String, differences: &[CaptureDifference]) {
    for diff in differences {
        let _ = write!(
            out,
            "\n  [{}] candidate={:?} reference={:?}",
            diff.index, diff.candidate, diff.reference
        );
    }
}

/// Group-1 payload of every non-overlapping match, first to last.
///
/// A match whose group 1 did not participate contributes an empty string,
/// which keeps positions aligned between the two sides.
#[must_use]
pub fn extract(pattern: &Pattern, text: &str) -> Vec<String> {
    pattern
        .regex()
        .captures_iter(text)
        .map(|caps| {
            caps.get(1)
                .map_or_else(String::new, |m| m.as_str().to_string())
        })
        .collect()
}

/// Group 1 of the first match, if there is a match.
#[must_use]
pub fn first_capture(pattern: &Pattern, text: &str) -> Option<String> {
    pattern.regex().captures(text).map(|caps| {
        caps.get(1)
            .map_or_else(String::new, |m| m.as_str().to_string())
    })
}

/// Positional correlation: equal length and equal at every index.
#[must_use]
pub fn compare_positional(candidate: &[String], reference: &[String]) -> PatternCheck {
    let longest = candidate.len().max(reference.len());
    let differences: Vec<CaptureDifference> = (0..longest)
        .filter_map(|index| {
            let c = candidate.get(index);
            let r = reference.get(index);
            if c == r {
                None
            } else {
                Some(CaptureDifference {
                    index,
                    candidate: c.cloned(),
                    reference: r.cloned(),
                })
            }
        })
        .collect();

    if candidate.len() != reference.len() {
        PatternCheck::LengthMismatch {
            candidate_len: candidate.len(),
            reference_len: reference.len(),
            differences,
        }
    } else if differences.is_empty() {
        PatternCheck::Matched {
            captures: candidate.len(),
        }
    } else {
        PatternCheck::ValueMismatch { differences }
    }
}

/// Exactly one capture per side, compared for equality.
#[must_use]
pub fn check_single(
    candidate_pattern: &Pattern,
    candidate_text: &str,
    reference_pattern: &Pattern,
    reference_text: &str,
) -> PatternCheck {
    let candidate = first_capture(candidate_pattern, candidate_text);
    let reference = first_capture(reference_pattern, reference_text);

    match (candidate, reference) {
        (Some(c), Some(r)) if c == r => PatternCheck::Matched { captures: 1 },
        (Some(c), Some(r)) => PatternCheck::ValueMismatch {
            differences: vec![CaptureDifference {
                index: 0,
                candidate: Some(c),
                reference: Some(r),
            }],
        },
        (c, r) => {
            let mut misses = Vec::new();
            if c.is_none() {
                misses.push(Miss::new(Side::Candidate, candidate_pattern, candidate_text));
            }
            if r.is_none() {
                misses.push(Miss::new(Side::Reference, reference_pattern, reference_text));
            }
            PatternCheck::NoMatch { misses }
        }
    }
}

/// The text must match at least once.
#[must_use]
pub fn check_presence(pattern: &Pattern, text: &str, side: Side) -> PatternCheck {
    let count = pattern.regex().find_iter(text).count();
    if count == 0 {
        PatternCheck::NoMatch {
            misses: vec![Miss::new(side, pattern, text)],
        }
    } else {
        PatternCheck::Matched { captures: count }
    }
}

/// Apply a paired rule to the candidate and reference texts.
///
/// Rules are expected to be of the same kind (checked when scenarios are
/// validated). If they are not, the candidate rule's kind decides.
#[must_use]
pub fn evaluate_pair(
    candidate_rule: &MatchRule,
    candidate_text: &str,
    reference_rule: &MatchRule,
    reference_text: &str,
) -> PatternCheck {
    let reference_pattern = reference_rule.pattern();
    match candidate_rule {
        MatchRule::Presence(pattern) => {
            let mut misses = Vec::new();
            let mut total = 0;
            for (side, pat, text) in [
                (Side::Candidate, pattern, candidate_text),
                (Side::Reference, reference_pattern, reference_text),
            ] {
                match check_presence(pat, text, side) {
                    PatternCheck::Matched { captures } => total += captures,
                    PatternCheck::NoMatch { misses: found } => misses.extend(found),
                    _ => {}
                }
            }
            if misses.is_empty() {
                PatternCheck::Matched { captures: total }
            } else {
                PatternCheck::NoMatch { misses }
            }
        }
        MatchRule::Single(pattern) => {
            check_single(pattern, candidate_text, reference_pattern, reference_text)
        }
        MatchRule::Positional(pattern) => {
            let candidate = extract(pattern, candidate_text);
            let reference = extract(reference_pattern, reference_text);
            compare_positional(&candidate, &reference)
        }
    }
}

/// Apply a rule to the candidate alone (pattern-only scenarios).
///
/// Every kind must match at least once; capturing kinds report how many
/// payloads they found.
#[must_use]
pub fn evaluate_candidate(rule: &MatchRule, text: &str) -> PatternCheck {
    match rule {
        MatchRule::Presence(pattern) => check_presence(pattern, text, Side::Candidate),
        MatchRule::Single(pattern) | MatchRule::Positional(pattern) => {
            let captures = extract(pattern, text);
            if captures.is_empty() {
                PatternCheck::NoMatch {
                    misses: vec![Miss::new(Side::Candidate, pattern, text)],
                }
            } else {
                PatternCheck::Matched {
                    captures: captures.len(),
                }
            }
        }
    }
}
