//! Output comparison policies
//!
//! Sample mode compares the candidate against expected answers by integer
//! tokens only (`[0,1]` matches `0 1`). Stress mode expects the oracle and the
//! candidate to print in the same format and compares trimmed text exactly.

use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonStrategy {
    /// Trimmed outputs must be identical
    ExactTextEquality,
    /// The sequences of integers appearing in both outputs must be identical
    IntegerTokenEquality,
}

impl ComparisonStrategy {
    pub fn outputs_match(self, expected: &str, actual: &str) -> bool {
        match self {
            ComparisonStrategy::ExactTextEquality => expected.trim() == actual.trim(),
            ComparisonStrategy::IntegerTokenEquality => {
                integer_tokens(expected) == integer_tokens(actual)
            }
        }
    }
}

fn integer_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"-?\d+").expect("integer pattern is valid"))
}

/// Extract the ordered integers in `text`, normalized so that `007` equals `7`
/// and `-0` equals `0`
///
/// Tokens are kept as strings so arbitrarily large values compare exactly.
pub fn integer_tokens(text: &str) -> Vec<String> {
    integer_pattern()
        .find_iter(text)
        .map(|m| normalize_integer(m.as_str()))
        .collect()
}

fn normalize_integer(token: &str) -> String {
    let (negative, digits) = match token.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, token),
    };
    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        "0".to_string()
    } else if negative {
        format!("-{}", digits)
    } else {
        digits.to_string()
    }
}
