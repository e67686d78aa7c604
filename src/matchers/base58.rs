use regex::Regex;

use super::format::message;
use super::{Inspect, MatchError, Matcher, Subject};

const ALPHABET: &str = "1-9a-zABCDEFGHJKLMNPQRSTUVWXYZ";

/// Matches a one-character prefix followed by base58 characters, the shape
/// of IndyKite raw identifiers.
#[derive(Debug, Clone)]
pub struct Base58 {
    pattern: Regex,
}

/// Match base58 identifiers with at least `min` characters after the prefix.
///
/// A `min` of zero matches exactly one character after the prefix.
pub fn base58(min: usize) -> Base58 {
    let pattern = if min > 0 {
        format!("^.[{}]{{{},}}$", ALPHABET, min)
    } else {
        format!("^.[{}]$", ALPHABET)
    };
    Base58 {
        // The pattern is assembled from a fixed alphabet and a number.
        pattern: Regex::new(&pattern).expect("base58 pattern is valid"),
    }
}

impl<T: Inspect + ?Sized> Matcher<T> for Base58 {
    fn matches(&self, actual: &T) -> Result<bool, MatchError> {
        match actual.inspect() {
            Subject::Text(text) => Ok(self.pattern.is_match(text)),
            other => Err(MatchError::UnexpectedType {
                matcher: "Base58",
                expected: "a string",
                actual: other.render(),
            }),
        }
    }

    fn failure_message(&self, actual: &T) -> String {
        message(
            &actual.inspect().render(),
            "to match regular expression",
            self.pattern.as_str(),
        )
    }

    fn negated_failure_message(&self, actual: &T) -> String {
        message(
            &actual.inspect().render(),
            "not to match regular expression",
            self.pattern.as_str(),
        )
    }

    fn description(&self) -> String {
        format!("a base58 string matching {}", self.pattern.as_str())
    }
}
