use super::format::message;
use super::{Inspect, MatchError, Matcher, Subject};

/// Matches strings and bytes holding a JSON document.
#[derive(Debug, Clone, Copy, Default)]
pub struct IsJson;

/// Match strings and bytes holding a JSON document.
pub fn is_json() -> IsJson {
    IsJson
}

impl<T: Inspect + ?Sized> Matcher<T> for IsJson {
    fn matches(&self, actual: &T) -> Result<bool, MatchError> {
        let bytes = match actual.inspect() {
            Subject::Text(text) => text.as_bytes(),
            Subject::Bytes(bytes) => bytes,
            other => {
                return Err(MatchError::UnexpectedType {
                    matcher: "IsJson",
                    expected: "a string or bytes",
                    actual: other.render(),
                })
            },
        };
        Ok(serde_json::from_slice::<serde_json::Value>(bytes).is_ok())
    }

    fn failure_message(&self, actual: &T) -> String {
        message(&actual.inspect().render(), "to be", "JSON")
    }

    fn negated_failure_message(&self, actual: &T) -> String {
        message(&actual.inspect().render(), "not to be", "JSON")
    }

    fn description(&self) -> String {
        "a JSON document".to_string()
    }
}
