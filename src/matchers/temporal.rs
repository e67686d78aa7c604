use chrono::{DateTime, Duration, Utc};

use super::format::message;
use super::{Inspect, MatchError, Matcher, Subject};

/// Compares points in time.
///
/// Subjects may be `chrono` times, RFC3339 strings or
/// `google.protobuf.Timestamp` messages. Comparators are `==`, `~`
/// (within the threshold, default one millisecond), `>`, `>=`, `<` and `<=`.
#[derive(Debug, Clone)]
pub struct BeTemporally {
    comparator: String,
    compare_to: DateTime<Utc>,
    threshold: Duration,
}

/// Compare a time against `compare_to` with `comparator`.
pub fn be_temporally(comparator: &str, compare_to: DateTime<Utc>) -> BeTemporally {
    BeTemporally {
        comparator: comparator.to_string(),
        compare_to,
        threshold: Duration::milliseconds(1),
    }
}

impl BeTemporally {
    /// Set the tolerance of the `~` comparator.
    pub fn with_threshold(mut self, threshold: Duration) -> Self {
        self.threshold = threshold;
        self
    }

    fn subject_time(subject: Subject<'_>) -> Result<DateTime<Utc>, MatchError> {
        match subject {
            Subject::Time(time) => Ok(time),
            Subject::Text(text) => DateTime::parse_from_rfc3339(text)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|source| MatchError::InvalidTime {
                    value: text.to_string(),
                    source,
                }),
            Subject::Message(message) => {
                match message.as_any().downcast_ref::<prost_types::Timestamp>() {
                    Some(ts) => timestamp_to_utc(ts).ok_or_else(|| MatchError::UnexpectedType {
                        matcher: "BeTemporally",
                        expected: "a representable timestamp",
                        actual: subject.render(),
                    }),
                    None => Err(unexpected(subject)),
                }
            },
            other => Err(unexpected(other)),
        }
    }
}

fn unexpected(subject: Subject<'_>) -> MatchError {
    MatchError::UnexpectedType {
        matcher: "BeTemporally",
        expected: "a time",
        actual: subject.render(),
    }
}

fn timestamp_to_utc(ts: &prost_types::Timestamp) -> Option<DateTime<Utc>> {
    let nanos = u32::try_from(ts.nanos).ok()?;
    DateTime::from_timestamp(ts.seconds, nanos)
}

impl<T: Inspect + ?Sized> Matcher<T> for BeTemporally {
    fn matches(&self, actual: &T) -> Result<bool, MatchError> {
        let time = Self::subject_time(actual.inspect())?;
        Ok(match self.comparator.as_str() {
            "==" => time == self.compare_to,
            "~" => (time - self.compare_to).abs() <= self.threshold,
            ">" => time > self.compare_to,
            ">=" => time >= self.compare_to,
            "<" => time < self.compare_to,
            "<=" => time <= self.compare_to,
            other => return Err(MatchError::UnknownComparator(other.to_string())),
        })
    }

    fn failure_message(&self, actual: &T) -> String {
        message(
            &actual.inspect().render(),
            &format!("to be {}", self.comparator),
            &self.compare_to.to_rfc3339(),
        )
    }

    fn negated_failure_message(&self, actual: &T) -> String {
        message(
            &actual.inspect().render(),
            &format!("not to be {}", self.comparator),
            &self.compare_to.to_rfc3339(),
        )
    }

    fn description(&self) -> String {
        format!("a time {} {}", self.comparator, self.compare_to.to_rfc3339())
    }
}
