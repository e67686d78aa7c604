//! Assertion matchers for tests and mock expectations.
//!
//! A [`Matcher`] answers whether a value matches and renders failure
//! messages for both outcomes. [`EqualProto`] compares protobuf messages
//! structurally and unwraps `google.protobuf.Any` payloads on the way.
//!
//! `mockall` expects [`predicates::Predicate`] implementations for argument
//! checks, so [`WrapMatcher`] adapts any matcher into one:
//!
//! ```ignore
//! client
//!     .expect_create_application()
//!     .with(wrap_matcher(equal_proto(CreateApplicationRequest {
//!         project_id: "gid:AAAAAmluZHlraURlgAABDwAAAAA".to_string(),
//!         name: "acme".to_string(),
//!         ..Default::default()
//!     })))
//!     .returning(|_| Ok(Application::default()));
//! ```

mod adapter;
mod base58;
mod format;
mod json;
mod proto;
mod temporal;

use std::fmt;

use chrono::{DateTime, FixedOffset, Utc};
use thiserror::Error;

pub use adapter::{matched_by, wrap_matcher, WrapMatcher};
pub use base58::{base58, Base58};
pub use format::{message, message_with_diff};
pub use json::{is_json, IsJson};
pub use proto::{equal_proto, EqualProto, ProtoMessage, TypeRegistry};
pub use temporal::{be_temporally, BeTemporally};

/// Errors raised while matching, as opposed to a plain mismatch.
#[derive(Debug, Error)]
pub enum MatchError {
    /// Both sides of an equality are absent.
    #[error("Refusing to compare <nil> to <nil>.\nBe explicit and check for absence instead. This is to avoid mistakes where both sides of an assertion are erroneously uninitialized.")]
    NilComparison,

    /// The matcher does not support the subject's type.
    #[error("{matcher} matcher expects {expected}. Got:\n{actual}")]
    UnexpectedType {
        /// Matcher name.
        matcher: &'static str,
        /// What the matcher accepts.
        expected: &'static str,
        /// Rendering of the subject.
        actual: String,
    },

    /// An `Any` payload names a type the registry does not know.
    #[error("type URL {0:?} is not registered")]
    UnregisteredType(String),

    /// An `Any` payload does not decode as the type it names.
    #[error("failed to decode {type_url}: {source}")]
    Decode {
        /// Type URL of the payload.
        type_url: String,
        /// Decoder error.
        #[source]
        source: prost::DecodeError,
    },

    /// A time comparator other than `==`, `~`, `>`, `>=`, `<` and `<=`.
    #[error("unknown comparator {0:?}")]
    UnknownComparator(String),

    /// A string subject is not an RFC3339 time.
    #[error("{value:?} is not an RFC3339 time: {source}")]
    InvalidTime {
        /// The offending string.
        value: String,
        /// Parser error.
        #[source]
        source: chrono::ParseError,
    },
}

/// A value as seen by a matcher.
#[derive(Clone, Copy)]
pub enum Subject<'a> {
    /// An absent value.
    Nil,
    /// A protobuf message.
    Message(&'a dyn ProtoMessage),
    /// A string.
    Text(&'a str),
    /// Raw bytes.
    Bytes(&'a [u8]),
    /// A point in time.
    Time(DateTime<Utc>),
    /// Anything else, kept for rendering.
    Other {
        /// Rust type name of the value.
        type_name: &'static str,
        /// The value itself.
        value: &'a dyn fmt::Debug,
    },
}

impl Subject<'_> {
    /// Render the subject with its type, one level deep.
    pub fn render(&self) -> String {
        match self {
            Self::Nil => "<nil>: nil".to_string(),
            Self::Message(m) => format!("<{}>: {:#?}", m.message_name(), m),
            Self::Text(s) => format!("<string>: {:?}", s),
            Self::Bytes(b) => format!("<bytes>: {:?}", b),
            Self::Time(t) => format!("<time>: {}", t.to_rfc3339()),
            Self::Other { type_name, value } => format!("<{}>: {:?}", type_name, value),
        }
    }
}

impl fmt::Debug for Subject<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Exposes a value to matchers.
pub trait Inspect {
    /// View the value as a [`Subject`].
    fn inspect(&self) -> Subject<'_>;
}

impl<T: Inspect + ?Sized> Inspect for &T {
    fn inspect(&self) -> Subject<'_> {
        (**self).inspect()
    }
}

impl<T: Inspect + ?Sized> Inspect for Box<T> {
    fn inspect(&self) -> Subject<'_> {
        (**self).inspect()
    }
}

impl<T: Inspect + ?Sized> Inspect for std::sync::Arc<T> {
    fn inspect(&self) -> Subject<'_> {
        (**self).inspect()
    }
}

impl<T: Inspect> Inspect for Option<T> {
    fn inspect(&self) -> Subject<'_> {
        match self {
            Some(value) => value.inspect(),
            None => Subject::Nil,
        }
    }
}

impl Inspect for str {
    fn inspect(&self) -> Subject<'_> {
        Subject::Text(self)
    }
}

impl Inspect for String {
    fn inspect(&self) -> Subject<'_> {
        Subject::Text(self)
    }
}

impl Inspect for [u8] {
    fn inspect(&self) -> Subject<'_> {
        Subject::Bytes(self)
    }
}

impl Inspect for Vec<u8> {
    fn inspect(&self) -> Subject<'_> {
        Subject::Bytes(self)
    }
}

impl Inspect for DateTime<Utc> {
    fn inspect(&self) -> Subject<'_> {
        Subject::Time(*self)
    }
}

impl Inspect for DateTime<FixedOffset> {
    fn inspect(&self) -> Subject<'_> {
        Subject::Time(self.with_timezone(&Utc))
    }
}

/// Implement [`Inspect`] for protobuf message types.
#[macro_export]
macro_rules! impl_inspect_message {
    ($($ty:ty),* $(,)?) => {
        $(
            impl $crate::matchers::Inspect for $ty {
                fn inspect(&self) -> $crate::matchers::Subject<'_> {
                    $crate::matchers::Subject::Message(self)
                }
            }
        )*
    };
}

/// Implement [`Inspect`] for types matchers only render.
#[macro_export]
macro_rules! impl_inspect_other {
    ($($ty:ty),* $(,)?) => {
        $(
            impl $crate::matchers::Inspect for $ty {
                fn inspect(&self) -> $crate::matchers::Subject<'_> {
                    $crate::matchers::Subject::Other {
                        type_name: ::std::any::type_name::<$ty>(),
                        value: self,
                    }
                }
            }
        )*
    };
}

impl_inspect_other!(bool, i32, i64, u32, u64, f64, serde_json::Value);

/// A value matcher with failure rendering.
pub trait Matcher<T: ?Sized> {
    /// Whether `actual` matches. Errors mean the comparison itself failed.
    fn matches(&self, actual: &T) -> Result<bool, MatchError>;

    /// Message for an expected match that did not happen.
    fn failure_message(&self, actual: &T) -> String;

    /// Message for an unexpected match.
    fn negated_failure_message(&self, actual: &T) -> String;

    /// Describe what the matcher expects.
    fn description(&self) -> String;
}
