//! Use [`Matcher`]s as `mockall` argument predicates.

use std::fmt;
use std::sync::{Mutex, PoisonError};

use predicates::reflection::PredicateReflection;
use predicates::Predicate;

use super::{Inspect, Matcher};

/// A [`Matcher`] exposed as a [`Predicate`].
///
/// The last evaluated argument is kept so the failure description printed
/// by `mockall` can show what was actually passed.
pub struct WrapMatcher<M, T> {
    matcher: M,
    actual: Mutex<Option<T>>,
}

/// Wrap `matcher` for use in `mockall`'s `.with(...)`.
pub fn wrap_matcher<M, T>(matcher: M) -> WrapMatcher<M, T>
where
    M: Matcher<Option<T>>,
{
    WrapMatcher {
        matcher,
        actual: Mutex::new(None),
    }
}

impl<M, T> WrapMatcher<M, T>
where
    M: Matcher<Option<T>>,
{
    /// The wrapped matcher.
    pub fn matcher(&self) -> &M {
        &self.matcher
    }
}

impl<M, T> Predicate<T> for WrapMatcher<M, T>
where
    M: Matcher<Option<T>>,
    T: Inspect + Clone,
{
    fn eval(&self, variable: &T) -> bool {
        let mut actual = self.actual.lock().unwrap_or_else(PoisonError::into_inner);
        *actual = Some(variable.clone());
        self.matcher.matches(&*actual).unwrap_or(false)
    }
}

impl<M, T> PredicateReflection for WrapMatcher<M, T>
where
    M: Matcher<Option<T>>,
    T: Inspect,
{
}

impl<M, T> fmt::Display for WrapMatcher<M, T>
where
    M: Matcher<Option<T>>,
    T: Inspect,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let actual = self.actual.lock().unwrap_or_else(PoisonError::into_inner);
        write!(
            f,
            "Wrapped matcher fail message: {}",
            self.matcher.failure_message(&*actual)
        )
    }
}

impl<M: fmt::Debug, T> fmt::Debug for WrapMatcher<M, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WrapMatcher")
            .field("matcher", &self.matcher)
            .finish_non_exhaustive()
    }
}

/// Turn `matcher` into a closure for `mockall`'s `.withf(...)`.
///
/// Match errors count as a mismatch.
pub fn matched_by<M, T>(matcher: M) -> impl Fn(&T) -> bool + Send + Sync + 'static
where
    M: Matcher<T> + Send + Sync + 'static,
    T: ?Sized + 'static,
{
    move |actual| matcher.matches(actual).unwrap_or(false)
}
