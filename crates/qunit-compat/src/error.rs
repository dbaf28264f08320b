//! Error taxonomy for the compatibility layer
//!
//! Three kinds of failure flow through this crate: assertion failures
//! (structured actual/expected mismatches that fail a single test), async
//! protocol violations (double-resume, over-resolution), and usage errors.
//! None of them are fatal to a run; every one propagates to the host
//! engine's per-test failure channel.

use serde_json::Value;
use thiserror::Error;

/// A failed assertion, carrying the structured detail the legacy API exposes
/// through its `log` event payload.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{message}")]
pub struct AssertionError {
    /// Human-readable failure message
    pub message: String,
    /// Value the assertion observed, when one exists
    pub actual: Option<Value>,
    /// Value the assertion wanted, when one exists
    pub expected: Option<Value>,
}

impl AssertionError {
    /// Create an assertion error with a message only
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            actual: None,
            expected: None,
        }
    }

    /// Create an assertion error carrying the observed and wanted values
    pub fn with_values(message: impl Into<String>, actual: Value, expected: Value) -> Self {
        Self {
            message: message.into(),
            actual: Some(actual),
            expected: Some(expected),
        }
    }
}

/// Violations of the legacy async completion protocols.
///
/// These are thrown errors that fail the current test; they are never
/// silently swallowed.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// `start()` was called with no stop/resume bridge pending
    #[error("start() called without a pending stop()")]
    StartWithoutStop,

    /// `start()` was called after the test already completed
    #[error("start() called after the test has already completed")]
    StartAfterCompletion,

    /// `stop()` was called after the test already completed
    #[error("stop() called after the test has already completed")]
    StopAfterCompletion,

    /// A deferred-arity done handle was invoked past its accepted call count
    #[error("resolve called too many times")]
    ResolvedTooManyTimes,

    /// An operation that requires a running test was called outside one
    #[error("no test is currently running")]
    NoActiveTest,
}

/// Umbrella error type returned by test bodies and interface operations.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CompatError {
    #[error(transparent)]
    Assertion(#[from] AssertionError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// What a settled-failed test records against itself in the host tree.
#[derive(Debug, Clone, PartialEq)]
pub struct FailureDetail {
    /// Failure message
    pub message: String,
    /// Observed value, if the failure was an assertion
    pub actual: Option<Value>,
    /// Wanted value, if the failure was an assertion
    pub expected: Option<Value>,
    /// Source location or stack context, when the host provides one
    pub source: Option<String>,
}

impl FailureDetail {
    /// Build a failure detail from a bare message
    pub fn from_message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            actual: None,
            expected: None,
            source: None,
        }
    }
}

impl From<CompatError> for FailureDetail {
    fn from(err: CompatError) -> Self {
        match err {
            CompatError::Assertion(a) => Self {
                message: a.message,
                actual: a.actual,
                expected: a.expected,
                source: None,
            },
            CompatError::Protocol(p) => Self::from_message(p.to_string()),
        }
    }
}
