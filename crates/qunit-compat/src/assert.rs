//! Assertion adapter
//!
//! Wraps the comparison backend behind the legacy API's named assertion
//! methods. Every method increments the per-invocation assertion counter
//! before delegating, and failures surface as structured errors the host
//! records against the current test.
//!
//! A fresh adapter is created for every test invocation and never shared
//! across invocations, so counters and the step log cannot leak between
//! tests. The interface also keeps one detached adapter around as the
//! default `assert` reference, usable outside a running test.

use std::cell::{Cell, RefCell};
use std::error::Error;
use std::rc::Rc;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::backend;
use crate::bridge::Done;
use crate::error::{AssertionError, CompatError, ProtocolError};
use crate::host::suite::{ModuleContext, SharedContext};
use crate::host::Test;

/// The generic low-level assertion payload, the escape hatch other helpers
/// can be built on.
#[derive(Debug, Clone, PartialEq)]
pub struct AssertionResult {
    pub result: bool,
    pub actual: Value,
    pub expected: Value,
    pub message: String,
}

/// What `throws` should match the raised error against.
///
/// A tagged sum decided once at the call boundary rather than sniffing the
/// argument shape at runtime.
pub enum ThrowsExpectation {
    /// A predicate over the raised error
    Matches(Box<dyn Fn(&dyn Error) -> bool>),
    /// The raised error's description must contain this substring
    MessageContains(String),
    /// The raised error's description must match this pattern
    MessagePattern(Regex),
}

/// Per-test-invocation assertion state and methods.
pub struct Assert {
    test: Option<Rc<Test>>,
    context: SharedContext,
    num_assertions: Cell<usize>,
    expected_assertions: Cell<Option<usize>>,
    steps: RefCell<Vec<String>>,
}

fn to_value<T: Serialize>(value: T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

impl Assert {
    /// Adapter bound to a running test, sharing the module's context.
    pub(crate) fn for_test(test: Rc<Test>, context: SharedContext) -> Rc<Self> {
        Rc::new(Self {
            test: Some(test),
            context,
            num_assertions: Cell::new(0),
            expected_assertions: Cell::new(None),
            steps: RefCell::new(Vec::new()),
        })
    }

    /// Adapter with no test binding; the interface's default `assert`.
    pub(crate) fn detached() -> Rc<Self> {
        Rc::new(Self {
            test: None,
            context: Rc::new(RefCell::new(ModuleContext::new())),
            num_assertions: Cell::new(0),
            expected_assertions: Cell::new(None),
            steps: RefCell::new(Vec::new()),
        })
    }

    /// The shared per-module context of the test this adapter is bound to.
    pub fn context(&self) -> SharedContext {
        self.context.clone()
    }

    /// Assertions performed so far in this invocation.
    pub fn num_assertions(&self) -> usize {
        self.num_assertions.get()
    }

    fn count(&self) {
        self.num_assertions.set(self.num_assertions.get() + 1);
    }

    fn failure(
        &self,
        message: Option<&str>,
        detail: String,
        actual: Option<Value>,
        expected: Option<Value>,
    ) -> CompatError {
        let message = match message {
            Some(prefix) => format!("{prefix}: {detail}"),
            None => detail,
        };
        CompatError::Assertion(AssertionError {
            message,
            actual,
            expected,
        })
    }

    /// Record how many assertions this invocation must perform.
    pub fn expect(&self, count: usize) {
        self.expected_assertions.set(Some(count));
    }

    /// The recorded expected-assertion count, if one was set.
    pub fn expected(&self) -> Option<usize> {
        self.expected_assertions.get()
    }

    /// Check the expected-assertion invariant at test completion.
    pub fn verify_expects(&self, require_expects: bool) -> Result<(), CompatError> {
        match self.expected_assertions.get() {
            None if require_expects => Err(AssertionError::new(
                "Expected number of assertions to be defined, but expect() was not called.",
            )
            .into()),
            Some(expected) if expected != self.num_assertions.get() => {
                Err(AssertionError::new(format!(
                    "Expected {expected} assertions, but {} were run",
                    self.num_assertions.get()
                ))
                .into())
            }
            _ => Ok(()),
        }
    }

    pub fn ok<T: Serialize>(&self, state: T, message: Option<&str>) -> Result<(), CompatError> {
        self.count();
        let actual = to_value(state);
        if !backend::truthy(&actual) {
            return Err(self.failure(
                message,
                format!("expected {actual} to be truthy"),
                Some(actual),
                Some(Value::Bool(true)),
            ));
        }
        Ok(())
    }

    pub fn not_ok<T: Serialize>(&self, state: T, message: Option<&str>) -> Result<(), CompatError> {
        self.count();
        let actual = to_value(state);
        if backend::truthy(&actual) {
            return Err(self.failure(
                message,
                format!("expected {actual} to be falsy"),
                Some(actual),
                Some(Value::Bool(false)),
            ));
        }
        Ok(())
    }

    pub fn equal<A: Serialize, E: Serialize>(
        &self,
        actual: A,
        expected: E,
        message: Option<&str>,
    ) -> Result<(), CompatError> {
        self.count();
        let actual = to_value(actual);
        let expected = to_value(expected);
        if !backend::loose_eq(&actual, &expected) {
            return Err(self.failure(
                message,
                format!("expected {actual} to equal {expected}"),
                Some(actual),
                Some(expected),
            ));
        }
        Ok(())
    }

    pub fn not_equal<A: Serialize, E: Serialize>(
        &self,
        actual: A,
        expected: E,
        message: Option<&str>,
    ) -> Result<(), CompatError> {
        self.count();
        let actual = to_value(actual);
        let expected = to_value(expected);
        if backend::loose_eq(&actual, &expected) {
            return Err(self.failure(
                message,
                format!("expected {actual} to not equal {expected}"),
                Some(actual),
                Some(expected),
            ));
        }
        Ok(())
    }

    pub fn strict_equal<A: Serialize, E: Serialize>(
        &self,
        actual: A,
        expected: E,
        message: Option<&str>,
    ) -> Result<(), CompatError> {
        self.count();
        let actual = to_value(actual);
        let expected = to_value(expected);
        if !backend::strict_eq(&actual, &expected) {
            return Err(self.failure(
                message,
                format!("expected {actual} to equal {expected}"),
                Some(actual),
                Some(expected),
            ));
        }
        Ok(())
    }

    pub fn not_strict_equal<A: Serialize, E: Serialize>(
        &self,
        actual: A,
        expected: E,
        message: Option<&str>,
    ) -> Result<(), CompatError> {
        self.count();
        let actual = to_value(actual);
        let expected = to_value(expected);
        if backend::strict_eq(&actual, &expected) {
            return Err(self.failure(
                message,
                format!("expected {actual} to not equal {expected}"),
                Some(actual),
                Some(expected),
            ));
        }
        Ok(())
    }

    pub fn deep_equal<A: Serialize, E: Serialize>(
        &self,
        actual: A,
        expected: E,
        message: Option<&str>,
    ) -> Result<(), CompatError> {
        self.count();
        let actual = to_value(actual);
        let expected = to_value(expected);
        if !backend::deep_eq(&actual, &expected) {
            return Err(self.failure(
                message,
                format!("expected {actual} to deeply equal {expected}"),
                Some(actual),
                Some(expected),
            ));
        }
        Ok(())
    }

    pub fn not_deep_equal<A: Serialize, E: Serialize>(
        &self,
        actual: A,
        expected: E,
        message: Option<&str>,
    ) -> Result<(), CompatError> {
        self.count();
        let actual = to_value(actual);
        let expected = to_value(expected);
        if backend::deep_eq(&actual, &expected) {
            return Err(self.failure(
                message,
                format!("expected {actual} to not deeply equal {expected}"),
                Some(actual),
                Some(expected),
            ));
        }
        Ok(())
    }

    /// Legacy alias for deep equality over own properties.
    pub fn prop_equal<A: Serialize, E: Serialize>(
        &self,
        actual: A,
        expected: E,
        message: Option<&str>,
    ) -> Result<(), CompatError> {
        self.deep_equal(actual, expected, message)
    }

    /// Legacy alias for negated deep equality over own properties.
    pub fn not_prop_equal<A: Serialize, E: Serialize>(
        &self,
        actual: A,
        expected: E,
        message: Option<&str>,
    ) -> Result<(), CompatError> {
        self.not_deep_equal(actual, expected, message)
    }

    /// Record a pre-computed assertion outcome, carrying the caller's
    /// actual/expected/message through verbatim on failure.
    pub fn push_result(&self, result: AssertionResult) -> Result<(), CompatError> {
        self.count();
        if !result.result {
            return Err(CompatError::Assertion(AssertionError {
                message: result.message,
                actual: Some(result.actual),
                expected: Some(result.expected),
            }));
        }
        Ok(())
    }

    /// Append a checkpoint to the step log. Steps do not count as
    /// assertions; `verify_steps` does.
    pub fn step(&self, message: impl Into<String>) {
        self.steps.borrow_mut().push(message.into());
    }

    /// Snapshot of the step log, in recording order.
    pub fn steps(&self) -> Vec<String> {
        self.steps.borrow().clone()
    }

    /// Assert the step log contains every expected checkpoint (subset
    /// semantics). The log is left intact for later inspection.
    pub fn verify_steps(&self, expected: &[&str], message: Option<&str>) -> Result<(), CompatError> {
        self.count();
        let steps = self.steps.borrow();
        for step in expected {
            if !steps.iter().any(|recorded| recorded == step) {
                return Err(self.failure(
                    message,
                    format!("expected steps to include {step:?}"),
                    Some(Value::Array(
                        steps.iter().map(|s| Value::String(s.clone())).collect(),
                    )),
                    Some(Value::Array(
                        expected.iter().map(|s| Value::String((*s).to_string())).collect(),
                    )),
                ));
            }
        }
        Ok(())
    }

    /// Assert that `block` raises an error satisfying `expected`.
    pub fn throws<F>(
        &self,
        block: F,
        expected: ThrowsExpectation,
        message: Option<&str>,
    ) -> Result<(), CompatError>
    where
        F: FnOnce() -> Result<(), Box<dyn Error>>,
    {
        self.count();
        let raised = match block() {
            Ok(()) => {
                return Err(self.failure(
                    message,
                    "expected [Function] to throw".to_string(),
                    None,
                    None,
                ))
            }
            Err(err) => err,
        };

        match expected {
            ThrowsExpectation::Matches(matcher) => {
                if !matcher(raised.as_ref()) {
                    return Err(self.failure(
                        message,
                        format!(
                            "expected [Function] to throw error matching [Function] but got {raised}"
                        ),
                        None,
                        None,
                    ));
                }
                Ok(())
            }
            ThrowsExpectation::MessageContains(needle) => {
                if !raised.to_string().contains(&needle) {
                    return Err(self.failure(
                        message,
                        format!(
                            "expected [Function] to throw error including {needle:?} but got {raised}"
                        ),
                        None,
                        None,
                    ));
                }
                Ok(())
            }
            ThrowsExpectation::MessagePattern(pattern) => {
                if !pattern.is_match(&raised.to_string()) {
                    return Err(self.failure(
                        message,
                        format!(
                            "expected [Function] to throw error matching /{pattern}/ but got {raised}"
                        ),
                        None,
                        None,
                    ));
                }
                Ok(())
            }
        }
    }

    /// Enter the deferred-arity async protocol: acquire the bound test's
    /// completion token and hand back a done handle that fulfills it after
    /// `accept_call_count` calls.
    pub fn begin_async(&self, accept_call_count: usize) -> Result<Done, CompatError> {
        let test = self.test.as_ref().ok_or(ProtocolError::NoActiveTest)?;
        let completion = test.acquire_completion();
        Ok(Done::new(accept_call_count, completion))
    }

    /// Override the bound test's timeout. A no-op on the detached adapter.
    pub fn timeout(&self, millis: u64) {
        if let Some(test) = &self.test {
            test.set_timeout(Some(millis));
        }
    }
}
