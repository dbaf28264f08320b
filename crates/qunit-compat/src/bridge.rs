//! Async completion bridge
//!
//! Reconciles the legacy callback-style completion protocols with the
//! host's single-resolution completion token. Two protocols coexist because
//! legacy call sites use either:
//!
//! - the deferred-arity protocol: `assert.begin_async(n)` hands back a
//!   [`Done`] handle; the nth invocation fulfills the token and an (n+1)th
//!   is a protocol error;
//! - the stop/resume protocol: a countdown starting at 1 on entry,
//!   incremented by `stop()` and decremented by `start()`; reaching zero
//!   runs the expected-assertion check and settles the token.
//!
//! Resuming (or stopping) after the test has settled is a protocol error
//! rather than a silent no-op; the two legacy API generations disagreed
//! here and this implementation takes the strict reading.

use std::cell::Cell;
use std::rc::Rc;

use crate::assert::Assert;
use crate::error::{CompatError, ProtocolError};
use crate::host::Completion;

/// Resolution handle for the deferred-arity protocol.
///
/// Clones share the countdown, so a handle can be moved into several
/// callbacks that each report completion once.
#[derive(Clone)]
pub struct Done {
    remaining: Rc<Cell<i64>>,
    completion: Completion,
}

impl Done {
    /// Build a handle that fulfills `completion` on the nth `resolve` call.
    /// Counts below 1 clamp to 1.
    pub fn new(accept_call_count: usize, completion: Completion) -> Self {
        Self {
            remaining: Rc::new(Cell::new(accept_call_count.max(1) as i64)),
            completion,
        }
    }

    /// Report one completion. Fulfills the token on the final accepted call;
    /// any further call is an error.
    pub fn resolve(&self) -> Result<(), CompatError> {
        let remaining = self.remaining.get() - 1;
        self.remaining.set(remaining);
        match remaining {
            0 => {
                self.completion.resolve();
                Ok(())
            }
            n if n < 0 => Err(ProtocolError::ResolvedTooManyTimes.into()),
            _ => Ok(()),
        }
    }
}

/// State machine for the legacy stop/resume protocol.
///
/// Owned by the interface for the duration of one test invocation. The
/// countdown starts at 1 (test entry counts as the first stop); `stop`
/// increments it and `resume` decrements it. Reaching zero verifies the
/// expected-assertion state and settles the token exactly once.
pub struct StopStartBridge {
    countdown: Cell<i64>,
    completion: Completion,
    assert: Rc<Assert>,
    require_expects: bool,
    settled: Cell<bool>,
}

impl StopStartBridge {
    pub fn new(assert: Rc<Assert>, completion: Completion, require_expects: bool) -> Self {
        Self {
            countdown: Cell::new(1),
            completion,
            assert,
            require_expects,
            settled: Cell::new(false),
        }
    }

    /// Defer completion by one more resume call.
    pub fn stop(&self) -> Result<(), CompatError> {
        if self.settled.get() || !self.completion.is_pending() {
            return Err(ProtocolError::StopAfterCompletion.into());
        }
        self.countdown.set(self.countdown.get() + 1);
        Ok(())
    }

    /// Consume one pending stop; the final resume settles the test.
    pub fn resume(&self) -> Result<(), CompatError> {
        if self.settled.get() || !self.completion.is_pending() {
            return Err(ProtocolError::StartAfterCompletion.into());
        }
        let countdown = self.countdown.get() - 1;
        self.countdown.set(countdown);
        if countdown > 0 {
            return Ok(());
        }
        if countdown < 0 {
            return Err(ProtocolError::StartWithoutStop.into());
        }
        self.settled.set(true);
        match self.assert.verify_expects(self.require_expects) {
            Ok(()) => self.completion.resolve(),
            Err(err) => self.completion.reject(err.into()),
        }
        Ok(())
    }

    pub fn is_settled(&self) -> bool {
        self.settled.get()
    }
}
