//! Async-completion token
//!
//! The host engine hands a test a completion token and suspends the test's
//! settlement until the token resolves, rejects, or the engine's own timeout
//! elapses. The token is a three-state machine:
//! - Pending: the test is still running
//! - Resolved: the test may settle with its accumulated assertion state
//! - Rejected: the test fails with the carried detail
//!
//! The transition out of Pending happens at most once; later calls are
//! no-ops at the token level. Over-resolution accounting (the "resolve
//! called too many times" protocol error) is the bridge's job, not the
//! token's.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::error::FailureDetail;

/// State of a completion token
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionState {
    /// The owning test has not settled yet
    Pending,
    /// The owning test may complete successfully
    Resolved,
    /// The owning test failed with this detail
    Rejected(FailureDetail),
}

/// Shared handle to a single test's completion state.
///
/// Clones share state; resolving any clone settles them all.
#[derive(Clone)]
pub struct Completion {
    state: Rc<RefCell<CompletionState>>,
}

impl Completion {
    /// Create a new pending token
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(CompletionState::Pending)),
        }
    }

    /// Current state (cloned)
    pub fn state(&self) -> CompletionState {
        self.state.borrow().clone()
    }

    pub fn is_pending(&self) -> bool {
        matches!(*self.state.borrow(), CompletionState::Pending)
    }

    pub fn is_resolved(&self) -> bool {
        matches!(*self.state.borrow(), CompletionState::Resolved)
    }

    pub fn is_rejected(&self) -> bool {
        matches!(*self.state.borrow(), CompletionState::Rejected(_))
    }

    /// Transition Pending -> Resolved. No-op if already settled.
    pub fn resolve(&self) {
        let mut state = self.state.borrow_mut();
        if matches!(*state, CompletionState::Pending) {
            *state = CompletionState::Resolved;
        }
    }

    /// Transition Pending -> Rejected. No-op if already settled.
    pub fn reject(&self, detail: FailureDetail) {
        let mut state = self.state.borrow_mut();
        if matches!(*state, CompletionState::Pending) {
            *state = CompletionState::Rejected(detail);
        }
    }
}

impl Default for Completion {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self.state.borrow() {
            CompletionState::Pending => write!(f, "Completion(pending)"),
            CompletionState::Resolved => write!(f, "Completion(resolved)"),
            CompletionState::Rejected(_) => write!(f, "Completion(rejected)"),
        }
    }
}
