//! Test nodes of the host test tree
//!
//! A test wraps a body closure built by the registrar. Running the body
//! yields either a finished result or a pending completion token the host
//! driver must wait on (bounded by the test's timeout). The node also holds
//! an optional deferred post-check the wrapper installs when the expected-
//! assertion verification has to wait for async settlement.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::error::{CompatError, FailureDetail};
use crate::host::completion::Completion;
use crate::host::suite::Suite;

/// What running a test body produced.
pub enum TestRun {
    /// The body finished synchronously
    Finished,
    /// The body went async; the driver must wait on this token
    Pending(Completion),
}

/// A test body as stored in the host tree.
pub type TestBody = Box<dyn FnMut(&Rc<Test>) -> Result<TestRun, CompatError>>;

/// Deferred expected-assertion check, run when a pending token resolves.
pub type PostCheck = Box<dyn FnOnce() -> Result<(), CompatError>>;

/// Settlement state of a test
#[derive(Debug, Clone, PartialEq)]
pub enum TestState {
    NotRun,
    Skipped { reason: String },
    Passed,
    Failed(FailureDetail),
}

/// A leaf node in the host test tree.
pub struct Test {
    name: String,
    parent: RefCell<Weak<Suite>>,
    body: RefCell<Option<TestBody>>,
    state: RefCell<TestState>,
    timeout: Cell<Option<u64>>,
    completion: RefCell<Option<Completion>>,
    post_check: RefCell<Option<PostCheck>>,
    time_elapsed: Cell<u64>,
}

impl Test {
    pub fn new(name: impl Into<String>, body: TestBody) -> Rc<Self> {
        Rc::new(Self {
            name: name.into(),
            parent: RefCell::new(Weak::new()),
            body: RefCell::new(Some(body)),
            state: RefCell::new(TestState::NotRun),
            timeout: Cell::new(None),
            completion: RefCell::new(None),
            post_check: RefCell::new(None),
            time_elapsed: Cell::new(0),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_parent(&self, parent: Weak<Suite>) {
        *self.parent.borrow_mut() = parent;
    }

    pub fn parent(&self) -> Option<Rc<Suite>> {
        self.parent.borrow().upgrade()
    }

    /// Name of the suite this test was declared under ("root" for tests
    /// registered with no module).
    pub fn module_name(&self) -> String {
        self.parent()
            .map(|suite| suite.name().to_string())
            .unwrap_or_default()
    }

    /// Full dotted id: suite path plus this test's name, joined " - ".
    pub fn full_id(&self) -> String {
        match self.parent() {
            Some(suite) => format!("{} - {}", suite.full_id(), self.name),
            None => self.name.clone(),
        }
    }

    /// Run the test body. The body is temporarily taken out of the node so
    /// the closure may hold the test handle without a re-entrant borrow.
    pub fn run_body(self: &Rc<Self>) -> Result<TestRun, CompatError> {
        let body = self.body.borrow_mut().take();
        match body {
            Some(mut body) => {
                let result = body(self);
                *self.body.borrow_mut() = Some(body);
                result
            }
            None => Ok(TestRun::Finished),
        }
    }

    /// Acquire the async-completion token, marking the test asynchronous.
    /// Repeated acquisition returns the same shared token.
    pub fn acquire_completion(&self) -> Completion {
        let mut slot = self.completion.borrow_mut();
        match &*slot {
            Some(token) => token.clone(),
            None => {
                let token = Completion::new();
                *slot = Some(token.clone());
                token
            }
        }
    }

    /// Adopt an externally created token (a test body returning a pending
    /// result). A token already acquired through `acquire_completion` wins.
    pub fn adopt_completion(&self, token: &Completion) {
        let mut slot = self.completion.borrow_mut();
        if slot.is_none() {
            *slot = Some(token.clone());
        }
    }

    pub fn completion(&self) -> Option<Completion> {
        self.completion.borrow().clone()
    }

    pub fn set_timeout(&self, millis: Option<u64>) {
        self.timeout.set(millis);
    }

    pub fn timeout(&self) -> Option<u64> {
        self.timeout.get()
    }

    pub fn set_post_check(&self, check: PostCheck) {
        *self.post_check.borrow_mut() = Some(check);
    }

    pub fn take_post_check(&self) -> Option<PostCheck> {
        self.post_check.borrow_mut().take()
    }

    pub fn state(&self) -> TestState {
        self.state.borrow().clone()
    }

    pub fn has_passed(&self) -> bool {
        matches!(*self.state.borrow(), TestState::Passed)
    }

    pub fn skipped_reason(&self) -> Option<String> {
        match &*self.state.borrow() {
            TestState::Skipped { reason } => Some(reason.clone()),
            _ => None,
        }
    }

    /// The failure recorded against this test, if it settled failed.
    pub fn failure(&self) -> Option<FailureDetail> {
        match &*self.state.borrow() {
            TestState::Failed(detail) => Some(detail.clone()),
            _ => None,
        }
    }

    pub fn mark_passed(&self) {
        *self.state.borrow_mut() = TestState::Passed;
    }

    pub fn mark_skipped(&self, reason: impl Into<String>) {
        *self.state.borrow_mut() = TestState::Skipped {
            reason: reason.into(),
        };
    }

    pub fn fail(&self, detail: FailureDetail) {
        *self.state.borrow_mut() = TestState::Failed(detail);
    }

    pub fn set_time_elapsed(&self, millis: u64) {
        self.time_elapsed.set(millis);
    }

    pub fn time_elapsed(&self) -> u64 {
        self.time_elapsed.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_body_passes_the_test_handle() {
        let test = Test::new(
            "t",
            Box::new(|handle| {
                assert_eq!(handle.name(), "t");
                Ok(TestRun::Finished)
            }),
        );
        assert!(matches!(test.run_body(), Ok(TestRun::Finished)));
        // Body is restored and can run again
        assert!(matches!(test.run_body(), Ok(TestRun::Finished)));
    }

    #[test]
    fn acquire_completion_is_idempotent() {
        let test = Test::new("t", Box::new(|_| Ok(TestRun::Finished)));
        let a = test.acquire_completion();
        let b = test.acquire_completion();
        a.resolve();
        assert!(b.is_resolved());
    }

    #[test]
    fn adopt_completion_defers_to_an_acquired_token() {
        let test = Test::new("t", Box::new(|_| Ok(TestRun::Finished)));
        let acquired = test.acquire_completion();
        let external = Completion::new();
        test.adopt_completion(&external);
        external.resolve();
        assert!(acquired.is_pending());
    }

    #[test]
    fn state_transitions_record_detail() {
        let test = Test::new("t", Box::new(|_| Ok(TestRun::Finished)));
        assert_eq!(test.state(), TestState::NotRun);
        test.fail(FailureDetail::from_message("boom"));
        assert!(!test.has_passed());
        assert_eq!(
            test.failure().map(|detail| detail.message),
            Some("boom".to_string())
        );

        test.mark_skipped("grep");
        assert_eq!(test.skipped_reason(), Some("grep".to_string()));
    }
}
