//! Reference host driver used by the integration tests.
//!
//! The crate under test only decorates a host engine; something still has to
//! walk the tree, run hooks and bodies, wait on completion tokens, and fire
//! the lifecycle events. This module is that something, with a manual clock
//! so async timing is deterministic.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use qunit_compat::error::FailureDetail;
use qunit_compat::host::{
    Completion, CompletionState, Engine, EventPayload, HookKind, HostEvent, Node, Suite, Test,
    TestRun,
};

struct Timer {
    due: u64,
    action: Option<Box<dyn FnOnce()>>,
}

/// Manual clock with scheduled one-shot timers. Firing a timer advances the
/// clock to its due time.
pub struct Clock {
    now: Cell<u64>,
    timers: RefCell<Vec<Timer>>,
}

impl Clock {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            now: Cell::new(0),
            timers: RefCell::new(Vec::new()),
        })
    }

    pub fn now(&self) -> u64 {
        self.now.get()
    }

    /// Schedule `action` to fire `delay` ticks from the current time.
    pub fn schedule(&self, delay: u64, action: impl FnOnce() + 'static) {
        self.timers.borrow_mut().push(Timer {
            due: self.now.get() + delay,
            action: Some(Box::new(action)),
        });
    }

    /// Due time of the earliest unfired timer.
    pub fn next_due(&self) -> Option<u64> {
        self.timers
            .borrow()
            .iter()
            .filter(|timer| timer.action.is_some())
            .map(|timer| timer.due)
            .min()
    }

    /// Fire the earliest unfired timer, advancing the clock to its due time.
    /// Returns false when no timers remain.
    pub fn fire_next(&self) -> bool {
        let action = {
            let mut timers = self.timers.borrow_mut();
            let earliest = timers
                .iter_mut()
                .filter(|timer| timer.action.is_some())
                .min_by_key(|timer| timer.due);
            match earliest {
                Some(timer) => {
                    if timer.due > self.now.get() {
                        self.now.set(timer.due);
                    }
                    timer.action.take()
                }
                None => None,
            }
        };
        match action {
            Some(action) => {
                action();
                true
            }
            None => false,
        }
    }

    pub fn advance_to(&self, instant: u64) {
        if instant > self.now.get() {
            self.now.set(instant);
        }
    }
}

/// Drive a full run over the engine's tree: blocking gates, lifecycle
/// events, hooks, test bodies, and completion-token waits.
pub fn run_engine(engine: &Rc<Engine>, clock: &Rc<Clock>) {
    let gates = engine.emit(HostEvent::BeforeRun, &EventPayload::Run);
    for gate in &gates {
        while gate.is_pending() {
            assert!(clock.fire_next(), "run is blocked with no pending timers");
        }
    }

    engine.emit(HostEvent::RunStart, &EventPayload::Run);
    let root = engine.root();
    let started = clock.now();
    run_suite(engine, &root, clock);
    root.set_time_elapsed(clock.now() - started);
    engine.emit(HostEvent::RunEnd, &EventPayload::Run);
}

fn run_suite(engine: &Rc<Engine>, suite: &Rc<Suite>, clock: &Rc<Clock>) {
    engine.emit(HostEvent::SuiteStart, &EventPayload::Suite(suite.clone()));
    let started = clock.now();
    suite.run_hooks(HookKind::BeforeAll);

    for child in suite.children() {
        match child {
            Node::Suite(inner) => run_suite(engine, &inner, clock),
            Node::Test(test) => run_test(engine, &test, clock),
        }
    }

    suite.run_hooks(HookKind::AfterAll);
    suite.set_time_elapsed(clock.now() - started);
    engine.emit(HostEvent::SuiteEnd, &EventPayload::Suite(suite.clone()));
}

fn run_test(engine: &Rc<Engine>, test: &Rc<Test>, clock: &Rc<Clock>) {
    if let Some(grep) = engine.root().grep() {
        if !grep.is_match(&test.full_id()) {
            test.mark_skipped("grep");
            return;
        }
    }

    engine.emit(HostEvent::TestStart, &EventPayload::Test(test.clone()));
    let started = clock.now();

    let ancestors = ancestors_of(test);
    for suite in ancestors.iter().rev() {
        suite.run_hooks(HookKind::BeforeEach);
    }

    match test.run_body() {
        Err(err) => test.fail(FailureDetail::from(err)),
        Ok(TestRun::Finished) => test.mark_passed(),
        Ok(TestRun::Pending(token)) => {
            wait_for(test, &token, clock, started);
            settle(test, &token);
        }
    }

    for suite in &ancestors {
        suite.run_hooks(HookKind::AfterEach);
    }

    test.set_time_elapsed(clock.now() - started);
    engine.emit(HostEvent::TestEnd, &EventPayload::Test(test.clone()));
}

fn wait_for(test: &Rc<Test>, token: &Completion, clock: &Rc<Clock>, started: u64) {
    let deadline = test.timeout().map(|millis| started + millis);
    while token.is_pending() {
        match (clock.next_due(), deadline) {
            (Some(due), Some(limit)) if due > limit => {
                clock.advance_to(limit);
                test.fail(FailureDetail::from_message(format!(
                    "Timeout reached on {}#",
                    test.full_id()
                )));
                return;
            }
            (Some(_), _) => {
                clock.fire_next();
            }
            (None, Some(limit)) => {
                clock.advance_to(limit);
                test.fail(FailureDetail::from_message(format!(
                    "Timeout reached on {}#",
                    test.full_id()
                )));
                return;
            }
            (None, None) => {
                panic!("test {} is pending with no timers and no timeout", test.full_id());
            }
        }
    }
}

fn settle(test: &Rc<Test>, token: &Completion) {
    match token.state() {
        CompletionState::Pending => {
            // The wait recorded a timeout failure already.
        }
        CompletionState::Rejected(detail) => test.fail(detail),
        CompletionState::Resolved => match test.take_post_check() {
            Some(check) => match check() {
                Ok(()) => test.mark_passed(),
                Err(err) => test.fail(FailureDetail::from(err)),
            },
            None => test.mark_passed(),
        },
    }
}

fn ancestors_of(test: &Rc<Test>) -> Vec<Rc<Suite>> {
    let mut out = Vec::new();
    let mut cursor = test.parent();
    while let Some(suite) = cursor {
        cursor = suite.parent();
        out.push(suite);
    }
    out
}
