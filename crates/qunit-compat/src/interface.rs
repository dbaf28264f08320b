//! The legacy-compatible surface
//!
//! One `QUnit` interface per engine instance, obtained through the
//! [`InterfaceRegistry`]. Registration calls mutate the host tree; at run
//! time the translator handlers turn host lifecycle events back into the
//! legacy callback payloads by reading the live tree.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::assert::Assert;
use crate::bridge::StopStartBridge;
use crate::config::Config;
use crate::error::{CompatError, FailureDetail, ProtocolError};
use crate::events::{
    BeginData, DoneData, EventSubscriber, LogData, ModuleDoneData, ModuleStartData, TestDoneData,
    TestStartData,
};
use crate::host::suite::{ModuleContext, SharedContext, Suite};
use crate::host::test::{Test, TestRun, TestState};
use crate::host::{Completion, Engine, EventPayload, HostEvent, Subscription};
use crate::registrar::{attach_hooks, ModuleDecl, ModuleHooks};

/// What a test callback reports when it returns.
pub enum TestOutcome {
    /// The test body is done; any acquired async token still gates
    /// settlement
    Done,
    /// The body produced its own pending completion (the thenable-return
    /// shape); the expected-assertion check waits for it to settle
    Pending(Completion),
}

/// A user test callback.
pub type TestCallback = Box<dyn FnMut(&Assert) -> Result<TestOutcome, CompatError>>;

struct ActiveTest {
    test: Rc<Test>,
    assert: Rc<Assert>,
    bridge: Option<Rc<StopStartBridge>>,
}

/// The legacy-compatible interface over one host engine.
pub struct QUnit {
    engine: Rc<Engine>,
    config: Rc<Config>,
    current_suites: RefCell<Vec<Rc<Suite>>>,
    nesting: RefCell<Vec<Rc<Suite>>>,
    live_assert: RefCell<Rc<Assert>>,
    active: RefCell<Option<ActiveTest>>,
}

impl QUnit {
    /// Build an interface bound to `engine`. Prefer obtaining interfaces
    /// through [`InterfaceRegistry`] so repeated lookups share state.
    pub fn new(engine: Rc<Engine>) -> Rc<Self> {
        let config = Rc::new(Config::new(engine.clone()));
        Rc::new(Self {
            engine,
            config,
            current_suites: RefCell::new(Vec::new()),
            nesting: RefCell::new(Vec::new()),
            live_assert: RefCell::new(Assert::detached()),
            active: RefCell::new(None),
        })
    }

    pub fn engine(&self) -> Rc<Engine> {
        self.engine.clone()
    }

    /// Live reference to the most recently created assertion adapter (the
    /// detached default outside a running test).
    pub fn assert(&self) -> Rc<Assert> {
        self.live_assert.borrow().clone()
    }

    pub fn config(&self) -> Rc<Config> {
        self.config.clone()
    }

    /// Declare a module. Subsequently declared tests attach to it until the
    /// next module declaration replaces the cursor.
    pub fn module(&self, name: &str, decl: ModuleDecl) {
        let context: SharedContext = Rc::new(RefCell::new(ModuleContext::new()));
        let suite = Suite::new(name, Some(context));

        let parent = self.nesting.borrow().last().cloned();
        match parent {
            Some(parent) => parent.add_suite(suite.clone()),
            None => self.engine.add_suite(|root| root.add_suite(suite.clone())),
        }

        match decl {
            ModuleDecl::Plain => {}
            ModuleDecl::WithHooks(hooks) => attach_hooks(&suite, hooks),
            ModuleDecl::Nested(builder) => {
                self.nesting.borrow_mut().push(suite.clone());
                *self.current_suites.borrow_mut() = vec![suite.clone()];
                builder(&ModuleHooks::new(suite.clone()));
                self.nesting.borrow_mut().pop();
            }
        }

        *self.current_suites.borrow_mut() = vec![suite];
    }

    /// Declare a test under every suite currently in the cursor (the root
    /// suite when no module has been declared, matching the legacy default
    /// module).
    pub fn test(
        self: &Rc<Self>,
        name: &str,
        callback: impl FnMut(&Assert) -> Result<TestOutcome, CompatError> + 'static,
    ) {
        self.register_test(name, Box::new(callback), false);
    }

    /// Declare a test that enters the stop/resume protocol on entry: the
    /// test will not settle until `start()` balances the implicit stop.
    pub fn async_test(
        self: &Rc<Self>,
        name: &str,
        callback: impl FnMut(&Assert) -> Result<TestOutcome, CompatError> + 'static,
    ) {
        self.register_test(name, Box::new(callback), true);
    }

    fn register_test(self: &Rc<Self>, name: &str, callback: TestCallback, legacy_async: bool) {
        let shared_callback = Rc::new(RefCell::new(callback));
        let parents: Vec<Rc<Suite>> = {
            let cursor = self.current_suites.borrow();
            if cursor.is_empty() {
                vec![self.engine.root()]
            } else {
                cursor.clone()
            }
        };

        for parent in parents {
            let context = parent
                .context()
                .unwrap_or_else(|| Rc::new(RefCell::new(ModuleContext::new())));
            let iface = Rc::downgrade(self);
            let config = self.config.clone();
            let callback = shared_callback.clone();

            let body = Box::new(move |test: &Rc<Test>| -> Result<TestRun, CompatError> {
                let assert = Assert::for_test(test.clone(), context.clone());

                if let Some(iface) = iface.upgrade() {
                    *iface.live_assert.borrow_mut() = assert.clone();
                    let mut active = iface.active.borrow_mut();
                    *active = Some(ActiveTest {
                        test: test.clone(),
                        assert: assert.clone(),
                        bridge: None,
                    });
                    if legacy_async {
                        let completion = test.acquire_completion();
                        let bridge = Rc::new(StopStartBridge::new(
                            assert.clone(),
                            completion,
                            config.require_expects(),
                        ));
                        if let Some(state) = active.as_mut() {
                            state.bridge = Some(bridge);
                        }
                    }
                }

                if test.timeout().is_none() {
                    test.set_timeout(config.test_timeout());
                }

                let result = (*callback.borrow_mut())(&assert);

                let bridge = iface.upgrade().and_then(|iface| {
                    let active = iface.active.borrow();
                    active.as_ref().and_then(|state| {
                        if Rc::ptr_eq(&state.test, test) {
                            state.bridge.clone()
                        } else {
                            None
                        }
                    })
                });

                match result {
                    Err(err) => {
                        // A sync throw short-circuits any pending async wait.
                        if let Some(token) = test.completion() {
                            token.reject(FailureDetail::from(err.clone()));
                        }
                        Err(err)
                    }
                    Ok(outcome) => {
                        if let TestOutcome::Pending(token) = &outcome {
                            test.adopt_completion(token);
                        }
                        match test.completion() {
                            Some(token) if token.is_pending() => {
                                if bridge.is_none() {
                                    let assert = assert.clone();
                                    let require_expects = config.require_expects();
                                    test.set_post_check(Box::new(move || {
                                        assert.verify_expects(require_expects)
                                    }));
                                }
                                Ok(TestRun::Pending(token))
                            }
                            Some(token) => {
                                // Settled synchronously (stop/resume balanced
                                // inside the body); the token carries the
                                // verification outcome.
                                Ok(TestRun::Pending(token))
                            }
                            None => {
                                assert.verify_expects(config.require_expects())?;
                                Ok(TestRun::Finished)
                            }
                        }
                    }
                }
            });

            parent.add_test(Test::new(name, body));
        }
    }

    /// Legacy "stop the runner" call: defers the current test's completion
    /// by one more `start()`.
    pub fn stop(&self) -> Result<(), CompatError> {
        let mut active = self.active.borrow_mut();
        match active.as_mut() {
            None => Err(ProtocolError::NoActiveTest.into()),
            Some(state) => match &state.bridge {
                Some(bridge) => bridge.stop(),
                None => {
                    // A settled test must not re-enter the protocol.
                    if !matches!(state.test.state(), TestState::NotRun) {
                        return Err(ProtocolError::StopAfterCompletion.into());
                    }
                    let completion = state.test.acquire_completion();
                    state.bridge = Some(Rc::new(StopStartBridge::new(
                        state.assert.clone(),
                        completion,
                        self.config.require_expects(),
                    )));
                    Ok(())
                }
            },
        }
    }

    /// Legacy "resume" call. Releases a pending autostart block if one
    /// exists; otherwise consumes one pending stop on the current test.
    pub fn start(&self) -> Result<(), CompatError> {
        if self.config.release_autostart_block() {
            return Ok(());
        }
        let (bridge, settled) = {
            let active = self.active.borrow();
            match active.as_ref() {
                Some(state) => (
                    state.bridge.clone(),
                    !matches!(state.test.state(), TestState::NotRun),
                ),
                None => (None, false),
            }
        };
        match bridge {
            Some(bridge) => bridge.resume(),
            None if settled => Err(ProtocolError::StartAfterCompletion.into()),
            None => Err(ProtocolError::StartWithoutStop.into()),
        }
    }

    /// Subscribe to run start; the payload counts every registered test at
    /// that moment.
    pub fn begin(&self, mut callback: impl FnMut(&BeginData) + 'static) -> Subscription {
        let engine = Rc::downgrade(&self.engine);
        self.engine.on(
            HostEvent::RunStart,
            Box::new(move |_| {
                if let Some(engine) = engine.upgrade() {
                    let total_tests = engine
                        .suites()
                        .iter()
                        .map(|suite| suite.num_tests())
                        .sum();
                    callback(&BeginData { total_tests });
                }
                None
            }),
        )
    }

    /// Subscribe to run end; counts are re-derived from the tree.
    pub fn done(&self, mut callback: impl FnMut(&DoneData) + 'static) -> Subscription {
        let engine = Rc::downgrade(&self.engine);
        self.engine.on(
            HostEvent::RunEnd,
            Box::new(move |_| {
                if let Some(engine) = engine.upgrade() {
                    let suites = engine.suites();
                    let total: usize = suites.iter().map(|s| s.num_tests()).sum();
                    let failed: usize = suites.iter().map(|s| s.num_failed_tests()).sum();
                    let skipped: usize = suites.iter().map(|s| s.num_skipped_tests()).sum();
                    let runtime = suites.iter().map(|s| s.time_elapsed()).max().unwrap_or(0);
                    callback(&DoneData {
                        failed,
                        passed: total - failed - skipped,
                        total,
                        runtime,
                    });
                }
                None
            }),
        )
    }

    /// Subscribe to per-test detail, fired for every test regardless of
    /// module context.
    pub fn log(&self, mut callback: impl FnMut(&LogData) + 'static) -> Subscription {
        self.engine.on(
            HostEvent::TestEnd,
            Box::new(move |payload| {
                if let EventPayload::Test(test) = payload {
                    let failure = test.failure();
                    callback(&LogData {
                        result: test.has_passed(),
                        actual: failure.as_ref().and_then(|f| f.actual.clone()),
                        expected: failure.as_ref().and_then(|f| f.expected.clone()),
                        message: failure.as_ref().map(|f| f.message.clone()),
                        source: failure.as_ref().and_then(|f| f.source.clone()),
                        module: test.module_name(),
                        name: test.name().to_string(),
                    });
                }
                None
            }),
        )
    }

    /// Subscribe to module start; fires only for registrar-created suites.
    pub fn module_start(
        &self,
        mut callback: impl FnMut(&ModuleStartData) + 'static,
    ) -> Subscription {
        self.engine.on(
            HostEvent::SuiteStart,
            Box::new(move |payload| {
                if let EventPayload::Suite(suite) = payload {
                    if suite.has_module_context() {
                        callback(&ModuleStartData {
                            name: suite.name().to_string(),
                        });
                    }
                }
                None
            }),
        )
    }

    /// Subscribe to module end; fires only for registrar-created suites.
    pub fn module_done(
        &self,
        mut callback: impl FnMut(&ModuleDoneData) + 'static,
    ) -> Subscription {
        self.engine.on(
            HostEvent::SuiteEnd,
            Box::new(move |payload| {
                if let EventPayload::Suite(suite) = payload {
                    if suite.has_module_context() {
                        let total = suite.num_tests();
                        let failed = suite.num_failed_tests();
                        let skipped = suite.num_skipped_tests();
                        callback(&ModuleDoneData {
                            name: suite.name().to_string(),
                            failed,
                            passed: total - failed - skipped,
                            total,
                            runtime: suite.time_elapsed(),
                        });
                    }
                }
                None
            }),
        )
    }

    /// Subscribe to test start.
    pub fn test_start(&self, mut callback: impl FnMut(&TestStartData) + 'static) -> Subscription {
        self.engine.on(
            HostEvent::TestStart,
            Box::new(move |payload| {
                if let EventPayload::Test(test) = payload {
                    callback(&TestStartData {
                        name: test.name().to_string(),
                        module: test.module_name(),
                    });
                }
                None
            }),
        )
    }

    /// Subscribe to the per-test summary.
    pub fn test_done(&self, mut callback: impl FnMut(&TestDoneData) + 'static) -> Subscription {
        self.engine.on(
            HostEvent::TestEnd,
            Box::new(move |payload| {
                if let EventPayload::Test(test) = payload {
                    let passed = test.has_passed();
                    callback(&TestDoneData {
                        name: test.name().to_string(),
                        module: test.module_name(),
                        failed: usize::from(!passed),
                        passed: usize::from(passed),
                        total: 1,
                        runtime: test.time_elapsed(),
                    });
                }
                None
            }),
        )
    }

    /// Generic subscription dispatch; each variant forwards to its named
    /// subscription method.
    pub fn on(&self, subscriber: EventSubscriber) -> Subscription {
        match subscriber {
            EventSubscriber::Begin(callback) => self.begin(callback),
            EventSubscriber::Done(callback) => self.done(callback),
            EventSubscriber::Log(callback) => self.log(callback),
            EventSubscriber::ModuleStart(callback) => self.module_start(callback),
            EventSubscriber::ModuleDone(callback) => self.module_done(callback),
            EventSubscriber::TestStart(callback) => self.test_start(callback),
            EventSubscriber::TestDone(callback) => self.test_done(callback),
        }
    }
}

/// Lookup-or-create cache of interfaces, keyed by engine identity.
///
/// Owned by whichever component constructs engine instances; an interface
/// lives exactly as long as its engine stays alive, and dead entries are
/// pruned on lookup. There is no implicit global registry.
#[derive(Default)]
pub struct InterfaceRegistry {
    entries: RefCell<Vec<(Weak<Engine>, Rc<QUnit>)>>,
}

impl InterfaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The interface for `engine`, creating it on first lookup.
    pub fn interface(&self, engine: &Rc<Engine>) -> Rc<QUnit> {
        let mut entries = self.entries.borrow_mut();
        entries.retain(|(weak, _)| weak.strong_count() > 0);

        let target = Rc::downgrade(engine);
        if let Some((_, existing)) = entries.iter().find(|(weak, _)| weak.ptr_eq(&target)) {
            return existing.clone();
        }

        let created = QUnit::new(engine.clone());
        entries.push((target, created.clone()));
        created
    }

    /// Live entries, for diagnostics.
    pub fn len(&self) -> usize {
        self.entries
            .borrow()
            .iter()
            .filter(|(weak, _)| weak.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
