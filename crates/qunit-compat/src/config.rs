//! Config & filter facade
//!
//! Mutable options whose setters have side effects on the host engine:
//! disabling autostart installs a pre-run blocking gate, and setting the
//! module filter installs a name-matching grep on the root suite. The
//! remaining options (`require_expects`, `test_timeout`) are plain values
//! read at test invocation time.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use regex::RegexBuilder;

use crate::host::{Completion, Engine, EventPayload, HostEvent, Subscription};

struct AutostartBlock {
    subscription: Subscription,
    gate: Rc<RefCell<Option<Completion>>>,
}

/// Mutable configuration bound to one engine instance.
pub struct Config {
    engine: Rc<Engine>,
    autostart_block: RefCell<Option<AutostartBlock>>,
    module_filter: RefCell<Option<String>>,
    require_expects: Cell<bool>,
    test_timeout: Cell<Option<u64>>,
}

impl Config {
    pub(crate) fn new(engine: Rc<Engine>) -> Self {
        Self {
            engine,
            autostart_block: RefCell::new(None),
            module_filter: RefCell::new(None),
            require_expects: Cell::new(false),
            test_timeout: Cell::new(None),
        }
    }

    /// True when no pre-run block is pending.
    pub fn autostart(&self) -> bool {
        self.autostart_block.borrow().is_none()
    }

    /// Disabling autostart registers a `BeforeRun` handler whose gate
    /// suspends the run until `start()` is observed. Re-enabling (or a
    /// resume call) releases the block; the handle is disposed exactly
    /// once either way.
    pub fn set_autostart(&self, value: bool) {
        self.release_autostart_block();
        if value {
            return;
        }

        let gate: Rc<RefCell<Option<Completion>>> = Rc::new(RefCell::new(None));
        let handler_gate = gate.clone();
        let subscription = self.engine.on(
            HostEvent::BeforeRun,
            Box::new(move |_: &EventPayload| {
                let completion = Completion::new();
                *handler_gate.borrow_mut() = Some(completion.clone());
                Some(completion)
            }),
        );
        *self.autostart_block.borrow_mut() = Some(AutostartBlock { subscription, gate });
    }

    /// Release any pending autostart block, resolving its gate if the run
    /// was already suspended on it. Returns whether a block existed.
    pub(crate) fn release_autostart_block(&self) -> bool {
        match self.autostart_block.borrow_mut().take() {
            Some(block) => {
                block.subscription.dispose();
                if let Some(gate) = block.gate.borrow_mut().take() {
                    gate.resolve();
                }
                true
            }
            None => false,
        }
    }

    /// The configured module-name filter, if any.
    pub fn module(&self) -> Option<String> {
        self.module_filter.borrow().clone()
    }

    /// Install (or replace) the module-name filter. Matching uses literal
    /// substring semantics against the suite's full dotted id; the user's
    /// input is escaped, never treated as a pattern.
    pub fn set_module(&self, name: &str) {
        *self.module_filter.borrow_mut() = Some(name.to_string());
        let pattern = format!("(?:^|[^-]* - ){} - ", regex::escape(name));
        let grep = RegexBuilder::new(&pattern)
            .case_insensitive(true)
            .build()
            .ok();
        self.engine.add_suite(|root| root.set_grep(grep));
    }

    /// Remove the module-name filter.
    pub fn clear_module(&self) {
        *self.module_filter.borrow_mut() = None;
        self.engine.add_suite(|root| root.set_grep(None));
    }

    /// When true, a test that never called `expect()` fails at completion
    /// even if every assertion passed.
    pub fn require_expects(&self) -> bool {
        self.require_expects.get()
    }

    pub fn set_require_expects(&self, value: bool) {
        self.require_expects.set(value);
    }

    /// Default timeout for subsequently declared tests; `None` means no
    /// timeout.
    pub fn test_timeout(&self) -> Option<u64> {
        self.test_timeout.get()
    }

    pub fn set_test_timeout(&self, millis: Option<u64>) {
        self.test_timeout.set(millis);
    }
}
