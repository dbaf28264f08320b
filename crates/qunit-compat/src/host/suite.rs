//! Suite nodes of the host test tree
//!
//! A suite is a named grouping node containing child tests and/or child
//! suites. Suites created through the module registrar additionally carry a
//! shared per-module context map that lifecycle hooks and tests mutate
//! through the assertion adapter.
//!
//! Aggregate counters (`num_tests`, `num_failed_tests`, `num_skipped_tests`)
//! are recomputed on demand by walking descendants, never tallied
//! incrementally; the event translator relies on this to derive payloads
//! from the live tree at emission time.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use regex::Regex;
use serde_json::Value;

use crate::host::test::{Test, TestState};

/// Per-module shared state, mutated by hooks and visible to tests.
pub type ModuleContext = HashMap<String, Value>;

/// Shared handle to a module context
pub type SharedContext = Rc<RefCell<ModuleContext>>;

/// A lifecycle hook bound to a suite
pub type HookFn = Box<dyn FnMut(&mut ModuleContext)>;

/// Lifecycle points a hook can attach to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    BeforeAll,
    BeforeEach,
    AfterEach,
    AfterAll,
}

/// A child of a suite
#[derive(Clone)]
pub enum Node {
    Suite(Rc<Suite>),
    Test(Rc<Test>),
}

/// A named grouping node in the host test tree.
pub struct Suite {
    name: String,
    parent: RefCell<Weak<Suite>>,
    children: RefCell<Vec<Node>>,
    context: Option<SharedContext>,
    hooks: RefCell<Vec<(HookKind, HookFn)>>,
    grep: RefCell<Option<Regex>>,
    time_elapsed: Cell<u64>,
}

impl Suite {
    /// Create a suite. `context` is `Some` exactly when the suite was
    /// declared through the module registrar.
    pub fn new(name: impl Into<String>, context: Option<SharedContext>) -> Rc<Self> {
        Rc::new(Self {
            name: name.into(),
            parent: RefCell::new(Weak::new()),
            children: RefCell::new(Vec::new()),
            context,
            hooks: RefCell::new(Vec::new()),
            grep: RefCell::new(None),
            time_elapsed: Cell::new(0),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<Rc<Suite>> {
        self.parent.borrow().upgrade()
    }

    /// Full dotted id: names from the root down, joined with " - ".
    pub fn full_id(&self) -> String {
        let mut parts = vec![self.name.clone()];
        let mut cursor = self.parent();
        while let Some(suite) = cursor {
            parts.push(suite.name().to_string());
            cursor = suite.parent();
        }
        parts.reverse();
        parts.join(" - ")
    }

    /// Attach a child suite, fixing up its parent pointer.
    pub fn add_suite(self: &Rc<Self>, child: Rc<Suite>) {
        *child.parent.borrow_mut() = Rc::downgrade(self);
        self.children.borrow_mut().push(Node::Suite(child));
    }

    /// Attach a child test, fixing up its parent pointer.
    pub fn add_test(self: &Rc<Self>, test: Rc<Test>) {
        test.set_parent(Rc::downgrade(self));
        self.children.borrow_mut().push(Node::Test(test));
    }

    /// Snapshot of this suite's children, in declaration order.
    pub fn children(&self) -> Vec<Node> {
        self.children.borrow().clone()
    }

    /// Direct child suites
    pub fn suites(&self) -> Vec<Rc<Suite>> {
        self.children
            .borrow()
            .iter()
            .filter_map(|node| match node {
                Node::Suite(s) => Some(s.clone()),
                Node::Test(_) => None,
            })
            .collect()
    }

    /// Direct child tests
    pub fn tests(&self) -> Vec<Rc<Test>> {
        self.children
            .borrow()
            .iter()
            .filter_map(|node| match node {
                Node::Test(t) => Some(t.clone()),
                Node::Suite(_) => None,
            })
            .collect()
    }

    /// The shared module context, when this suite carries one.
    pub fn context(&self) -> Option<SharedContext> {
        self.context.clone()
    }

    /// True for suites declared through the module registrar. The event
    /// translator only emits module-scoped events for these.
    pub fn has_module_context(&self) -> bool {
        self.context.is_some()
    }

    /// Append a lifecycle hook listener.
    pub fn add_hook(&self, kind: HookKind, hook: HookFn) {
        self.hooks.borrow_mut().push((kind, hook));
    }

    /// Number of hooks registered for a lifecycle point.
    pub fn hook_count(&self, kind: HookKind) -> usize {
        self.hooks.borrow().iter().filter(|(k, _)| *k == kind).count()
    }

    /// Invoke every hook registered for `kind`, in registration order, with
    /// the shared module context.
    pub fn run_hooks(&self, kind: HookKind) {
        let context = self.context.clone();
        let mut hooks = self.hooks.borrow_mut();
        for (k, hook) in hooks.iter_mut() {
            if *k == kind {
                match &context {
                    Some(ctx) => hook(&mut ctx.borrow_mut()),
                    None => {
                        let mut scratch = ModuleContext::new();
                        hook(&mut scratch);
                    }
                }
            }
        }
    }

    /// Total descendant tests
    pub fn num_tests(&self) -> usize {
        self.children
            .borrow()
            .iter()
            .map(|node| match node {
                Node::Test(_) => 1,
                Node::Suite(s) => s.num_tests(),
            })
            .sum()
    }

    /// Descendant tests that settled failed
    pub fn num_failed_tests(&self) -> usize {
        self.children
            .borrow()
            .iter()
            .map(|node| match node {
                Node::Test(t) => match t.state() {
                    TestState::Failed(_) => 1,
                    _ => 0,
                },
                Node::Suite(s) => s.num_failed_tests(),
            })
            .sum()
    }

    /// Descendant tests that were skipped
    pub fn num_skipped_tests(&self) -> usize {
        self.children
            .borrow()
            .iter()
            .map(|node| match node {
                Node::Test(t) => match t.state() {
                    TestState::Skipped { .. } => 1,
                    _ => 0,
                },
                Node::Suite(s) => s.num_skipped_tests(),
            })
            .sum()
    }

    /// Name-matching filter installed by the config facade; only meaningful
    /// on the root suite. The driver skips tests whose full id does not
    /// match.
    pub fn set_grep(&self, grep: Option<Regex>) {
        *self.grep.borrow_mut() = grep;
    }

    pub fn grep(&self) -> Option<Regex> {
        self.grep.borrow().clone()
    }

    pub fn set_time_elapsed(&self, millis: u64) {
        self.time_elapsed.set(millis);
    }

    pub fn time_elapsed(&self) -> u64 {
        self.time_elapsed.get()
    }
}
