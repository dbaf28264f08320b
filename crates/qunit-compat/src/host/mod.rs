//! Interface boundary to the host test-execution engine
//!
//! The host engine owns scheduling, the suite/test tree, and timeout
//! enforcement; this crate only decorates it. What lives here is the
//! contract the adapter programs against: tree node handles, the lifecycle
//! event bus, and the async-completion token. The driver that actually
//! walks the tree and runs tests is external (the reference driver used by
//! this crate's integration tests lives in `tests/common`).

pub mod completion;
pub mod suite;
pub mod test;

pub use completion::{Completion, CompletionState};
pub use suite::{HookFn, HookKind, ModuleContext, Node, SharedContext, Suite};
pub use test::{PostCheck, Test, TestBody, TestRun, TestState};

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::{Rc, Weak};

/// Lifecycle events the engine fires, in its own fixed order: `BeforeRun`,
/// `RunStart`, then per suite `SuiteStart`/`SuiteEnd` wrapping per test
/// `TestStart`/`TestEnd`, then `RunEnd`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostEvent {
    BeforeRun,
    RunStart,
    SuiteStart,
    SuiteEnd,
    TestStart,
    TestEnd,
    RunEnd,
}

/// Payload handed to event handlers.
#[derive(Clone)]
pub enum EventPayload {
    /// Run-scoped events carry no node; handlers read the engine tree
    Run,
    Suite(Rc<Suite>),
    Test(Rc<Test>),
}

/// An event handler. A `BeforeRun` handler may return a completion gate the
/// driver must await before starting the run; other events ignore the
/// return value.
pub type EventHandler = Box<dyn FnMut(&EventPayload) -> Option<Completion>>;

struct HandlerEntry {
    id: u64,
    handler: EventHandler,
}

/// The host engine handle: the root of the suite tree plus the lifecycle
/// event bus.
pub struct Engine {
    root: Rc<Suite>,
    handlers: RefCell<HashMap<HostEvent, Vec<HandlerEntry>>>,
    disposed: RefCell<HashSet<u64>>,
    next_handler_id: Cell<u64>,
}

impl Engine {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            root: Suite::new("root", None),
            handlers: RefCell::new(HashMap::new()),
            disposed: RefCell::new(HashSet::new()),
            next_handler_id: Cell::new(0),
        })
    }

    /// The root suite all registered modules attach under.
    pub fn root(&self) -> Rc<Suite> {
        self.root.clone()
    }

    /// Top-level suites of the run (the roots the aggregate events sum over).
    pub fn suites(&self) -> Vec<Rc<Suite>> {
        vec![self.root.clone()]
    }

    /// Invoke `f` with the root suite handle, the engine's registration
    /// entry point for tree mutations.
    pub fn add_suite<F: FnOnce(&Rc<Suite>)>(&self, f: F) {
        f(&self.root);
    }

    /// Subscribe to a lifecycle event. The returned handle removes the
    /// handler when disposed.
    pub fn on(self: &Rc<Self>, event: HostEvent, handler: EventHandler) -> Subscription {
        let id = self.next_handler_id.get();
        self.next_handler_id.set(id + 1);
        self.handlers
            .borrow_mut()
            .entry(event)
            .or_default()
            .push(HandlerEntry { id, handler });
        Subscription {
            engine: Rc::downgrade(self),
            event,
            id,
        }
    }

    /// Fire an event, invoking handlers in registration order. Returns the
    /// blocking gates any handlers produced (only meaningful for
    /// `BeforeRun`).
    pub fn emit(&self, event: HostEvent, payload: &EventPayload) -> Vec<Completion> {
        // Take the handler list out of the map so handlers may subscribe or
        // dispose without a re-entrant borrow.
        let mut running = self.handlers.borrow_mut().remove(&event).unwrap_or_default();
        let mut gates = Vec::new();
        for entry in &mut running {
            if self.disposed.borrow().contains(&entry.id) {
                continue;
            }
            if let Some(gate) = (entry.handler)(payload) {
                gates.push(gate);
            }
        }

        let mut handlers = self.handlers.borrow_mut();
        let added = handlers.remove(&event).unwrap_or_default();
        running.extend(added);
        let disposed = std::mem::take(&mut *self.disposed.borrow_mut());
        running.retain(|entry| !disposed.contains(&entry.id));
        handlers.insert(event, running);
        gates
    }

    /// Number of live handlers for an event.
    pub fn handler_count(&self, event: HostEvent) -> usize {
        self.handlers
            .borrow()
            .get(&event)
            .map_or(0, |entries| entries.len())
    }
}

/// Disposable handle to an event subscription. Disposing consumes the
/// handle, so removal happens exactly once.
pub struct Subscription {
    engine: Weak<Engine>,
    event: HostEvent,
    id: u64,
}

impl Subscription {
    pub fn dispose(self) {
        let Some(engine) = self.engine.upgrade() else {
            return;
        };
        let mut handlers = engine.handlers.borrow_mut();
        match handlers.get_mut(&self.event) {
            Some(entries) => {
                let before = entries.len();
                entries.retain(|entry| entry.id != self.id);
                if entries.len() == before {
                    // The handler list is mid-emit; tombstone it instead.
                    engine.disposed.borrow_mut().insert(self.id);
                }
            }
            None => {
                engine.disposed.borrow_mut().insert(self.id);
            }
        }
    }
}
