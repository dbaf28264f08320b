//! Module declaration shapes
//!
//! The legacy API distinguished "hooks object" from "nested builder" by
//! inspecting argument shapes at runtime. Here the distinction is a tagged
//! parameter decided once at the call boundary: a module is declared plain,
//! with a flat hooks bundle, or with a nested builder that receives a hook
//! registrar for the suite under construction.

use std::rc::Rc;

use crate::host::suite::{HookKind, ModuleContext, Suite};

type UserHook = Box<dyn FnMut(&mut ModuleContext)>;

/// How a module is being declared.
pub enum ModuleDecl {
    /// No hooks, no nesting
    Plain,
    /// A flat bundle of lifecycle hooks
    WithHooks(Hooks),
    /// A builder invoked while the module is current; tests and nested
    /// modules declared inside attach under it
    Nested(Box<dyn FnOnce(&ModuleHooks)>),
}

/// Lifecycle hooks for a flat module declaration.
///
/// Both hook naming generations are accepted: `before`/`before_each`/
/// `after_each`/`after`, and the older `setup`/`teardown` aliases.
#[derive(Default)]
pub struct Hooks {
    pub(crate) before: Option<UserHook>,
    pub(crate) before_each: Option<UserHook>,
    pub(crate) after_each: Option<UserHook>,
    pub(crate) after: Option<UserHook>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs once before any test in the module.
    pub fn before(mut self, hook: impl FnMut(&mut ModuleContext) + 'static) -> Self {
        self.before = Some(Box::new(hook));
        self
    }

    /// Runs before every test in the module.
    pub fn before_each(mut self, hook: impl FnMut(&mut ModuleContext) + 'static) -> Self {
        self.before_each = Some(Box::new(hook));
        self
    }

    /// Runs after every test in the module.
    pub fn after_each(mut self, hook: impl FnMut(&mut ModuleContext) + 'static) -> Self {
        self.after_each = Some(Box::new(hook));
        self
    }

    /// Runs once after the last test in the module.
    pub fn after(mut self, hook: impl FnMut(&mut ModuleContext) + 'static) -> Self {
        self.after = Some(Box::new(hook));
        self
    }

    /// Legacy alias for `before_each`.
    pub fn setup(self, hook: impl FnMut(&mut ModuleContext) + 'static) -> Self {
        self.before_each(hook)
    }

    /// Legacy alias for `after_each`.
    pub fn teardown(self, hook: impl FnMut(&mut ModuleContext) + 'static) -> Self {
        self.after_each(hook)
    }
}

/// Bind a flat hooks bundle onto a host suite. Hooks share the suite's
/// module context as their call receiver.
pub(crate) fn attach_hooks(suite: &Rc<Suite>, hooks: Hooks) {
    let Hooks {
        before,
        before_each,
        after_each,
        after,
    } = hooks;
    if let Some(hook) = before {
        suite.add_hook(HookKind::BeforeAll, hook);
    }
    if let Some(hook) = before_each {
        suite.add_hook(HookKind::BeforeEach, hook);
    }
    if let Some(hook) = after_each {
        suite.add_hook(HookKind::AfterEach, hook);
    }
    if let Some(hook) = after {
        suite.add_hook(HookKind::AfterAll, hook);
    }
}

/// Hook registrar handed to a nested module builder.
pub struct ModuleHooks {
    suite: Rc<Suite>,
}

impl ModuleHooks {
    pub(crate) fn new(suite: Rc<Suite>) -> Self {
        Self { suite }
    }

    pub fn before(&self, hook: impl FnMut(&mut ModuleContext) + 'static) {
        self.suite.add_hook(HookKind::BeforeAll, Box::new(hook));
    }

    pub fn before_each(&self, hook: impl FnMut(&mut ModuleContext) + 'static) {
        self.suite.add_hook(HookKind::BeforeEach, Box::new(hook));
    }

    pub fn after_each(&self, hook: impl FnMut(&mut ModuleContext) + 'static) {
        self.suite.add_hook(HookKind::AfterEach, Box::new(hook));
    }

    pub fn after(&self, hook: impl FnMut(&mut ModuleContext) + 'static) {
        self.suite.add_hook(HookKind::AfterAll, Box::new(hook));
    }

    /// Legacy alias for `before_each`.
    pub fn setup(&self, hook: impl FnMut(&mut ModuleContext) + 'static) {
        self.before_each(hook);
    }

    /// Legacy alias for `after_each`.
    pub fn teardown(&self, hook: impl FnMut(&mut ModuleContext) + 'static) {
        self.after_each(hook);
    }
}
