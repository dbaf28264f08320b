//! # qunit-compat
//!
//! A compatibility layer exposing the classic QUnit-style registration and
//! assertion API over a host test-execution engine. Legacy call sites keep
//! their `module`/`test`/`asyncTest` shape, their assertion vocabulary, and
//! their lifecycle callbacks, while the host engine owns scheduling, the
//! suite tree, and timeout enforcement.
//!
//! The layer has four parts:
//!
//! - **registration** ([`interface`], [`registrar`]): modules and tests
//!   declared through the interface are attached to the host suite tree,
//!   with a cursor tracking where subsequent declarations land;
//! - **assertions** ([`assert`], [`backend`]): a per-test adapter counting
//!   assertions and delegating comparisons to loose/strict/deep equality
//!   semantics;
//! - **async protocols** ([`bridge`]): the deferred-arity `done` handle and
//!   the legacy stop/resume countdown, both reconciled onto the host's
//!   single-resolution completion token;
//! - **events** ([`events`]): translators that recompute the legacy
//!   aggregate payloads from the live host tree whenever a host lifecycle
//!   event fires.
//!
//! ## Example
//!
//! ```
//! use qunit_compat::host::Engine;
//! use qunit_compat::interface::{InterfaceRegistry, TestOutcome};
//! use qunit_compat::registrar::ModuleDecl;
//!
//! let registry = InterfaceRegistry::new();
//! let engine = Engine::new();
//! let qunit = registry.interface(&engine);
//!
//! qunit.module("math", ModuleDecl::Plain);
//! qunit.test("addition", |assert| {
//!     assert.equal(1 + 1, 2, None)?;
//!     Ok(TestOutcome::Done)
//! });
//!
//! assert_eq!(engine.root().num_tests(), 1);
//! ```

pub mod assert;
pub mod backend;
pub mod bridge;
pub mod config;
pub mod error;
pub mod events;
pub mod extend;
pub mod host;
pub mod interface;
pub mod registrar;

pub use assert::{Assert, AssertionResult, ThrowsExpectation};
pub use bridge::{Done, StopStartBridge};
pub use config::Config;
pub use error::{AssertionError, CompatError, FailureDetail, ProtocolError};
pub use events::EventSubscriber;
pub use interface::{InterfaceRegistry, QUnit, TestOutcome};
pub use registrar::{Hooks, ModuleDecl};

/// Crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
