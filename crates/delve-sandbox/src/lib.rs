//! Delve code-execution sandbox.
//!
//! This crate evaluates snippets of a small dynamically typed scripting
//! language against a namespace that persists between calls.
//!
//! - **[`config`]** -- [`SandboxConfig`] holds the module allow-list, the fuel
//!   budget and the stdout capture limit.
//! - **[`error`]** -- [`Fault`] and [`FaultKind`] describe every way a snippet
//!   can fail.
//! - **[`namespace`]** -- [`Namespace`] stores bindings and computes the
//!   per-call change set.
//! - **[`runtime`]** -- [`Sandbox`] is the main entry point: execute a snippet,
//!   get back stdout, the rendered fault, and the changed bindings.
//!
//! The lexer, parser and evaluator are internal.

pub mod config;
pub mod error;
pub mod namespace;
pub mod runtime;
pub mod value;

mod builtins;
mod interp;
mod lexer;
mod modules;
mod ops;
mod parser;

pub use builtins::BUILTINS;
pub use config::SandboxConfig;
pub use error::{Fault, FaultKind, Result};
pub use interp::TRUNCATION_MARKER;
pub use modules::KNOWN_MODULES;
pub use namespace::{Bindings, Namespace};
pub use runtime::{ExecutionResult, Sandbox};
pub use value::{MAX_NESTING_DEPTH, NativeFn, Value};
