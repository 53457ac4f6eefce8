//! Sandboxed agent loop orchestrator.
//!
//! Each step takes a pre-exec block from a proposal source, extracts exactly
//! one shell command, runs it inside a container, and records the outcome in
//! an append-only run log. The architecture keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (command extraction, repeat guard,
//!   record types). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (config, processes, run files).
//! - **[`proposal`]**: Where blocks come from (console, replay, remote API).
//!
//! [`looping`] ties these together behind `orchestrator run`.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod looping;
pub mod observer;
pub mod proposal;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
