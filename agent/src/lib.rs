//! Turn-based driver between an automated planner and a local command
//! executor.
//!
//! Each turn the planner must emit exactly one of three mutually exclusive
//! intents (run a command, ask the human a question, declare the task
//! finished). This crate decodes that intent from free-form text, validates
//! it, and routes it to the right side effect. The architecture enforces a
//! strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (intent codecs, failure
//!   budget). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting collaborators (HTTP completion service,
//!   process execution, console, config). Isolated to enable mocking in
//!   tests.
//!
//! The [`driver`] module coordinates core logic with I/O to implement the
//! run loop the CLI exposes.

pub mod core;
pub mod driver;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod prompts;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
