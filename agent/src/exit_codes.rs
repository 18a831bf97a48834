//! Stable exit codes for the agent CLI.

/// The run finished with the planner reporting completion.
pub const OK: i32 = 0;
/// Setup or collaborator error (config, endpoint, dispatch plumbing).
pub const ERROR: i32 = 1;
/// The run ended without completion (budget exhausted or interrupted).
pub const ABORTED: i32 = 2;
