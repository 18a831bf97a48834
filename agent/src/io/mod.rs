//! Side-effecting collaborators: HTTP completion service, command
//! dispatcher, console I/O, configuration, task sourcing, transcript sink.

pub mod command;
pub mod completion;
pub mod config;
pub mod console;
pub mod task;
pub mod transcript_log;
