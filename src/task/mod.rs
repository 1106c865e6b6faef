//! Task records and their embedded execution history.
//!
//! A [`Task`] is a named, owned command string. Every time the command is run
//! a [`TaskExecution`] is appended to `task_executions`; the history is never
//! edited or reordered once written.

mod types;

pub use types::{Task, TaskExecution};
