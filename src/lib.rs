//! # Task API
//!
//! Stores task records and runs each task's command on request, keeping every
//! run in the task's embedded history.
//!
//! ```text
//!   HTTP (axum) ──▶ TaskService ──▶ TaskRepository (memory | SQLite)
//!                        │
//!                        ▼
//!                 CommandExecutor
//!        allowlist → argv spawn → merged output → 10 s deadline
//! ```
//!
//! ## Modules
//! - `api`: routes, error mapping, server startup
//! - `config`: environment-driven settings
//! - `executor`: allowlisted, shell-free command runner
//! - `service`: task operations and per-task execution locking
//! - `store`: repository trait and its backends
//! - `task`: `Task` and `TaskExecution`

pub mod api;
pub mod config;
pub mod executor;
pub mod service;
pub mod store;
pub mod task;

pub use config::Config;
pub use executor::CommandExecutor;
pub use service::{TaskError, TaskService};
pub use task::{Task, TaskExecution};
