//! HTTP API for tasks.

mod error;
mod routes;
mod tasks;

pub use error::ApiError;
pub use routes::{open_store, router, serve, AppState};
