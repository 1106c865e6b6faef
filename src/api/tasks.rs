//! Task API endpoints.
//!
//! - `POST /tasks` / `PUT /tasks` - create or replace a task
//! - `GET /tasks` - list tasks
//! - `GET /tasks/:id` - fetch one task
//! - `GET /tasks/find/by-name/:name` - case-insensitive name search
//! - `DELETE /tasks/:id` - delete a task
//! - `PUT /tasks/execute/:id` - run the task's command and record it

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};

use super::error::ApiError;
use super::routes::AppState;
use crate::task::Task;

/// Create task routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tasks", get(list_tasks).post(create_task).put(update_task))
        .route("/tasks/:id", get(get_task).delete(delete_task))
        .route("/tasks/find/by-name/:name", get(search_tasks))
        .route("/tasks/execute/:id", put(execute_task))
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// POST /tasks - Create a task.
async fn create_task(
    State(state): State<Arc<AppState>>,
    Json(task): Json<Task>,
) -> Result<(StatusCode, Json<Task>), ApiError> {
    let saved = state.tasks.save_task(task).await?;
    tracing::info!(
        "Created task: {} ({})",
        saved.name,
        saved.id.as_deref().unwrap_or_default()
    );
    Ok((StatusCode::CREATED, Json(saved)))
}

/// PUT /tasks - Create or replace a task.
async fn update_task(
    State(state): State<Arc<AppState>>,
    Json(task): Json<Task>,
) -> Result<Json<Task>, ApiError> {
    let saved = state.tasks.save_task(task).await?;
    tracing::info!(
        "Saved task: {} ({})",
        saved.name,
        saved.id.as_deref().unwrap_or_default()
    );
    Ok(Json(saved))
}

/// GET /tasks - List all tasks.
async fn list_tasks(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Task>>, ApiError> {
    Ok(Json(state.tasks.find_all_tasks().await?))
}

/// GET /tasks/:id - Get one task.
async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Task>, ApiError> {
    Ok(Json(state.tasks.find_task_by_id(&id).await?))
}

/// GET /tasks/find/by-name/:name - Search tasks by name fragment.
async fn search_tasks(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<Vec<Task>>, ApiError> {
    Ok(Json(state.tasks.search_tasks_by_name(&name).await?))
}

/// DELETE /tasks/:id - Delete a task.
async fn delete_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.tasks.delete_task_by_id(&id).await?;
    tracing::info!("Deleted task {}", id);
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /tasks/execute/:id - Execute the task's command.
async fn execute_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Task>, ApiError> {
    Ok(Json(state.tasks.execute_task(&id).await?))
}
