//! Mapping of task errors onto HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::service::TaskError;

/// An error response: status code plus a message shown to the client.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    status: u16,
    error: &'a str,
    message: &'a str,
}

impl From<TaskError> for ApiError {
    fn from(e: TaskError) -> Self {
        let status = match &e {
            TaskError::NotFound(_) => StatusCode::NOT_FOUND,
            TaskError::DisallowedCommand(_) => StatusCode::BAD_REQUEST,
            TaskError::Spawn(_) => StatusCode::INTERNAL_SERVER_ERROR,
            TaskError::Store(err) => {
                tracing::error!("Task store failure: {}", err);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self {
            status,
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            status: self.status.as_u16(),
            error: self.status.canonical_reason().unwrap_or("Error"),
            message: &self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (TaskError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (TaskError::DisallowedCommand("rm".into()), StatusCode::BAD_REQUEST),
            (TaskError::Spawn("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (
                TaskError::Store(StoreError::Background("gone".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status, expected);
        }
    }

    #[test]
    fn test_not_found_message_names_id() {
        let err = ApiError::from(TaskError::NotFound("abc-123".into()));
        assert_eq!(err.message, "Task not found with ID: abc-123");
    }
}
