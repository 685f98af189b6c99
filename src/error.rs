use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt::Display;

use crate::models::ReviewStatus;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized")
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "resource not found")
    }

    pub fn internal<E: Display>(error: E) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status;
        let body = Json(ErrorResponse {
            error: self.message,
        });
        (status, body).into_response()
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        AppError::internal(value)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(value: serde_json::Error) -> Self {
        AppError::bad_request(value.to_string())
    }
}

/// Blocking input problems, reported before any state changes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("a title or body is required")]
    EmptyText,

    #[error("{0} must not be empty")]
    Required(&'static str),

    #[error("review notes are required when marking as {0}")]
    NotesRequired(ReviewStatus),

    #[error("select at least one file to upload")]
    NoFiles,

    #[error("select at least one skin tone")]
    NoTones,

    #[error("none of the selected files are images or videos")]
    NoAcceptedFiles,

    #[error("none of the files could be stored: {}", .0.join("; "))]
    NothingStored(Vec<String>),

    #[error("unknown event {0}")]
    UnknownEvent(String),

    #[error("unknown text group {0}")]
    UnknownGroup(String),

    #[error("{0} must be a positive number")]
    NotPositive(&'static str),

    #[error("end date must not be before start date")]
    EndBeforeStart,

    #[error("nothing to import")]
    EmptyImport,

    #[error("comment must not be empty")]
    EmptyComment,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MutationError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("another {0} is already in progress")]
    Busy(&'static str),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
}

impl MutationError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        MutationError::NotFound {
            entity,
            id: id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_messages_read_naturally() {
        assert_eq!(
            MutationError::from(ValidationError::NotesRequired(ReviewStatus::Hold)).to_string(),
            "review notes are required when marking as Hold"
        );
        assert_eq!(
            MutationError::not_found("asset", "a-1").to_string(),
            "asset a-1 not found"
        );
        assert_eq!(
            MutationError::Busy("upload").to_string(),
            "another upload is already in progress"
        );
    }
}
