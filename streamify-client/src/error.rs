use std::collections::BTreeMap;
use std::sync::Arc;

use reqwest::StatusCode;
use streamify_common::{ErrorDetail, ErrorEnvelope};
use thiserror::Error;

/// Field-keyed messages from a 422 response, in server order per field.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidationErrors(pub BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    pub fn first(&self, field: &str) -> Option<&str> {
        self.0.get(field)?.first().map(String::as_str)
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fields: Vec<&str> = self.0.keys().map(String::as_str).collect();
        write!(f, "invalid fields: {}", fields.join(", "))
    }
}

#[derive(Error, Debug, Clone)]
pub enum ApiError {
    #[error("validation failed ({0})")]
    Validation(ValidationErrors),

    #[error("not found")]
    NotFound,

    #[error("not authenticated")]
    Unauthenticated,

    #[error("server error {status}: {message}")]
    Server { status: StatusCode, message: String },

    #[error("transport failure: {0}")]
    Transport(Arc<reqwest::Error>),

    #[error("superseded by a newer request for the same key")]
    Superseded,
}

/// Coarse classification used to decide how an error is surfaced.
#[derive(Eq, PartialEq, Clone, Copy, Debug)]
pub enum ErrorKind {
    Validation,
    Server,
    NotFound,
    Unauthenticated,
    Transport,
    Superseded,
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(Arc::new(err))
    }
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Validation(_) => ErrorKind::Validation,
            ApiError::NotFound => ErrorKind::NotFound,
            ApiError::Unauthenticated => ErrorKind::Unauthenticated,
            ApiError::Server { .. } => ErrorKind::Server,
            ApiError::Transport(_) => ErrorKind::Transport,
            ApiError::Superseded => ErrorKind::Superseded,
        }
    }

    /// Whether the user should see a transient notification for this error.
    /// Validation errors go to the form instead, superseded results are
    /// dropped silently.
    pub fn should_notify(&self) -> bool {
        matches!(self.kind(), ErrorKind::Server | ErrorKind::Transport)
    }

    /// Maps a non-success response to the error taxonomy. `lookup` marks a
    /// fetch of one specific resource, where 400 and 404 mean "not found".
    pub fn from_response(status: StatusCode, body: &[u8], lookup: bool) -> Self {
        let detail = serde_json::from_slice::<ErrorEnvelope>(body).ok().map(|e| e.error);
        match status {
            StatusCode::UNPROCESSABLE_ENTITY => match detail {
                Some(ErrorDetail::Fields(fields)) => ApiError::Validation(ValidationErrors(fields)),
                other => ApiError::Server { status, message: message_of(other, body) },
            },
            StatusCode::UNAUTHORIZED => ApiError::Unauthenticated,
            StatusCode::NOT_FOUND | StatusCode::BAD_REQUEST if lookup => ApiError::NotFound,
            _ => ApiError::Server { status, message: message_of(detail, body) },
        }
    }
}

fn message_of(detail: Option<ErrorDetail>, body: &[u8]) -> String {
    match detail {
        Some(ErrorDetail::Message(message)) => message,
        Some(ErrorDetail::Fields(fields)) => ValidationErrors(fields).to_string(),
        None => String::from_utf8_lossy(body).into_owned(),
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}
