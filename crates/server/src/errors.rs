use axum::{http::StatusCode, response::IntoResponse};
use serde::Serialize;

use crate::store::StoreError;

/// Error response rendered as `{ "error": ..., "_id"?: ... }`.
#[derive(Debug)]
pub struct ServerError {
    status: StatusCode,
    body: ErrorBody,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct ErrorBody {
    error: String,
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    id: Option<String>,
}

impl ServerError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                error: message.into(),
                id: None,
            },
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// 400 that echoes the `_id` the client sent.
    pub fn for_issue(message: impl Into<String>, id: impl Into<String>) -> Self {
        let mut err = Self::bad_request(message);
        err.body.id = Some(id.into());
        err
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.body.error
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        (self.status, axum::Json(self.body)).into_response()
    }
}

impl From<StoreError> for ServerError {
    fn from(err: StoreError) -> Self {
        tracing::error!(error = %err, "issue store failure");
        ServerError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    }
}
