//! Error types for Hookflow.
//!
//! All errors are represented by the `HookflowError` enum. The trigger
//! variants map one-to-one onto the HTTP answers the dispatch layer gives,
//! see [`HookflowError::status_code`].

use std::{io::ErrorKind, string::FromUtf8Error};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for all Hookflow operations.
#[derive(Deserialize, Serialize, Error, Debug, Clone, PartialEq)]
pub enum HookflowError {
    /// No trigger registration exists for the requested `(kind, id)`.
    #[error("trigger '{0}' is not registered")]
    RegistrationNotFound(String),

    /// Webhook called with a method other than the registered one.
    #[error("method {actual} not allowed, webhook expects {expected}")]
    MethodMismatch {
        expected: String,
        actual: String,
    },

    /// The registration is not active. Dispatch answers this with a soft 200.
    #[error("workflow '{0}' is not active")]
    WorkflowInactive(String),

    /// The workflow document store has no workflow for the registration.
    #[error("workflow '{0}' not found")]
    WorkflowDocumentMissing(String),

    /// The workflow exists but no node references the trigger id.
    #[error("no node in workflow '{workflow_id}' references trigger '{trigger_id}'")]
    TriggerNodeMissing {
        workflow_id: String,
        trigger_id: String,
    },

    /// A node's logic failed to parse or instantiate.
    #[error("{0}")]
    NodeCompile(String),

    /// A node's logic raised while running.
    #[error("{0}")]
    NodeRuntime(String),

    /// An execution event could not be persisted.
    #[error("{0}")]
    EventPersist(String),

    /// Caller has no identity, or the identity may not access the resource.
    #[error("not authorized: {0}")]
    Unauthorized(String),

    /// Malformed request input.
    #[error("{0}")]
    BadRequest(String),

    /// Engine-level errors (startup, shutdown, wiring).
    #[error("{0}")]
    Engine(String),

    /// Configuration parsing or validation errors.
    #[error("{0}")]
    Config(String),

    /// Data conversion errors.
    #[error("{0}")]
    Convert(String),

    /// Storage operation errors.
    #[error("{0}")]
    Store(String),

    /// Workflow definition errors.
    #[error("{0}")]
    Workflow(String),

    /// Node definition errors.
    #[error("{0}")]
    Node(String),

    /// Connection definition errors.
    #[error("{0}")]
    Edge(String),

    /// Action execution errors.
    #[error("{0}")]
    Action(String),

    /// I/O operation errors.
    #[error("{0}")]
    IoError(String),
}

impl HookflowError {
    /// HTTP status the dispatch layer answers with for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            HookflowError::RegistrationNotFound(_) => StatusCode::NOT_FOUND,
            HookflowError::MethodMismatch {
                ..
            } => StatusCode::METHOD_NOT_ALLOWED,
            HookflowError::WorkflowInactive(_) => StatusCode::OK,
            HookflowError::WorkflowDocumentMissing(_) => StatusCode::NOT_FOUND,
            HookflowError::TriggerNodeMissing {
                ..
            } => StatusCode::NOT_FOUND,
            HookflowError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            HookflowError::BadRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short label rendered as the `error` field of a JSON error reply.
    pub fn label(&self) -> &'static str {
        match self {
            HookflowError::RegistrationNotFound(_) => "Trigger not found",
            HookflowError::MethodMismatch {
                ..
            } => "Method not allowed",
            HookflowError::WorkflowInactive(_) => "Workflow not active",
            HookflowError::WorkflowDocumentMissing(_) => "Workflow not found",
            HookflowError::TriggerNodeMissing {
                ..
            } => "Trigger node not found",
            HookflowError::Unauthorized(_) => "Not authorized",
            HookflowError::BadRequest(_) => "Bad request",
            HookflowError::NodeCompile(_) | HookflowError::NodeRuntime(_) => "Node execution failed",
            _ => "Internal server error",
        }
    }
}

impl IntoResponse for HookflowError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.label(),
            "details": self.to_string(),
        });
        (self.status_code(), Json(body)).into_response()
    }
}

impl From<HookflowError> for String {
    fn from(val: HookflowError) -> Self {
        val.to_string()
    }
}

impl From<std::io::Error> for HookflowError {
    fn from(error: std::io::Error) -> Self {
        HookflowError::IoError(error.to_string())
    }
}

impl From<HookflowError> for std::io::Error {
    fn from(val: HookflowError) -> Self {
        #[allow(clippy::io_other_error)]
        std::io::Error::new(ErrorKind::Other, val.to_string())
    }
}

impl From<FromUtf8Error> for HookflowError {
    fn from(_: FromUtf8Error) -> Self {
        HookflowError::Convert("Error with utf-8 string convert".to_string())
    }
}

impl From<serde_json::Error> for HookflowError {
    fn from(error: serde_json::Error) -> Self {
        HookflowError::Convert(error.to_string())
    }
}

impl From<jsonschema::ValidationError<'_>> for HookflowError {
    fn from(error: jsonschema::ValidationError<'_>) -> Self {
        HookflowError::NodeCompile(error.to_string())
    }
}
