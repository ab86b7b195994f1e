//! Error taxonomy for the server runtime.
//!
//! Internal failures are expressed as typed errors close to where they
//! happen (registries, progress tracking) and converge on [`McpError`],
//! the JSON-RPC error payload sent back to the peer. Handler errors never
//! cross the connection loop; transport errors never become JSON-RPC
//! errors (see the framing and connection modules).

use crate::error_code::INTERNAL_ERROR_CODE;
use crate::error_code::INVALID_PARAMS_ERROR_CODE;
use crate::error_code::METHOD_NOT_FOUND_ERROR_CODE;
use crate::error_code::NOT_INITIALIZED_ERROR_CODE;
use crate::error_code::PROGRESS_TOKEN_IN_USE_ERROR_CODE;
use crate::error_code::TOOL_EXECUTION_ERROR_CODE;
use mcp_types::JSONRPCErrorError;
use serde_json::json;
use thiserror::Error;

/// A JSON-RPC error payload: the terminal form of every request failure.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} (code {code})")]
pub struct McpError {
    pub code: i64,
    pub message: String,
    pub data: Option<serde_json::Value>,
}

impl McpError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(INVALID_PARAMS_ERROR_CODE, message)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(METHOD_NOT_FOUND_ERROR_CODE, format!("method not found: {method}"))
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(INTERNAL_ERROR_CODE, message)
    }

    pub fn not_initialized() -> Self {
        Self::new(NOT_INITIALIZED_ERROR_CODE, "server not initialized")
    }

    pub fn invalid_lifecycle(message: impl Into<String>) -> Self {
        Self::new(NOT_INITIALIZED_ERROR_CODE, message)
    }

    pub fn resource_not_found(uri: &str) -> Self {
        Self::new(NOT_INITIALIZED_ERROR_CODE, format!("resource not found: {uri}"))
            .with_data(json!({ "uri": uri }))
    }

    pub fn tool_execution(message: impl Into<String>) -> Self {
        Self::new(TOOL_EXECUTION_ERROR_CODE, message)
    }
}

impl From<McpError> for JSONRPCErrorError {
    fn from(err: McpError) -> Self {
        JSONRPCErrorError {
            code: err.code,
            message: err.message,
            data: err.data,
        }
    }
}

/// Failures raised by the tool/resource/prompt registries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("duplicate name: {0}")]
    DuplicateName(String),

    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    #[error("subscriptions are disabled for this registry")]
    SubscriptionsDisabled,
}

impl From<RegistryError> for McpError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::DuplicateName(name) => {
                McpError::invalid_params(format!("duplicate name: {name}"))
            }
            RegistryError::ResourceNotFound(uri) => McpError::resource_not_found(&uri),
            RegistryError::SubscriptionsDisabled => {
                McpError::invalid_params("subscriptions are not supported")
            }
        }
    }
}

/// Failures raised by the progress tracker.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProgressError {
    #[error("progress token already in use: {0}")]
    TokenInUse(String),

    #[error("progress must not decrease: {previous} -> {proposed}")]
    NonMonotonic { previous: f64, proposed: f64 },

    #[error("progress {progress} exceeds total {total}")]
    ExceedsTotal { progress: f64, total: f64 },

    #[error("progress tracker is closed")]
    Closed,
}

impl From<ProgressError> for McpError {
    fn from(err: ProgressError) -> Self {
        match err {
            ProgressError::TokenInUse(token) => McpError::new(
                PROGRESS_TOKEN_IN_USE_ERROR_CODE,
                format!("progress token already in use: {token}"),
            ),
            other => McpError::invalid_params(other.to_string()),
        }
    }
}
