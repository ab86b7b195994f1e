//! JSON-RPC 2.0 wire parsing and message classification.
//!
//! Untagged serde deserialization alone cannot enforce the envelope rules
//! (a request with `id: null` would fall through to the notification
//! variant), so raw input is classified field-by-field here before any
//! typed struct is built. Batches classify each element independently:
//! input that is not valid JSON at all is a single parse error, while a
//! parseable element with an ill-formed envelope becomes a per-element
//! invalid-request response.

use crate::error_code::INVALID_REQUEST_ERROR_CODE;
use crate::errors::McpError;
use mcp_types::JSONRPC_VERSION;
use mcp_types::JSONRPCError;
use mcp_types::JSONRPCNotification;
use mcp_types::JSONRPCRequest;
use mcp_types::JSONRPCResponse;
use mcp_types::RequestId;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

/// One wire message: a single JSON-RPC envelope or a batch of them.
#[derive(Debug, Clone, PartialEq)]
pub enum IncomingMessage {
    Single(IncomingItem),
    Batch(Vec<IncomingItem>),
}

/// A classified element of the incoming stream. `Invalid` carries the
/// ready-made error so the processor can answer without re-inspecting
/// the original bytes.
#[derive(Debug, Clone, PartialEq)]
pub enum IncomingItem {
    Request(JSONRPCRequest),
    Notification(JSONRPCNotification),
    /// A response from the peer to a server-initiated request.
    Response(JSONRPCResponse),
    /// An error object from the peer.
    PeerError(JSONRPCError),
    Invalid {
        id: Option<RequestId>,
        error: McpError,
    },
}

/// Failures that poison the whole input rather than one element.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("empty batch")]
    EmptyBatch,
}

/// Parses one frame's payload into classified messages.
pub fn parse_message(bytes: &[u8]) -> Result<IncomingMessage, ParseError> {
    let value: Value = serde_json::from_slice(bytes)?;
    match value {
        Value::Array(items) => {
            if items.is_empty() {
                return Err(ParseError::EmptyBatch);
            }
            Ok(IncomingMessage::Batch(items.into_iter().map(classify).collect()))
        }
        other => Ok(IncomingMessage::Single(classify(other))),
    }
}

fn invalid(id: Option<RequestId>, message: impl Into<String>) -> IncomingItem {
    IncomingItem::Invalid {
        id,
        error: McpError::new(INVALID_REQUEST_ERROR_CODE, message),
    }
}

/// Best-effort id extraction for error reporting: a string or integer id
/// is echoed, anything else maps to null.
fn salvage_id(object: &Map<String, Value>) -> Option<RequestId> {
    match object.get("id") {
        Some(Value::String(s)) => Some(RequestId::String(s.clone())),
        Some(Value::Number(n)) => n.as_i64().map(RequestId::Integer),
        _ => None,
    }
}

fn classify(value: Value) -> IncomingItem {
    let Value::Object(object) = value else {
        return invalid(None, "message must be a JSON object");
    };

    let id = salvage_id(&object);

    match object.get("jsonrpc") {
        Some(Value::String(version)) if version == JSONRPC_VERSION => {}
        Some(_) => return invalid(id, "jsonrpc version must be the string \"2.0\""),
        None => return invalid(id, "missing jsonrpc version"),
    }

    if let Some(method_value) = object.get("method") {
        let Some(method) = method_value.as_str() else {
            return invalid(id, "method must be a string");
        };
        if method.is_empty() {
            return invalid(id, "method must not be empty");
        }
        let method = method.to_string();
        let params = object.get("params").cloned();

        return match object.get("id") {
            None => IncomingItem::Notification(JSONRPCNotification {
                jsonrpc: JSONRPC_VERSION.into(),
                method,
                params,
            }),
            Some(Value::Null) => invalid(None, "request id must not be null"),
            Some(Value::String(s)) => IncomingItem::Request(JSONRPCRequest {
                jsonrpc: JSONRPC_VERSION.into(),
                id: RequestId::String(s.clone()),
                method,
                params,
            }),
            Some(Value::Number(n)) => match n.as_i64() {
                Some(i) => IncomingItem::Request(JSONRPCRequest {
                    jsonrpc: JSONRPC_VERSION.into(),
                    id: RequestId::Integer(i),
                    method,
                    params,
                }),
                None => invalid(None, "request id must be a string or integer"),
            },
            Some(_) => invalid(None, "request id must be a string or integer"),
        };
    }

    // No method: a response or error object from the peer.
    let value = Value::Object(object);
    if value.get("result").is_some() {
        return match serde_json::from_value::<JSONRPCResponse>(value) {
            Ok(response) => IncomingItem::Response(response),
            Err(err) => invalid(id, format!("malformed response object: {err}")),
        };
    }
    if value.get("error").is_some() {
        return match serde_json::from_value::<JSONRPCError>(value) {
            Ok(error) => IncomingItem::PeerError(error),
            Err(err) => invalid(id, format!("malformed error object: {err}")),
        };
    }
    invalid(id, "message is neither request, notification, response, nor error")
}
