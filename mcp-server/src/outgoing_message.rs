//! Outbound message path for one connection.
//!
//! Handlers and registries enqueue typed messages here; the connection's
//! writer task serializes and frames them. Funneling every outbound frame
//! through one channel is what keeps frames atomic on the wire: the writer
//! is the only task that touches the write half.

use crate::connection::ConnectionId;
use crate::errors::McpError;
use mcp_types::JSONRPC_VERSION;
use mcp_types::JSONRPCError;
use mcp_types::JSONRPCErrorError;
use mcp_types::JSONRPCMessage;
use mcp_types::JSONRPCNotification;
use mcp_types::JSONRPCResponse;
use mcp_types::RequestId;
use tokio::sync::mpsc;
use tracing::warn;

/// Sends messages to the peer on one connection.
#[derive(Debug)]
pub struct OutgoingMessageSender {
    connection: ConnectionId,
    sender: mpsc::UnboundedSender<OutgoingMessage>,
}

impl OutgoingMessageSender {
    pub(crate) fn new(
        connection: ConnectionId,
        sender: mpsc::UnboundedSender<OutgoingMessage>,
    ) -> Self {
        Self { connection, sender }
    }

    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    pub(crate) fn send_response(&self, id: RequestId, result: serde_json::Value) {
        self.send(OutgoingMessage::Response(OutgoingResponse { id, result }));
    }

    pub(crate) fn send_error(&self, id: Option<RequestId>, error: McpError) {
        self.send(OutgoingMessage::Error(OutgoingError {
            id,
            error: error.into(),
        }));
    }

    /// Enqueues a server-originated notification (progress, resource
    /// updates, list-changed).
    pub fn send_notification(&self, method: &str, params: Option<serde_json::Value>) {
        self.send(OutgoingMessage::Notification(OutgoingNotification {
            method: method.to_string(),
            params,
        }));
    }

    pub(crate) fn send_batch(&self, responses: Vec<JSONRPCMessage>) {
        self.send(OutgoingMessage::Batch(responses));
    }

    fn send(&self, message: OutgoingMessage) {
        if self.sender.send(message).is_err() {
            // Writer gone: the connection is tearing down and the
            // response is discarded, per the write-failure policy.
            warn!(connection = %self.connection, "dropping outbound message, writer closed");
        }
    }
}

/// Outgoing message from the server to the client.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum OutgoingMessage {
    Response(OutgoingResponse),
    Error(OutgoingError),
    Notification(OutgoingNotification),
    /// Responses to a batch request, emitted as one frame.
    Batch(Vec<JSONRPCMessage>),
}

impl OutgoingMessage {
    /// Serializes to the JSON payload handed to the framing writer.
    pub(crate) fn into_payload(self) -> Result<String, serde_json::Error> {
        match self {
            OutgoingMessage::Batch(messages) => serde_json::to_string(&messages),
            OutgoingMessage::Response(OutgoingResponse { id, result }) => {
                serde_json::to_string(&JSONRPCMessage::Response(JSONRPCResponse {
                    jsonrpc: JSONRPC_VERSION.into(),
                    id,
                    result,
                }))
            }
            OutgoingMessage::Error(OutgoingError { id, error }) => {
                serde_json::to_string(&JSONRPCMessage::Error(JSONRPCError {
                    jsonrpc: JSONRPC_VERSION.into(),
                    id,
                    error,
                }))
            }
            OutgoingMessage::Notification(OutgoingNotification { method, params }) => {
                serde_json::to_string(&JSONRPCMessage::Notification(JSONRPCNotification {
                    jsonrpc: JSONRPC_VERSION.into(),
                    method,
                    params,
                }))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct OutgoingResponse {
    pub id: RequestId,
    pub result: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct OutgoingError {
    /// Null when the offending request id could not be determined.
    pub id: Option<RequestId>,
    pub error: JSONRPCErrorError,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct OutgoingNotification {
    pub method: String,
    pub params: Option<serde_json::Value>,
}
