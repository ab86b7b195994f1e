//! Wire types for the Model Context Protocol.
//!
//! JSON-RPC 2.0 envelopes plus the MCP payload types exchanged during the
//! handshake and when listing/calling the three primitive kinds (tools,
//! resources, prompts). Serialization follows the MCP schema: camelCase
//! field names on the wire, optional fields omitted entirely.

use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;

pub const JSONRPC_VERSION: &str = "2.0";

/// Protocol revision advertised in the `initialize` response.
pub const MCP_SCHEMA_VERSION: &str = "2024-11-05";

/// Binds a method name to its params and result types so handlers can be
/// written against concrete types instead of raw `serde_json::Value`.
pub trait ModelContextProtocolRequest {
    const METHOD: &'static str;
    type Params: DeserializeOwned + Serialize + Send + Sync + 'static;
    type Result: DeserializeOwned + Serialize + Send + Sync + 'static;
}

/// Notification counterpart of [`ModelContextProtocolRequest`].
pub trait ModelContextProtocolNotification {
    const METHOD: &'static str;
    type Params: DeserializeOwned + Serialize + Send + Sync + 'static;
}

/// A request id: string or integer, echoed bit-identically on the response.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    String(String),
    Integer(i64),
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::String(s) => write!(f, "{s}"),
            RequestId::Integer(i) => write!(f, "{i}"),
        }
    }
}

/// Progress tokens share the id shape: requester-chosen string or integer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProgressToken {
    String(String),
    Integer(i64),
}

impl fmt::Display for ProgressToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressToken::String(s) => write!(f, "{s}"),
            ProgressToken::Integer(i) => write!(f, "{i}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JSONRPCRequest {
    pub jsonrpc: String,
    pub id: RequestId,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JSONRPCNotification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JSONRPCResponse {
    pub jsonrpc: String,
    pub id: RequestId,
    pub result: serde_json::Value,
}

/// Error payload carried by a JSON-RPC error response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JSONRPCErrorError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JSONRPCError {
    pub jsonrpc: String,
    /// Null when the offending request id could not be determined.
    pub id: Option<RequestId>,
    pub error: JSONRPCErrorError,
}

/// Any single JSON-RPC message. Batches are handled one level up; see the
/// server's wire module for the classification rules applied to raw input
/// (untagged deserialization alone cannot reject `id: null` requests).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JSONRPCMessage {
    Request(JSONRPCRequest),
    Response(JSONRPCResponse),
    Error(JSONRPCError),
    Notification(JSONRPCNotification),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Implementation {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub version: String,
}

/// Capabilities declared by the client on `initialize`. Stored for handler
/// consultation; the server does not change behavior based on them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientCapabilities {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experimental: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roots: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sampling: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerCapabilitiesTools {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerCapabilitiesResources {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscribe: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerCapabilitiesPrompts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerCapabilities {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompts: Option<ServerCapabilitiesPrompts>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ServerCapabilitiesResources>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<ServerCapabilitiesTools>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeRequestParams {
    #[serde(default)]
    pub capabilities: ClientCapabilities,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_info: Option<Implementation>,
    pub protocol_version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub capabilities: ServerCapabilities,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    pub protocol_version: String,
    pub server_info: Implementation,
}

/// A block of content returned by a tool call or embedded in a prompt
/// message. Tagged by `type` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "text")]
    Text(TextContent),
    #[serde(rename = "image")]
    Image(ImageContent),
    #[serde(rename = "resource")]
    ResourceRef(ResourceRefContent),
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text(TextContent { text: text.into() })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageContent {
    /// Base64-encoded image bytes.
    pub data: String,
    pub mime_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRefContent {
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// Descriptor of a registered tool, as returned by `tools/list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub name: String,
    pub description: String,
    /// JSON-Schema object describing the tool's arguments.
    pub input_schema: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListToolsResult {
    pub tools: Vec<Tool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallToolRequestParams {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    pub content: Vec<ContentBlock>,
    pub is_error: bool,
}

/// Descriptor of a registered resource, as returned by `resources/list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub uri: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListResourcesResult {
    pub resources: Vec<Resource>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadResourceRequestParams {
    pub uri: String,
}

/// Resource payload: exactly one of `text` or `blob` per contents entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceContents {
    Text(TextResourceContents),
    Blob(BlobResourceContents),
}

impl ResourceContents {
    pub fn uri(&self) -> &str {
        match self {
            ResourceContents::Text(t) => &t.uri,
            ResourceContents::Blob(b) => &b.uri,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextResourceContents {
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobResourceContents {
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Base64-encoded binary payload.
    pub blob: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadResourceResult {
    pub contents: Vec<ResourceContents>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscribeRequestParams {
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnsubscribeRequestParams {
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceUpdatedNotificationParams {
    pub uri: String,
}

/// Descriptor of a registered prompt template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<PromptArgument>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptArgument {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListPromptsResult {
    pub prompts: Vec<Prompt>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetPromptRequestParams {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: Role,
    pub content: ContentBlock,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetPromptResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub messages: Vec<PromptMessage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressNotificationParams {
    pub progress_token: ProgressToken,
    pub progress: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelledNotificationParams {
    pub request_id: RequestId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Request-level `_meta`, carried inside `params`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_token: Option<ProgressToken>,
}

impl RequestMeta {
    /// Pulls `_meta` out of a raw params value, tolerating its absence.
    pub fn from_params(params: Option<&serde_json::Value>) -> Option<RequestMeta> {
        let meta = params?.get("_meta")?;
        serde_json::from_value(meta.clone()).ok()
    }
}

macro_rules! mcp_request {
    ($name:ident, $method:literal, $params:ty, $result:ty) => {
        #[derive(Debug)]
        pub enum $name {}

        impl ModelContextProtocolRequest for $name {
            const METHOD: &'static str = $method;
            type Params = $params;
            type Result = $result;
        }
    };
}

mcp_request!(
    InitializeRequest,
    "initialize",
    InitializeRequestParams,
    InitializeResult
);
mcp_request!(PingRequest, "ping", Option<serde_json::Value>, serde_json::Value);
mcp_request!(ListToolsRequest, "tools/list", Option<serde_json::Value>, ListToolsResult);
mcp_request!(CallToolRequest, "tools/call", CallToolRequestParams, CallToolResult);
mcp_request!(
    ListResourcesRequest,
    "resources/list",
    Option<serde_json::Value>,
    ListResourcesResult
);
mcp_request!(
    ReadResourceRequest,
    "resources/read",
    ReadResourceRequestParams,
    ReadResourceResult
);
mcp_request!(
    SubscribeRequest,
    "resources/subscribe",
    SubscribeRequestParams,
    serde_json::Value
);
mcp_request!(
    UnsubscribeRequest,
    "resources/unsubscribe",
    UnsubscribeRequestParams,
    serde_json::Value
);
mcp_request!(ListPromptsRequest, "prompts/list", Option<serde_json::Value>, ListPromptsResult);
mcp_request!(GetPromptRequest, "prompts/get", GetPromptRequestParams, GetPromptResult);
mcp_request!(ShutdownRequest, "shutdown", Option<serde_json::Value>, serde_json::Value);

macro_rules! mcp_notification {
    ($name:ident, $method:literal, $params:ty) => {
        #[derive(Debug)]
        pub enum $name {}

        impl ModelContextProtocolNotification for $name {
            const METHOD: &'static str = $method;
            type Params = $params;
        }
    };
}

mcp_notification!(InitializedNotification, "notifications/initialized", Option<serde_json::Value>);
mcp_notification!(
    CancelledNotification,
    "notifications/cancelled",
    CancelledNotificationParams
);
mcp_notification!(ProgressNotification, "$/progress", ProgressNotificationParams);
mcp_notification!(
    ResourceUpdatedNotification,
    "notifications/resources/updated",
    ResourceUpdatedNotificationParams
);
mcp_notification!(
    ResourceListChangedNotification,
    "notifications/resources/list_changed",
    Option<serde_json::Value>
);
mcp_notification!(
    ToolListChangedNotification,
    "notifications/tools/list_changed",
    Option<serde_json::Value>
);
mcp_notification!(
    PromptListChangedNotification,
    "notifications/prompts/list_changed",
    Option<serde_json::Value>
);

/// A request from the client, narrowed to a known MCP method with its
/// params deserialized. Unknown methods and bad params are reported
/// distinctly so the dispatcher can answer −32601 vs −32602.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientRequest {
    Initialize(InitializeRequestParams),
    Ping(Option<serde_json::Value>),
    ListTools(Option<serde_json::Value>),
    CallTool(CallToolRequestParams),
    ListResources(Option<serde_json::Value>),
    ReadResource(ReadResourceRequestParams),
    Subscribe(SubscribeRequestParams),
    Unsubscribe(UnsubscribeRequestParams),
    ListPrompts(Option<serde_json::Value>),
    GetPrompt(GetPromptRequestParams),
    Shutdown(Option<serde_json::Value>),
}

/// Why a [`JSONRPCRequest`] could not become a [`ClientRequest`].
#[derive(Debug, Clone, PartialEq)]
pub enum TryFromRequestError {
    UnknownMethod(String),
    InvalidParams { method: String, message: String },
}

impl fmt::Display for TryFromRequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TryFromRequestError::UnknownMethod(method) => {
                write!(f, "unknown method: {method}")
            }
            TryFromRequestError::InvalidParams { method, message } => {
                write!(f, "invalid params for {method}: {message}")
            }
        }
    }
}

impl std::error::Error for TryFromRequestError {}

fn parse_params<P: DeserializeOwned>(
    method: &str,
    params: Option<serde_json::Value>,
) -> Result<P, TryFromRequestError> {
    serde_json::from_value(params.unwrap_or(serde_json::Value::Null)).map_err(|err| {
        TryFromRequestError::InvalidParams {
            method: method.to_string(),
            message: err.to_string(),
        }
    })
}

impl TryFrom<JSONRPCRequest> for ClientRequest {
    type Error = TryFromRequestError;

    fn try_from(request: JSONRPCRequest) -> Result<Self, Self::Error> {
        let JSONRPCRequest { method, params, .. } = request;
        match method.as_str() {
            InitializeRequest::METHOD => {
                Ok(ClientRequest::Initialize(parse_params(&method, params)?))
            }
            PingRequest::METHOD => Ok(ClientRequest::Ping(params)),
            ListToolsRequest::METHOD => Ok(ClientRequest::ListTools(params)),
            CallToolRequest::METHOD => {
                Ok(ClientRequest::CallTool(parse_params(&method, params)?))
            }
            ListResourcesRequest::METHOD => Ok(ClientRequest::ListResources(params)),
            ReadResourceRequest::METHOD => {
                Ok(ClientRequest::ReadResource(parse_params(&method, params)?))
            }
            SubscribeRequest::METHOD => {
                Ok(ClientRequest::Subscribe(parse_params(&method, params)?))
            }
            UnsubscribeRequest::METHOD => {
                Ok(ClientRequest::Unsubscribe(parse_params(&method, params)?))
            }
            ListPromptsRequest::METHOD => Ok(ClientRequest::ListPrompts(params)),
            GetPromptRequest::METHOD => {
                Ok(ClientRequest::GetPrompt(parse_params(&method, params)?))
            }
            ShutdownRequest::METHOD => Ok(ClientRequest::Shutdown(params)),
            _ => Err(TryFromRequestError::UnknownMethod(method.clone())),
        }
    }
}

/// A notification from the client, narrowed to a known MCP method.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientNotification {
    Initialized,
    Cancelled(CancelledNotificationParams),
    Progress(ProgressNotificationParams),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TryFromNotificationError(pub String);

impl fmt::Display for TryFromNotificationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown or malformed notification: {}", self.0)
    }
}

impl std::error::Error for TryFromNotificationError {}

impl TryFrom<JSONRPCNotification> for ClientNotification {
    type Error = TryFromNotificationError;

    fn try_from(notification: JSONRPCNotification) -> Result<Self, Self::Error> {
        let JSONRPCNotification { method, params, .. } = notification;
        match method.as_str() {
            InitializedNotification::METHOD => Ok(ClientNotification::Initialized),
            CancelledNotification::METHOD => {
                let params = serde_json::from_value(params.unwrap_or(serde_json::Value::Null))
                    .map_err(|_| TryFromNotificationError(method))?;
                Ok(ClientNotification::Cancelled(params))
            }
            ProgressNotification::METHOD => {
                let params = serde_json::from_value(params.unwrap_or(serde_json::Value::Null))
                    .map_err(|_| TryFromNotificationError(method))?;
                Ok(ClientNotification::Progress(params))
            }
            _ => Err(TryFromNotificationError(method)),
        }
    }
}
