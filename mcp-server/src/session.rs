//! Per-connection lifecycle state and capability negotiation.
//!
//! The MCP handshake is a conversation with one peer, so each connection
//! carries its own phase machine; the registries stay process-wide.

use crate::config::ServerConfig;
use crate::errors::McpError;
use mcp_types::ClientCapabilities;
use mcp_types::Implementation;
use mcp_types::InitializeRequest;
use mcp_types::InitializeRequestParams;
use mcp_types::InitializeResult;
use mcp_types::MCP_SCHEMA_VERSION;
use mcp_types::ModelContextProtocolRequest;
use mcp_types::PingRequest;
use mcp_types::ServerCapabilities;
use mcp_types::ServerCapabilitiesPrompts;
use mcp_types::ServerCapabilitiesResources;
use mcp_types::ServerCapabilitiesTools;

/// Handshake phases. Transitions are monotonic; the only exit from
/// `Ready` is `ShuttingDown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Uninitialized,
    Initializing,
    Ready,
    ShuttingDown,
}

#[derive(Debug)]
pub struct SessionState {
    phase: SessionPhase,
    client_info: Option<Implementation>,
    client_capabilities: Option<ClientCapabilities>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            phase: SessionPhase::Uninitialized,
            client_info: None,
            client_capabilities: None,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn client_info(&self) -> Option<&Implementation> {
        self.client_info.as_ref()
    }

    pub fn client_capabilities(&self) -> Option<&ClientCapabilities> {
        self.client_capabilities.as_ref()
    }

    /// Whether a request for `method` may be dispatched in the current
    /// phase. Notifications are never gated here.
    pub fn allows_request(&self, method: &str) -> bool {
        if method == PingRequest::METHOD {
            return true;
        }
        match self.phase {
            SessionPhase::Ready => true,
            SessionPhase::Uninitialized | SessionPhase::Initializing => {
                method == InitializeRequest::METHOD
            }
            SessionPhase::ShuttingDown => false,
        }
    }

    /// `initialize` request: Uninitialized -> Initializing.
    pub(crate) fn begin_initialize(
        &mut self,
        params: &InitializeRequestParams,
    ) -> Result<(), McpError> {
        if self.phase != SessionPhase::Uninitialized {
            return Err(McpError::invalid_lifecycle(
                "initialize called more than once",
            ));
        }
        self.phase = SessionPhase::Initializing;
        self.client_info = params.client_info.clone();
        self.client_capabilities = Some(params.capabilities.clone());
        Ok(())
    }

    /// `notifications/initialized`: Initializing -> Ready.
    pub(crate) fn confirm_initialized(&mut self) -> Result<(), McpError> {
        if self.phase != SessionPhase::Initializing {
            return Err(McpError::invalid_lifecycle(
                "initialized notification before initialize",
            ));
        }
        self.phase = SessionPhase::Ready;
        Ok(())
    }

    /// `shutdown` request: Ready -> ShuttingDown.
    pub(crate) fn begin_shutdown(&mut self) -> Result<(), McpError> {
        if self.phase != SessionPhase::Ready {
            return Err(McpError::invalid_lifecycle("shutdown before ready"));
        }
        self.phase = SessionPhase::ShuttingDown;
        Ok(())
    }
}

/// The capability set advertised on `initialize`.
pub(crate) fn server_capabilities(config: &ServerConfig) -> ServerCapabilities {
    ServerCapabilities {
        logging: Some(serde_json::json!({})),
        prompts: Some(ServerCapabilitiesPrompts {
            list_changed: Some(true),
        }),
        resources: Some(ServerCapabilitiesResources {
            list_changed: Some(true),
            subscribe: Some(config.supports_subscriptions),
        }),
        tools: Some(ServerCapabilitiesTools {
            list_changed: Some(true),
        }),
    }
}

pub(crate) fn initialize_result(config: &ServerConfig) -> InitializeResult {
    InitializeResult {
        capabilities: server_capabilities(config),
        instructions: config.instructions.clone(),
        protocol_version: MCP_SCHEMA_VERSION.to_string(),
        server_info: Implementation {
            name: config.server_name.clone(),
            title: None,
            version: config.server_version.clone(),
        },
    }
}
