//! Per-connection message processing.
//!
//! One processor per connection drives classified incoming messages
//! through the dispatcher, strictly in arrival order, and turns dispatch
//! outcomes into outgoing frames. Batch requests produce one response
//! batch preserving input order, with notification slots omitted; a batch
//! of nothing but notifications produces no bytes at all.

use crate::arena::Arena;
use crate::config::ServerConfig;
use crate::dispatcher::DispatchResult;
use crate::dispatcher::Dispatcher;
use crate::dispatcher::RequestCx;
use crate::errors::McpError;
use crate::errors::RegistryError;
use crate::jsonrpc::IncomingItem;
use crate::jsonrpc::IncomingMessage;
use crate::outgoing_message::OutgoingMessageSender;
use crate::progress::ProgressRegistry;
use crate::prompts::PromptRegistry;
use crate::resources::CallbackId;
use crate::resources::ResourceRegistry;
use crate::session::SessionState;
use crate::session::initialize_result;
use crate::tools::ToolRegistry;
use mcp_types::CallToolRequest;
use mcp_types::CancelledNotification;
use mcp_types::GetPromptRequest;
use mcp_types::InitializeRequest;
use mcp_types::InitializedNotification;
use mcp_types::JSONRPC_VERSION;
use mcp_types::JSONRPCError;
use mcp_types::JSONRPCMessage;
use mcp_types::JSONRPCNotification;
use mcp_types::JSONRPCRequest;
use mcp_types::JSONRPCResponse;
use mcp_types::ListPromptsRequest;
use mcp_types::ListPromptsResult;
use mcp_types::ListResourcesRequest;
use mcp_types::ListResourcesResult;
use mcp_types::ListToolsRequest;
use mcp_types::ListToolsResult;
use mcp_types::MCP_SCHEMA_VERSION;
use mcp_types::ModelContextProtocolNotification;
use mcp_types::ModelContextProtocolRequest;
use mcp_types::PingRequest;
use mcp_types::ReadResourceRequest;
use mcp_types::ReadResourceResult;
use mcp_types::RequestId;
use mcp_types::RequestMeta;
use mcp_types::ResourceUpdatedNotification;
use mcp_types::ResourceUpdatedNotificationParams;
use mcp_types::ShutdownRequest;
use mcp_types::SubscribeRequest;
use mcp_types::UnsubscribeRequest;
use serde_json::Value;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::trace;
use tracing::warn;

pub(crate) struct MessageProcessor {
    dispatcher: Arc<Dispatcher>,
    progress: Arc<ProgressRegistry>,
    outgoing: Arc<OutgoingMessageSender>,
    session: SessionState,
}

impl MessageProcessor {
    pub(crate) fn new(
        dispatcher: Arc<Dispatcher>,
        progress: Arc<ProgressRegistry>,
        outgoing: Arc<OutgoingMessageSender>,
    ) -> Self {
        Self {
            dispatcher,
            progress,
            outgoing,
            session: SessionState::new(),
        }
    }

    /// Processes one wire message under the request's arena. A handler
    /// runs to completion before the next message is looked at.
    pub(crate) fn process(&mut self, arena: &mut Arena, message: IncomingMessage) {
        match message {
            IncomingMessage::Single(item) => {
                if let Some(reply) = self.process_item(arena, item) {
                    self.send_reply(reply);
                }
            }
            IncomingMessage::Batch(items) => {
                let mut replies = Vec::new();
                for item in items {
                    if let Some(reply) = self.process_item(arena, item) {
                        replies.push(reply.into_message());
                    }
                }
                if !replies.is_empty() {
                    self.outgoing.send_batch(replies);
                }
            }
        }
    }

    fn process_item(&mut self, arena: &mut Arena, item: IncomingItem) -> Option<Reply> {
        match item {
            IncomingItem::Request(request) => Some(self.dispatch_request(arena, request)),
            IncomingItem::Notification(notification) => {
                self.dispatch_notification(arena, notification);
                None
            }
            IncomingItem::Response(response) => {
                info!("<- response: {response:?}");
                None
            }
            IncomingItem::PeerError(err) => {
                error!("<- error: {err:?}");
                None
            }
            IncomingItem::Invalid { id, error } => Some(Reply::Error { id, error }),
        }
    }

    fn dispatch_request(&mut self, arena: &mut Arena, request: JSONRPCRequest) -> Reply {
        let JSONRPCRequest { id, method, params, .. } = request;
        trace!(%id, %method, "-> request");

        let progress_token =
            RequestMeta::from_params(params.as_ref()).and_then(|meta| meta.progress_token);
        let tracker = match progress_token {
            Some(token) => {
                match self.progress.start(Arc::clone(&self.outgoing), token, None) {
                    Ok(tracker) => Some(tracker),
                    Err(err) => {
                        return Reply::Error {
                            id: Some(id),
                            error: err.into(),
                        };
                    }
                }
            }
            None => None,
        };

        let outcome = {
            let mut ctx = RequestCx {
                method: &method,
                request_id: Some(&id),
                params: params.as_ref(),
                arena,
                session: &mut self.session,
                outgoing: &self.outgoing,
                progress: tracker.as_ref(),
            };
            self.dispatcher.dispatch(&mut ctx)
        };

        if let Some(tracker) = tracker {
            // Already-closed means the handler completed it itself.
            let _ = tracker.complete();
        }

        match outcome {
            Ok(value) => Reply::Result { id, value },
            Err(error) => Reply::Error { id: Some(id), error },
        }
    }

    fn dispatch_notification(&mut self, arena: &mut Arena, notification: JSONRPCNotification) {
        let JSONRPCNotification { method, params, .. } = notification;
        trace!(%method, "-> notification");

        let mut ctx = RequestCx {
            method: &method,
            request_id: None,
            params: params.as_ref(),
            arena,
            session: &mut self.session,
            outgoing: &self.outgoing,
            progress: None,
        };
        // The outcome of a notification is discarded; hooks still fired.
        if let Err(err) = self.dispatcher.dispatch(&mut ctx) {
            debug!(%method, "notification dispatch failed: {err}");
        }
    }

    fn send_reply(&self, reply: Reply) {
        match reply {
            Reply::Result { id, value } => self.outgoing.send_response(id, value),
            Reply::Error { id, error } => self.outgoing.send_error(id, error),
        }
    }
}

/// One request's outcome, not yet serialized.
enum Reply {
    Result { id: RequestId, value: Value },
    Error { id: Option<RequestId>, error: McpError },
}

impl Reply {
    fn into_message(self) -> JSONRPCMessage {
        match self {
            Reply::Result { id, value } => JSONRPCMessage::Response(JSONRPCResponse {
                jsonrpc: JSONRPC_VERSION.into(),
                id,
                result: value,
            }),
            Reply::Error { id, error } => JSONRPCMessage::Error(JSONRPCError {
                jsonrpc: JSONRPC_VERSION.into(),
                id,
                error: error.into(),
            }),
        }
    }
}

fn to_result<T: serde::Serialize>(value: &T) -> DispatchResult {
    serde_json::to_value(value)
        .map_err(|err| McpError::internal(format!("failed to serialize result: {err}")))
}

/// Registers the MCP method set on a dispatcher. The handlers close over
/// the shared registries; per-connection state arrives through the
/// request context.
pub(crate) fn register_mcp_methods(
    dispatcher: &Dispatcher,
    config: &ServerConfig,
    tools: &Arc<ToolRegistry>,
    resources: &Arc<ResourceRegistry>,
    prompts: &Arc<PromptRegistry>,
) -> Result<(), RegistryError> {
    let cfg = config.clone();
    dispatcher.register_method(InitializeRequest::METHOD, move |ctx| {
        let params: <InitializeRequest as ModelContextProtocolRequest>::Params =
            ctx.parse_params()?;
        ctx.session.begin_initialize(&params)?;
        if params.protocol_version != MCP_SCHEMA_VERSION {
            warn!(
                requested = %params.protocol_version,
                supported = MCP_SCHEMA_VERSION,
                "client requested a different protocol revision"
            );
        }
        to_result(&initialize_result(&cfg))
    })?;

    dispatcher.register_method(PingRequest::METHOD, |_ctx| Ok(json!({})))?;

    dispatcher.register_method(InitializedNotification::METHOD, |ctx| {
        ctx.session.confirm_initialized()?;
        Ok(Value::Null)
    })?;

    dispatcher.register_method(CancelledNotification::METHOD, |ctx| {
        let params: <CancelledNotification as ModelContextProtocolNotification>::Params =
            ctx.parse_params()?;
        // Requests are serialized per connection, so by the time this
        // notification is read the request it names has already finished.
        info!(request_id = %params.request_id, reason = ?params.reason, "peer cancelled request");
        Ok(Value::Null)
    })?;

    let registry = Arc::clone(tools);
    dispatcher.register_method(ListToolsRequest::METHOD, move |_ctx| {
        to_result(&ListToolsResult {
            tools: registry.list(),
        })
    })?;

    let registry = Arc::clone(tools);
    dispatcher.register_method(CallToolRequest::METHOD, move |ctx| {
        let params: <CallToolRequest as ModelContextProtocolRequest>::Params =
            ctx.parse_params()?;
        let result = registry.call(ctx.arena, &params.name, params.arguments)?;
        to_result(&result)
    })?;

    let registry = Arc::clone(resources);
    dispatcher.register_method(ListResourcesRequest::METHOD, move |_ctx| {
        to_result(&ListResourcesResult {
            resources: registry.list(),
        })
    })?;

    let registry = Arc::clone(resources);
    dispatcher.register_method(ReadResourceRequest::METHOD, move |ctx| {
        let params: <ReadResourceRequest as ModelContextProtocolRequest>::Params =
            ctx.parse_params()?;
        let contents = registry.read(ctx.arena, &params.uri)?;
        to_result(&ReadResourceResult {
            contents: vec![contents],
        })
    })?;

    let registry = Arc::clone(resources);
    dispatcher.register_method(SubscribeRequest::METHOD, move |ctx| {
        let params: <SubscribeRequest as ModelContextProtocolRequest>::Params =
            ctx.parse_params()?;
        let outgoing = Arc::clone(ctx.outgoing);
        registry.subscribe(
            &params.uri,
            CallbackId::from(ctx.connection()),
            Box::new(move |_arena, uri| {
                let params = serde_json::to_value(ResourceUpdatedNotificationParams {
                    uri: uri.to_string(),
                })
                .map_err(|err| McpError::internal(err.to_string()))?;
                outgoing.send_notification(ResourceUpdatedNotification::METHOD, Some(params));
                Ok(())
            }),
        )?;
        Ok(json!({}))
    })?;

    let registry = Arc::clone(resources);
    dispatcher.register_method(UnsubscribeRequest::METHOD, move |ctx| {
        let params: <UnsubscribeRequest as ModelContextProtocolRequest>::Params =
            ctx.parse_params()?;
        registry.unsubscribe(&params.uri, CallbackId::from(ctx.connection()))?;
        Ok(json!({}))
    })?;

    let registry = Arc::clone(prompts);
    dispatcher.register_method(ListPromptsRequest::METHOD, move |_ctx| {
        to_result(&ListPromptsResult {
            prompts: registry.list(),
        })
    })?;

    let registry = Arc::clone(prompts);
    dispatcher.register_method(GetPromptRequest::METHOD, move |ctx| {
        let params: <GetPromptRequest as ModelContextProtocolRequest>::Params =
            ctx.parse_params()?;
        let result = registry.get(ctx.arena, &params.name, params.arguments)?;
        to_result(&result)
    })?;

    dispatcher.register_method(ShutdownRequest::METHOD, |ctx| {
        ctx.session.begin_shutdown()?;
        Ok(json!({}))
    })?;

    Ok(())
}
