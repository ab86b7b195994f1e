//! MCP server runtime.
//!
//! Accepts framed JSON-RPC 2.0 messages from a host, dispatches them
//! through a lifecycle-aware method registry, and mediates access to the
//! three registered primitive kinds: tools, resources, and prompts.
//! Transports are external; the runtime only needs an async byte
//! reader/writer pair per connection.
#![deny(clippy::print_stdout, clippy::print_stderr)]

use std::io::Result as IoResult;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::Weak;

use mcp_types::ModelContextProtocolNotification;
use mcp_types::PromptListChangedNotification;
use mcp_types::ResourceListChangedNotification;
use mcp_types::ToolListChangedNotification;
use tokio::io::AsyncRead;
use tokio::io::AsyncWrite;
use tracing_subscriber::EnvFilter;

pub mod arena;
mod config;
mod connection;
pub mod dispatcher;
pub mod error_code;
pub mod errors;
pub mod framing;
mod jsonrpc;
pub(crate) mod message_processor;
mod outgoing_message;
pub mod progress;
pub mod prompts;
pub mod resources;
pub mod session;
pub mod tools;

use crate::arena::ArenaPool;
use crate::dispatcher::Dispatcher;
use crate::errors::RegistryError;
use crate::message_processor::register_mcp_methods;
use crate::outgoing_message::OutgoingMessageSender;
use crate::progress::ProgressRegistry;
use crate::prompts::PromptRegistry;
use crate::resources::ResourceRegistry;
use crate::tools::ToolRegistry;

pub use crate::config::ServerConfig;
pub use crate::connection::ConnectionId;
pub use crate::dispatcher::DispatchResult;
pub use crate::dispatcher::RequestCx;
pub use crate::errors::McpError;
pub use crate::framing::FramingKind;
pub use crate::jsonrpc::IncomingItem;
pub use crate::jsonrpc::IncomingMessage;
pub use crate::jsonrpc::ParseError;
pub use crate::jsonrpc::parse_message;

/// Size of the bounded channel between a connection's reader and its
/// processor. 128 frames of headroom is plenty for an interactive peer
/// while still bounding memory under a flood.
pub(crate) const CHANNEL_CAPACITY: usize = 128;

/// One server instance: configuration, the shared registries, and the
/// dispatcher the MCP method set is registered on. Connections are
/// served concurrently against this shared state.
pub struct McpServer {
    config: ServerConfig,
    arenas: Arc<ArenaPool>,
    tools: Arc<ToolRegistry>,
    resources: Arc<ResourceRegistry>,
    prompts: Arc<PromptRegistry>,
    progress: Arc<ProgressRegistry>,
    dispatcher: Arc<Dispatcher>,
    /// Live connections, for list-changed broadcasts. Weak: the writer
    /// task lifetime is owned by the connection loop, not the server.
    connections: Mutex<Vec<Weak<OutgoingMessageSender>>>,
}

impl McpServer {
    pub fn new(config: ServerConfig) -> Result<Arc<Self>, RegistryError> {
        let arenas = ArenaPool::new();
        let tools = Arc::new(ToolRegistry::new());
        let resources = Arc::new(ResourceRegistry::new(
            config.supports_subscriptions,
            Arc::clone(&arenas),
        ));
        let prompts = Arc::new(PromptRegistry::new());
        let progress = ProgressRegistry::new();
        let dispatcher = Arc::new(Dispatcher::new());
        register_mcp_methods(&dispatcher, &config, &tools, &resources, &prompts)?;

        Ok(Arc::new(Self {
            config,
            arenas,
            tools,
            resources,
            prompts,
            progress,
            dispatcher,
            connections: Mutex::new(Vec::new()),
        }))
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn resources(&self) -> &ResourceRegistry {
        &self.resources
    }

    pub fn prompts(&self) -> &PromptRegistry {
        &self.prompts
    }

    /// The dispatcher the MCP methods are registered on; additional
    /// methods and hooks can be added before serving connections.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn arena_pool(&self) -> &Arc<ArenaPool> {
        &self.arenas
    }

    pub(crate) fn dispatcher_handle(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub(crate) fn progress_handle(&self) -> &Arc<ProgressRegistry> {
        &self.progress
    }

    /// Drives one connection over the given byte-stream pair until the
    /// stream closes or a write fails.
    pub async fn serve_connection<R, W>(self: &Arc<Self>, reader: R, writer: W) -> IoResult<()>
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        connection::serve_connection(Arc::clone(self), reader, writer).await
    }

    /// Serves a single connection on stdin/stdout.
    pub async fn run_stdio(self: &Arc<Self>) -> IoResult<()> {
        self.serve_connection(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Tells every live connection that the tool listing changed.
    pub fn notify_tools_list_changed(&self) {
        self.broadcast(ToolListChangedNotification::METHOD);
    }

    pub fn notify_resources_list_changed(&self) {
        self.broadcast(ResourceListChangedNotification::METHOD);
    }

    pub fn notify_prompts_list_changed(&self) {
        self.broadcast(PromptListChangedNotification::METHOD);
    }

    fn broadcast(&self, method: &str) {
        let mut connections = self.lock_connections();
        connections.retain(|entry| match entry.upgrade() {
            Some(outgoing) => {
                outgoing.send_notification(method, None);
                true
            }
            None => false,
        });
    }

    pub(crate) fn track_connection(&self, outgoing: &Arc<OutgoingMessageSender>) {
        self.lock_connections().push(Arc::downgrade(outgoing));
    }

    /// Connection teardown: wire subscriptions owned by the connection
    /// are dropped and the broadcast entry pruned.
    pub(crate) fn release_connection(&self, connection: ConnectionId) {
        self.resources.remove_subscriber(connection.into());
        self.lock_connections().retain(|entry| {
            entry
                .upgrade()
                .is_some_and(|outgoing| outgoing.connection() != connection)
        });
    }

    fn lock_connections(&self) -> std::sync::MutexGuard<'_, Vec<Weak<OutgoingMessageSender>>> {
        self.connections.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Installs the tracing subscriber and serves stdio until EOF. Users can
/// control the log level with `RUST_LOG`; logs go to stderr so stdout
/// stays a clean wire.
pub async fn run_main(server: Arc<McpServer>) -> IoResult<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    server.run_stdio().await
}
