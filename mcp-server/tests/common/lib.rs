//! In-process harness for driving a server over an in-memory wire.
//!
//! Tests get a client view of one connection: typed send helpers, framed
//! reads with a timeout, and scan-until helpers that skip interleaved
//! notifications the way a real client would.

use anyhow::Context;
use anyhow::Result;
use anyhow::bail;
use mast_mcp_server::McpServer;
use mast_mcp_server::ServerConfig;
use mast_mcp_server::FramingKind;
use mast_mcp_server::framing::Framing;
use mcp_types::JSONRPC_VERSION;
use mcp_types::MCP_SCHEMA_VERSION;
use serde_json::Value;
use serde_json::json;
use std::io::Result as IoResult;
use std::sync::Arc;
use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::io::DuplexStream;
use tokio::task::JoinHandle;
use tokio::time::timeout;

const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);
const PIPE_CAPACITY: usize = 64 * 1024;

/// A server preloaded with one of each primitive, the fixture most suite
/// tests run against: an `echo` tool, a static and a dynamic resource,
/// and a `greeting` prompt.
pub fn demo_server(config: ServerConfig) -> Result<Arc<McpServer>> {
    use mcp_types::ContentBlock;
    use mcp_types::Prompt;
    use mcp_types::PromptArgument;
    use mcp_types::PromptMessage;
    use mcp_types::Resource;
    use mcp_types::ResourceContents;
    use mcp_types::Role;
    use mcp_types::TextResourceContents;
    use mcp_types::Tool;

    let server = McpServer::new(config)?;

    server.tools().register(
        Tool {
            name: "echo".into(),
            description: "Echoes the text argument back".into(),
            input_schema: json!({
                "type": "object",
                "properties": {"text": {"type": "string"}},
                "required": ["text"],
            }),
        },
        Box::new(|_arena, arguments| {
            Ok(arguments.get("text").cloned().unwrap_or(Value::Null))
        }),
    )?;

    server.resources().register_static(
        Resource {
            uri: "file:///x".into(),
            name: "x".into(),
            description: None,
            mime_type: Some("text/plain".into()),
        },
        ResourceContents::Text(TextResourceContents {
            uri: "file:///x".into(),
            mime_type: Some("text/plain".into()),
            text: "contents of x".into(),
        }),
    )?;

    server.resources().register_dynamic(
        Resource {
            uri: "mem://clock".into(),
            name: "clock".into(),
            description: Some("Always ticking".into()),
            mime_type: Some("text/plain".into()),
        },
        Box::new(|_arena, uri| {
            Ok(ResourceContents::Text(TextResourceContents {
                uri: uri.to_string(),
                mime_type: Some("text/plain".into()),
                text: "tick".into(),
            }))
        }),
    )?;

    server.prompts().register(
        Prompt {
            name: "greeting".into(),
            description: Some("Greets someone by name".into()),
            arguments: vec![PromptArgument {
                name: "who".into(),
                description: None,
                required: Some(true),
            }],
        },
        Box::new(|_arena, arguments| {
            let who = arguments.get("who").and_then(Value::as_str).unwrap_or("stranger");
            Ok(vec![PromptMessage {
                role: Role::User,
                content: ContentBlock::text(format!("Say hello to {who}")),
            }])
        }),
    )?;

    Ok(server)
}

/// A client-side view of one served connection.
pub struct McpConnection {
    next_request_id: AtomicI64,
    framing: Framing,
    writer: Option<DuplexStream>,
    reader: BufReader<DuplexStream>,
    server_task: JoinHandle<IoResult<()>>,
}

/// The framing a client must speak to match `config`.
pub fn client_framing(config: &ServerConfig) -> Framing {
    let framing = match config.framing {
        FramingKind::ContentLength => Framing::content_length(),
        FramingKind::Delimited => Framing::delimited().with_delimiter(config.delimiter),
    };
    framing.with_max_frame_bytes(config.max_frame_bytes)
}

impl McpConnection {
    /// Spawns a connection loop against in-memory pipes and returns the
    /// client ends.
    pub fn connect(server: &Arc<McpServer>) -> Self {
        let framing = client_framing(server.config());
        let (client_writer, server_reader) = tokio::io::duplex(PIPE_CAPACITY);
        let (server_writer, client_reader) = tokio::io::duplex(PIPE_CAPACITY);

        let server_task = tokio::spawn({
            let server = Arc::clone(server);
            async move { server.serve_connection(server_reader, server_writer).await }
        });

        Self {
            next_request_id: AtomicI64::new(1),
            framing,
            writer: Some(client_writer),
            reader: BufReader::new(client_reader),
            server_task,
        }
    }

    /// Sends a request and returns the id chosen for it.
    pub async fn send_request(&mut self, method: &str, params: Option<Value>) -> Result<i64> {
        let id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let mut message = json!({
            "jsonrpc": JSONRPC_VERSION,
            "id": id,
            "method": method,
        });
        if let Some(params) = params {
            message["params"] = params;
        }
        self.send_value(&message).await?;
        Ok(id)
    }

    pub async fn send_notification(&mut self, method: &str, params: Option<Value>) -> Result<()> {
        let mut message = json!({
            "jsonrpc": JSONRPC_VERSION,
            "method": method,
        });
        if let Some(params) = params {
            message["params"] = params;
        }
        self.send_value(&message).await
    }

    pub async fn send_value(&mut self, value: &Value) -> Result<()> {
        let payload = serde_json::to_vec(value)?;
        self.send_raw(&payload).await
    }

    /// Writes one frame with an arbitrary payload, for malformed-input
    /// tests.
    pub async fn send_raw(&mut self, payload: &[u8]) -> Result<()> {
        let writer = self.writer.as_mut().context("client writer already closed")?;
        self.framing.write_frame(writer, payload).await?;
        Ok(())
    }

    /// Writes bytes verbatim, bypassing the framing writer entirely.
    pub async fn send_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        use tokio::io::AsyncWriteExt;
        let writer = self.writer.as_mut().context("client writer already closed")?;
        writer.write_all(bytes).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Reads the next frame as raw JSON.
    pub async fn read_value(&mut self) -> Result<Value> {
        let mut buf = Vec::new();
        timeout(
            DEFAULT_READ_TIMEOUT,
            self.framing.read_frame(&mut self.reader, &mut buf),
        )
        .await
        .context("timed out waiting for a frame")??;
        Ok(serde_json::from_slice(&buf)?)
    }

    /// Reads frames until the response (result or error) for `id`,
    /// skipping notifications.
    pub async fn read_response(&mut self, id: i64) -> Result<Value> {
        loop {
            let value = self.read_value().await?;
            if value.get("id") == Some(&json!(id))
                && (value.get("result").is_some() || value.get("error").is_some())
            {
                return Ok(value);
            }
            if value.get("method").is_none() {
                bail!("unexpected message while waiting for response {id}: {value}");
            }
        }
    }

    /// Reads frames until a notification for `method`, skipping others.
    pub async fn read_notification(&mut self, method: &str) -> Result<Value> {
        loop {
            let value = self.read_value().await?;
            if value.get("method") == Some(&json!(method)) {
                return Ok(value);
            }
        }
    }

    /// Runs the `initialize` / `initialized` handshake to Ready.
    pub async fn initialize(&mut self) -> Result<Value> {
        let id = self
            .send_request(
                "initialize",
                Some(json!({
                    "protocolVersion": MCP_SCHEMA_VERSION,
                    "capabilities": {},
                    "clientInfo": {"name": "mast-test-client", "version": "0.0.0"},
                })),
            )
            .await?;
        let response = self.read_response(id).await?;
        if response.get("error").is_some() {
            bail!("initialize failed: {response}");
        }
        self.send_notification("notifications/initialized", None).await?;
        Ok(response)
    }

    /// Closes the client write half (the server sees EOF) and waits for
    /// the connection loop to finish.
    pub async fn close(mut self) -> Result<()> {
        drop(self.writer.take());
        timeout(DEFAULT_READ_TIMEOUT, self.server_task)
            .await
            .context("timed out waiting for the connection loop")?
            .context("connection loop panicked")??;
        Ok(())
    }
}
