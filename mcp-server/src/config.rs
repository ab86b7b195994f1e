//! Runtime configuration for a server instance.

use crate::framing::DEFAULT_DELIMITER;
use crate::framing::DEFAULT_MAX_FRAME_BYTES;
use crate::framing::Framing;
use crate::framing::FramingKind;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server_name: String,
    pub server_version: String,
    /// Free-form usage hints surfaced to the client on `initialize`.
    pub instructions: Option<String>,
    pub framing: FramingKind,
    pub max_frame_bytes: usize,
    /// Frame separator for [`FramingKind::Delimited`].
    pub delimiter: u8,
    /// Gates `resources/subscribe` and `resources/unsubscribe`.
    pub supports_subscriptions: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_name: "mast-mcp-server".to_string(),
            server_version: env!("CARGO_PKG_VERSION").to_string(),
            instructions: None,
            framing: FramingKind::Delimited,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            delimiter: DEFAULT_DELIMITER,
            supports_subscriptions: false,
        }
    }
}

impl ServerConfig {
    pub(crate) fn framing(&self) -> Framing {
        let framing = match self.framing {
            FramingKind::ContentLength => Framing::content_length(),
            FramingKind::Delimited => Framing::delimited().with_delimiter(self.delimiter),
        };
        framing.with_max_frame_bytes(self.max_frame_bytes)
    }
}
