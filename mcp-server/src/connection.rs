//! The per-connection read/process/write loop.
//!
//! Each accepted byte-stream pair gets three tasks: a reader that frames
//! bytes into pooled arenas, a processor that dispatches strictly in
//! arrival order (responses stay FIFO), and a writer that owns the write
//! half and serializes every outbound frame. Connections run these trios
//! independently over the shared registries.

use crate::CHANNEL_CAPACITY;
use crate::McpServer;
use crate::arena::PooledArena;
use crate::error_code::INVALID_REQUEST_ERROR_CODE;
use crate::error_code::PARSE_ERROR_CODE;
use crate::errors::McpError;
use crate::framing::FramingError;
use crate::framing::FramingKind;
use crate::jsonrpc::ParseError;
use crate::jsonrpc::parse_message;
use crate::message_processor::MessageProcessor;
use crate::outgoing_message::OutgoingMessage;
use crate::outgoing_message::OutgoingMessageSender;
use crate::resources::CallbackId;
use std::fmt;
use std::io;
use std::io::ErrorKind;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use tokio::io::AsyncRead;
use tokio::io::AsyncWrite;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tracing::debug;
use tracing::error;
use tracing::info;

/// Identifies one accepted connection for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

impl From<ConnectionId> for CallbackId {
    fn from(connection: ConnectionId) -> Self {
        CallbackId::new(connection.0)
    }
}

enum ReaderEvent {
    /// A complete frame, carried inside its request arena.
    Frame(PooledArena),
    /// The stream produced a frame this framing cannot parse.
    Malformed(McpError),
}

pub(crate) async fn serve_connection<R, W>(
    server: Arc<McpServer>,
    reader: R,
    writer: W,
) -> io::Result<()>
where
    R: AsyncRead + Send + Unpin + 'static,
    W: AsyncWrite + Send + Unpin + 'static,
{
    let connection = ConnectionId::next();
    let framing = server.config().framing();

    let (incoming_tx, mut incoming_rx) = mpsc::channel::<ReaderEvent>(CHANNEL_CAPACITY);
    let (outgoing_tx, mut outgoing_rx) = mpsc::unbounded_channel::<OutgoingMessage>();
    let outgoing = Arc::new(OutgoingMessageSender::new(connection, outgoing_tx));
    server.track_connection(&outgoing);

    // Task: read frames into pooled arenas, push to the processor.
    let mut reader_handle = tokio::spawn({
        let arenas = Arc::clone(server.arena_pool());
        async move {
            let mut reader = BufReader::new(reader);
            loop {
                let mut arena = arenas.acquire();
                match framing.read_frame(&mut reader, arena.frame_mut()).await {
                    Ok(()) => {
                        if incoming_tx.send(ReaderEvent::Frame(arena)).await.is_err() {
                            // Processor gone, nothing left to do.
                            break;
                        }
                    }
                    Err(FramingError::EndOfStream) => {
                        debug!(%connection, "reader finished (EOF)");
                        break;
                    }
                    Err(FramingError::MalformedFrame(reason)) => {
                        drop(arena);
                        let malformed = ReaderEvent::Malformed(McpError::new(
                            PARSE_ERROR_CODE,
                            format!("malformed frame: {reason}"),
                        ));
                        if incoming_tx.send(malformed).await.is_err() {
                            break;
                        }
                        // A delimited stream resynchronizes on the next
                        // delimiter; a Content-Length stream cannot be
                        // trusted past this point.
                        if framing.kind() == FramingKind::ContentLength {
                            break;
                        }
                    }
                    Err(FramingError::Io(err)) => {
                        match err.kind() {
                            ErrorKind::BrokenPipe
                            | ErrorKind::ConnectionReset
                            | ErrorKind::UnexpectedEof => {
                                info!(%connection, "connection closed: {err}");
                            }
                            _ => error!(%connection, "read failed: {err}"),
                        }
                        break;
                    }
                }
            }
        }
    });

    // Task: dispatch incoming messages, strictly serialized.
    let processor_handle = tokio::spawn({
        let dispatcher = Arc::clone(server.dispatcher_handle());
        let progress = Arc::clone(server.progress_handle());
        let outgoing = Arc::clone(&outgoing);
        async move {
            let mut processor = MessageProcessor::new(dispatcher, progress, Arc::clone(&outgoing));
            while let Some(event) = incoming_rx.recv().await {
                match event {
                    ReaderEvent::Frame(mut arena) => match parse_message(arena.frame()) {
                        Ok(message) => processor.process(&mut arena, message),
                        Err(ParseError::InvalidJson(err)) => {
                            debug!(%connection, "unparseable frame: {err}");
                            outgoing.send_error(
                                None,
                                McpError::new(PARSE_ERROR_CODE, format!("parse error: {err}")),
                            );
                        }
                        Err(ParseError::EmptyBatch) => {
                            outgoing.send_error(
                                None,
                                McpError::new(INVALID_REQUEST_ERROR_CODE, "empty batch"),
                            );
                        }
                    },
                    ReaderEvent::Malformed(err) => outgoing.send_error(None, err),
                }
                // The arena, if any, was released at the end of the cycle.
            }
            debug!(%connection, "processor finished (channel closed)");
        }
    });

    // Task: serialize and frame outgoing messages.
    let mut writer_handle = tokio::spawn(async move {
        let mut writer = writer;
        while let Some(message) = outgoing_rx.recv().await {
            match message.into_payload() {
                Ok(payload) => {
                    if let Err(err) = framing.write_frame(&mut writer, payload.as_bytes()).await {
                        error!(%connection, "write failed, closing connection: {err}");
                        break;
                    }
                }
                Err(err) => error!(%connection, "failed to serialize outgoing message: {err}"),
            }
        }
    });

    // The usual exit is the reader hitting EOF; its channel closing winds
    // down the processor and then the writer. A writer failure instead
    // ends the whole connection, reads included.
    let writer_finished_first = tokio::select! {
        _ = &mut writer_handle => {
            reader_handle.abort();
            true
        }
        _ = &mut reader_handle => false,
    };

    let _ = processor_handle.await;
    server.release_connection(connection);
    drop(outgoing);

    if writer_finished_first {
        let _ = reader_handle.await;
    } else {
        let _ = writer_handle.await;
    }

    Ok(())
}
