//! Message framing over a raw byte stream.
//!
//! Two interchangeable disciplines share one reader/writer contract:
//! `Content-Length`-delimited frames (LSP-style header block) and
//! single-delimiter frames (one message per line, the framing the MCP
//! stdio transport uses). Both are transport-agnostic: they only consume
//! an async byte source and sink. The reader fills a caller-owned buffer,
//! typically the frame buffer of a per-request arena.

use std::io;
use thiserror::Error;
use tokio::io::AsyncBufRead;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWrite;
use tokio::io::AsyncWriteExt;

/// Frames larger than this are refused outright.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

pub const DEFAULT_DELIMITER: u8 = b'\n';

const CONTENT_LENGTH_HEADER: &str = "Content-Length";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramingKind {
    /// `Content-Length: N` header block terminated by an empty line,
    /// followed by exactly N payload bytes.
    ContentLength,
    /// One frame per delimiter-terminated chunk.
    Delimited,
}

#[derive(Debug, Error)]
pub enum FramingError {
    /// Clean EOF with nothing buffered; the peer is done.
    #[error("end of stream")]
    EndOfStream,

    /// The stream no longer parses under this framing discipline. For
    /// Content-Length framing this is unrecoverable; the delimited
    /// reader resynchronizes on the next delimiter before returning.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A framing discipline plus its limits.
#[derive(Debug, Clone, Copy)]
pub struct Framing {
    kind: FramingKind,
    max_frame_bytes: usize,
    delimiter: u8,
}

impl Framing {
    pub fn content_length() -> Self {
        Self {
            kind: FramingKind::ContentLength,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            delimiter: DEFAULT_DELIMITER,
        }
    }

    pub fn delimited() -> Self {
        Self {
            kind: FramingKind::Delimited,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            delimiter: DEFAULT_DELIMITER,
        }
    }

    pub fn with_max_frame_bytes(mut self, max_frame_bytes: usize) -> Self {
        self.max_frame_bytes = max_frame_bytes;
        self
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn kind(&self) -> FramingKind {
        self.kind
    }

    /// Reads one frame's payload into `buf` (cleared first). The buffer
    /// is owned by the caller; nothing borrowed from the reader survives
    /// the call.
    pub async fn read_frame<R>(&self, reader: &mut R, buf: &mut Vec<u8>) -> Result<(), FramingError>
    where
        R: AsyncBufRead + Unpin,
    {
        buf.clear();
        match self.kind {
            FramingKind::ContentLength => self.read_content_length(reader, buf).await,
            FramingKind::Delimited => self.read_delimited(reader, buf).await,
        }
    }

    /// Writes one frame holding `payload` and flushes the sink.
    pub async fn write_frame<W>(&self, writer: &mut W, payload: &[u8]) -> io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        match self.kind {
            FramingKind::ContentLength => {
                let header = format!("{CONTENT_LENGTH_HEADER}: {}\r\n\r\n", payload.len());
                writer.write_all(header.as_bytes()).await?;
                writer.write_all(payload).await?;
            }
            FramingKind::Delimited => {
                writer.write_all(payload).await?;
                writer.write_all(&[self.delimiter]).await?;
            }
        }
        writer.flush().await
    }

    async fn read_content_length<R>(
        &self,
        reader: &mut R,
        buf: &mut Vec<u8>,
    ) -> Result<(), FramingError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut content_length: Option<usize> = None;
        let mut line: Vec<u8> = Vec::new();
        let mut first_line = true;

        loop {
            line.clear();
            let read = reader.read_until(b'\n', &mut line).await?;
            if read == 0 {
                if first_line {
                    return Err(FramingError::EndOfStream);
                }
                return Err(FramingError::MalformedFrame(
                    "stream ended inside header block".to_string(),
                ));
            }
            first_line = false;

            let text = std::str::from_utf8(&line)
                .map_err(|_| FramingError::MalformedFrame("header is not UTF-8".to_string()))?;
            let text = text.trim_end_matches(['\r', '\n']);
            if text.is_empty() {
                break;
            }

            let Some((key, value)) = text.split_once(':') else {
                return Err(FramingError::MalformedFrame(format!(
                    "header line missing ':' separator: {text}"
                )));
            };
            // Unknown headers are ignored.
            if key.trim() == CONTENT_LENGTH_HEADER {
                let parsed = value.trim().parse::<usize>().map_err(|_| {
                    FramingError::MalformedFrame(format!(
                        "non-numeric {CONTENT_LENGTH_HEADER}: {}",
                        value.trim()
                    ))
                })?;
                content_length = Some(parsed);
            }
        }

        let len = content_length.ok_or_else(|| {
            FramingError::MalformedFrame(format!("missing {CONTENT_LENGTH_HEADER} header"))
        })?;
        if len > self.max_frame_bytes {
            return Err(FramingError::MalformedFrame(format!(
                "frame of {len} bytes exceeds maximum of {}",
                self.max_frame_bytes
            )));
        }

        buf.resize(len, 0);
        reader.read_exact(buf).await.map_err(|err| {
            if err.kind() == io::ErrorKind::UnexpectedEof {
                FramingError::MalformedFrame("stream ended inside payload".to_string())
            } else {
                FramingError::Io(err)
            }
        })?;
        Ok(())
    }

    async fn read_delimited<R>(&self, reader: &mut R, buf: &mut Vec<u8>) -> Result<(), FramingError>
    where
        R: AsyncBufRead + Unpin,
    {
        let limit = self.max_frame_bytes as u64;
        let read = {
            let mut capped = (&mut *reader).take(limit + 1);
            capped.read_until(self.delimiter, buf).await?
        };
        if read == 0 {
            return Err(FramingError::EndOfStream);
        }

        if buf.last() == Some(&self.delimiter) {
            buf.pop();
        } else if buf.len() as u64 > limit {
            // Over the cap without a delimiter in sight: discard through
            // the next delimiter so the caller can keep reading frames.
            buf.clear();
            let mut discard = Vec::new();
            let _ = reader.read_until(self.delimiter, &mut discard).await?;
            return Err(FramingError::MalformedFrame(format!(
                "frame exceeds maximum of {} bytes",
                self.max_frame_bytes
            )));
        }
        // EOF without a trailing delimiter still yields the final frame.
        Ok(())
    }
}
