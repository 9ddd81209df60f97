//! `Content-Length:` + CRLFCRLF framing over an async reader/writer, per
//! `spec.md`'s wire-format description — the only part of the LSP transport
//! this crate implements; message *semantics* live in [`crate::server`].

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::protocol::Incoming;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("stream closed")]
    Eof,
    #[error("malformed header: {0}")]
    MalformedHeader(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Reads one `Content-Length`-framed JSON-RPC message, or `Ok(None)` if the
/// stream closed cleanly before the next message started.
pub async fn read_message<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<Option<Incoming>, TransportError> {
    let mut content_length: Option<usize> = None;
    loop {
        let mut line = String::new();
        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            return Ok(None);
        }
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            break;
        }
        let (name, value) = line.split_once(':').ok_or_else(|| TransportError::MalformedHeader(line.to_string()))?;
        if name.eq_ignore_ascii_case("content-length") {
            content_length = Some(value.trim().parse().map_err(|_| TransportError::MalformedHeader(line.to_string()))?);
        }
    }
    let content_length = content_length.ok_or_else(|| TransportError::MalformedHeader("missing Content-Length".to_string()))?;

    let mut body = vec![0u8; content_length];
    tokio::io::AsyncReadExt::read_exact(reader, &mut body).await?;
    let message: Incoming = serde_json::from_slice(&body)?;
    Ok(Some(message))
}

/// Serializes `value` and writes it framed with a `Content-Length` header.
pub async fn write_message<W: AsyncWrite + Unpin>(writer: &mut W, value: &impl serde::Serialize) -> Result<(), TransportError> {
    let body = serde_json::to_vec(value)?;
    let header = format!("Content-Length: {}\r\n\r\n", body.len());
    writer.write_all(header.as_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}
