//! Message framing: "read until the peer goes idle, then parse the
//! accumulated buffer as one JSON document."
//!
//! There is no length prefix and no delimiter. A single JSON object per
//! connection-direction is expected; this is tractable only because
//! neither the server nor the client keeps a connection alive past one
//! request/reply pair (§4.3).

use serde_json::Value;
use tokio::net::UnixStream;

use crate::endpoint;
use crate::error::CodecError;

/// Initial receive buffer size, matching the original `JRPC_DEFAULT_RCVBUF_STREAM`.
const DEFAULT_RCVBUF: usize = 1024;

/// Hard ceiling on accumulated document size (REDESIGN FLAGS §9: the
/// original has no such ceiling and is marked as a TODO there).
const MAX_RCVBUF: usize = 1024 * 1024;

/// Timeout substituted after the first byte arrives, to detect "end of
/// message" by short idle rather than by peer close.
const IDLE_TIMEOUT_MS: u64 = 10;

/// Receive one JSON document, honoring `timeout_ms` as the initial
/// per-read timeout. Grows the buffer geometrically as data accumulates,
/// capped at [`MAX_RCVBUF`].
pub(crate) async fn recv_message(
    stream: &mut UnixStream,
    timeout_ms: u64,
) -> Result<Value, CodecError> {
    let mut buf = vec![0u8; DEFAULT_RCVBUF];
    let mut filled = 0usize;
    let mut timeout_ms = timeout_ms;

    loop {
        if buf.len() - filled < 2 {
            if buf.len() * 2 > MAX_RCVBUF {
                return Err(CodecError::Oversize { limit: MAX_RCVBUF });
            }
            buf.resize(buf.len() * 2, 0);
        }

        let n = endpoint::recv_once(stream, &mut buf[filled..], timeout_ms).await?;
        if n == 0 {
            break;
        }

        filled += n;
        // Lower the timeout once data has started arriving: subsequent
        // idle is the signal that the message is complete.
        if timeout_ms > 0 {
            timeout_ms = IDLE_TIMEOUT_MS;
        }
    }

    if filled < 2 {
        return Err(CodecError::Empty);
    }

    serde_json::from_slice(&buf[..filled]).map_err(CodecError::Parse)
}

/// Serialize `value` compactly and write it in full.
pub(crate) async fn send_message(stream: &mut UnixStream, value: &Value) -> Result<(), CodecError> {
    let bytes = serde_json::to_vec(value).map_err(CodecError::Serialize)?;
    endpoint::send_all(stream, &bytes).await.map_err(CodecError::from)
}
