//! Error taxonomy for the transport, codec, and client layers.
//!
//! Dispatch-level failures are not modeled as `std::error::Error` types:
//! per the JSON-RPC contract a dispatch failure is always converted into a
//! reply (see [`crate::dispatch`]), never propagated as a Rust error.

use thiserror::Error;

/// Transport-layer failure: a socket operation did not complete.
#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("bind failed for {path}: {source}")]
    Bind {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("a live server already owns {path}")]
    AddressInUse { path: std::path::PathBuf },
    #[error("accept failed: {0}")]
    Accept(#[source] std::io::Error),
    #[error("connect failed for {path}: {source}")]
    Connect {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("send failed: {0}")]
    Send(#[source] std::io::Error),
    #[error("recv failed: {0}")]
    Recv(#[source] std::io::Error),
}

/// Message-codec failure: framing, parsing, or size-limit violation.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("transport error while receiving: {0}")]
    Transport(#[from] EndpointError),
    #[error("received document exceeds the {limit} byte ceiling")]
    Oversize { limit: usize },
    #[error("no bytes received before idle timeout")]
    Empty,
    #[error("failed to parse JSON document: {0}")]
    Parse(#[source] serde_json::Error),
    #[error("failed to serialize JSON document: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// Failure returned to the caller of the client request primitive.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Failed to connect to the server's derived address.
    #[error("failed to connect to daemon: {0}")]
    Connect(#[source] EndpointError),
    /// Failed to send the request or receive the reply.
    #[error("communication error: {0}")]
    Io(#[from] CodecError),
    /// The reply decoded, but carried neither "result" nor "error".
    #[error("reply carried neither result nor error")]
    NoResult,
}
