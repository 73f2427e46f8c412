//! Host-local stream-socket transport.
//!
//! Owns the filesystem-rendezvous Unix domain socket underlying every
//! connection: address derivation, listen-with-stale-socket-recovery,
//! accept, connect, and close/unlink. [`ServerEndpoint`]/[`Connection`]
//! and [`ClientEndpoint`] are distinct types built on the same low-level
//! recv/send primitives, which removes the server/client role-flag
//! branch the original C implementation threaded through a single
//! `ipsc_t` (see DESIGN.md).

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::codec;
use crate::error::{CodecError, EndpointError};

/// Upper clamp for the accept backlog, matching the original `IPSC_MAX_QUEUE`.
pub const MAX_QUEUE: i32 = 128;
/// Substituted backlog when the caller passes an out-of-range value.
pub const MAX_QUEUE_DEFAULT: i32 = 16;

/// The filesystem path both client and server derive from a port tag.
pub fn derived_address(port: u16) -> PathBuf {
    PathBuf::from(format!("/tmp/ipsc.{port}.sock"))
}

fn clamp_maxq(maxq: i32) -> i32 {
    if maxq > MAX_QUEUE {
        MAX_QUEUE
    } else if maxq < 1 {
        MAX_QUEUE_DEFAULT
    } else {
        maxq
    }
}

/// Opaque, embedder-supplied state handed to every accepted connection
/// and, through it, to every handler invocation. The library places no
/// constraints on its shape beyond `Send + Sync`.
pub struct ServerContext<T> {
    pub state: T,
}

/// A listening endpoint. Owns the on-disk socket file for its lifetime and
/// unlinks it on drop.
pub struct ServerEndpoint {
    listener: UnixListener,
    path: PathBuf,
    maxq: i32,
}

impl ServerEndpoint {
    /// Bind and start listening at the address derived from `port`.
    ///
    /// If the path is already bound, probes it with a connect attempt: a
    /// successful connect means a live server owns it (fail); a failed
    /// connect means the path is stale (unlink and retry exactly once).
    pub async fn listen(port: u16, maxq: i32) -> Result<Self, EndpointError> {
        let path = derived_address(port);
        let maxq = clamp_maxq(maxq);
        let listener = bind_with_stale_recovery(&path).await?;

        Ok(Self {
            listener,
            path,
            maxq,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn maxq(&self) -> i32 {
        self.maxq
    }

    /// Accept one connection, handing it the server's context pointer
    /// (§3 "Connection inherits the server's context pointer"). Resolves
    /// once a peer has connected; Tokio's reactor handles the
    /// non-blocking/edge-triggered plumbing, so there is no manual
    /// would-block check here (see REDESIGN FLAGS §9).
    pub async fn accept<T>(
        &self,
        context: Arc<ServerContext<T>>,
    ) -> Result<Connection<T>, EndpointError> {
        let (stream, _addr) = self.listener.accept().await.map_err(EndpointError::Accept)?;
        Ok(Connection {
            stream: Mutex::new(stream),
            context,
        })
    }
}

impl Drop for ServerEndpoint {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "failed to unlink server socket");
            }
        } else {
            debug!(path = %self.path.display(), "unlinked server socket");
        }
    }
}

async fn bind_with_stale_recovery(path: &Path) -> Result<UnixListener, EndpointError> {
    match UnixListener::bind(path) {
        Ok(listener) => Ok(listener),
        Err(e) if e.kind() == ErrorKind::AddrInUse => {
            match UnixStream::connect(path).await {
                Ok(_) => Err(EndpointError::AddressInUse {
                    path: path.to_path_buf(),
                }),
                Err(_) => {
                    let _ = std::fs::remove_file(path);
                    UnixListener::bind(path).map_err(|source| EndpointError::Bind {
                        path: path.to_path_buf(),
                        source,
                    })
                }
            }
        }
        Err(source) => Err(EndpointError::Bind {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// A child endpoint produced by [`ServerEndpoint::accept`]. Handles exactly
/// one request/reply pair before the server closes it (§4.3 framing
/// rationale). The underlying stream is behind a [`Mutex`] rather than
/// owned exclusively so that a handler holding `Arc<Connection>` can send
/// its own reply (`HandlerOutcome::Replied`) without the dispatcher also
/// needing exclusive access. Carries the server's context (§3 "Connection
/// inherits the server's context pointer"), reachable by every handler
/// through `conn.context`.
pub struct Connection<T> {
    stream: Mutex<UnixStream>,
    pub context: Arc<ServerContext<T>>,
}

impl<T> Connection<T> {
    pub(crate) async fn recv_message(
        &self,
        timeout_ms: u64,
    ) -> Result<serde_json::Value, CodecError> {
        let mut guard = self.stream.lock().await;
        codec::recv_message(&mut guard, timeout_ms).await
    }

    pub async fn send_message(&self, value: &serde_json::Value) -> Result<(), CodecError> {
        let mut guard = self.stream.lock().await;
        codec::send_message(&mut guard, value).await
    }
}

/// A client-role endpoint that issues one request and reads one reply.
/// Owns its stream exclusively: a client call never shares a connection
/// across tasks.
pub struct ClientEndpoint {
    stream: UnixStream,
}

impl ClientEndpoint {
    pub async fn connect(port: u16) -> Result<Self, EndpointError> {
        let path = derived_address(port);
        let stream = UnixStream::connect(&path)
            .await
            .map_err(|source| EndpointError::Connect { path, source })?;
        Ok(Self { stream })
    }

    pub(crate) async fn send_message(
        &mut self,
        value: &serde_json::Value,
    ) -> Result<(), CodecError> {
        codec::send_message(&mut self.stream, value).await
    }

    pub(crate) async fn recv_message(
        &mut self,
        timeout_ms: u64,
    ) -> Result<serde_json::Value, CodecError> {
        codec::recv_message(&mut self.stream, timeout_ms).await
    }
}

/// Read at least one chunk, honoring `timeout_ms` as the per-call receive
/// timeout. A `timeout_ms` of zero blocks until data, EOF, or an error.
/// A zero-length result means "nothing more arrived" — either the peer
/// closed the connection or the idle window elapsed; both stop the
/// codec's accumulate loop identically (§4.3).
pub(crate) async fn recv_once(
    stream: &mut UnixStream,
    buf: &mut [u8],
    timeout_ms: u64,
) -> Result<usize, EndpointError> {
    loop {
        let read = if timeout_ms == 0 {
            stream.read(buf).await
        } else {
            match tokio::time::timeout(Duration::from_millis(timeout_ms), stream.read(buf)).await {
                Ok(result) => result,
                Err(_elapsed) => return Ok(0),
            }
        };

        match read {
            Ok(n) => return Ok(n),
            Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::Interrupted => {
                continue;
            }
            Err(e) => return Err(EndpointError::Recv(e)),
        }
    }
}

/// Write the entire buffer. `write_all` already loops past transient
/// conditions and surfaces a closed peer as an `io::Error` rather than
/// `SIGPIPE`, satisfying the original's `MSG_NOSIGNAL` invariant.
pub(crate) async fn send_all(stream: &mut UnixStream, buf: &[u8]) -> Result<(), EndpointError> {
    use tokio::io::AsyncWriteExt;
    stream.write_all(buf).await.map_err(EndpointError::Send)
}
