//! Server entry point: the accept loop and per-connection request
//! handling.
//!
//! Grounded on `joshgermon-bksd/src/rpc/transport.rs`'s `Transport::listen`
//! (accept loop plus `tokio::select!`-driven shutdown) adapted from TCP
//! newline-framing to Unix-domain-socket whole-message framing, and on
//! the original `jrpc_server`/`jrpc_process` for the post-listen hook and
//! one-request-per-connection lifecycle.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::dispatch::{self, DispatchOutcome, MethodTable};
use crate::endpoint::{Connection, ServerEndpoint};
pub use crate::endpoint::ServerContext;
use crate::error::{CodecError, EndpointError};
use crate::protocol::Response;

/// Configuration for [`run_server`].
pub struct ServerConfig<T> {
    pub port: u16,
    pub maxq: i32,
    /// Per-receive timeout in milliseconds, passed to the codec.
    pub recv_timeout_ms: u64,
    /// Inter-iteration sleep. Defaults to zero: Tokio's task scheduler
    /// already yields between accept-loop iterations, so this is kept
    /// only as a disabled-by-default debug knob (REDESIGN FLAGS §9).
    pub poll_interval: Duration,
    /// Whether strict (JSON-RPC 2.0, version field required) or lite
    /// mode is in effect.
    pub strict: bool,
    pub methods: MethodTable<T>,
    /// Called once with the bound path after a successful `listen()`,
    /// mirroring the original's `connreg` joinable-thread callback.
    pub on_listen: Option<Box<dyn Fn(&std::path::Path) + Send + Sync>>,
    pub context: Arc<ServerContext<T>>,
}

/// Run the server until `shutdown` fires. Reentrant: multiple servers
/// with distinct configs may run concurrently as distinct spawned tasks,
/// matching the spec's "entry point is invocable on a caller-supplied
/// execution context" (thread spawning is the embedder's concern).
pub async fn run_server<T: Send + Sync + 'static>(
    config: ServerConfig<T>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), EndpointError> {
    let endpoint = ServerEndpoint::listen(config.port, config.maxq).await?;
    info!(path = %endpoint.path().display(), "ipsc server listening");

    if let Some(hook) = &config.on_listen {
        hook(endpoint.path());
    }

    let methods = Arc::new(config.methods);
    let context = config.context;
    let recv_timeout_ms = config.recv_timeout_ms;
    let strict = config.strict;

    loop {
        tokio::select! {
            accept_result = endpoint.accept(context.clone()) => {
                match accept_result {
                    Ok(conn) => {
                        let methods = methods.clone();
                        tokio::spawn(async move {
                            handle_connection(conn, methods, recv_timeout_ms, strict).await;
                        });
                    }
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                    }
                }
            }
            _ = shutdown.recv() => {
                info!("ipsc server shutting down");
                break;
            }
        }

        if !config.poll_interval.is_zero() {
            tokio::time::sleep(config.poll_interval).await;
        }
    }

    Ok(())
}

/// Handle one accepted connection: decode the single request it carries,
/// dispatch it, and write back exactly one reply. The server never keeps
/// a connection alive past this pair (§4.3 framing rationale). Errors are
/// logged and swallowed here: per §7, only listen-time failures terminate
/// the server, never a single connection's mishap.
async fn handle_connection<T: Send + Sync + 'static>(
    conn: Connection<T>,
    methods: Arc<MethodTable<T>>,
    recv_timeout_ms: u64,
    strict: bool,
) {
    let conn = Arc::new(conn);

    let document = match conn.recv_message(recv_timeout_ms).await {
        Ok(doc) => doc,
        Err(CodecError::Oversize { limit }) => {
            warn!(limit, "received document exceeds byte ceiling");
            let reply = Response::invalid_request(strict, serde_json::Value::Null);
            if let Err(e) = send_reply(&conn, &reply).await {
                debug!(error = %e, "failed to send invalid-request reply");
            }
            return;
        }
        Err(e @ CodecError::Transport(_)) => {
            debug!(error = %e, "transport failure, closing connection without a reply");
            return;
        }
        Err(e) => {
            warn!(error = %e, "decode failure");
            let reply = Response::parse_error(strict);
            if let Err(e) = send_reply(&conn, &reply).await {
                debug!(error = %e, "failed to send parse-error reply");
            }
            return;
        }
    };

    match dispatch::dispatch(conn.clone(), document, &methods, strict).await {
        DispatchOutcome::ReplyReady(reply) => {
            if let Err(e) = send_reply(&conn, &reply).await {
                debug!(error = %e, "failed to send reply");
            }
        }
        DispatchOutcome::AlreadyHandled => {}
    }
}

async fn send_reply<T>(conn: &Connection<T>, reply: &Response) -> Result<(), CodecError> {
    let value = serde_json::to_value(reply).expect("Response always serializes");
    conn.send_message(&value).await
}
