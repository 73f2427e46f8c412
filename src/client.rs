//! Client request primitive: open a connection, send one request, read
//! one reply, close.
//!
//! Grounded on `joshgermon-bksd/src/rpc/client.rs`'s `RpcClient::call`
//! shape, adapted to Unix-domain-socket transport and to the tri-state
//! result/error/user-error classification from the original
//! `jrpc_request` (§4.5, §7 "Client-side classification").

use serde_json::{Map, Value};

use crate::endpoint::ClientEndpoint;
use crate::error::{ClientError, CodecError};
use crate::protocol::{JSONRPC_VERSION, RpcError};

/// One outgoing call: port tag, method, optional params, an id, and the
/// per-receive timeout to apply while waiting for the reply.
pub struct ClientRequest {
    pub port: u16,
    pub method: String,
    pub params: Option<Value>,
    pub id: Value,
    pub recv_timeout_ms: u64,
    /// Strict (JSON-RPC 2.0) vs lite framing for the outgoing request.
    pub strict: bool,
}

impl ClientRequest {
    pub fn new(port: u16, method: impl Into<String>, id: Value) -> Self {
        Self {
            port,
            method: method.into(),
            params: None,
            id,
            recv_timeout_ms: 2_000,
            strict: true,
        }
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.recv_timeout_ms = timeout_ms;
        self
    }
}

/// The classification the client applies to a successfully decoded reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientOutcome {
    /// The reply carried "result" (possibly `Value::Null` — null is a
    /// valid result and is still `Success`, not `NoResult`).
    Success(Value),
    /// The reply carried no "result" but did carry "error": the call
    /// reached the server and was rejected at the protocol or
    /// application level.
    RpcError(RpcError),
}

/// Convenience for a method that takes no params, mirroring
/// `RpcClient::call_no_params` in the teacher's client.
pub async fn call_no_params(
    port: u16,
    method: impl Into<String>,
    id: Value,
) -> Result<ClientOutcome, ClientError> {
    call(ClientRequest::new(port, method, id)).await
}

/// Issue one request and classify the reply. See [`ClientOutcome`] for the
/// result/error split; a reply with neither key is a [`ClientError::NoResult`].
pub async fn call(request: ClientRequest) -> Result<ClientOutcome, ClientError> {
    let mut endpoint = ClientEndpoint::connect(request.port)
        .await
        .map_err(ClientError::Connect)?;

    let mut document = Map::new();
    if request.strict {
        document.insert("jsonrpc".to_string(), Value::String(JSONRPC_VERSION.to_string()));
    }
    document.insert("method".to_string(), Value::String(request.method));
    if let Some(params) = request.params {
        document.insert("params".to_string(), params);
    }
    document.insert("id".to_string(), request.id);

    endpoint
        .send_message(&Value::Object(document))
        .await
        .map_err(ClientError::Io)?;

    let reply = endpoint
        .recv_message(request.recv_timeout_ms)
        .await
        .map_err(ClientError::Io)?;

    classify(reply)
}

fn classify(mut reply: Value) -> Result<ClientOutcome, ClientError> {
    let Some(object) = reply.as_object_mut() else {
        return Err(ClientError::NoResult);
    };

    if let Some(result) = object.remove("result") {
        return Ok(ClientOutcome::Success(result));
    }

    if let Some(error_value) = object.remove("error") {
        let error: RpcError = serde_json::from_value(error_value)
            .map_err(|e| ClientError::Io(CodecError::Parse(e)))?;
        return Ok(ClientOutcome::RpcError(error));
    }

    Err(ClientError::NoResult)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn null_result_classifies_as_success() {
        let reply = json!({"jsonrpc": "2.0", "id": 1, "result": null});
        let outcome = classify(reply).unwrap();
        assert_eq!(outcome, ClientOutcome::Success(Value::Null));
    }

    #[test]
    fn missing_result_key_is_not_success() {
        let reply = json!({"jsonrpc": "2.0", "id": 1, "error": {"code": -32601, "message": "Method not found: x"}});
        let outcome = classify(reply).unwrap();
        assert!(matches!(outcome, ClientOutcome::RpcError(_)));
    }

    #[test]
    fn neither_result_nor_error_is_no_result() {
        let reply = json!({"jsonrpc": "2.0", "id": 1});
        let err = classify(reply).unwrap_err();
        assert!(matches!(err, ClientError::NoResult));
    }
}
