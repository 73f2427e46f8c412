//! JSON-RPC 2.0 wire types.
//!
//! Implements the request/reply document shapes from the JSON-RPC 2.0
//! specification, plus the crate's "lite" dialect that omits the
//! `jsonrpc` version field. See: <https://www.jsonrpc.org/specification>

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

// Standard JSON-RPC 2.0 error codes.
pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

/// Library-defined extension code for a method with no handler chain.
pub const NOT_IMPLEMENTED: i32 = -32001;

/// JSON-RPC 2.0 request object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Must be exactly "2.0" in strict mode; absent in lite mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jsonrpc: Option<String>,
    /// Method name to invoke.
    pub method: String,
    /// Optional parameters (object or array, interpretation per method).
    #[serde(default)]
    pub params: Option<Value>,
    /// Request identifier. Echoed verbatim in the reply; may be any JSON
    /// value including null. Absent is distinct from `null`.
    #[serde(default)]
    pub id: Option<Value>,
}

/// JSON-RPC 2.0 reply object. `result` and `error` are mutually exclusive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jsonrpc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    /// Echoed verbatim from the request, or `Value::Null` if the request
    /// omitted it or never decoded far enough to extract it.
    pub id: Value,
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Response {
    fn version(strict: bool) -> Option<String> {
        strict.then(|| JSONRPC_VERSION.to_string())
    }

    /// Build a success reply carrying `result`.
    pub fn success(strict: bool, id: Value, result: Value) -> Self {
        Self {
            jsonrpc: Self::version(strict),
            result: Some(result),
            error: None,
            id,
        }
    }

    /// Build an error reply with no extra data.
    pub fn error(strict: bool, id: Value, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: Self::version(strict),
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
                data: None,
            }),
            id,
        }
    }

    /// Parse errors never got far enough to extract an id (§9(b)): the
    /// stored id is always `Value::Null`, matching upstream JSON-RPC and
    /// the original C implementation's behavior.
    pub fn parse_error(strict: bool) -> Self {
        Self::error(strict, Value::Null, PARSE_ERROR, "Parse error")
    }

    pub fn invalid_request(strict: bool, id: Value) -> Self {
        Self::error(strict, id, INVALID_REQUEST, "Invalid request")
    }

    pub fn method_not_found(strict: bool, id: Value, method: &str) -> Self {
        Self::error(
            strict,
            id,
            METHOD_NOT_FOUND,
            format!("Method not found: {method}"),
        )
    }

    pub fn invalid_params(strict: bool, id: Value, details: impl Into<String>) -> Self {
        Self::error(strict, id, INVALID_PARAMS, details.into())
    }

    pub fn internal_error(strict: bool, id: Value, details: impl Into<String>) -> Self {
        Self::error(strict, id, INTERNAL_ERROR, details.into())
    }

    pub fn not_implemented(strict: bool, id: Value) -> Self {
        Self::error(strict, id, NOT_IMPLEMENTED, "Method not implemented")
    }
}

impl Request {
    /// A notification has no `id`; the crate's transport still replies to
    /// it like any other call (batched/notification semantics are a
    /// declared Non-goal), but callers may use this to distinguish intent.
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }

    /// Validate the strict-mode version field. Lite mode skips this.
    pub fn check_version(&self) -> Result<(), &'static str> {
        match self.jsonrpc.as_deref() {
            Some(JSONRPC_VERSION) => Ok(()),
            _ => Err("jsonrpc must be \"2.0\""),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_strict_request() {
        let json = r#"{"jsonrpc":"2.0","method":"jobs.list","params":{"limit":10},"id":1}"#;
        let req: Request = serde_json::from_str(json).unwrap();

        assert_eq!(req.jsonrpc.as_deref(), Some("2.0"));
        assert_eq!(req.method, "jobs.list");
        assert!(req.params.is_some());
        assert_eq!(req.id, Some(Value::Number(1.into())));
        assert!(req.check_version().is_ok());
    }

    #[test]
    fn parse_lite_request_without_version() {
        let json = r#"{"method":"ping","id":null}"#;
        let req: Request = serde_json::from_str(json).unwrap();

        assert!(req.jsonrpc.is_none());
        assert!(req.check_version().is_err());
    }

    #[test]
    fn notification_has_no_id() {
        let json = r#"{"jsonrpc":"2.0","method":"ping"}"#;
        let req: Request = serde_json::from_str(json).unwrap();

        assert!(req.is_notification());
        assert!(req.params.is_none());
    }

    #[test]
    fn serialize_success_response() {
        let resp = Response::success(true, Value::Number(1.into()), Value::String("ok".into()));
        let json = serde_json::to_string(&resp).unwrap();

        assert!(json.contains(r#""jsonrpc":"2.0""#));
        assert!(json.contains(r#""result":"ok""#));
        assert!(json.contains(r#""id":1"#));
        assert!(!json.contains("error"));
    }

    #[test]
    fn serialize_error_response() {
        let resp = Response::method_not_found(true, Value::String("abc".into()), "unknown.method");
        let json = serde_json::to_string(&resp).unwrap();

        assert!(json.contains(r#""code":-32601"#));
        assert!(json.contains("Method not found"));
        assert!(!json.contains("result"));
    }

    #[test]
    fn lite_response_omits_version() {
        let resp = Response::success(false, Value::Null, Value::Bool(true));
        let json = serde_json::to_string(&resp).unwrap();
        assert!(!json.contains("jsonrpc"));
    }

    #[test]
    fn null_result_is_distinct_from_absent_result() {
        let with_null = Response::success(true, Value::from(1), Value::Null);
        let json = serde_json::to_string(&with_null).unwrap();
        // result key must be present even though its value is null
        assert!(json.contains(r#""result":null"#));
    }
}
