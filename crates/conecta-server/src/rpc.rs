use serde::{Deserialize, Serialize};

/// JSON-RPC request as sent by the web client.
#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    pub method: String,
    pub params: Option<serde_json::Value>,
    pub id: Option<serde_json::Value>,
}

/// JSON-RPC response wire format.
///
/// The client expects: `{ id, success, result?, error?: { code: String, message } }`
#[derive(Debug, Serialize)]
pub struct RpcResponse {
    pub id: Option<serde_json::Value>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

/// JSON-RPC error object (code is String on the wire).
#[derive(Debug, Serialize)]
pub struct RpcError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

// Standard JSON-RPC error codes (used internally for routing)
pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

// Application codes
pub const UNAUTHENTICATED: i32 = -32001;
pub const PERMISSION_DENIED: i32 = -32002;
pub const NOT_FOUND: i32 = -32003;
pub const CONFLICT: i32 = -32004;
pub const UPSTREAM_ERROR: i32 = -32005;

/// Map numeric JSON-RPC error codes to the string codes the client expects.
pub fn error_code_to_string(code: i32) -> &'static str {
    match code {
        PARSE_ERROR => "PARSE_ERROR",
        INVALID_REQUEST => "INVALID_REQUEST",
        METHOD_NOT_FOUND => "METHOD_NOT_FOUND",
        INVALID_PARAMS => "INVALID_PARAMS",
        INTERNAL_ERROR => "INTERNAL_ERROR",
        UNAUTHENTICATED => "UNAUTHENTICATED",
        PERMISSION_DENIED => "PERMISSION_DENIED",
        NOT_FOUND => "NOT_FOUND",
        CONFLICT => "CONFLICT",
        UPSTREAM_ERROR => "UPSTREAM_ERROR",
        _ => "UNKNOWN_ERROR",
    }
}

impl RpcResponse {
    pub fn success(id: Option<serde_json::Value>, result: serde_json::Value) -> Self {
        Self {
            id,
            success: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Option<serde_json::Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            id,
            success: false,
            result: None,
            error: Some(RpcError {
                code: error_code_to_string(code).to_string(),
                message: message.into(),
                data: None,
            }),
        }
    }

    pub fn method_not_found(id: Option<serde_json::Value>, method: &str) -> Self {
        Self::error(id, METHOD_NOT_FOUND, format!("Method not found: {method}"))
    }

    pub fn invalid_params(id: Option<serde_json::Value>, msg: impl Into<String>) -> Self {
        Self::error(id, INVALID_PARAMS, msg)
    }

    pub fn internal_error(id: Option<serde_json::Value>, msg: impl Into<String>) -> Self {
        Self::error(id, INTERNAL_ERROR, msg)
    }

    pub fn unauthenticated(id: Option<serde_json::Value>, msg: impl Into<String>) -> Self {
        Self::error(id, UNAUTHENTICATED, msg)
    }

    pub fn permission_denied(id: Option<serde_json::Value>, msg: impl Into<String>) -> Self {
        Self::error(id, PERMISSION_DENIED, msg)
    }

    pub fn not_found(id: Option<serde_json::Value>, msg: impl Into<String>) -> Self {
        Self::error(id, NOT_FOUND, msg)
    }

    pub fn conflict(id: Option<serde_json::Value>, msg: impl Into<String>) -> Self {
        Self::error(id, CONFLICT, msg)
    }

    pub fn upstream_error(id: Option<serde_json::Value>, msg: impl Into<String>) -> Self {
        Self::error(id, UPSTREAM_ERROR, msg)
    }

    pub fn parse_error() -> Self {
        Self::error(None, PARSE_ERROR, "Parse error")
    }
}

/// Extract a required string param from the RPC params object.
pub fn require_str<'a>(params: &'a serde_json::Value, key: &str) -> Result<&'a str, String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| format!("Missing required parameter: {key}"))
}

/// Extract an optional string param.
pub fn optional_str<'a>(params: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    params.get(key).and_then(|v| v.as_str())
}

/// Extract an optional i64 param.
pub fn optional_i64(params: &serde_json::Value, key: &str) -> Option<i64> {
    params.get(key).and_then(|v| v.as_i64())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rpc_request() {
        let json = r#"{"method":"chat.send","params":{"session_id":"sess_123","message":"hola"},"id":1}"#;
        let req: RpcRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.method, "chat.send");
        assert!(req.params.is_some());
        assert_eq!(req.id, Some(serde_json::json!(1)));
    }

    #[test]
    fn success_response_has_success_true() {
        let resp = RpcResponse::success(Some(serde_json::json!(1)), serde_json::json!({"ok": true}));
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["success"], true);
        assert!(json["result"].is_object());
        assert!(json.get("error").is_none() || json["error"].is_null());
    }

    #[test]
    fn error_response_has_success_false() {
        let resp = RpcResponse::error(Some(serde_json::json!(1)), INVALID_PARAMS, "bad param");
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["code"], "INVALID_PARAMS");
        assert_eq!(json["error"]["message"], "bad param");
    }

    #[test]
    fn error_response_serializes() {
        let resp = RpcResponse::method_not_found(Some(serde_json::json!(1)), "foo.bar");
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"error\""));
        assert!(json.contains("METHOD_NOT_FOUND"));
        assert!(json.contains("foo.bar"));
        assert!(!json.contains("\"result\""));
        assert!(json.contains("\"success\":false"));
    }

    #[test]
    fn error_code_maps_to_string() {
        assert_eq!(error_code_to_string(PARSE_ERROR), "PARSE_ERROR");
        assert_eq!(error_code_to_string(METHOD_NOT_FOUND), "METHOD_NOT_FOUND");
        assert_eq!(error_code_to_string(UNAUTHENTICATED), "UNAUTHENTICATED");
        assert_eq!(error_code_to_string(PERMISSION_DENIED), "PERMISSION_DENIED");
        assert_eq!(error_code_to_string(NOT_FOUND), "NOT_FOUND");
        assert_eq!(error_code_to_string(CONFLICT), "CONFLICT");
        assert_eq!(error_code_to_string(UPSTREAM_ERROR), "UPSTREAM_ERROR");
        assert_eq!(error_code_to_string(-99999), "UNKNOWN_ERROR");
    }

    #[test]
    fn application_constructors() {
        let resp = RpcResponse::unauthenticated(None, "Credenciales inválidas.");
        assert_eq!(resp.error.as_ref().unwrap().code, "UNAUTHENTICATED");

        let resp = RpcResponse::conflict(None, "duplicado");
        assert_eq!(resp.error.as_ref().unwrap().code, "CONFLICT");

        let resp = RpcResponse::upstream_error(None, "gateway");
        assert_eq!(resp.error.as_ref().unwrap().code, "UPSTREAM_ERROR");
    }

    #[test]
    fn require_str_extracts() {
        let params = serde_json::json!({"name": "test", "count": 5});
        assert_eq!(require_str(&params, "name").unwrap(), "test");
        assert!(require_str(&params, "missing").is_err());
        assert!(require_str(&params, "count").is_err()); // not a string
    }

    #[test]
    fn optional_helpers() {
        let params = serde_json::json!({"name": "test", "count": 5});
        assert_eq!(optional_str(&params, "name"), Some("test"));
        assert_eq!(optional_str(&params, "missing"), None);
        assert_eq!(optional_i64(&params, "count"), Some(5));
        assert_eq!(optional_i64(&params, "missing"), None);
    }

    #[test]
    fn parse_error_has_no_id() {
        let resp = RpcResponse::parse_error();
        assert!(resp.id.is_none());
        assert_eq!(resp.error.as_ref().unwrap().code, "PARSE_ERROR");
        assert!(!resp.success);
    }
}
