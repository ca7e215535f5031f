use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One call, sent on its own bidirectional stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    pub id: u64,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// Answer to an `RpcRequest` with the same id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub id: u64,
    pub result: Result<Value, RpcError>,
}

/// Errors a service reports back to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum RpcError {
    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RpcError {
    /// Params did not match the method's request type
    pub fn invalid_params(err: serde_json::Error) -> Self {
        Self::InvalidParams(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_wire_format() {
        let response = RpcResponse {
            id: 7,
            result: Err(RpcError::MethodNotFound("nope".into())),
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": 7,
                "result": {"Err": {"kind": "method_not_found", "message": "nope"}}
            })
        );

        let parsed: RpcResponse = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, response);
    }

    #[test]
    fn test_request_without_params() {
        let request: RpcRequest =
            serde_json::from_str(r#"{"id":1,"method":"helloworld.Greeter/SayHello"}"#).unwrap();
        assert_eq!(request.params, Value::Null);
    }
}
