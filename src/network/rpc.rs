// src/network/rpc.rs
//! JSON-RPC message shapes for the `getwork` protocol

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request id sent with every call
pub const REQUEST_ID: &str = "json";

/// A `getwork` request, with no params to fetch or one data string to submit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcRequest {
    /// Request id
    pub id: String,
    /// Method name, always `getwork`
    pub method: String,
    /// Empty to fetch work, or the 256-hex-char solution data
    pub params: Vec<String>,
}

impl RpcRequest {
    /// Request for new work
    pub fn get_work() -> Self {
        RpcRequest {
            id: REQUEST_ID.to_string(),
            method: "getwork".to_string(),
            params: Vec::new(),
        }
    }

    /// Request submitting a solved `data` field
    pub fn submit_work(data: String) -> Self {
        RpcRequest {
            id: REQUEST_ID.to_string(),
            method: "getwork".to_string(),
            params: vec![data],
        }
    }
}

/// Response envelope
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcResponse<T> {
    /// Echoed request id, if any
    pub id: Option<Value>,
    /// Call result; `None` on error or when absent
    pub result: Option<T>,
    /// Error object; `None` on success
    pub error: Option<Value>,
}

/// Result of a work fetch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GetWorkResult {
    /// 128-byte padded header, hex
    pub data: String,
    /// 32-byte target, hex
    pub target: String,
    /// Precomputed midstate; ignored, it is recomputed locally
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub midstate: Option<String>,
    /// Legacy second-hash buffer; ignored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash1: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn requests_serialize_to_getwork_calls() {
        let fetch = serde_json::to_value(RpcRequest::get_work()).unwrap();
        assert_eq!(fetch, json!({"id": "json", "method": "getwork", "params": []}));

        let submit = serde_json::to_value(RpcRequest::submit_work("ab".into())).unwrap();
        assert_eq!(submit["params"], json!(["ab"]));
    }

    #[test]
    fn responses_tolerate_null_and_missing_fields() {
        let ok: RpcResponse<bool> =
            serde_json::from_str(r#"{"id":"json","result":true,"error":null}"#).unwrap();
        assert_eq!(ok.result, Some(true));
        assert!(ok.error.is_none());

        let err: RpcResponse<GetWorkResult> =
            serde_json::from_str(r#"{"result":null,"error":{"code":-1,"message":"busy"}}"#)
                .unwrap();
        assert!(err.result.is_none());
        assert!(err.error.is_some());
    }

    #[test]
    fn work_response_without_result_field_decodes() {
        let empty: RpcResponse<GetWorkResult> =
            serde_json::from_str(r#"{"id":"json","error":null}"#).unwrap();
        assert_eq!(empty.id, Some(json!("json")));
        assert!(empty.result.is_none());
        assert!(empty.error.is_none());

        let work: RpcResponse<GetWorkResult> =
            serde_json::from_str(r#"{"result":{"data":"00","target":"ff"}}"#).unwrap();
        assert_eq!(work.result.unwrap().data, "00");
        assert!(work.id.is_none());
    }

    #[test]
    fn work_result_ignores_optional_fields() {
        let result: GetWorkResult =
            serde_json::from_str(r#"{"data":"00","target":"ff","extra":1}"#).unwrap();
        assert_eq!(result.midstate, None);
        assert_eq!(result.target, "ff");
    }
}
