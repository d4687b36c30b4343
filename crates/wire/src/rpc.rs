// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON-RPC 2.0 request/response types and the newline codec.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Method;

const JSONRPC_VERSION: &str = "2.0";

/// Request correlation id. Fresh UUID per request; ids never collide within
/// one worker lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(String);

impl RequestId {
    pub fn fresh() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Outbound request frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub id: RequestId,
    pub method: String,
    pub params: serde_json::Value,
}

impl RpcRequest {
    pub fn new(id: RequestId, method: Method, params: serde_json::Value) -> Self {
        Self { jsonrpc: JSONRPC_VERSION.to_string(), id, method: method.as_str().to_string(), params }
    }
}

/// Error object carried in a response frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("worker error {code}: {message}")]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Inbound response frame. Exactly one of `result`/`error` is present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    #[serde(default = "default_version")]
    pub jsonrpc: String,
    pub id: RequestId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

fn default_version() -> String {
    JSONRPC_VERSION.to_string()
}

impl RpcResponse {
    pub fn into_result(self) -> Result<serde_json::Value, RpcError> {
        match (self.result, self.error) {
            (_, Some(err)) => Err(err),
            (Some(value), None) => Ok(value),
            // A response with neither member is treated as an empty result;
            // the shutdown ack arrives this way from older workers.
            (None, None) => Ok(serde_json::Value::Null),
        }
    }
}

/// Codec errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("failed to serialize request: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("malformed frame: {0}")]
    Malformed(#[source] serde_json::Error),

    /// The line parsed as JSON but is not a JSON-RPC response (no id, or
    /// neither result nor error). Workers print progress on stdout during
    /// first-run downloads; the mux discards these.
    #[error("not a JSON-RPC response: {0}")]
    NotAResponse(String),
}

/// Serialize a request frame, newline-terminated, ready for stdin.
pub fn encode_line(request: &RpcRequest) -> Result<String, ProtocolError> {
    let mut line = serde_json::to_string(request).map_err(ProtocolError::Serialize)?;
    line.push('\n');
    Ok(line)
}

/// Parse one complete stdout line into a response frame.
pub fn decode_line(line: &str) -> Result<RpcResponse, ProtocolError> {
    let value: serde_json::Value =
        serde_json::from_str(line.trim_end()).map_err(ProtocolError::Malformed)?;

    let looks_like_response = value.get("id").is_some_and(|id| id.is_string())
        && (value.get("result").is_some() || value.get("error").is_some());
    if !looks_like_response {
        return Err(ProtocolError::NotAResponse(frame_summary(&value)));
    }

    serde_json::from_value(value).map_err(ProtocolError::Malformed)
}

/// Short description of a non-response frame for the discard log.
fn frame_summary(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Object(map) => {
            let keys: Vec<&str> = map.keys().take(4).map(String::as_str).collect();
            format!("object with keys [{}]", keys.join(", "))
        }
        other => format!("{} value", json_type(other)),
    }
}

fn json_type(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[cfg(test)]
#[path = "rpc_tests.rs"]
mod tests;
