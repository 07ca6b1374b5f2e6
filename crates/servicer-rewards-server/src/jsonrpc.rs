// Copyright 2025 RISC Zero, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! JSON-RPC 2.0 envelopes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub const JSONRPC_VERSION: &str = "2.0";

/// Reasons a request is rejected before it reaches the calculator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("Content-Type must be application/json")]
    ContentType,

    #[error("request body must be a json object")]
    NotAnObject,

    #[error("jsonrpc version must be 2.0")]
    Version,

    #[error("id must be a number or string")]
    Id,

    #[error("method must be a string")]
    Method,

    #[error("params must be an array")]
    Params,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(serde_json::Number),
    String(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RpcRequest {
    pub id: RequestId,
    pub method: String,
    pub params: Vec<Value>,
}

impl RpcRequest {
    /// Validate a request body. An absent or `null` `params` is an empty list.
    pub fn parse(body: &[u8]) -> Result<Self, EnvelopeError> {
        let mut object = match serde_json::from_slice::<Value>(body) {
            Ok(Value::Object(object)) => object,
            _ => return Err(EnvelopeError::NotAnObject),
        };

        if object.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
            return Err(EnvelopeError::Version);
        }
        let id = match take(&mut object, "id") {
            Value::Number(n) => RequestId::Number(n),
            Value::String(s) => RequestId::String(s),
            _ => return Err(EnvelopeError::Id),
        };
        let method = match take(&mut object, "method") {
            Value::String(method) => method,
            _ => return Err(EnvelopeError::Method),
        };
        let params = match take(&mut object, "params") {
            Value::Array(params) => params,
            Value::Null => Vec::new(),
            _ => return Err(EnvelopeError::Params),
        };

        Ok(Self { id, method, params })
    }
}

fn take(object: &mut Map<String, Value>, key: &str) -> Value {
    object.remove(key).unwrap_or(Value::Null)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcErrorObject {
    pub message: String,
}

/// Response to a valid request: either a `result` or an `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub id: RequestId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcErrorObject>,
}

impl RpcResponse {
    pub fn result(id: RequestId, result: Value) -> Self {
        Self { jsonrpc: JSONRPC_VERSION.to_string(), id, result: Some(result), error: None }
    }

    pub fn error(id: RequestId, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(RpcErrorObject { message: message.into() }),
        }
    }
}
