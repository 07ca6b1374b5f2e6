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

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};

use crate::jsonrpc::{EnvelopeError, RpcRequest, RpcResponse};
use crate::AppState;

/// Largest accepted request body.
pub const MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// Creates the axum application with all routes
pub fn create_app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/", post(rpc))
        .route("/health", get(health_check))
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .layer(cors)
        .fallback(not_found)
        .with_state(state)
}

/// JSON-RPC endpoint.
///
/// Malformed envelopes are rejected with a 400 and a plain text reason. Once the envelope is
/// valid the response is always a 200, carrying either the result or the error message.
async fn rpc(State(state): State<Arc<AppState>>, headers: HeaderMap, body: Bytes) -> Response {
    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(is_json_content_type);
    if !is_json {
        return reject(EnvelopeError::ContentType);
    }

    let RpcRequest { id, method, params } = match RpcRequest::parse(&body) {
        Ok(request) => request,
        Err(err) => return reject(err),
    };

    let response = match state.registry.call(&state.calculator, &method, params).await {
        Ok(result) => RpcResponse::result(id, result),
        Err(err) => {
            tracing::warn!("{} failed: {}", method, err);
            RpcResponse::error(id, err.to_string())
        }
    };
    (StatusCode::OK, Json(response)).into_response()
}

/// Whether the media type, ignoring parameters such as `charset`, is `application/json`.
fn is_json_content_type(value: &str) -> bool {
    let media_type = value.split(';').next().unwrap_or_default().trim();
    media_type.eq_ignore_ascii_case("application/json")
}

fn reject(err: EnvelopeError) -> Response {
    tracing::debug!("Rejected request: {}", err);
    (StatusCode::BAD_REQUEST, err.to_string()).into_response()
}

async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "servicer-rewards"
    }))
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "Not Found",
            "message": "The requested endpoint does not exist"
        })),
    )
}
