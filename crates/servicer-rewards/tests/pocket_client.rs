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

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::post,
    Router,
};
use reqwest::Method;
use serde_json::{json, Value};
use servicer_rewards::{PocketClient, QueryError, RequestEngine, RequestError};

use common::{config, spawn, state_response, Hits};

#[tokio::test]
async fn test_height_majority() {
    let hits = Hits::default();
    let router = Router::new().route(
        "/v1/query/height",
        post({
            let hits = hits.clone();
            move || async move {
                let height = [1000, 999, 1000][hits.next() % 3];
                Json(json!({ "height": height }))
            }
        }),
    );
    let client = PocketClient::new(config(spawn(router).await));

    assert_eq!(client.query_height(None).await.unwrap(), 1000);
    assert_eq!(hits.count(), 3);
}

#[tokio::test]
async fn test_height_outvotes_failures() {
    let hits = Hits::default();
    let router = Router::new().route(
        "/v1/query/height",
        post({
            let hits = hits.clone();
            move || async move {
                if hits.next() == 0 {
                    return (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response();
                }
                Json(json!({ "height": "1000" })).into_response()
            }
        }),
    );
    let client = PocketClient::new(config(spawn(router).await));

    assert_eq!(client.query_height(None).await.unwrap(), 1000);
}

#[tokio::test]
async fn test_retry_returns_last_error() {
    let hits = Hits::default();
    let router = Router::new().route(
        "/flaky",
        post({
            let hits = hits.clone();
            move || async move {
                let status = [500, 502, 503][hits.next().min(2)];
                StatusCode::from_u16(status).unwrap()
            }
        }),
    );
    let url = spawn(router).await.join("flaky").unwrap();

    let res = RequestEngine::new()
        .retry_request(3, Method::POST, url.as_str(), None, Duration::from_secs(5))
        .await;
    assert!(matches!(res, Err(RequestError::Status { status: 503, .. })));
    assert_eq!(hits.count(), 3);
}

#[tokio::test]
async fn test_state_is_cached() {
    let hits = Hits::default();
    let router = Router::new().route(
        "/v1/query/state",
        post({
            let hits = hits.clone();
            move || async move {
                hits.next();
                Json(state_response())
            }
        }),
    );
    let client = PocketClient::new(config(spawn(router).await));

    let first = client.query_state(960, None).await.unwrap();
    let second = client.query_state(960, None).await.unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first["pos"]["params"]["dao_allocation"], "10");
    assert_eq!(hits.count(), 1);
    assert_eq!(client.state_cache().heights(), vec![960]);
}

#[tokio::test]
async fn test_state_cache_can_be_disabled() {
    let hits = Hits::default();
    let router = Router::new().route(
        "/v1/query/state",
        post({
            let hits = hits.clone();
            move || async move {
                hits.next();
                Json(state_response())
            }
        }),
    );
    let mut config = config(spawn(router).await);
    config.use_state_cache = false;
    let client = PocketClient::new(config);

    client.query_state(960, None).await.unwrap();
    client.query_state(960, None).await.unwrap();
    assert_eq!(hits.count(), 2);
    assert!(client.state_cache().is_empty());
}

#[tokio::test]
async fn test_state_retries_until_app_state() {
    let hits = Hits::default();
    let router = Router::new().route(
        "/v1/query/state",
        post({
            let hits = hits.clone();
            move || async move {
                if hits.next() == 0 {
                    return Json(json!({ "error": { "message": "busy" } }));
                }
                Json(state_response())
            }
        }),
    );
    let client = PocketClient::new(config(spawn(router).await));

    let state = client.query_state(960, None).await.unwrap();
    assert!(state.get("pos").is_some());
    assert_eq!(hits.count(), 2);
}

#[tokio::test]
async fn test_state_reports_final_failure() {
    let router = Router::new()
        .route("/v1/query/state", post(|| async { StatusCode::INTERNAL_SERVER_ERROR }));
    let client = PocketClient::new(config(spawn(router).await));
    let err = client.query_state(960, None).await.unwrap_err();
    assert!(matches!(err, QueryError::Request(RequestError::Status { status: 500, .. })));

    let router = Router::new().route(
        "/v1/query/state",
        post(|| async { Json(json!({ "error": { "message": "height not found" } })) }),
    );
    let client = PocketClient::new(config(spawn(router).await));
    let err = client.query_state(960, None).await.unwrap_err();
    assert!(matches!(err, QueryError::Rpc(ref message) if message == "height not found"));
}

#[tokio::test]
async fn test_account_txs_paginates() {
    let bodies: Arc<Mutex<Vec<Value>>> = Arc::default();
    let router = Router::new().route(
        "/v1/query/accounttxs",
        post({
            let bodies = bodies.clone();
            move |Json(body): Json<Value>| async move {
                bodies.lock().unwrap().push(body.clone());
                let page = body["page"].as_u64().unwrap();
                let txs: Vec<Value> = (0..5u64)
                    .map(|i| json!({ "hash": format!("T{i}"), "height": 100 + i }))
                    .skip(((page - 1) * 2) as usize)
                    .take(2)
                    .collect();
                Json(json!({ "txs": txs, "total_txs": 5, "page_count": 2 }))
            }
        }),
    );
    let mut config = config(spawn(router).await);
    config.tx_per_page = 2;
    let client = PocketClient::new(config);

    let txs = client.query_account_txs_by_height("node1", 100, None).await.unwrap();
    let hashes: Vec<&str> = txs.iter().filter_map(|tx| tx["hash"].as_str()).collect();
    assert_eq!(hashes, vec!["T0", "T1", "T2", "T3", "T4"]);

    let bodies = bodies.lock().unwrap();
    assert_eq!(bodies.len(), 3);
    assert_eq!(
        bodies[0],
        json!({
            "address": "node1",
            "page": 1,
            "per_page": 2,
            "received": false,
            "prove": false,
            "order": "asc",
        })
    );
    assert_eq!(bodies[2]["page"], 3);
}

#[tokio::test]
async fn test_account_txs_stop_at_first_older_tx() {
    let hits = Hits::default();
    let router = Router::new().route(
        "/v1/query/accounttxs",
        post({
            let hits = hits.clone();
            move || async move {
                hits.next();
                Json(json!({
                    "txs": [{ "height": 100 }, { "height": 90 }, { "height": 110 }],
                    "total_txs": 6,
                    "page_count": 3,
                }))
            }
        }),
    );
    let client = PocketClient::new(config(spawn(router).await));

    let txs = client.query_account_txs_by_height("node1", 95, None).await.unwrap();
    assert_eq!(txs, vec![json!({ "height": 100 })]);
    assert_eq!(hits.count(), 1);
}

#[tokio::test]
async fn test_account_txs_empty_history() {
    let router = Router::new().route(
        "/v1/query/accounttxs",
        post(|| async { Json(json!({ "txs": null, "total_txs": 0, "page_count": 0 })) }),
    );
    let client = PocketClient::new(config(spawn(router).await));

    let txs = client.query_account_txs_by_height("node1", 0, None).await.unwrap();
    assert!(txs.is_empty());
}

#[tokio::test]
async fn test_params_from_height() {
    let hits = Hits::default();
    let router = Router::new().route(
        "/v1/query/allParams",
        post({
            let hits = hits.clone();
            move || async move {
                hits.next();
                Json(json!({
                    "app_params": [],
                    "node_params": [
                        { "param_key": "pos/DAOAllocation", "param_value": "\"10\"" },
                        { "param_key": "pos/ProposerPercentage", "param_value": "5" },
                        { "param_key": "pos/RelaysToTokensMultiplier", "param_value": "8461" },
                        { "param_key": "pos/ServicerStakeFloorMultiplier", "param_value": "15000000000" },
                        { "param_key": "pos/ServicerStakeWeightMultiplier", "param_value": "5" },
                        { "param_key": "pos/StakeMinimum", "param_value": "15000000000" },
                    ],
                }))
            }
        }),
    );
    let client = PocketClient::new(config(spawn(router).await));

    let params = client.get_params_from_height(960, None).await.unwrap();
    assert_eq!(params.dao_allocation.as_deref(), Some("10"));
    assert_eq!(params.proposer_allocation.as_deref(), Some("5"));
    assert_eq!(params.servicer_stake_floor_multiplier.as_deref(), Some("15000000000"));
    assert_eq!(params.servicer_stake_weight_multiplier.as_deref(), Some("5"));
    assert_eq!(params.servicer_stake_weight_ceiling, None);
    assert_eq!(params.servicer_stake_floor_multiplier_exponent, None);
    assert_eq!(hits.count(), 3);

    let cached = client.get_params_from_height(960, None).await.unwrap();
    assert!(Arc::ptr_eq(&params, &cached));
    assert_eq!(hits.count(), 3);
}

#[tokio::test]
async fn test_node_query_sends_address_and_height() {
    let router = Router::new().route(
        "/v1/query/node",
        post(|Json(body): Json<Value>| async move {
            if body != json!({ "address": "node1", "height": 960 }) {
                return (StatusCode::BAD_REQUEST, "unexpected body").into_response();
            }
            Json(common::node_response("node1", "30000000000")).into_response()
        }),
    );
    let client = PocketClient::new(config(spawn(router).await));

    let node = client.query_node("node1", 960, None).await.unwrap();
    assert_eq!(node.tokens, "30000000000");
    assert_eq!(node.chains, vec!["0021".to_string()]);
}

#[tokio::test]
async fn test_state_retries_null_app_state() {
    let hits = Hits::default();
    let router = Router::new().route(
        "/v1/query/state",
        post({
            let hits = hits.clone();
            move || async move {
                if hits.next() == 0 {
                    return Json(json!({ "app_state": null }));
                }
                Json(state_response())
            }
        }),
    );
    let client = PocketClient::new(config(spawn(router).await));

    let state = client.query_state(960, None).await.unwrap();
    assert_eq!(state["pos"]["params"]["dao_allocation"], "10");
    assert_eq!(hits.count(), 2);

    let cached = client.query_state(960, None).await.unwrap();
    assert!(Arc::ptr_eq(&state, &cached));
    assert_eq!(hits.count(), 2);
}

#[tokio::test]
async fn test_state_null_on_every_attempt_is_malformed() {
    let hits = Hits::default();
    let router = Router::new().route(
        "/v1/query/state",
        post({
            let hits = hits.clone();
            move || async move {
                hits.next();
                Json(json!({ "app_state": null }))
            }
        }),
    );
    let client = PocketClient::new(config(spawn(router).await));

    let err = client.query_state(960, None).await.unwrap_err();
    assert!(matches!(err, QueryError::MalformedResponse { query: "state", .. }));
    assert_eq!(hits.count(), 3);
    assert!(client.state_cache().is_empty());
}

#[tokio::test]
async fn test_account_txs_skip_items_without_height() {
    let router = Router::new().route(
        "/v1/query/accounttxs",
        post(|| async {
            Json(json!({
                "txs": [
                    { "hash": "A", "height": 100 },
                    { "hash": "NOH" },
                    { "hash": "BAD", "height": "unknown" },
                    { "hash": "B", "height": 120 },
                ],
                "total_txs": 4,
                "page_count": 10,
            }))
        }),
    );
    let client = PocketClient::new(config(spawn(router).await));

    let txs = client.query_account_txs_by_height("node1", 95, None).await.unwrap();
    let hashes: Vec<&str> = txs.iter().filter_map(|tx| tx["hash"].as_str()).collect();
    assert_eq!(hashes, vec!["A", "B"]);
}

#[tokio::test]
async fn test_account_txs_retries_failed_page() {
    let page_two_hits = Hits::default();
    let router = Router::new().route(
        "/v1/query/accounttxs",
        post({
            let page_two_hits = page_two_hits.clone();
            move |Json(body): Json<Value>| async move {
                let page = body["page"].as_u64().unwrap();
                if page == 2 {
                    match page_two_hits.next() {
                        0 => return (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response(),
                        1 => return Json(json!({ "error": { "message": "busy" } })).into_response(),
                        _ => {}
                    }
                }
                let txs: Vec<Value> = (0..4u64)
                    .map(|i| json!({ "hash": format!("T{i}"), "height": 100 + i }))
                    .skip(((page - 1) * 2) as usize)
                    .take(2)
                    .collect();
                Json(json!({ "txs": txs, "total_txs": 4, "page_count": 2 })).into_response()
            }
        }),
    );
    let mut config = config(spawn(router).await);
    config.tx_per_page = 2;
    let client = PocketClient::new(config);

    let txs = client.query_account_txs_by_height("node1", 100, None).await.unwrap();
    let hashes: Vec<&str> = txs.iter().filter_map(|tx| tx["hash"].as_str()).collect();
    assert_eq!(hashes, vec!["T0", "T1", "T2", "T3"]);
    assert_eq!(page_two_hits.count(), 3);
}

#[tokio::test]
async fn test_account_txs_missing_txs_is_malformed() {
    let hits = Hits::default();
    let router = Router::new().route(
        "/v1/query/accounttxs",
        post({
            let hits = hits.clone();
            move || async move {
                hits.next();
                Json(json!({ "total_txs": 4, "page_count": 2 }))
            }
        }),
    );
    let client = PocketClient::new(config(spawn(router).await));

    let err = client.query_account_txs_by_height("node1", 0, None).await.unwrap_err();
    assert!(matches!(err, QueryError::MalformedResponse { query: "accounttxs", .. }));
    assert_eq!(hits.count(), 3);
}
