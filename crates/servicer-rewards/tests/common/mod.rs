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

//! Stub Pocket RPC endpoints for the integration tests.

#![allow(dead_code)]

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;

use axum::Router;
use serde_json::{json, Value};
use servicer_rewards::{CalculatorConfig, CLAIM_TX_TYPE, PROOF_TX_TYPE};
use url::Url;

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn spawn(router: Router) -> Url {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}").parse().unwrap()
}

/// Configuration pointed at `endpoint` with short timeouts.
pub fn config(endpoint: Url) -> CalculatorConfig {
    let mut config = CalculatorConfig::with_endpoint(endpoint);
    config.request_timeout = Duration::from_secs(5);
    config.retry_request_timeout = Duration::from_secs(5);
    config
}

/// Counts calls to a stub route.
#[derive(Clone, Default)]
pub struct Hits(Arc<AtomicUsize>);

impl Hits {
    /// Record a call and return its zero-based index.
    pub fn next(&self) -> usize {
        self.0.fetch_add(1, Ordering::SeqCst)
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Reward parameters with a floor multiplier of 15000 POKT and a ceiling of 60000 POKT.
pub fn fixture_params() -> Value {
    json!({
        "dao_allocation": "10",
        "proposer_allocation": "5",
        "relays_to_tokens_multiplier": "8461",
        "servicer_stake_floor_multipler": "15000000000",
        "servicer_stake_floor_multiplier_exponent": "1",
        "servicer_stake_weight_ceiling": "60000000000",
        "servicer_stake_weight_multipler": "5",
    })
}

pub fn state_response() -> Value {
    json!({ "app_state": { "pos": { "params": fixture_params() } } })
}

pub fn node_response(address: &str, tokens: &str) -> Value {
    json!({
        "address": address,
        "chains": ["0021"],
        "jailed": false,
        "public_key": "pk",
        "service_url": "https://node.example:443",
        "status": 2,
        "tokens": tokens,
        "unstaking_time": "0001-01-01T00:00:00Z",
    })
}

pub fn proof_tx(hash: &str, height: u64, session_height: u64, chain: &str) -> Value {
    json!({
        "hash": hash,
        "height": height,
        "tx_result": { "code": 0 },
        "stdTx": { "msg": {
            "type": PROOF_TX_TYPE,
            "value": { "leaf": { "value": {
                "session_block_height": session_height.to_string(),
                "blockchain": chain,
            } } },
        } },
    })
}

pub fn claim_tx(
    hash: &str,
    height: u64,
    session_height: u64,
    chain: &str,
    from: &str,
    relays: u64,
) -> Value {
    json!({
        "hash": hash,
        "height": height,
        "tx_result": { "code": 0 },
        "stdTx": { "msg": {
            "type": CLAIM_TX_TYPE,
            "value": {
                "from_address": from,
                "total_proofs": relays.to_string(),
                "header": { "session_height": session_height.to_string(), "chain": chain },
            },
        } },
    })
}
