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

//! Typed queries against the Pocket RPC endpoint.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use reqwest::Method;
use serde_json::{json, Value};

use crate::cache::BoundedCache;
use crate::config::CalculatorConfig;
use crate::error::{QueryError, RequestError};
use crate::request::RequestEngine;
use crate::types::{scalar_to_string, value_as_u64, PocketNode, RewardParams};

/// `allParams` keys of the reward parameters.
const DAO_ALLOCATION_KEY: &str = "pos/DAOAllocation";
const PROPOSER_ALLOCATION_KEY: &str = "pos/ProposerPercentage";
const RELAYS_TO_TOKENS_KEY: &str = "pos/RelaysToTokensMultiplier";
const FLOOR_MULTIPLIER_KEY: &str = "pos/ServicerStakeFloorMultiplier";
const FLOOR_MULTIPLIER_EXPONENT_KEY: &str = "pos/ServicerStakeFloorMultiplierExponent";
const WEIGHT_CEILING_KEY: &str = "pos/ServicerStakeWeightCeiling";
const WEIGHT_MULTIPLIER_KEY: &str = "pos/ServicerStakeWeightMultiplier";

/// Client for the Pocket RPC endpoint.
///
/// Owns the state and parameter caches. They are shared between concurrent callers and are
/// best effort: two racing misses for one height both query the endpoint.
#[derive(Debug)]
pub struct PocketClient {
    config: CalculatorConfig,
    engine: RequestEngine,
    state_cache: Mutex<BoundedCache<Value>>,
    params_cache: Mutex<BoundedCache<RewardParams>>,
}

impl PocketClient {
    pub fn new(config: CalculatorConfig) -> Self {
        let state_cache = BoundedCache::new(config.state_cache_length);
        let params_cache = BoundedCache::new(config.params_cache_length);
        Self::with_caches(config, state_cache, params_cache)
    }

    /// Create a client with pre-populated caches.
    pub fn with_caches(
        config: CalculatorConfig,
        state_cache: BoundedCache<Value>,
        params_cache: BoundedCache<RewardParams>,
    ) -> Self {
        Self {
            config,
            engine: RequestEngine::new(),
            state_cache: Mutex::new(state_cache),
            params_cache: Mutex::new(params_cache),
        }
    }

    pub fn config(&self) -> &CalculatorConfig {
        &self.config
    }

    /// Snapshot of the state cache.
    pub fn state_cache(&self) -> BoundedCache<Value> {
        lock(&self.state_cache).clone()
    }

    /// Snapshot of the parameter cache.
    pub fn params_cache(&self) -> BoundedCache<RewardParams> {
        lock(&self.params_cache).clone()
    }

    /// Fails with [QueryError::EndpointNotSet] when no endpoint is configured.
    pub fn check_endpoint(&self) -> Result<(), QueryError> {
        self.endpoint().map(|_| ())
    }

    fn endpoint(&self) -> Result<&str, QueryError> {
        self.config
            .pocket_endpoint
            .as_ref()
            .map(|url| url.as_str().trim_end_matches('/'))
            .ok_or(QueryError::EndpointNotSet)
    }

    fn url(&self, path: &str) -> Result<String, QueryError> {
        Ok(format!("{}{}", self.endpoint()?, path))
    }

    async fn vote(
        &self,
        path: &str,
        body: Option<&Value>,
        timeout: Duration,
    ) -> Result<Value, QueryError> {
        let url = self.url(path)?;
        let res = self
            .engine
            .multi_request(self.config.multi_request_count, Method::POST, &url, body, timeout)
            .await?;
        check_rpc_error(&res)?;
        Ok(res)
    }

    /// Current block height, voted across parallel requests.
    pub async fn query_height(&self, timeout: Option<Duration>) -> Result<u64, QueryError> {
        let timeout = timeout.unwrap_or(self.config.request_timeout);
        let res = self.vote("/v1/query/height", None, timeout).await?;
        res.get("height")
            .and_then(value_as_u64)
            .ok_or_else(|| QueryError::malformed("height", "missing height"))
    }

    /// Staking snapshot of a node at `height`, where 0 is the latest block.
    pub async fn query_node(
        &self,
        address: &str,
        height: u64,
        timeout: Option<Duration>,
    ) -> Result<PocketNode, QueryError> {
        let timeout = timeout.unwrap_or(self.config.request_timeout);
        let body = json!({ "address": address, "height": height });
        let res = self.vote("/v1/query/node", Some(&body), timeout).await?;
        serde_json::from_value(res).map_err(|e| QueryError::malformed("node", e.to_string()))
    }

    /// Full application state at `height`.
    ///
    /// Served from the state cache when possible. Otherwise up to `multi_request_count`
    /// attempts are made one after another until a response carries an `app_state`.
    pub async fn query_state(
        &self,
        height: u64,
        timeout: Option<Duration>,
    ) -> Result<Arc<Value>, QueryError> {
        let url = self.url("/v1/query/state")?;
        let timeout = timeout.unwrap_or(self.config.retry_request_timeout);

        if self.config.use_state_cache {
            if let Some(state) = lock(&self.state_cache).get(height) {
                tracing::debug!("State cache hit for height {}", height);
                return Ok(state);
            }
        }

        let body = json!({ "height": height });
        let mut res = self.attempt(&url, &body, timeout, 1).await;
        for attempt in 2..=self.config.multi_request_count {
            if matches!(&res, Ok(v) if has_app_state(v)) {
                break;
            }
            res = self.attempt(&url, &body, timeout, attempt).await;
        }

        let mut res = res?;
        check_rpc_error(&res)?;
        let state = match res.get_mut("app_state").map(Value::take) {
            Some(state) if !state.is_null() => Arc::new(state),
            _ => return Err(QueryError::malformed("state", "missing app_state")),
        };

        if self.config.use_state_cache {
            lock(&self.state_cache).insert(height, state.clone());
        }
        Ok(state)
    }

    /// Transactions sent by `address` at or above `starting_height`, in ascending order.
    ///
    /// Pages are fetched one at a time, each retried up to `multi_request_count` times. The
    /// scan stops at the first transaction below `starting_height`.
    pub async fn query_account_txs_by_height(
        &self,
        address: &str,
        starting_height: u64,
        timeout: Option<Duration>,
    ) -> Result<Vec<Value>, QueryError> {
        let url = self.url("/v1/query/accounttxs")?;
        let timeout = timeout.unwrap_or(self.config.retry_request_timeout);
        let per_page = self.config.tx_per_page;

        let mut filtered = Vec::new();
        let mut total_pages: Option<u64> = None;
        let mut page: u64 = 1;

        while page <= total_pages.unwrap_or(1) {
            let body = json!({
                "address": address,
                "page": page,
                "per_page": per_page,
                "received": false,
                "prove": false,
                "order": "asc",
            });

            let mut res = self.attempt(&url, &body, timeout, 1).await;
            for attempt in 2..=self.config.multi_request_count {
                if matches!(&res, Ok(v) if is_txs_page(v)) {
                    break;
                }
                res = self.attempt(&url, &body, timeout, attempt).await;
            }

            let res = res?;
            check_rpc_error(&res)?;
            if !is_txs_page(&res) {
                return Err(QueryError::malformed("accounttxs", "missing txs"));
            }

            if total_pages.is_none() {
                let total_txs = res.get("total_txs").and_then(value_as_u64).unwrap_or(0);
                let page_count = res
                    .get("page_count")
                    .and_then(value_as_u64)
                    .filter(|count| *count > 0)
                    .unwrap_or(u64::from(per_page.max(1)));
                total_pages = Some(total_txs.div_ceil(page_count));
                tracing::debug!(
                    "Account {} has {} transactions over {:?} pages",
                    address,
                    total_txs,
                    total_pages
                );
            }

            let txs = match res.get("txs") {
                Some(Value::Array(txs)) => txs.clone(),
                _ => Vec::new(),
            };
            for tx in txs {
                // Items without a readable height are skipped, not treated as older.
                let Some(height) = tx.get("height").and_then(value_as_u64) else {
                    continue;
                };
                if height >= starting_height {
                    filtered.push(tx);
                } else {
                    return Ok(filtered);
                }
            }

            page += 1;
        }

        Ok(filtered)
    }

    /// Reward parameters at `height` from the `allParams` query.
    ///
    /// Served from the parameter cache when possible. Keys missing from the listing leave the
    /// field unset.
    pub async fn get_params_from_height(
        &self,
        height: u64,
        timeout: Option<Duration>,
    ) -> Result<Arc<RewardParams>, QueryError> {
        self.check_endpoint()?;
        let timeout = timeout.unwrap_or(self.config.request_timeout);

        if self.config.use_state_cache {
            if let Some(params) = lock(&self.params_cache).get(height) {
                tracing::debug!("Params cache hit for height {}", height);
                return Ok(params);
            }
        }

        let body = json!({ "height": height });
        let res = self.vote("/v1/query/allParams", Some(&body), timeout).await?;
        let node_params = res
            .get("node_params")
            .and_then(Value::as_array)
            .ok_or_else(|| QueryError::malformed("allParams", "missing node_params"))?;

        let find = |key: &str| {
            node_params
                .iter()
                .find(|param| param.get("param_key").and_then(Value::as_str) == Some(key))
                .and_then(|param| param.get("param_value"))
                .and_then(param_value_to_string)
        };
        let params = Arc::new(RewardParams {
            dao_allocation: find(DAO_ALLOCATION_KEY),
            proposer_allocation: find(PROPOSER_ALLOCATION_KEY),
            relays_to_tokens_multiplier: find(RELAYS_TO_TOKENS_KEY),
            servicer_stake_floor_multiplier: find(FLOOR_MULTIPLIER_KEY),
            servicer_stake_floor_multiplier_exponent: find(FLOOR_MULTIPLIER_EXPONENT_KEY),
            servicer_stake_weight_ceiling: find(WEIGHT_CEILING_KEY),
            servicer_stake_weight_multiplier: find(WEIGHT_MULTIPLIER_KEY),
        });

        if self.config.use_state_cache {
            lock(&self.params_cache).insert(height, params.clone());
        }
        Ok(params)
    }

    /// One attempt of a retried query. An endpoint error payload counts as a failed attempt
    /// but is still returned so the last one can be reported.
    async fn attempt(
        &self,
        url: &str,
        body: &Value,
        timeout: Duration,
        attempt: usize,
    ) -> Result<Value, RequestError> {
        let res = self.engine.request(Method::POST, url, Some(body), timeout).await;
        match &res {
            Err(err) => tracing::warn!("Attempt {} to {} failed: {}", attempt, url, err),
            Ok(value) => {
                if let Some(message) = rpc_error_message(value) {
                    tracing::warn!("Attempt {} to {} returned error: {}", attempt, url, message);
                }
            }
        }
        res
    }
}

/// Reward parameters from the `pos.params` section of an application state.
pub fn get_params_from_state(state: &Value) -> Result<RewardParams, QueryError> {
    let params = state
        .get("pos")
        .and_then(|pos| pos.get("params"))
        .ok_or_else(|| QueryError::malformed("state", "missing pos.params"))?;
    serde_json::from_value(params.clone())
        .map_err(|e| QueryError::malformed("state", e.to_string()))
}

fn has_app_state(value: &Value) -> bool {
    matches!(value.get("app_state"), Some(state) if !state.is_null())
}

fn is_txs_page(value: &Value) -> bool {
    rpc_error_message(value).is_none()
        && matches!(value.get("txs"), Some(Value::Array(_)) | Some(Value::Null))
}

fn rpc_error_message(value: &Value) -> Option<String> {
    let error = value.get("error")?;
    match error.get("message") {
        Some(message) => Some(message.as_str().map(str::to_string).unwrap_or(message.to_string())),
        None => Some(error.as_str().map(str::to_string).unwrap_or(error.to_string())),
    }
}

fn check_rpc_error(value: &Value) -> Result<(), QueryError> {
    match rpc_error_message(value) {
        Some(message) => Err(QueryError::Rpc(message)),
        None => Ok(()),
    }
}

/// Parameter values can be listed JSON encoded a second time, e.g. `"\"10\""`.
fn param_value_to_string(value: &Value) -> Option<String> {
    let raw = scalar_to_string(value)?;
    match serde_json::from_str::<Value>(&raw) {
        Ok(Value::String(inner)) => Some(inner),
        _ => Some(raw),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // Cache updates are single pushes, so a poisoned lock still holds a valid cache.
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
