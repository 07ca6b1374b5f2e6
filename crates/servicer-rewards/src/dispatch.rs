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

//! Name-based invocation of the calculator operations.
//!
//! Parameters are positional, as in a JSON-RPC `params` array. Timeouts are given in
//! milliseconds and fall back to the configured defaults when absent or `null`.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use crate::calculator::ServicerRewardCalculator;
use crate::client::get_params_from_state;
use crate::error::DispatchError;
use crate::rewards::calculate_reward;
use crate::types::{RewardParams, SessionData};

type Handler = for<'a> fn(
    &'a ServicerRewardCalculator,
    Vec<Value>,
) -> BoxFuture<'a, Result<Value, DispatchError>>;

/// Table of the operations callable by name.
#[derive(Clone)]
pub struct MethodRegistry {
    methods: BTreeMap<&'static str, Handler>,
}

impl Default for MethodRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MethodRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodRegistry").field("methods", &self.methods.keys()).finish()
    }
}

impl MethodRegistry {
    pub fn new() -> Self {
        let mut methods: BTreeMap<&'static str, Handler> = BTreeMap::new();
        methods.insert("queryHeight", query_height);
        methods.insert("queryNode", query_node);
        methods.insert("queryState", query_state);
        methods.insert("queryAccountTxsByHeight", query_account_txs_by_height);
        methods.insert("getSessionsByHeight", get_sessions_by_height);
        methods.insert("getParamsFromState", get_params_from_state_method);
        methods.insert("getParamsFromHeight", get_params_from_height);
        methods.insert("calculateReward", calculate_reward_method);
        methods.insert("getRewardsFromSessions", get_rewards_from_sessions);
        methods.insert("getRewardFromSession", get_reward_from_session);
        methods.insert("getSessionsRewardsFromHeight", get_sessions_rewards_from_height);
        Self { methods }
    }

    /// Registered method names, sorted.
    pub fn methods(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.methods.keys().copied()
    }

    pub fn contains(&self, method: &str) -> bool {
        self.methods.contains_key(method)
    }

    /// Invoke `method` with positional `params` and return its JSON result.
    pub async fn call(
        &self,
        calculator: &ServicerRewardCalculator,
        method: &str,
        params: Vec<Value>,
    ) -> Result<Value, DispatchError> {
        let handler = self
            .methods
            .get(method)
            .ok_or_else(|| DispatchError::MethodNotFound(method.to_string()))?;
        tracing::debug!("Dispatching {} with {} params", method, params.len());
        handler(calculator, params).await
    }
}

fn param<T: DeserializeOwned>(
    params: &[Value],
    index: usize,
    name: &str,
) -> Result<T, DispatchError> {
    let value = params
        .get(index)
        .ok_or_else(|| DispatchError::InvalidParams(format!("missing parameter {name}")))?;
    serde_json::from_value(value.clone())
        .map_err(|e| DispatchError::InvalidParams(format!("invalid parameter {name}: {e}")))
}

fn optional_param<T: DeserializeOwned>(
    params: &[Value],
    index: usize,
    name: &str,
) -> Result<Option<T>, DispatchError> {
    match params.get(index) {
        None | Some(Value::Null) => Ok(None),
        Some(_) => param(params, index, name).map(Some),
    }
}

fn timeout_param(params: &[Value], index: usize) -> Result<Option<Duration>, DispatchError> {
    Ok(optional_param::<u64>(params, index, "timeout")?.map(Duration::from_millis))
}

/// A height that may be given as a number or a numeric string.
fn height_param(params: &[Value], index: usize, name: &str) -> Result<u64, DispatchError> {
    let value = param::<Value>(params, index, name)?;
    crate::types::value_as_u64(&value)
        .ok_or_else(|| DispatchError::InvalidParams(format!("invalid parameter {name}: {value}")))
}

fn error_entry(err: impl Display) -> Value {
    json!({ "error": { "message": err.to_string() } })
}

fn entries<T: Serialize, E: Display>(results: Vec<Result<T, E>>) -> Result<Value, DispatchError> {
    let entries = results
        .into_iter()
        .map(|result| match result {
            Ok(value) => serde_json::to_value(value),
            Err(err) => Ok(error_entry(err)),
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Value::Array(entries))
}

fn query_height(
    calc: &ServicerRewardCalculator,
    params: Vec<Value>,
) -> BoxFuture<'_, Result<Value, DispatchError>> {
    async move {
        let timeout = timeout_param(&params, 0)?;
        Ok(json!(calc.client().query_height(timeout).await?))
    }
    .boxed()
}

fn query_node(
    calc: &ServicerRewardCalculator,
    params: Vec<Value>,
) -> BoxFuture<'_, Result<Value, DispatchError>> {
    async move {
        let address: String = param(&params, 0, "address")?;
        let height = match params.get(1) {
            None | Some(Value::Null) => 0,
            Some(_) => height_param(&params, 1, "height")?,
        };
        let timeout = timeout_param(&params, 2)?;
        let node = calc.client().query_node(&address, height, timeout).await?;
        Ok(serde_json::to_value(node)?)
    }
    .boxed()
}

fn query_state(
    calc: &ServicerRewardCalculator,
    params: Vec<Value>,
) -> BoxFuture<'_, Result<Value, DispatchError>> {
    async move {
        let height = height_param(&params, 0, "height")?;
        let timeout = timeout_param(&params, 1)?;
        let state = calc.client().query_state(height, timeout).await?;
        Ok(state.as_ref().clone())
    }
    .boxed()
}

fn query_account_txs_by_height(
    calc: &ServicerRewardCalculator,
    params: Vec<Value>,
) -> BoxFuture<'_, Result<Value, DispatchError>> {
    async move {
        let address: String = param(&params, 0, "address")?;
        let starting_height = height_param(&params, 1, "startingHeight")?;
        let timeout = timeout_param(&params, 2)?;
        let txs =
            calc.client().query_account_txs_by_height(&address, starting_height, timeout).await?;
        Ok(Value::Array(txs))
    }
    .boxed()
}

fn get_sessions_by_height(
    calc: &ServicerRewardCalculator,
    params: Vec<Value>,
) -> BoxFuture<'_, Result<Value, DispatchError>> {
    async move {
        let address: String = param(&params, 0, "address")?;
        let starting_height = height_param(&params, 1, "startingHeight")?;
        let timeout = timeout_param(&params, 2)?;
        let sessions = calc.get_sessions_by_height(&address, starting_height, timeout).await?;
        Ok(serde_json::to_value(sessions)?)
    }
    .boxed()
}

fn get_params_from_state_method(
    _calc: &ServicerRewardCalculator,
    params: Vec<Value>,
) -> BoxFuture<'_, Result<Value, DispatchError>> {
    async move {
        let state: Value = param(&params, 0, "state")?;
        Ok(serde_json::to_value(get_params_from_state(&state)?)?)
    }
    .boxed()
}

fn get_params_from_height(
    calc: &ServicerRewardCalculator,
    params: Vec<Value>,
) -> BoxFuture<'_, Result<Value, DispatchError>> {
    async move {
        let height = height_param(&params, 0, "height")?;
        let timeout = timeout_param(&params, 1)?;
        let reward_params = calc.client().get_params_from_height(height, timeout).await?;
        Ok(serde_json::to_value(reward_params.as_ref())?)
    }
    .boxed()
}

fn calculate_reward_method(
    _calc: &ServicerRewardCalculator,
    params: Vec<Value>,
) -> BoxFuture<'_, Result<Value, DispatchError>> {
    async move {
        let relay_count = height_param(&params, 0, "relayCount")?;
        let staked_tokens: Value = param(&params, 1, "stakedTokens")?;
        let staked_tokens = crate::types::scalar_to_string(&staked_tokens).ok_or_else(|| {
            DispatchError::InvalidParams(format!("invalid parameter stakedTokens: {staked_tokens}"))
        })?;
        let reward_params: RewardParams = param(&params, 2, "params")?;
        Ok(json!(calculate_reward(relay_count, &staked_tokens, &reward_params)?))
    }
    .boxed()
}

fn get_rewards_from_sessions(
    calc: &ServicerRewardCalculator,
    params: Vec<Value>,
) -> BoxFuture<'_, Result<Value, DispatchError>> {
    async move {
        let sessions: Vec<SessionData> = param(&params, 0, "sessions")?;
        let timeout = timeout_param(&params, 1)?;
        entries(calc.get_rewards_from_sessions(&sessions, timeout).await?)
    }
    .boxed()
}

fn get_reward_from_session(
    calc: &ServicerRewardCalculator,
    params: Vec<Value>,
) -> BoxFuture<'_, Result<Value, DispatchError>> {
    async move {
        let session: SessionData = param(&params, 0, "session")?;
        let timeout = timeout_param(&params, 1)?;
        let reward = calc.get_reward_from_session(&session, timeout).await?;
        Ok(serde_json::to_value(reward)?)
    }
    .boxed()
}

fn get_sessions_rewards_from_height(
    calc: &ServicerRewardCalculator,
    params: Vec<Value>,
) -> BoxFuture<'_, Result<Value, DispatchError>> {
    async move {
        let address: String = param(&params, 0, "address")?;
        let starting_height = height_param(&params, 1, "startingHeight")?;
        let include_transactions =
            optional_param::<bool>(&params, 2, "includeTransactions")?.unwrap_or(false);
        let timeout = timeout_param(&params, 3)?;
        entries(
            calc.get_sessions_rewards_from_height(
                &address,
                starting_height,
                include_transactions,
                timeout,
            )
            .await?,
        )
    }
    .boxed()
}
