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

//! Session discovery and the batch reward pipeline.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use crate::client::{get_params_from_state, PocketClient};
use crate::config::{CalculatorConfig, ParamsSource};
use crate::error::{CalculatorError, QueryError, SessionError};
use crate::rewards::calculate_reward;
use crate::sessions::pair_sessions;
use crate::types::{
    PocketNode, RewardData, RewardDataCondensed, RewardDenom, RewardParams, SessionData,
};
use crate::SESSION_LOOKBACK_BLOCKS;

/// A reward record, either with the full proof and claim transactions or with their hashes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RewardRecord {
    Full(RewardData),
    Condensed(RewardDataCondensed),
}

impl RewardRecord {
    pub fn reward(&self) -> &str {
        match self {
            RewardRecord::Full(data) => &data.reward,
            RewardRecord::Condensed(data) => &data.reward,
        }
    }
}

/// Lookups shared by the sessions of one batch. Dropped when the batch completes.
#[derive(Default)]
struct BatchLookups {
    states: HashMap<u64, Arc<Value>>,
    nodes: HashMap<u64, HashMap<String, PocketNode>>,
}

/// Computes servicer rewards from an account's on-chain sessions.
#[derive(Debug)]
pub struct ServicerRewardCalculator {
    client: PocketClient,
}

impl ServicerRewardCalculator {
    pub fn new(config: CalculatorConfig) -> Self {
        Self { client: PocketClient::new(config) }
    }

    pub fn with_client(client: PocketClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &PocketClient {
        &self.client
    }

    pub fn config(&self) -> &CalculatorConfig {
        self.client.config()
    }

    /// Complete sessions of `address` at or above `starting_height`.
    ///
    /// Transactions are fetched from a few blocks earlier so that claims submitted just before
    /// the window can still be paired.
    pub async fn get_sessions_by_height(
        &self,
        address: &str,
        starting_height: u64,
        timeout: Option<Duration>,
    ) -> Result<Vec<SessionData>, QueryError> {
        let from_height = starting_height.saturating_sub(SESSION_LOOKBACK_BLOCKS);
        let txs = self.client.query_account_txs_by_height(address, from_height, timeout).await?;
        let tx_count = txs.len();

        let sessions = pair_sessions(txs, starting_height);
        tracing::debug!(
            "Paired {} sessions for {} from {} transactions since height {}",
            sessions.len(),
            address,
            tx_count,
            from_height
        );
        Ok(sessions)
    }

    /// Compute the reward of every session, in input order.
    ///
    /// A session that fails yields an error entry at its position; the rest of the batch is
    /// still processed. Only a missing endpoint fails the whole call.
    pub async fn get_rewards_from_sessions(
        &self,
        sessions: &[SessionData],
        timeout: Option<Duration>,
    ) -> Result<Vec<Result<RewardData, SessionError>>, QueryError> {
        self.client.check_endpoint()?;

        let mut lookups = BatchLookups::default();
        let mut results = Vec::with_capacity(sessions.len());
        for session in sessions {
            let result = self.reward_for_session(session, &mut lookups, timeout).await;
            if let Err(err) = &result {
                tracing::warn!("{}", err);
            }
            results.push(result);
        }

        let failed = results.iter().filter(|r| r.is_err()).count();
        tracing::info!(
            "Computed rewards for {} sessions ({} failed)",
            results.len() - failed,
            failed
        );
        Ok(results)
    }

    /// Compute the reward of a single session.
    pub async fn get_reward_from_session(
        &self,
        session: &SessionData,
        timeout: Option<Duration>,
    ) -> Result<RewardData, CalculatorError> {
        self.client.check_endpoint()?;
        let mut lookups = BatchLookups::default();
        Ok(self.reward_for_session(session, &mut lookups, timeout).await?)
    }

    /// Find the sessions of `address` since `starting_height` and compute their rewards.
    ///
    /// Without `include_transactions` successful records carry only the proof and claim
    /// hashes.
    pub async fn get_sessions_rewards_from_height(
        &self,
        address: &str,
        starting_height: u64,
        include_transactions: bool,
        timeout: Option<Duration>,
    ) -> Result<Vec<Result<RewardRecord, SessionError>>, QueryError> {
        let sessions = self.get_sessions_by_height(address, starting_height, timeout).await?;
        let rewards = self.get_rewards_from_sessions(&sessions, timeout).await?;

        Ok(rewards
            .into_iter()
            .map(|result| {
                result.map(|data| {
                    if include_transactions {
                        RewardRecord::Full(data)
                    } else {
                        RewardRecord::Condensed(data.into())
                    }
                })
            })
            .collect())
    }

    async fn reward_for_session(
        &self,
        session: &SessionData,
        lookups: &mut BatchLookups,
        timeout: Option<Duration>,
    ) -> Result<RewardData, SessionError> {
        let height = session.proof_height().ok_or_else(|| SessionError::MissingProofHeight {
            session_height: session.session_height,
            chain: session.chain.clone(),
        })?;

        let params = self.params_at(height, lookups, timeout).await?;
        let node = self.node_at(&session.account, height, lookups, timeout).await?;

        let reward = calculate_reward(session.relays, &node.tokens, &params).map_err(|source| {
            SessionError::Reward {
                session_height: session.session_height,
                proof_hash: session.proof_hash().unwrap_or_default().to_string(),
                source,
            }
        })?;

        Ok(RewardData { session: session.clone(), reward, reward_denom: RewardDenom::Upokt })
    }

    async fn params_at(
        &self,
        height: u64,
        lookups: &mut BatchLookups,
        timeout: Option<Duration>,
    ) -> Result<Arc<RewardParams>, SessionError> {
        match self.config().params_source {
            ParamsSource::Query => self
                .client
                .get_params_from_height(height, timeout)
                .await
                .map_err(|source| SessionError::Params { height, source }),
            ParamsSource::State => {
                let state = match lookups.states.get(&height) {
                    Some(state) => state.clone(),
                    None => {
                        let state = self
                            .client
                            .query_state(height, timeout)
                            .await
                            .map_err(|source| SessionError::State { height, source })?;
                        lookups.states.insert(height, state.clone());
                        state
                    }
                };
                get_params_from_state(&state)
                    .map(Arc::new)
                    .map_err(|source| SessionError::Params { height, source })
            }
        }
    }

    async fn node_at(
        &self,
        account: &str,
        height: u64,
        lookups: &mut BatchLookups,
        timeout: Option<Duration>,
    ) -> Result<PocketNode, SessionError> {
        if let Some(node) = lookups.nodes.get(&height).and_then(|nodes| nodes.get(account)) {
            return Ok(node.clone());
        }

        let node = self.client.query_node(account, height, timeout).await.map_err(|source| {
            SessionError::Node { account: account.to_string(), height, source }
        })?;
        lookups.nodes.entry(height).or_default().insert(account.to_string(), node.clone());
        Ok(node)
    }
}
