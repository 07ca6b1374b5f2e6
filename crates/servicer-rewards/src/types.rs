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

//! Sessions, reward records and the chain objects they are built from.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One servicer session, identified by `(session_height, chain)`.
///
/// `proof` and `claim` hold the raw transactions as returned by the endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionData {
    /// Claimant address, set from the claim transaction.
    #[serde(default)]
    pub account: String,
    pub session_height: u64,
    pub chain: String,
    /// Number of relays asserted by the claim.
    #[serde(default)]
    pub relays: u64,
    #[serde(default)]
    pub proof: Option<Value>,
    #[serde(default)]
    pub claim: Option<Value>,
}

impl SessionData {
    /// Whether both the proof and the claim have been matched.
    pub fn is_complete(&self) -> bool {
        self.proof.is_some() && self.claim.is_some()
    }

    /// Block height of the proof transaction, at which the reward is evaluated.
    pub fn proof_height(&self) -> Option<u64> {
        self.proof.as_ref().and_then(|proof| proof.get("height")).and_then(value_as_u64)
    }

    pub fn proof_hash(&self) -> Option<&str> {
        tx_hash(self.proof.as_ref())
    }

    pub fn claim_hash(&self) -> Option<&str> {
        tx_hash(self.claim.as_ref())
    }
}

fn tx_hash(tx: Option<&Value>) -> Option<&str> {
    tx.and_then(|tx| tx.get("hash")).and_then(Value::as_str)
}

/// Unit of every computed reward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RewardDenom {
    #[default]
    #[serde(rename = "upokt")]
    Upokt,
}

/// A session with its computed reward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardData {
    #[serde(flatten)]
    pub session: SessionData,
    /// Reward as an integer decimal string.
    pub reward: String,
    pub reward_denom: RewardDenom,
}

/// [RewardData] with the proof and claim replaced by their transaction hashes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardDataCondensed {
    pub account: String,
    pub session_height: u64,
    pub chain: String,
    pub relays: u64,
    pub proof: String,
    pub claim: String,
    pub reward: String,
    pub reward_denom: RewardDenom,
}

impl From<RewardData> for RewardDataCondensed {
    fn from(data: RewardData) -> Self {
        let proof = data.session.proof_hash().unwrap_or_default().to_string();
        let claim = data.session.claim_hash().unwrap_or_default().to_string();
        let SessionData { account, session_height, chain, relays, .. } = data.session;
        Self {
            account,
            session_height,
            chain,
            relays,
            proof,
            claim,
            reward: data.reward,
            reward_denom: data.reward_denom,
        }
    }
}

/// The chain parameters the reward formula depends on.
///
/// Every field is optional: a missing parameter only fails the computation that needs it.
/// Serialized field names follow the chain's `pos` params, including their spelling.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardParams {
    #[serde(default, deserialize_with = "string_or_number")]
    pub dao_allocation: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub proposer_allocation: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub relays_to_tokens_multiplier: Option<String>,
    #[serde(
        rename = "servicer_stake_floor_multipler",
        default,
        deserialize_with = "string_or_number"
    )]
    pub servicer_stake_floor_multiplier: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub servicer_stake_floor_multiplier_exponent: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub servicer_stake_weight_ceiling: Option<String>,
    #[serde(
        rename = "servicer_stake_weight_multipler",
        default,
        deserialize_with = "string_or_number"
    )]
    pub servicer_stake_weight_multiplier: Option<String>,
}

/// Staking snapshot of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PocketNode {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub chains: Vec<String>,
    #[serde(default)]
    pub jailed: bool,
    #[serde(default)]
    pub output_address: String,
    #[serde(default)]
    pub public_key: String,
    #[serde(default)]
    pub service_url: String,
    #[serde(default)]
    pub status: i64,
    /// Staked tokens as an integer decimal string.
    #[serde(deserialize_with = "required_string_or_number")]
    pub tokens: String,
    #[serde(default)]
    pub unstaking_time: String,
}

/// Read a JSON scalar as a decimal string.
pub(crate) fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Read a height or count that the endpoint may encode as a number or a numeric string.
pub(crate) fn value_as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(scalar_to_string))
}

fn required_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    scalar_to_string(&value)
        .ok_or_else(|| serde::de::Error::custom("expected a string or a number"))
}
