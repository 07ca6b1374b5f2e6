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

//! Session reconstruction from an account's proof and claim transactions.

use std::collections::HashMap;

use serde_json::Value;

use crate::types::{value_as_u64, SessionData};
use crate::{CLAIM_TX_TYPE, PROOF_TX_TYPE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TxRole {
    Proof,
    Claim,
}

/// A successful proof or claim with the fields needed to pair it.
struct SessionTx {
    role: TxRole,
    session_height: u64,
    chain: String,
    tx: Value,
}

impl SessionTx {
    /// Returns `None` for other transaction types, failed transactions, and proofs or claims
    /// whose session key cannot be read.
    fn parse(tx: Value) -> Option<Self> {
        let msg = tx.get("stdTx")?.get("msg")?;
        let role = match msg.get("type")?.as_str()? {
            PROOF_TX_TYPE => TxRole::Proof,
            CLAIM_TX_TYPE => TxRole::Claim,
            _ => return None,
        };
        if tx.get("tx_result")?.get("code")?.as_u64()? != 0 {
            return None;
        }

        let value = msg.get("value")?;
        let (session_height, chain) = match role {
            TxRole::Proof => {
                let leaf = value.get("leaf")?.get("value")?;
                (value_as_u64(leaf.get("session_block_height")?)?, leaf.get("blockchain")?)
            }
            TxRole::Claim => {
                let header = value.get("header")?;
                (value_as_u64(header.get("session_height")?)?, header.get("chain")?)
            }
        };
        let chain = chain.as_str()?.to_string();

        Some(Self { role, session_height, chain, tx })
    }
}

/// Pair proof and claim transactions into sessions.
///
/// Transactions sharing a `(session height, chain)` key are merged in the order they are
/// seen; a claim also sets the session's account and relay count. Only sessions with both a
/// proof and a claim, at or above `starting_height`, are returned.
pub fn pair_sessions(txs: Vec<Value>, starting_height: u64) -> Vec<SessionData> {
    let mut sessions: Vec<SessionData> = Vec::new();
    let mut index: HashMap<(u64, String), usize> = HashMap::new();

    for tx in txs {
        let Some(parsed) = SessionTx::parse(tx) else {
            continue;
        };

        let key = (parsed.session_height, parsed.chain.clone());
        let position = *index.entry(key).or_insert_with(|| {
            sessions.push(SessionData {
                account: String::new(),
                session_height: parsed.session_height,
                chain: parsed.chain.clone(),
                relays: 0,
                proof: None,
                claim: None,
            });
            sessions.len() - 1
        });

        let session = &mut sessions[position];
        match parsed.role {
            TxRole::Proof => session.proof = Some(parsed.tx),
            TxRole::Claim => {
                let claim = &parsed.tx["stdTx"]["msg"]["value"];
                session.account = claim["from_address"].as_str().unwrap_or_default().to_string();
                session.relays = value_as_u64(&claim["total_proofs"]).unwrap_or_default();
                session.claim = Some(parsed.tx);
            }
        }
    }

    sessions
        .into_iter()
        .filter(|session| session.is_complete())
        .filter(|session| session.session_height >= starting_height)
        .collect()
}
