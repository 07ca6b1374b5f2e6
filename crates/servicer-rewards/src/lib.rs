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

//! Servicer reward computation for Pocket Network sessions.
//!
//! Sessions are rebuilt from an account's claim and proof transactions, the
//! chain parameters and the servicer's stake are read from an RPC endpoint
//! that is not trusted to answer consistently, and the reward is computed
//! with exact decimal arithmetic.

// Declare modules
pub mod cache;
pub mod calculator;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod request;
pub mod rewards;
pub mod sessions;
pub mod types;

// Re-export commonly used types
pub use cache::BoundedCache;

pub use calculator::{RewardRecord, ServicerRewardCalculator};

pub use client::PocketClient;

pub use config::{CalculatorConfig, ParamsSource};

pub use dispatch::MethodRegistry;

pub use error::{
    CalculatorError, DispatchError, QueryError, RequestError, RewardError, SessionError,
};

pub use request::RequestEngine;

pub use rewards::calculate_reward;

pub use sessions::pair_sessions;

pub use types::{
    PocketNode, RewardData, RewardDataCondensed, RewardDenom, RewardParams, SessionData,
};

/// Number of blocks scanned below the requested starting height, since a claim can land
/// a few blocks after the session it belongs to.
pub const SESSION_LOOKBACK_BLOCKS: u64 = 6;
/// Transaction type of a relay proof.
pub const PROOF_TX_TYPE: &str = "pocketcore/proof";
/// Transaction type of a relay claim.
pub const CLAIM_TX_TYPE: &str = "pocketcore/claim";
