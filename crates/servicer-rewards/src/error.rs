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

//! Error types.
//!
//! [RequestError] is returned as a value by the request engine and is counted by the vote and
//! retry loops. The query boundary turns it, and errors reported by the endpoint, into a raised
//! [QueryError].

use thiserror::Error;

/// Failure of a single HTTP exchange with the endpoint.
#[derive(Error, Debug)]
pub enum RequestError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("No valid responses")]
    NoValidResponses,
}

/// Failure of a typed chain query.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Pocket endpoint not set")]
    EndpointNotSet,

    #[error(transparent)]
    Request(#[from] RequestError),

    /// Error message reported by the endpoint in an `{"error": {"message": ..}}` payload.
    #[error("{0}")]
    Rpc(String),

    #[error("Malformed {query} response: {reason}")]
    MalformedResponse { query: &'static str, reason: String },
}

impl QueryError {
    pub(crate) fn malformed(query: &'static str, reason: impl Into<String>) -> Self {
        QueryError::MalformedResponse { query, reason: reason.into() }
    }
}

/// Failure of the reward formula.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RewardError {
    #[error("Missing reward parameter {0}")]
    MissingParam(&'static str),

    #[error("Invalid decimal value for {name}: {value:?}")]
    InvalidDecimal { name: &'static str, value: String },

    #[error("{0} must not be zero")]
    Zero(&'static str),

    #[error("Arithmetic overflow while computing {0}")]
    Overflow(&'static str),
}

/// Failure to compute the reward of one session inside a batch.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session at height {session_height} on chain {chain} has no proof height")]
    MissingProofHeight { session_height: u64, chain: String },

    #[error("Error getting state at height {height} - {source}")]
    State {
        height: u64,
        #[source]
        source: QueryError,
    },

    #[error("Error getting params at height {height} - {source}")]
    Params {
        height: u64,
        #[source]
        source: QueryError,
    },

    #[error("Error getting node data for {account} at height {height} - {source}")]
    Node {
        account: String,
        height: u64,
        #[source]
        source: QueryError,
    },

    #[error(
        "Error calculating reward for session at height {session_height} with proof {proof_hash} - {source}"
    )]
    Reward {
        session_height: u64,
        proof_hash: String,
        #[source]
        source: RewardError,
    },
}

/// Errors raised by the calculator's public operations.
#[derive(Error, Debug)]
pub enum CalculatorError {
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Errors raised while dispatching a named method call.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error(transparent)]
    Calculator(#[from] CalculatorError),

    #[error(transparent)]
    Reward(#[from] RewardError),

    #[error("Failed to serialize result: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<QueryError> for DispatchError {
    fn from(err: QueryError) -> Self {
        DispatchError::Calculator(CalculatorError::Query(err))
    }
}
