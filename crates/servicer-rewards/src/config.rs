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

use std::time::Duration;

use url::Url;

/// Default timeout of a single request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
/// Default timeout of a single attempt in the retrying queries.
pub const DEFAULT_RETRY_REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
/// Default number of parallel requests in a vote, also used as the retry budget.
pub const DEFAULT_MULTI_REQUEST_COUNT: usize = 3;
/// Default capacity of the state and parameter caches.
pub const DEFAULT_CACHE_LENGTH: usize = 10;
/// Default page size of the account transaction query.
pub const DEFAULT_TX_PER_PAGE: u32 = 10;

/// Where the reward parameters of a session are read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParamsSource {
    /// `pos.params` of the full state snapshot at the proof height.
    #[default]
    State,
    /// The dedicated `allParams` query at the proof height.
    Query,
}

/// Configuration of a [crate::ServicerRewardCalculator].
#[derive(Debug, Clone)]
pub struct CalculatorConfig {
    /// Base URL of the Pocket RPC endpoint. Every query fails without it.
    pub pocket_endpoint: Option<Url>,
    pub request_timeout: Duration,
    pub retry_request_timeout: Duration,
    pub multi_request_count: usize,
    pub state_cache_length: usize,
    pub params_cache_length: usize,
    /// Enables both the state and the parameter cache.
    pub use_state_cache: bool,
    pub tx_per_page: u32,
    pub params_source: ParamsSource,
}

impl Default for CalculatorConfig {
    fn default() -> Self {
        Self {
            pocket_endpoint: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            retry_request_timeout: DEFAULT_RETRY_REQUEST_TIMEOUT,
            multi_request_count: DEFAULT_MULTI_REQUEST_COUNT,
            state_cache_length: DEFAULT_CACHE_LENGTH,
            params_cache_length: DEFAULT_CACHE_LENGTH,
            use_state_cache: true,
            tx_per_page: DEFAULT_TX_PER_PAGE,
            params_source: ParamsSource::State,
        }
    }
}

impl CalculatorConfig {
    /// Default configuration pointed at the given endpoint.
    pub fn with_endpoint(pocket_endpoint: Url) -> Self {
        Self { pocket_endpoint: Some(pocket_endpoint), ..Default::default() }
    }
}
