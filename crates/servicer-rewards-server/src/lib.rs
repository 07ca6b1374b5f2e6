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

//! HTTP front end exposing the servicer reward calculator over JSON-RPC.

use servicer_rewards::{CalculatorConfig, MethodRegistry, ServicerRewardCalculator};

pub mod handler;
pub mod jsonrpc;

pub const DEFAULT_PORT: u16 = 3300;

/// State shared by every request.
#[derive(Debug)]
pub struct AppState {
    pub calculator: ServicerRewardCalculator,
    pub registry: MethodRegistry,
}

impl AppState {
    pub fn new(config: CalculatorConfig) -> Self {
        Self { calculator: ServicerRewardCalculator::new(config), registry: MethodRegistry::new() }
    }
}
