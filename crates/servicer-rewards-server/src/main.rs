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

use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
    time::Duration,
};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use servicer_rewards::{CalculatorConfig, ParamsSource};
use servicer_rewards_server::{handler::create_app, AppState, DEFAULT_PORT};
use url::Url;

/// Arguments for the servicer reward server.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct ServerArgs {
    /// Port to listen on.
    #[clap(long, env, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Address to bind to.
    #[clap(long, env, default_value = "0.0.0.0")]
    bind_address: IpAddr,

    /// URL of the Pocket RPC endpoint. Without it every query fails.
    #[clap(long, env)]
    pocket_endpoint: Option<Url>,

    /// Timeout in milliseconds for voted requests.
    #[clap(long, env, default_value = "20000")]
    request_timeout: u64,

    /// Timeout in milliseconds for each attempt of a retried request.
    #[clap(long, env, default_value = "20000")]
    retry_request_timeout: u64,

    /// Number of parallel requests per vote, and of attempts per retried request.
    #[clap(long, env, default_value = "3", value_parser = clap::value_parser!(u32).range(1..))]
    multi_request_count: u32,

    /// Number of state snapshots kept in memory.
    #[clap(long, env, default_value = "10")]
    state_cache_length: usize,

    /// Number of parameter sets kept in memory.
    #[clap(long, env, default_value = "10")]
    params_cache_length: usize,

    /// Whether to cache state snapshots and parameter sets.
    #[clap(long, env, default_value_t = true, action = ArgAction::Set)]
    use_state_cache: bool,

    /// Page size of account transaction queries.
    #[clap(long, env, default_value = "10")]
    tx_per_page: u32,

    /// Read reward parameters from the state snapshot instead of the parameter query.
    #[clap(long, env, default_value_t = true, action = ArgAction::Set)]
    get_params_from_state: bool,

    /// Whether to log in JSON format.
    #[clap(long, env, default_value_t = false)]
    log_json: bool,
}

impl ServerArgs {
    fn calculator_config(&self) -> CalculatorConfig {
        CalculatorConfig {
            pocket_endpoint: self.pocket_endpoint.clone(),
            request_timeout: Duration::from_millis(self.request_timeout),
            retry_request_timeout: Duration::from_millis(self.retry_request_timeout),
            multi_request_count: self.multi_request_count as usize,
            state_cache_length: self.state_cache_length,
            params_cache_length: self.params_cache_length,
            use_state_cache: self.use_state_cache,
            tx_per_page: self.tx_per_page,
            params_source: if self.get_params_from_state {
                ParamsSource::State
            } else {
                ParamsSource::Query
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = ServerArgs::parse();

    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
        .from_env_lossy();

    if args.log_json {
        tracing_subscriber::fmt().with_ansi(false).json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_ansi(false).with_env_filter(filter).init();
    }

    match &args.pocket_endpoint {
        Some(endpoint) => tracing::info!("Pocket endpoint: {}", endpoint),
        None => tracing::warn!("No Pocket endpoint configured, queries will fail"),
    }

    let state = Arc::new(AppState::new(args.calculator_config()));
    let app = create_app(state);

    let addr = SocketAddr::new(args.bind_address, args.port);
    let listener =
        tokio::net::TcpListener::bind(addr).await.context("Failed to bind to address")?;

    tracing::info!("Servicer reward server listening on http://{}", addr);
    axum::serve(listener, app).await.context("Server failed")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = ServerArgs::try_parse_from(["servicer-rewards-server"]).unwrap();
        assert_eq!(args.port, 3300);

        let config = args.calculator_config();
        assert_eq!(config.pocket_endpoint, None);
        assert_eq!(config.request_timeout, Duration::from_secs(20));
        assert_eq!(config.multi_request_count, 3);
        assert!(config.use_state_cache);
        assert_eq!(config.params_source, ParamsSource::State);
    }

    #[test]
    fn test_overrides() {
        let args = ServerArgs::try_parse_from([
            "servicer-rewards-server",
            "--pocket-endpoint",
            "http://localhost:8081",
            "--request-timeout",
            "1500",
            "--use-state-cache",
            "false",
            "--get-params-from-state",
            "false",
            "--tx-per-page",
            "50",
        ])
        .unwrap();

        let config = args.calculator_config();
        assert_eq!(config.pocket_endpoint.unwrap().as_str(), "http://localhost:8081/");
        assert_eq!(config.request_timeout, Duration::from_millis(1500));
        assert!(!config.use_state_cache);
        assert_eq!(config.params_source, ParamsSource::Query);
        assert_eq!(config.tx_per_page, 50);
    }

    #[test]
    fn test_rejects_zero_request_count() {
        let res = ServerArgs::try_parse_from([
            "servicer-rewards-server",
            "--multi-request-count",
            "0",
        ]);
        assert!(res.is_err());

        let args = ServerArgs::try_parse_from([
            "servicer-rewards-server",
            "--multi-request-count",
            "1",
        ])
        .unwrap();
        assert_eq!(args.calculator_config().multi_request_count, 1);
    }
}
