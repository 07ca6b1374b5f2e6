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

//! Single, voted and retried HTTP requests.
//!
//! None of these functions fail by raising: every outcome, including transport failures and
//! non-2xx statuses, is returned as a `Result` value so the vote and retry loops can count it.

use std::time::Duration;

use futures_util::future::join_all;
use reqwest::{Client, Method};
use serde_json::Value;

use crate::error::RequestError;

/// Issues requests against the RPC endpoint.
#[derive(Debug, Clone, Default)]
pub struct RequestEngine {
    client: Client,
}

impl RequestEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine on top of an existing HTTP client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Issue a single request.
    ///
    /// A JSON response body is returned parsed. Any other body is returned as a JSON string.
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        timeout: Duration,
    ) -> Result<Value, RequestError> {
        tracing::trace!("{} {}", method, url);

        let mut builder = self.client.request(method, url).timeout(timeout);
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(RequestError::Status { status: status.as_u16(), body: text });
        }

        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }

    /// Issue `count` identical requests concurrently and return the most common successful
    /// response.
    ///
    /// See [pick_majority] for how the responses are compared.
    pub async fn multi_request(
        &self,
        count: usize,
        method: Method,
        url: &str,
        body: Option<&Value>,
        timeout: Duration,
    ) -> Result<Value, RequestError> {
        let results = join_all(
            (0..count).map(|_| self.request(method.clone(), url, body, timeout)),
        )
        .await;

        let errors = results.iter().filter(|r| r.is_err()).count();
        if errors > 0 {
            tracing::debug!("{} of {} requests to {} failed", errors, count, url);
        }

        pick_majority(results)
    }

    /// Issue requests one after another until one succeeds, at most `count` times.
    ///
    /// Returns the error of the final attempt when all of them fail.
    pub async fn retry_request(
        &self,
        count: usize,
        method: Method,
        url: &str,
        body: Option<&Value>,
        timeout: Duration,
    ) -> Result<Value, RequestError> {
        let mut last_err = RequestError::NoValidResponses;
        for attempt in 1..=count {
            match self.request(method.clone(), url, body, timeout).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    tracing::warn!("Attempt {}/{} to {} failed: {}", attempt, count, url, err);
                    last_err = err;
                }
            }
        }
        Err(last_err)
    }
}

/// Pick the winning response of a vote.
///
/// Successful responses are grouped by their canonical JSON encoding (object keys sorted).
/// The largest group wins and ties go to the group that was formed first, in result order.
/// Without any success the first error is returned, and an empty input yields
/// [RequestError::NoValidResponses].
pub fn pick_majority(results: Vec<Result<Value, RequestError>>) -> Result<Value, RequestError> {
    let mut groups: Vec<(String, usize, Value)> = Vec::new();
    let mut first_err = None;

    for result in results {
        match result {
            Ok(value) => {
                let encoded = canonical_json(&value);
                match groups.iter_mut().find(|(key, _, _)| *key == encoded) {
                    Some(group) => group.1 += 1,
                    None => groups.push((encoded, 1, value)),
                }
            }
            Err(err) => {
                if first_err.is_none() {
                    first_err = Some(err);
                }
            }
        }
    }

    let mut winner: Option<(usize, Value)> = None;
    for (_, count, value) in groups {
        // Strictly greater, so an equal count never displaces an earlier group.
        if winner.as_ref().map_or(true, |(best, _)| count > *best) {
            winner = Some((count, value));
        }
    }

    match (winner, first_err) {
        (Some((_, value)), _) => Ok(value),
        (None, Some(err)) => Err(err),
        (None, None) => Err(RequestError::NoValidResponses),
    }
}

/// JSON encoding with object keys sorted at every level.
fn canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));
            let fields: Vec<String> = entries
                .into_iter()
                .map(|(key, value)| {
                    format!("{}:{}", Value::String(key.clone()), canonical_json(value))
                })
                .collect();
            format!("{{{}}}", fields.join(","))
        }
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", items.join(","))
        }
        other => other.to_string(),
    }
}
