// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Loyalty engine HTTP adapter (§4.2). Stateless: one GET per check, no
//! retry of its own — the worker pool's check routine decides what to do
//! with each outcome.

use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

/// Resolves the Open Question in spec.md §9: a per-call timeout of 10s.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    RateLimited { retry_after_sec: u64 },
    Registered,
    Processing,
    Invalid,
    Processed { accrual: Decimal },
    Malformed,
    TransportError,
}

#[derive(Debug, Deserialize)]
struct AccrualResponse {
    #[allow(dead_code)]
    order: String,
    status: String,
    #[serde(default)]
    accrual: Option<Decimal>,
}

pub struct LoyaltyClient {
    http: Client,
    base_url: String,
}

impl LoyaltyClient {
    pub fn new(base_url: String) -> Self {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("reqwest client builds with static config");
        Self { http, base_url }
    }

    pub async fn check(&self, code: &str) -> Outcome {
        let url = format!("{}/api/orders/{}", self.base_url.trim_end_matches('/'), code);
        let response = match self.http.get(&url).send().await {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, code, "loyalty engine transport error");
                return Outcome::TransportError;
            }
        };

        match response.status() {
            StatusCode::OK => Self::classify_body(response).await,
            StatusCode::TOO_MANY_REQUESTS => Self::classify_rate_limit(response),
            status => {
                warn!(%status, code, "loyalty engine returned unexpected status");
                Outcome::TransportError
            }
        }
    }

    async fn classify_body(response: reqwest::Response) -> Outcome {
        let body: AccrualResponse = match response.json().await {
            Ok(body) => body,
            Err(_) => return Outcome::Malformed,
        };
        match body.status.as_str() {
            "REGISTERED" => Outcome::Registered,
            "PROCESSING" => Outcome::Processing,
            "INVALID" => Outcome::Invalid,
            "PROCESSED" => match body.accrual {
                Some(accrual) => Outcome::Processed { accrual },
                None => Outcome::Malformed,
            },
            _ => Outcome::Malformed,
        }
    }

    fn classify_rate_limit(response: reqwest::Response) -> Outcome {
        let retry_after_sec = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(60);
        Outcome::RateLimited { retry_after_sec }
    }
}
