//! Client for the variation-normalization REST service.
//!
//! Each description is sent as `GET {base_url}{path}?q=<description>`; the
//! service answers with a JSON body whose `variation` object carries the VRS
//! identifier, or `null` when the description could not be normalized.

use crate::adapters::http::build_client;
use crate::domain::ports::{NormalizedVariation, VariationNormalizer};
use crate::utils::error::{EvidenceError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_NORMALIZE_PATH: &str = "/variation/normalize";

#[derive(Debug, Clone)]
pub struct NormalizerSettings {
    pub base_url: String,
    pub path: String,
    pub timeout_secs: u64,
    pub retry_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for NormalizerSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            path: DEFAULT_NORMALIZE_PATH.to_string(),
            timeout_secs: 30,
            retry_attempts: 2,
            retry_delay: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Deserialize)]
struct NormalizeResponse {
    #[serde(default)]
    variation: Option<NormalizedVariation>,
    #[serde(default)]
    warnings: Vec<serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct HttpNormalizer {
    client: Client,
    endpoint: String,
    retry_attempts: u32,
    retry_delay: Duration,
}

impl HttpNormalizer {
    pub fn new(settings: NormalizerSettings) -> Result<Self> {
        let client = build_client(settings.timeout_secs)?;
        Ok(Self::with_client(client, settings))
    }

    pub fn with_client(client: Client, settings: NormalizerSettings) -> Self {
        let endpoint = format!(
            "{}{}",
            settings.base_url.trim_end_matches('/'),
            settings.path
        );
        Self {
            client,
            endpoint,
            retry_attempts: settings.retry_attempts,
            retry_delay: settings.retry_delay,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn request_once(&self, query: &str) -> Result<Option<NormalizedVariation>> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query)])
            .send()
            .await
            .map_err(|e| EvidenceError::NormalizerError {
                query: query.to_string(),
                message: e.to_string(),
                retryable: e.is_timeout() || e.is_connect() || e.is_request(),
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(EvidenceError::NormalizerError {
                query: query.to_string(),
                message: format!("service responded with status {}", status),
                retryable: status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS,
            });
        }

        let body: NormalizeResponse =
            response
                .json()
                .await
                .map_err(|e| EvidenceError::NormalizerError {
                    query: query.to_string(),
                    message: format!("invalid response body: {}", e),
                    retryable: false,
                })?;

        if body.variation.is_none() && !body.warnings.is_empty() {
            tracing::debug!("Normalizer warnings for {}: {:?}", query, body.warnings);
        }
        Ok(body.variation)
    }
}

#[async_trait]
impl VariationNormalizer for HttpNormalizer {
    async fn normalize(&self, query: &str) -> Result<Option<NormalizedVariation>> {
        let mut attempt = 0;
        loop {
            match self.request_once(query).await {
                Err(EvidenceError::NormalizerError {
                    retryable: true,
                    message,
                    ..
                }) if attempt < self.retry_attempts => {
                    attempt += 1;
                    let delay = self.retry_delay * attempt;
                    tracing::debug!(
                        "Retrying normalization of {} in {:?} (attempt {}): {}",
                        query,
                        delay,
                        attempt,
                        message
                    );
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }
}
