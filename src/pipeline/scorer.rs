use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use super::{FeatureVector, RiskLevel, Verdict};
use crate::config::ScorerConfig;

const TELEMETRY_TIMEOUT: Duration = Duration::from_secs(2);

/// Failure classes for the external scoring call. Resolved locally by the
/// engine's fail-open/fail-closed policy, never propagated to the host.
#[derive(Debug, Clone, Error)]
pub enum ScorerError {
    #[error("scorer request timed out")]
    Timeout,
    #[error("scorer network failure: {0}")]
    Network(String),
    #[error("scorer returned a malformed response: {0}")]
    MalformedResponse(String),
}

impl ScorerError {
    pub fn kind(&self) -> &'static str {
        match self {
            ScorerError::Timeout => "timeout",
            ScorerError::Network(_) => "network",
            ScorerError::MalformedResponse(_) => "malformed_response",
        }
    }
}

/// External risk-scoring capability consumed by the engine. The trait seam
/// exists so tests can script verdicts without a network.
#[async_trait]
pub trait RiskScorer: Send + Sync {
    /// Score a feature vector, bounded by the client's timeout.
    async fn classify(&self, features: &FeatureVector) -> Result<Verdict, ScorerError>;

    /// Learn-mode telemetry. Best effort: failures are swallowed and must
    /// never surface on the request path.
    async fn submit_sample(&self, features: &FeatureVector);
}

/// Wire shape of the scorer response. Both fields are validated explicitly:
/// a missing or mistyped field is a contract violation from the external
/// system, not a "safe" default.
#[derive(Debug, Deserialize)]
struct ScorerResponse {
    score: Option<f64>,
    risk: Option<RiskLevel>,
}

/// HTTP implementation: `POST <url>` with the serialized feature vector.
pub struct HttpRiskScorer {
    client: Client,
    predict_url: String,
    telemetry_url: String,
    timeout: Duration,
}

impl HttpRiskScorer {
    pub fn new(config: &ScorerConfig) -> Self {
        let telemetry_url = config
            .telemetry_url
            .clone()
            .unwrap_or_else(|| config.url.replace("/predict", "/train_sample"));

        Self {
            client: Client::new(),
            predict_url: config.url.clone(),
            telemetry_url,
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }

    pub fn telemetry_url(&self) -> &str {
        &self.telemetry_url
    }

    fn parse_verdict(body: &str) -> Result<Verdict, ScorerError> {
        let response: ScorerResponse = serde_json::from_str(body)
            .map_err(|err| ScorerError::MalformedResponse(err.to_string()))?;

        let level = response
            .risk
            .ok_or_else(|| ScorerError::MalformedResponse("missing risk field".to_string()))?;
        let score = response
            .score
            .ok_or_else(|| ScorerError::MalformedResponse("missing score field".to_string()))?;

        Ok(Verdict { level, score })
    }

    fn transport_error(err: reqwest::Error) -> ScorerError {
        if err.is_timeout() {
            ScorerError::Timeout
        } else {
            ScorerError::Network(err.to_string())
        }
    }
}

#[async_trait]
impl RiskScorer for HttpRiskScorer {
    async fn classify(&self, features: &FeatureVector) -> Result<Verdict, ScorerError> {
        let response = self
            .client
            .post(&self.predict_url)
            .timeout(self.timeout)
            .json(features)
            .send()
            .await
            .map_err(Self::transport_error)?
            .error_for_status()
            .map_err(|err| ScorerError::Network(err.to_string()))?;

        let body = response.text().await.map_err(Self::transport_error)?;
        Self::parse_verdict(&body)
    }

    async fn submit_sample(&self, features: &FeatureVector) {
        let _ = self
            .client
            .post(&self.telemetry_url)
            .timeout(TELEMETRY_TIMEOUT)
            .json(features)
            .send()
            .await;
    }
}
