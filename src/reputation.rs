use crate::config::ReputationConfig;
use crate::error::AnalysisError;
use async_trait::async_trait;
use base64::prelude::*;
use std::time::Duration;

/// Best-effort external URL reputation. Implementations must never block an
/// analysis: any failure surfaces as an error the caller treats as "no
/// additional signal".
#[async_trait]
pub trait ReputationLookup: Send + Sync {
    async fn is_malicious(&self, url: &str) -> Result<bool, AnalysisError>;
}

/// VirusTotal v3 URL-report client. The report id is the URL-safe base64 of
/// the URL with padding stripped.
pub struct VirusTotalClient {
    client: reqwest::Client,
    api_key: String,
    api_url: String,
}

impl VirusTotalClient {
    pub fn new(cfg: &ReputationConfig, api_key: String) -> Result<Self, AnalysisError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_seconds))
            .user_agent(concat!("mailtriage/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AnalysisError::ExternalLookupFailure(e.to_string()))?;
        Ok(VirusTotalClient {
            client,
            api_key,
            api_url: cfg.api_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ReputationLookup for VirusTotalClient {
    async fn is_malicious(&self, url: &str) -> Result<bool, AnalysisError> {
        let url_id = BASE64_URL_SAFE_NO_PAD.encode(url.as_bytes());
        let endpoint = format!("{}/{}", self.api_url, url_id);

        let response = self
            .client
            .get(&endpoint)
            .header("x-apikey", &self.api_key)
            .send()
            .await
            .map_err(|e| AnalysisError::ExternalLookupFailure(e.to_string()))?;

        if !response.status().is_success() {
            // Unknown URLs come back 404; that is a clean "no signal".
            if response.status() == reqwest::StatusCode::NOT_FOUND {
                return Ok(false);
            }
            return Err(AnalysisError::ExternalLookupFailure(format!(
                "provider returned {}",
                response.status()
            )));
        }

        let report: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AnalysisError::ExternalLookupFailure(e.to_string()))?;
        let malicious = report
            .pointer("/data/attributes/last_analysis_stats/malicious")
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(0);
        Ok(malicious > 0)
    }
}
