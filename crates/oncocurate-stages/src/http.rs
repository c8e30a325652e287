//! HTTP ontology lookup service client.
//!
//! Issues `GET {base_url}/{namespace}/lookup?q={term}` and expects a JSON body
//! `{"id": "...", "canonical_name": "...", "confidence": 0.9}` on success.

use std::time::Duration;

use async_trait::async_trait;
use oncocurate_core::{Connector, ConnectorError, LookupHit, LookupOutcome, LookupQuery};
use reqwest::{header::RETRY_AFTER, Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct HitBody {
    id: String,
    #[serde(alias = "name")]
    canonical_name: String,
    #[serde(default = "full_confidence")]
    confidence: f64,
}

fn full_confidence() -> f64 {
    1.0
}

/// [`Connector`] backed by an HTTP lookup service.
#[derive(Debug, Clone)]
pub struct HttpOntologyConnector {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpOntologyConnector {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ConnectorError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ConnectorError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConnectorError::Unavailable(format!("failed to build http client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn transport_error(&self, e: reqwest::Error) -> ConnectorError {
        if e.is_timeout() {
            ConnectorError::Timeout(self.timeout)
        } else {
            ConnectorError::Unavailable(e.to_string())
        }
    }
}

/// Map a non-success status to a connector error; `None` for 404.
pub fn classify_status(status: StatusCode, retry_after: Option<Duration>) -> Option<ConnectorError> {
    match status {
        StatusCode::NOT_FOUND => None,
        StatusCode::TOO_MANY_REQUESTS => Some(ConnectorError::RateLimited { retry_after }),
        s if s.is_server_error() => Some(ConnectorError::Unavailable(format!("server returned {s}"))),
        s => Some(ConnectorError::Rejected(format!("server returned {s}"))),
    }
}

#[async_trait]
impl Connector for HttpOntologyConnector {
    fn name(&self) -> &str {
        "http"
    }

    async fn lookup(&self, query: &LookupQuery) -> Result<LookupOutcome, ConnectorError> {
        if query.term.trim().is_empty() {
            return Err(ConnectorError::Rejected("empty term".into()));
        }
        let url = format!("{}/{}/lookup", self.base_url, query.namespace);
        debug!(url = %url, term = %query.term, "ontology lookup");

        let response = self
            .client
            .get(&url)
            .query(&[("q", query.term.as_str())])
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            return match classify_status(status, retry_after) {
                None => Ok(LookupOutcome::NotFound),
                Some(e) => Err(e),
            };
        }

        let body: HitBody = response
            .json()
            .await
            .map_err(|e| ConnectorError::Malformed(e.to_string()))?;
        Ok(LookupOutcome::Found(LookupHit {
            id: body.id,
            canonical_name: body.canonical_name,
            confidence: body.confidence.clamp(0.0, 1.0),
        }))
    }
}
