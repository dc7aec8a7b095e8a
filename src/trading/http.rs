//! Shared response handling for aggregator HTTP calls
//!
//! Transport failures, HTTP 429 and 5xx are transient. Everything else that
//! goes wrong with a response is terminal for the provider.

use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

/// Which provider step produced an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Quote,
    Build,
}

impl Stage {
    pub fn error(self, provider: &str, reason: impl Into<String>) -> Error {
        let provider = provider.to_string();
        let reason = reason.into();
        match self {
            Stage::Quote => Error::ProviderQuote { provider, reason },
            Stage::Build => Error::ProviderBuild { provider, reason },
        }
    }
}

/// Whether an HTTP status should be retried on the same provider
pub fn is_transient_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}

/// Read a JSON body, classifying HTTP and parse failures
pub async fn read_json<T: DeserializeOwned>(
    provider: &str,
    stage: Stage,
    response: Response,
) -> Result<T> {
    let status = response.status();
    let body = response.text().await?;
    parse_body(provider, stage, status, &body)
}

/// Body classification, split out for tests
pub fn parse_body<T: DeserializeOwned>(
    provider: &str,
    stage: Stage,
    status: StatusCode,
    body: &str,
) -> Result<T> {
    if is_transient_status(status) {
        return Err(Error::Network(format!(
            "{} returned HTTP {}: {}",
            provider,
            status,
            truncate(body)
        )));
    }

    if !status.is_success() {
        return Err(stage.error(provider, format!("HTTP {}: {}", status, truncate(body))));
    }

    serde_json::from_str(body)
        .map_err(|e| stage.error(provider, format!("malformed response: {}", e)))
}

fn truncate(body: &str) -> &str {
    const MAX: usize = 200;
    if body.len() <= MAX {
        return body;
    }
    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}
