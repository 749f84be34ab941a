//! Adapter for the openfigi.com mapping API.
//!
//! Resolves an ISIN to its security type, memoizing results for the
//! lifetime of the process and throttling outbound calls to the API's
//! public rate limit. Concurrent lookups for the same ISIN collapse into
//! a single outbound request.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use isocountry::CountryCode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://api.openfigi.com";

// Without an API key openfigi.com allows 25 mapping requests per minute.
const MAPPING_RATE_PERIOD: Duration = Duration::from_secs(60);
const MAPPING_BURST: u32 = 25;

/// A lookup against the OpenFIGI mapping endpoint failed.
#[derive(Debug, Error)]
pub enum FigiError {
    /// The identifier is not a plausible ISIN; no request was made.
    #[error("invalid ISIN: {0}")]
    InvalidIsin(String),
    /// The caller's cancellation signal fired while waiting.
    #[error("security type lookup cancelled")]
    Cancelled,
    /// The HTTP request could not be performed.
    #[error("make mapping request: {0}")]
    Request(#[from] reqwest::Error),
    /// The API answered with a failure status.
    #[error("bad mapping response status: {0}")]
    Status(reqwest::StatusCode),
    /// The response body could not be decoded as JSON.
    #[error("decode mapping response: {0}")]
    Decode(#[source] reqwest::Error),
    /// The response decoded but is structurally empty.
    #[error("malformed mapping response: {0}")]
    Malformed(&'static str),
    /// The API returned an entry with an empty security type.
    #[error("empty security type returned for ISIN: {0}")]
    EmptySecurityType(String),
}

/// Client for the openfigi.com mapping API.
pub struct OpenFigi {
    client: reqwest::Client,
    base_url: String,
    mapping_limiter: DefaultDirectRateLimiter,

    // TODO: there is no eviction; acceptable while this only serves a
    // short-lived run over a bounded set of ISINs. Revisit with an LRU if
    // that changes.
    cache: RwLock<HashMap<String, String>>,
}

impl OpenFigi {
    /// Create a client against the production API.
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_base_url(client, DEFAULT_BASE_URL)
    }

    /// Create a client against a custom base URL (tests, proxies).
    #[must_use]
    pub fn with_base_url(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let quota = Quota::with_period(MAPPING_RATE_PERIOD)
            .expect("rate period is nonzero")
            .allow_burst(NonZeroU32::new(MAPPING_BURST).expect("burst is nonzero"));

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            mapping_limiter: RateLimiter::direct(quota),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve the security type of an ISIN, e.g. `"Common Stock"`.
    ///
    /// Cached results return immediately. On a miss the call serializes
    /// with other misses, re-checks the cache, then performs one outbound
    /// request under the global rate limit; both the limiter wait and the
    /// request honor `token`. Successful results are cached for the
    /// process lifetime.
    pub async fn security_type_by_isin(
        &self,
        token: &CancellationToken,
        isin: &str,
    ) -> Result<String, FigiError> {
        {
            let cache = self.cache.read().await;
            if let Some(security_type) = cache.get(isin) {
                return Ok(security_type.clone());
            }
        }

        let mut cache = self.cache.write().await;

        // More than one task can miss concurrently; only the first holder
        // of the write lock may issue the request. The rest hit the cache
        // on this re-check once the lock is released.
        if let Some(security_type) = cache.get(isin) {
            return Ok(security_type.clone());
        }

        validate_isin(isin)?;

        tokio::select! {
            biased;
            () = token.cancelled() => return Err(FigiError::Cancelled),
            () = self.mapping_limiter.until_ready() => {}
        }

        let request = [MappingRequest {
            id_type: "ID_ISIN",
            id_value: isin,
        }];
        let url = format!("{}/v3/mapping", self.base_url);

        let response = tokio::select! {
            biased;
            () = token.cancelled() => return Err(FigiError::Cancelled),
            result = self.client.post(&url).json(&request).send() => result?,
        };

        let status = response.status();
        if status.as_u16() >= 400 {
            return Err(FigiError::Status(status));
        }

        let body: Vec<MappingResponse> = response.json().await.map_err(FigiError::Decode)?;

        let Some(first) = body.first() else {
            return Err(FigiError::Malformed("missing top-level elements"));
        };
        let Some(entry) = first.data.first() else {
            return Err(FigiError::Malformed("missing data elements"));
        };

        // An ISIN cannot map to different security types, so every entry
        // carries the same value and the first one is enough.
        if entry.security_type.is_empty() {
            return Err(FigiError::EmptySecurityType(isin.to_string()));
        }

        debug!(%isin, security_type = %entry.security_type, "resolved security type");
        cache.insert(isin.to_string(), entry.security_type.clone());

        Ok(entry.security_type.clone())
    }
}

fn validate_isin(isin: &str) -> Result<(), FigiError> {
    let prefix = if isin.len() == 12 { isin.get(..2) } else { None };
    match prefix {
        Some(country) if CountryCode::for_alpha2(country).is_ok() => Ok(()),
        _ => Err(FigiError::InvalidIsin(isin.to_string())),
    }
}

#[derive(Debug, Serialize)]
struct MappingRequest<'a> {
    #[serde(rename = "idType")]
    id_type: &'static str,
    #[serde(rename = "idValue")]
    id_value: &'a str,
}

#[derive(Debug, Deserialize)]
struct MappingResponse {
    #[serde(default)]
    data: Vec<MappingEntry>,
}

#[derive(Debug, Deserialize)]
struct MappingEntry {
    #[serde(rename = "securityType", default)]
    security_type: String,
}
