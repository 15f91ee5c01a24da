//! Anonymized-origin classifier.
//!
//! Decides whether a client address belongs to a VPN, proxy or Tor exit:
//! - Offline range set (fast path, no network)
//! - Remote classification provider (slow path, memoized)

use super::ranges::OfflineRangeSet;
use crate::cache::LookupCache;
use async_trait::async_trait;
use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Anonymizer indicators reported by a classification provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityFlags {
    pub vpn: bool,
    pub proxy: bool,
    pub tor: bool,
}

impl SecurityFlags {
    pub fn is_anonymized(&self) -> bool {
        self.vpn || self.proxy || self.tor
    }
}

/// Why a remote lookup produced no answer.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("lookup timed out after {0:?}")]
    Timeout(Duration),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("provider returned status {0}")]
    Status(u16),
    #[error("malformed provider response: {0}")]
    Malformed(String),
}

/// Remote classification provider.
#[async_trait]
pub trait RemoteLookup: Send + Sync {
    /// Look up one address. Issues a single outbound query.
    async fn lookup(&self, address: &str) -> Result<SecurityFlags, LookupError>;

    /// Get the provider name.
    fn name(&self) -> &'static str;
}

#[derive(Debug, Deserialize)]
struct VpnApiResponse {
    #[serde(default)]
    security: SecurityFlags,
}

/// vpnapi.io compatible provider: `GET {endpoint}/{address}?key={key}`.
pub struct VpnApiLookup {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl VpnApiLookup {
    /// Create a provider client with a fixed request timeout.
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    fn parse_body(body: &[u8]) -> Result<SecurityFlags, LookupError> {
        serde_json::from_slice::<VpnApiResponse>(body)
            .map(|r| r.security)
            .map_err(|e| LookupError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl RemoteLookup for VpnApiLookup {
    async fn lookup(&self, address: &str) -> Result<SecurityFlags, LookupError> {
        let url = format!("{}/{}", self.endpoint, address);
        let response = self
            .client
            .get(&url)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| LookupError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::Status(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| LookupError::Transport(e.to_string()))?;
        Self::parse_body(&body)
    }

    fn name(&self) -> &'static str {
        "vpnapi"
    }
}

/// Outcome of classifying one address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum OriginVerdict {
    /// Address is inside an offline anonymizer range
    OfflineMatch { range: IpNet },
    /// Provider flagged the address
    RemoteAffirmed,
    /// Provider cleared the address
    RemoteCleared,
    /// Provider failed now or earlier (memoized)
    RemoteUnknown,
    /// No provider configured
    RemoteDisabled,
}

impl OriginVerdict {
    pub fn is_anonymized(&self) -> bool {
        matches!(
            self,
            OriginVerdict::OfflineMatch { .. } | OriginVerdict::RemoteAffirmed
        )
    }
}

/// Two-tier anonymized-origin classifier.
pub struct OriginClassifier {
    ranges: Arc<OfflineRangeSet>,
    remote: Option<Arc<dyn RemoteLookup>>,
    cache: LookupCache<String, Option<bool>>,
    cache_failures: bool,
    timeout: Duration,
}

impl OriginClassifier {
    /// Create a classifier.
    ///
    /// `remote` is `None` when no provider credential is configured.
    /// With `cache_failures`, a failed lookup is memoized as unknown and the
    /// address is never retried for the life of the cache.
    pub fn new(
        ranges: Arc<OfflineRangeSet>,
        remote: Option<Arc<dyn RemoteLookup>>,
        cache: LookupCache<String, Option<bool>>,
        cache_failures: bool,
        timeout: Duration,
    ) -> Self {
        Self {
            ranges,
            remote,
            cache,
            cache_failures,
            timeout,
        }
    }

    /// Classifier using only the offline range set.
    pub fn offline_only(ranges: Arc<OfflineRangeSet>) -> Self {
        Self::new(
            ranges,
            None,
            LookupCache::new("origin_lookup", 2048),
            true,
            Duration::from_secs(5),
        )
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    pub fn cache(&self) -> &LookupCache<String, Option<bool>> {
        &self.cache
    }

    /// Classify an address. Never fails; malformed addresses skip the offline
    /// scan and go to the provider as-is.
    pub async fn classify(&self, address: &str) -> OriginVerdict {
        if let Ok(ip) = address.trim().parse::<IpAddr>() {
            if let Some(range) = self.ranges.find(&ip) {
                debug!(address, range = %range, "Offline range match");
                return OriginVerdict::OfflineMatch { range: *range };
            }
        }

        let Some(remote) = &self.remote else {
            return OriginVerdict::RemoteDisabled;
        };

        let cache_failures = self.cache_failures;
        let outcome = self
            .cache
            .get_or_compute(
                address.to_string(),
                self.remote_outcome(remote.as_ref(), address),
                |outcome| outcome.is_some() || cache_failures,
            )
            .await;

        match outcome {
            Some(true) => OriginVerdict::RemoteAffirmed,
            Some(false) => OriginVerdict::RemoteCleared,
            None => OriginVerdict::RemoteUnknown,
        }
    }

    /// Returns true if the address is anonymized.
    pub async fn is_anonymized(&self, address: &str) -> bool {
        self.classify(address).await.is_anonymized()
    }

    async fn remote_outcome(&self, remote: &dyn RemoteLookup, address: &str) -> Option<bool> {
        let result = match tokio::time::timeout(self.timeout, remote.lookup(address)).await {
            Ok(result) => result,
            Err(_) => Err(LookupError::Timeout(self.timeout)),
        };

        match result {
            Ok(flags) => {
                debug!(
                    address,
                    provider = remote.name(),
                    vpn = flags.vpn,
                    proxy = flags.proxy,
                    tor = flags.tor,
                    "Remote lookup complete"
                );
                Some(flags.is_anonymized())
            }
            Err(e) => {
                warn!(
                    address,
                    provider = remote.name(),
                    error = %e,
                    "Remote lookup failed, treating origin as unknown"
                );
                None
            }
        }
    }
}
