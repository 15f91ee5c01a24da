//! Configuration types for the risk signals agent.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration for the risk signals agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskSignalsConfig {
    /// Anonymized-origin classification
    pub origin: OriginConfig,

    /// Lookup cache settings
    pub cache: CacheConfig,

    /// Telemetry rule thresholds
    pub behavior: BehaviorConfig,

    /// Trap endpoints, decoy paths and honeyfields
    pub trap: TrapConfig,
}

impl RiskSignalsConfig {
    /// Load configuration from a JSON or YAML file (chosen by extension).
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = if path.extension().is_some_and(|e| e == "yaml" || e == "yml") {
            serde_yaml::from_str(&content)?
        } else {
            serde_json::from_str(&content)?
        };
        Ok(config)
    }
}

/// Origin classification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OriginConfig {
    /// API key for the remote classification provider. Remote lookups are
    /// disabled when unset or blank.
    pub remote_api_key: Option<String>,

    /// Base URL of the remote provider; the address is appended as a path segment
    pub remote_endpoint: String,

    /// Offline dataset of anonymizer ranges (JSON mapping, JSON list or text)
    pub offline_dataset: Option<PathBuf>,

    /// Block anonymized origins instead of only flagging them
    pub enforce: bool,

    /// Addresses or ranges exempt from enforcement
    pub allowlist: Vec<String>,

    /// Remote lookup timeout in milliseconds
    pub lookup_timeout_ms: u64,
}

impl OriginConfig {
    /// Returns the remote credential if one is configured.
    pub fn remote_credential(&self) -> Option<&str> {
        self.remote_api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

impl Default for OriginConfig {
    fn default() -> Self {
        Self {
            remote_api_key: None,
            remote_endpoint: "https://vpnapi.io/api".to_string(),
            offline_dataset: None,
            enforce: false,
            allowlist: vec![],
            lookup_timeout_ms: 5_000,
        }
    }
}

/// Lookup cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum memoized remote lookups
    pub lookup_cache_size: u64,

    /// Memoize failed lookups as "unknown" for the life of the process.
    ///
    /// A failed address is never retried while this is on.
    pub cache_failed_lookups: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            lookup_cache_size: 2048,
            cache_failed_lookups: true,
        }
    }
}

/// Thresholds for the telemetry rule set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Peak pointer speed (px/s) above which `speed-spikes` fires
    pub max_speed: f64,

    /// Speed standard deviation (px/s) above which `speed-spikes` fires
    pub speed_std: f64,

    /// Direction changes per second above which `jerky-direction` fires
    pub dir_changes_rate: f64,

    /// Straightness below which `low-straightness` may fire
    pub straightness: f64,

    /// Minimum path length (px) for `low-straightness`
    pub min_total_dist: f64,

    /// Mean speed change (px/s²) above which `high-jitter` fires
    pub jitter: f64,

    /// Clicks per second above which `high-activity` fires
    pub clicks_per_sec: f64,

    /// Keys per second above which `high-activity` fires
    pub keys_per_sec: f64,

    /// Moves per second above which `high-activity` fires
    pub moves_per_sec: f64,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            max_speed: 2500.0,
            speed_std: 1200.0,
            dir_changes_rate: 6.0,
            straightness: 0.15,
            min_total_dist: 800.0,
            jitter: 6000.0,
            clicks_per_sec: 6.0,
            keys_per_sec: 18.0,
            moves_per_sec: 120.0,
        }
    }
}

/// Trap endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrapConfig {
    /// Submissions per session before the trap locks
    pub threshold: u32,

    /// Regex matched against form field names to find honeyfields
    pub honeyfield_pattern: String,

    /// Paths no legitimate client requests
    pub decoy_paths: Vec<DecoyPathConfig>,

    /// Maximum sessions the in-memory trap store tracks
    pub max_sessions: usize,

    /// Idle time (seconds) after which a session's attempts are forgotten
    pub session_timeout_seconds: u64,
}

impl Default for TrapConfig {
    fn default() -> Self {
        Self {
            threshold: 3,
            honeyfield_pattern: regex::escape("__do_not_fill"),
            decoy_paths: vec![
                DecoyPathConfig {
                    path: "/admin/backup.zip".to_string(),
                    status: 404,
                },
                DecoyPathConfig {
                    path: "/secret-admin".to_string(),
                    status: 403,
                },
            ],
            max_sessions: 100_000,
            session_timeout_seconds: 3600,
        }
    }
}

/// A decoy path and the status the caller should answer with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoyPathConfig {
    pub path: String,
    pub status: u16,
}
