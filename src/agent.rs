//! Main risk signals agent implementation.

use crate::cache::LookupCache;
use crate::config::RiskSignalsConfig;
use crate::detectors::{
    AddressAllowlist, AnalysisResult, DecoyHit, DecoyPaths, HoneyfieldDetector, HoneyfieldHit,
    MemoryTrapStore, OfflineRangeSet, OriginClassifier, OriginVerdict, RemoteLookup,
    TelemetryAnalyzer, TrapAttemptTracker, TrapEndpoint, TrapOutcome, TrapStateStore,
    VpnApiLookup,
};
use crate::signal::RiskSignal;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Result of screening one client address.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OriginDecision {
    pub address: String,
    pub verdict: OriginVerdict,
    pub anonymized: bool,
    pub allowlisted: bool,
    /// Enforcement is on, the origin is anonymized and not allowlisted
    pub blocked: bool,
    /// Present only when blocked
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal: Option<RiskSignal>,
}

/// Risk Signals Agent for Zentinel.
pub struct RiskSignalsAgent {
    /// Configuration
    config: RiskSignalsConfig,
    /// Telemetry analyzer
    telemetry_analyzer: TelemetryAnalyzer,
    /// Anonymized-origin classifier
    origin_classifier: OriginClassifier,
    /// Enforcement exemptions
    allowlist: AddressAllowlist,
    /// Trap attempt tracker
    trap_tracker: TrapAttemptTracker,
    /// Per-session trap state
    trap_store: Arc<dyn TrapStateStore>,
    /// Honeyfield detector
    honeyfield_detector: HoneyfieldDetector,
    /// Decoy paths
    decoy_paths: DecoyPaths,
}

impl RiskSignalsAgent {
    /// Create a new agent, building the remote provider from the configured credential.
    pub fn new(config: RiskSignalsConfig) -> anyhow::Result<Self> {
        let remote: Option<Arc<dyn RemoteLookup>> = match config.origin.remote_credential() {
            Some(key) => {
                let lookup = VpnApiLookup::new(
                    config.origin.remote_endpoint.clone(),
                    key,
                    Duration::from_millis(config.origin.lookup_timeout_ms),
                )?;
                Some(Arc::new(lookup))
            }
            None => {
                info!("No remote lookup credential configured, using offline ranges only");
                None
            }
        };

        Self::with_remote_lookup(config, remote)
    }

    /// Create an agent with an explicit remote provider (or none).
    pub fn with_remote_lookup(
        config: RiskSignalsConfig,
        remote: Option<Arc<dyn RemoteLookup>>,
    ) -> anyhow::Result<Self> {
        let ranges = Arc::new(OfflineRangeSet::load(config.origin.offline_dataset.as_deref()));

        let allowlist = AddressAllowlist::new(&config.origin.allowlist);
        if allowlist.len() < config.origin.allowlist.len() {
            warn!(
                configured = config.origin.allowlist.len(),
                parsed = allowlist.len(),
                "Some allowlist entries could not be parsed"
            );
        }

        let origin_classifier = OriginClassifier::new(
            ranges,
            remote,
            LookupCache::new("origin_lookup", config.cache.lookup_cache_size),
            config.cache.cache_failed_lookups,
            Duration::from_millis(config.origin.lookup_timeout_ms),
        );

        let honeyfield_detector = HoneyfieldDetector::new(&config.trap.honeyfield_pattern)?;

        Ok(Self {
            telemetry_analyzer: TelemetryAnalyzer::new(config.behavior.clone()),
            origin_classifier,
            allowlist,
            trap_tracker: TrapAttemptTracker::new(config.trap.threshold),
            trap_store: Arc::new(MemoryTrapStore::new(
                config.trap.max_sessions,
                Duration::from_secs(config.trap.session_timeout_seconds),
            )),
            honeyfield_detector,
            decoy_paths: DecoyPaths::new(config.trap.decoy_paths.clone()),
            config,
        })
    }

    /// Replace the trap state store.
    pub fn with_trap_store(mut self, store: Arc<dyn TrapStateStore>) -> Self {
        self.trap_store = store;
        self
    }

    pub fn config(&self) -> &RiskSignalsConfig {
        &self.config
    }

    pub fn origin_classifier(&self) -> &OriginClassifier {
        &self.origin_classifier
    }

    /// Analyze a raw telemetry report.
    pub fn analyze_telemetry(&self, raw: &Value) -> (AnalysisResult, RiskSignal) {
        let (result, fallbacks) = self.telemetry_analyzer.analyze_value(raw);

        for fallback in &fallbacks {
            debug!(
                detector = "behavior",
                field = %fallback.field,
                reason = fallback.reason,
                "Telemetry field replaced with default"
            );
        }

        let signal = result.to_signal();
        info!(
            kind = signal.kind.as_str(),
            severity = %signal.severity,
            alert = signal.is_alert(),
            tags = ?result.tags.iter().map(|t| t.as_str()).collect::<Vec<_>>(),
            samples = result.metrics.kinematics.sample_count,
            fallbacks = fallbacks.len(),
            "Telemetry analysis complete"
        );

        (result, signal)
    }

    /// Classify an address and apply enforcement and the allowlist.
    pub async fn screen_origin(&self, address: &str) -> OriginDecision {
        let verdict = self.origin_classifier.classify(address).await;
        let anonymized = verdict.is_anonymized();
        let allowlisted = self.allowlist.contains(address);
        let blocked = self.config.origin.enforce && anonymized && !allowlisted;

        info!(
            address,
            anonymized,
            allowlisted,
            blocked,
            verdict = ?verdict,
            "Origin screening complete"
        );

        OriginDecision {
            address: address.to_string(),
            verdict,
            anonymized,
            allowlisted,
            blocked,
            signal: blocked.then(RiskSignal::vpn_blocked),
        }
    }

    /// Record a fake login submission for a session.
    pub fn record_trap_submission(
        &self,
        session: &str,
        endpoint: TrapEndpoint,
        username: &str,
    ) -> TrapOutcome {
        let state = self.trap_store.load(session);
        let outcome = self.trap_tracker.submit(state, endpoint, username);
        self.trap_store.store(session, outcome.next);

        info!(
            session,
            trap = endpoint.as_str(),
            attempts = outcome.signal.attempts,
            severity = %outcome.signal.severity,
            status = ?outcome.status,
            "Trap submission recorded"
        );

        outcome
    }

    /// Check submitted form fields for a filled honeyfield.
    pub fn check_form_fields<'a, I>(&self, fields: I) -> Option<HoneyfieldHit>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let hit = self.honeyfield_detector.check(fields);
        if let Some(hit) = &hit {
            info!(field = %hit.field, "Honeyfield filled");
        }
        hit
    }

    /// Check a request path against the decoy paths.
    pub fn check_decoy_path(&self, path: &str) -> Option<DecoyHit> {
        let hit = self.decoy_paths.check(path);
        if let Some(hit) = &hit {
            info!(path = %hit.path, status = hit.status, "Decoy path requested");
        }
        hit
    }

    /// Check a JSON object of form fields for a filled honeyfield.
    pub fn check_form_json(&self, form: &serde_json::Map<String, Value>) -> Option<HoneyfieldHit> {
        let hit = self.honeyfield_detector.check_json(form);
        if let Some(hit) = &hit {
            info!(field = %hit.field, "Honeyfield filled");
        }
        hit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::{LookupError, SecurityFlags, TrapStatus};
    use crate::signal::{RiskTag, Severity, SignalKind};
    use async_trait::async_trait;
    use serde_json::json;

    struct FlagEverything;

    #[async_trait]
    impl RemoteLookup for FlagEverything {
        async fn lookup(&self, _address: &str) -> Result<SecurityFlags, LookupError> {
            Ok(SecurityFlags {
                vpn: true,
                ..Default::default()
            })
        }

        fn name(&self) -> &'static str {
            "flag-everything"
        }
    }

    fn enforcing_agent(allowlist: &[&str]) -> RiskSignalsAgent {
        let mut config = RiskSignalsConfig::default();
        config.origin.enforce = true;
        config.origin.allowlist = allowlist.iter().map(|s| s.to_string()).collect();
        RiskSignalsAgent::with_remote_lookup(config, Some(Arc::new(FlagEverything))).unwrap()
    }

    #[test]
    fn test_agent_creation_without_credential() {
        let agent = RiskSignalsAgent::new(RiskSignalsConfig::default()).unwrap();
        assert!(!agent.origin_classifier().has_remote());
    }

    #[test]
    fn test_agent_creation_with_credential() {
        let mut config = RiskSignalsConfig::default();
        config.origin.remote_api_key = Some("secret".to_string());
        let agent = RiskSignalsAgent::new(config).unwrap();
        assert!(agent.origin_classifier().has_remote());
    }

    #[test]
    fn test_invalid_honeyfield_pattern_fails() {
        let mut config = RiskSignalsConfig::default();
        config.trap.honeyfield_pattern = "([".to_string();
        assert!(RiskSignalsAgent::new(config).is_err());
    }

    #[tokio::test]
    async fn test_blocked_origin() {
        let agent = enforcing_agent(&[]);
        let decision = agent.screen_origin("198.51.100.20").await;

        assert!(decision.anonymized);
        assert!(decision.blocked);
        let signal = decision.signal.unwrap();
        assert_eq!(signal.kind, SignalKind::Vpn);
        assert_eq!(signal.severity, Severity::High);
        assert_eq!(signal.details["message"], "Blocked due to VPN/proxy detection");
    }

    #[tokio::test]
    async fn test_allowlisted_origin_not_blocked() {
        let agent = enforcing_agent(&["198.51.100.0/24"]);
        let decision = agent.screen_origin("198.51.100.20").await;

        assert!(decision.anonymized);
        assert!(decision.allowlisted);
        assert!(!decision.blocked);
        assert!(decision.signal.is_none());
    }

    #[tokio::test]
    async fn test_no_enforcement_only_flags() {
        let agent = RiskSignalsAgent::with_remote_lookup(
            RiskSignalsConfig::default(),
            Some(Arc::new(FlagEverything)),
        )
        .unwrap();
        let decision = agent.screen_origin("198.51.100.20").await;
        assert!(decision.anonymized);
        assert!(!decision.blocked);
    }

    #[test]
    fn test_analyze_telemetry() {
        let agent = RiskSignalsAgent::new(RiskSignalsConfig::default()).unwrap();
        let (result, signal) = agent.analyze_telemetry(&json!({
            "clicks": 1,
            "keys": 0,
            "moves": 200,
            "duration_ms": 1000,
            "path": [{"x": 0, "y": 0, "t": 0}, {"x": 1000, "y": 0, "t": 100}, {"x": 2000, "y": 0, "t": 200}]
        }));

        assert_eq!(result.severity, Severity::Medium);
        assert!(result.has_tag(RiskTag::SpeedSpikes));
        assert!(result.has_tag(RiskTag::HighActivity));
        assert_eq!(signal.kind, SignalKind::Behavior);
        assert_eq!(signal.severity, Severity::Medium);
    }

    #[test]
    fn test_trap_submissions_are_per_session() {
        let agent = RiskSignalsAgent::new(RiskSignalsConfig::default()).unwrap();

        for _ in 0..2 {
            agent.record_trap_submission("a", TrapEndpoint::LegacyLogin, "root");
        }
        let other = agent.record_trap_submission("b", TrapEndpoint::LegacyLogin, "root");
        assert_eq!(other.signal.attempts, 1);

        let third = agent.record_trap_submission("a", TrapEndpoint::AdminLogin, "root");
        assert_eq!(third.status, TrapStatus::Locked);

        let after = agent.record_trap_submission("a", TrapEndpoint::LegacyLogin, "root");
        assert_eq!(after.signal.attempts, 1);
        assert_eq!(after.status, TrapStatus::InvalidCredentials);
    }

    #[test]
    fn test_locked_sessions_are_forgotten() {
        let store = Arc::new(MemoryTrapStore::default());
        let agent = RiskSignalsAgent::new(RiskSignalsConfig::default())
            .unwrap()
            .with_trap_store(store.clone());

        agent.record_trap_submission("a", TrapEndpoint::AdminLogin, "root");
        agent.record_trap_submission("a", TrapEndpoint::AdminLogin, "root");
        assert_eq!(store.len(), 1);

        let locked = agent.record_trap_submission("a", TrapEndpoint::AdminLogin, "root");
        assert_eq!(locked.status, TrapStatus::Locked);
        assert!(store.is_empty());
    }

    #[test]
    fn test_form_and_decoy_checks() {
        let agent = RiskSignalsAgent::new(RiskSignalsConfig::default()).unwrap();

        assert!(agent
            .check_form_fields([("username", "x"), ("__do_not_fill", "y")])
            .is_some());
        assert!(agent.check_form_fields([("username", "x")]).is_none());

        assert_eq!(agent.check_decoy_path("/secret-admin").map(|h| h.status), Some(403));
        assert!(agent.check_decoy_path("/login").is_none());
    }
}
