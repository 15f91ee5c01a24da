//! Risk signal vocabulary shared by all detectors.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Ordered risk level attached to a detection result.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Nothing actionable
    #[default]
    Info,
    /// Suspicious, worth recording
    Medium,
    /// Strong indication of automation or probing
    High,
}

impl Severity {
    /// Returns the severity as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tag explaining why pointer/keyboard telemetry looks automated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RiskTag {
    /// Peak or spread of pointer speed is implausible for a hand
    SpeedSpikes,
    /// Direction flips faster than a human tracks a target
    JerkyDirection,
    /// Long path that goes nowhere
    LowStraightness,
    /// Speed changes abruptly between segments
    HighJitter,
    /// Click, key or move rate is too high
    HighActivity,
    /// Three or more of the above fired together
    Erratic,
}

impl RiskTag {
    /// Tags that contribute to the severity score. `Erratic` is derived from them.
    pub const PRIMARY: [RiskTag; 5] = [
        RiskTag::SpeedSpikes,
        RiskTag::JerkyDirection,
        RiskTag::LowStraightness,
        RiskTag::HighJitter,
        RiskTag::HighActivity,
    ];

    /// Returns true if the tag counts toward the severity score.
    pub fn is_primary(&self) -> bool {
        !matches!(self, RiskTag::Erratic)
    }

    /// Returns the tag as it appears in reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTag::SpeedSpikes => "speed-spikes",
            RiskTag::JerkyDirection => "jerky-direction",
            RiskTag::LowStraightness => "low-straightness",
            RiskTag::HighJitter => "high-jitter",
            RiskTag::HighActivity => "high-activity",
            RiskTag::Erratic => "erratic",
        }
    }
}

/// Which detector produced a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    /// Anonymized origin (VPN, proxy, Tor)
    Vpn,
    /// Hidden form field was filled in
    Honeyfield,
    /// Trap endpoint or decoy path was hit
    Honeypot,
    /// Pointer/keyboard telemetry analysis
    Behavior,
}

impl SignalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::Vpn => "vpn",
            SignalKind::Honeyfield => "honeyfield",
            SignalKind::Honeypot => "honeypot",
            SignalKind::Behavior => "behavior",
        }
    }
}

/// A detection record handed to the event-log collaborator.
///
/// The crate never persists signals; callers decide where they go.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskSignal {
    pub kind: SignalKind,
    pub severity: Severity,
    /// Detector-specific payload
    pub details: Value,
}

impl RiskSignal {
    /// Create a new signal.
    pub fn new(kind: SignalKind, severity: Severity, details: Value) -> Self {
        Self {
            kind,
            severity,
            details,
        }
    }

    /// Signal recorded when an anonymized origin is blocked.
    pub fn vpn_blocked() -> Self {
        Self::new(
            SignalKind::Vpn,
            Severity::High,
            json!({ "message": "Blocked due to VPN/proxy detection" }),
        )
    }

    /// Returns true if the signal is worth alerting on.
    pub fn is_alert(&self) -> bool {
        self.severity >= Severity::Medium
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Info < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert_eq!(Severity::default(), Severity::Info);
    }

    #[test]
    fn test_severity_serialization() {
        assert_eq!(serde_json::to_string(&Severity::High).unwrap(), "\"high\"");
        let parsed: Severity = serde_json::from_str("\"medium\"").unwrap();
        assert_eq!(parsed, Severity::Medium);
    }

    #[test]
    fn test_risk_tag_as_str_matches_serde() {
        for tag in RiskTag::PRIMARY.iter().chain([RiskTag::Erratic].iter()) {
            let json = serde_json::to_string(tag).unwrap();
            assert_eq!(json, format!("\"{}\"", tag.as_str()));
        }
    }

    #[test]
    fn test_primary_tags() {
        assert!(RiskTag::PRIMARY.iter().all(|t| t.is_primary()));
        assert!(!RiskTag::Erratic.is_primary());
    }

    #[test]
    fn test_vpn_blocked_signal() {
        let signal = RiskSignal::vpn_blocked();
        assert_eq!(signal.kind, SignalKind::Vpn);
        assert_eq!(signal.severity, Severity::High);
        assert!(signal.is_alert());

        let json = serde_json::to_value(&signal).unwrap();
        assert_eq!(json["kind"], "vpn");
        assert_eq!(json["details"]["message"], "Blocked due to VPN/proxy detection");
    }
}
