//! Risk signal detectors.
//!
//! Each detector looks at one kind of evidence and produces a typed verdict
//! that converts to a [`RiskSignal`](crate::signal::RiskSignal).

pub mod behavior;
pub mod honeyfield;
pub mod kinematics;
pub mod origin;
pub mod ranges;
pub mod trap;

pub use behavior::{AnalysisResult, FieldFallback, TelemetryAnalyzer, TelemetryReport};
pub use honeyfield::{HoneyfieldDetector, HoneyfieldHit};
pub use kinematics::{extract_metrics, KinematicMetrics, TelemetrySample};
pub use origin::{
    LookupError, OriginClassifier, OriginVerdict, RemoteLookup, SecurityFlags, VpnApiLookup,
};
pub use ranges::{AddressAllowlist, OfflineRangeSet};
pub use trap::{
    DecoyHit, DecoyPaths, MemoryTrapStore, TrapAttemptTracker, TrapEndpoint, TrapOutcome,
    TrapState, TrapStateStore, TrapStatus,
};
