//! Risk Signals Agent for Zentinel
//!
//! Produces risk signals for human-verification and abuse-detection flows.
//!
//! # Features
//!
//! - Pointer/keyboard telemetry analysis (kinematic features and risk tags)
//! - Anonymized-origin classification (offline ranges plus cached remote lookup)
//! - Trap endpoints with attempt escalation, decoy paths and honeyfields
//!
//! # Example
//!
//! ```ignore
//! use zentinel_agent_risk_signals::{RiskSignalsAgent, RiskSignalsConfig};
//!
//! let agent = RiskSignalsAgent::new(RiskSignalsConfig::default())?;
//! let decision = agent.screen_origin("203.0.113.7").await;
//! if decision.blocked {
//!     // reject the submission
//! }
//! ```

pub mod agent;
pub mod cache;
pub mod config;
pub mod detectors;
pub mod signal;

pub use agent::{OriginDecision, RiskSignalsAgent};
pub use config::RiskSignalsConfig;
pub use signal::{RiskSignal, RiskTag, Severity, SignalKind};
