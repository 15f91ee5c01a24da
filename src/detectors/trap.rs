//! Trap endpoints.
//!
//! Fake login forms and decoy paths have no legitimate traffic. Repeated
//! submissions to a fake login escalate from medium to high severity and
//! lock the form; any hit on a decoy path is high severity.
//!
//! # Session ordering
//!
//! The attempt counter is owned by the caller's session layer. Concurrent
//! submissions under the same session are not synchronized here; callers must
//! serialize them (typical browser request ordering already does).
//!
//! The in-memory store forgets a session once it locks, once it has been idle
//! past the session timeout, or when the store is full and it is the oldest.

use crate::config::DecoyPathConfig;
use crate::signal::{RiskSignal, Severity, SignalKind};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

pub const DEFAULT_TRAP_THRESHOLD: u32 = 3;
pub const DEFAULT_MAX_SESSIONS: usize = 100_000;
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(3600);

const CLEANUP_INTERVAL: u64 = 1000;

/// Per-session attempt counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrapState {
    pub attempts: u32,
}

/// Which fake login form was submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrapEndpoint {
    LegacyLogin,
    AdminLogin,
}

impl TrapEndpoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrapEndpoint::LegacyLogin => "legacy_login",
            TrapEndpoint::AdminLogin => "admin_login",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrapResult {
    FailedTry,
    ThresholdExceeded,
}

/// What the caller should render after a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrapStatus {
    InvalidCredentials,
    Locked,
}

/// Signal emitted for one trap submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrapSignal {
    pub trap: TrapEndpoint,
    pub result: TrapResult,
    pub severity: Severity,
    /// Count that produced this signal
    pub attempts: u32,
    pub attempt_username: String,
}

impl TrapSignal {
    pub fn to_signal(&self) -> RiskSignal {
        RiskSignal::new(
            SignalKind::Honeypot,
            self.severity,
            json!({
                "trap": self.trap,
                "result": self.result,
                "attempts": self.attempts,
                "attempt_username": self.attempt_username,
            }),
        )
    }
}

/// Result of a submission: the signal, the state to store and the status to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrapOutcome {
    pub signal: TrapSignal,
    pub next: TrapState,
    pub status: TrapStatus,
}

/// Saturating attempt counter shared by every trap endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrapAttemptTracker {
    threshold: u32,
}

impl TrapAttemptTracker {
    /// Create a tracker. A threshold of 0 is treated as 1.
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Apply one submission to `state`.
    pub fn submit(
        &self,
        state: TrapState,
        trap: TrapEndpoint,
        username: impl Into<String>,
    ) -> TrapOutcome {
        let attempts = state.attempts.saturating_add(1);
        let locked = attempts >= self.threshold;

        let (result, severity, next, status) = if locked {
            (
                TrapResult::ThresholdExceeded,
                Severity::High,
                TrapState::default(),
                TrapStatus::Locked,
            )
        } else {
            (
                TrapResult::FailedTry,
                Severity::Medium,
                TrapState { attempts },
                TrapStatus::InvalidCredentials,
            )
        };

        TrapOutcome {
            signal: TrapSignal {
                trap,
                result,
                severity,
                attempts,
                attempt_username: username.into(),
            },
            next,
            status,
        }
    }
}

impl Default for TrapAttemptTracker {
    fn default() -> Self {
        Self::new(DEFAULT_TRAP_THRESHOLD)
    }
}

/// Per-session storage for trap state.
pub trait TrapStateStore: Send + Sync {
    /// Current state for a session; fresh sessions start at zero.
    fn load(&self, session: &str) -> TrapState;

    /// Persist a session's state. Storing the default state forgets the session.
    fn store(&self, session: &str, state: TrapState);
}

#[derive(Debug, Clone, Copy)]
struct TrackedSession {
    state: TrapState,
    last_seen: Instant,
}

impl TrackedSession {
    fn is_expired(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// In-process trap state store, bounded by session count and idle time.
#[derive(Debug)]
pub struct MemoryTrapStore {
    sessions: DashMap<String, TrackedSession>,
    /// Maximum sessions to track
    max_sessions: usize,
    /// Idle time after which a session starts over
    session_timeout: Duration,
    /// Counter for cleanup scheduling
    write_counter: AtomicU64,
}

impl MemoryTrapStore {
    pub fn new(max_sessions: usize, session_timeout: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            max_sessions: max_sessions.max(1),
            session_timeout,
            write_counter: AtomicU64::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Drop idle sessions every 1000 writes.
    fn maybe_cleanup(&self) {
        let count = self.write_counter.fetch_add(1, Ordering::Relaxed);
        if count % CLEANUP_INTERVAL == 0 {
            self.sessions
                .retain(|_, tracked| !tracked.is_expired(self.session_timeout));
        }
    }

    /// Make room for a new session.
    fn evict_one(&self) {
        self.sessions
            .retain(|_, tracked| !tracked.is_expired(self.session_timeout));
        if self.sessions.len() < self.max_sessions {
            return;
        }

        let oldest = self
            .sessions
            .iter()
            .min_by_key(|entry| entry.value().last_seen)
            .map(|entry| entry.key().clone());
        if let Some(key) = oldest {
            debug!(session = %key, "Trap store full, evicting oldest session");
            self.sessions.remove(&key);
        }
    }
}

impl Default for MemoryTrapStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SESSIONS, DEFAULT_SESSION_TIMEOUT)
    }
}

impl TrapStateStore for MemoryTrapStore {
    fn load(&self, session: &str) -> TrapState {
        self.sessions
            .get(session)
            .filter(|entry| !entry.value().is_expired(self.session_timeout))
            .map(|entry| entry.value().state)
            .unwrap_or_default()
    }

    fn store(&self, session: &str, state: TrapState) {
        self.maybe_cleanup();

        if state == TrapState::default() {
            self.sessions.remove(session);
            return;
        }

        if !self.sessions.contains_key(session) && self.sessions.len() >= self.max_sessions {
            self.evict_one();
        }

        self.sessions.insert(
            session.to_string(),
            TrackedSession {
                state,
                last_seen: Instant::now(),
            },
        );
    }
}

/// A decoy path request and the status to answer with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecoyHit {
    pub path: String,
    pub status: u16,
}

impl DecoyHit {
    pub fn to_signal(&self) -> RiskSignal {
        RiskSignal::new(
            SignalKind::Honeypot,
            Severity::High,
            json!({ "path": self.path }),
        )
    }
}

/// Paths no legitimate client requests.
#[derive(Debug, Clone, Default)]
pub struct DecoyPaths {
    paths: Vec<DecoyPathConfig>,
}

impl DecoyPaths {
    pub fn new(paths: Vec<DecoyPathConfig>) -> Self {
        Self { paths }
    }

    /// Match a request path exactly, ignoring any query string.
    pub fn check(&self, path: &str) -> Option<DecoyHit> {
        let path_only = path.split('?').next().unwrap_or(path);
        self.paths
            .iter()
            .find(|decoy| decoy.path == path_only)
            .map(|decoy| DecoyHit {
                path: decoy.path.clone(),
                status: decoy.status,
            })
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}
