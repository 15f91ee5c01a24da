//! Behavior telemetry analyzer.
//!
//! Scores a mouse/keyboard/timing report against a fixed rule set:
//! - Pointer speed spikes
//! - Jerky direction changes
//! - Long paths with low straightness
//! - Speed jitter
//! - Interaction rates

use super::kinematics::{extract_metrics, KinematicMetrics, TelemetrySample};
use crate::config::BehaviorConfig;
use crate::signal::{RiskSignal, RiskTag, Severity, SignalKind};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Number of primary tags at which a report is escalated to `high`.
const HIGH_SCORE: usize = 3;
/// Number of primary tags at which a report is `medium`.
const MEDIUM_SCORE: usize = 2;

/// A telemetry field that could not be used and fell back to its default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldFallback {
    /// Field path, e.g. `clicks` or `path[3].x`
    pub field: String,
    pub reason: &'static str,
}

impl FieldFallback {
    fn new(field: impl Into<String>, reason: &'static str) -> Self {
        Self {
            field: field.into(),
            reason,
        }
    }
}

/// Typed telemetry report with named defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryReport {
    pub clicks: u64,
    pub keys: u64,
    pub moves: u64,
    /// Always at least 1
    pub duration_ms: u64,
    pub path: Vec<TelemetrySample>,
}

impl Default for TelemetryReport {
    fn default() -> Self {
        Self {
            clicks: 0,
            keys: 0,
            moves: 0,
            duration_ms: 1,
            path: vec![],
        }
    }
}

/// Coerce a JSON value to an integer: integers as-is, finite floats
/// truncated, numeric strings parsed.
fn coerce_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| f.trunc() as i64)
            })
        }
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

fn coerce_f64(value: &Value) -> Option<f64> {
    let f = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    f.is_finite().then_some(f)
}

impl TelemetryReport {
    /// Parse a loosely-shaped JSON report.
    ///
    /// Never fails: every field is coerced independently and falls back to its
    /// default. Absent fields fall back silently; present but unusable ones are
    /// reported so the caller can log them.
    pub fn parse(raw: &Value) -> (Self, Vec<FieldFallback>) {
        let mut report = Self::default();
        let mut fallbacks = Vec::new();

        let Some(obj) = raw.as_object() else {
            if !raw.is_null() {
                fallbacks.push(FieldFallback::new("$", "report is not an object"));
            }
            return (report, fallbacks);
        };

        let mut counter = |name: &str, min: u64, default: u64| -> u64 {
            match obj.get(name) {
                None | Some(Value::Null) => default,
                Some(value) => match coerce_i64(value) {
                    Some(n) if n >= min as i64 => n as u64,
                    Some(_) => {
                        fallbacks.push(FieldFallback::new(name, "out of range"));
                        default
                    }
                    None => {
                        fallbacks.push(FieldFallback::new(name, "not an integer"));
                        default
                    }
                },
            }
        };

        report.clicks = counter("clicks", 0, 0);
        report.keys = counter("keys", 0, 0);
        report.moves = counter("moves", 0, 0);
        report.duration_ms = counter("duration_ms", 1, 1);

        match obj.get("path") {
            None | Some(Value::Null) => {}
            Some(Value::Array(entries)) => {
                report.path = parse_path(entries, &mut fallbacks);
            }
            Some(_) => fallbacks.push(FieldFallback::new("path", "not an array")),
        }

        (report, fallbacks)
    }
}

fn parse_path(entries: &[Value], fallbacks: &mut Vec<FieldFallback>) -> Vec<TelemetrySample> {
    let empty = Map::new();
    let mut path = Vec::with_capacity(entries.len());
    let mut prev_t: Option<i64> = None;

    for (i, entry) in entries.iter().enumerate() {
        let fields = match entry.as_object() {
            Some(fields) => fields,
            None => {
                fallbacks.push(FieldFallback::new(format!("path[{i}]"), "not an object"));
                &empty
            }
        };

        let mut coord = |name: &str| -> f64 {
            match fields.get(name) {
                None | Some(Value::Null) => 0.0,
                Some(value) => coerce_f64(value).unwrap_or_else(|| {
                    fallbacks.push(FieldFallback::new(format!("path[{i}].{name}"), "not a number"));
                    0.0
                }),
            }
        };
        let x = coord("x");
        let y = coord("y");

        let default_t = prev_t.map_or(0, |t| t.saturating_add(1));
        let t = match fields.get("t") {
            None | Some(Value::Null) => default_t,
            Some(value) => coerce_i64(value).unwrap_or_else(|| {
                fallbacks.push(FieldFallback::new(format!("path[{i}].t"), "not an integer"));
                default_t
            }),
        };
        prev_t = Some(t);

        path.push(TelemetrySample::new(x, y, t));
    }

    path
}

/// Echo of the raw counters in an analysis result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySummary {
    pub clicks: u64,
    pub keys: u64,
    pub moves: u64,
    pub duration_ms: u64,
    pub path_samples: usize,
}

/// Interaction rates together with the path metrics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InteractionMetrics {
    /// Clicks per second
    pub cps: f64,
    /// Keys per second
    pub kps: f64,
    /// Moves per second
    pub mps: f64,
    #[serde(flatten)]
    pub kinematics: KinematicMetrics,
}

/// Result of analyzing one telemetry report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub severity: Severity,
    /// Insertion order, no duplicates
    pub tags: Vec<RiskTag>,
    pub telemetry: TelemetrySummary,
    pub metrics: InteractionMetrics,
}

impl AnalysisResult {
    pub fn has_tag(&self, tag: RiskTag) -> bool {
        self.tags.contains(&tag)
    }

    /// Convert into a behavior signal for the event log.
    pub fn to_signal(&self) -> RiskSignal {
        let details = serde_json::json!({
            "telemetry": self.telemetry,
            "metrics": self.metrics,
            "tags": self.tags,
        });
        RiskSignal::new(SignalKind::Behavior, self.severity, details)
    }
}

/// Rule-based telemetry analyzer.
#[derive(Debug, Clone, Default)]
pub struct TelemetryAnalyzer {
    thresholds: BehaviorConfig,
}

impl TelemetryAnalyzer {
    /// Create an analyzer with the given thresholds.
    pub fn new(thresholds: BehaviorConfig) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &BehaviorConfig {
        &self.thresholds
    }

    /// Analyze a report. Pure: identical input gives identical output.
    pub fn analyze(&self, report: &TelemetryReport) -> AnalysisResult {
        let th = &self.thresholds;
        let pm = extract_metrics(&report.path);

        // Rates are floored at one second of elapsed time.
        let elapsed_s = (report.duration_ms as f64 / 1000.0).max(1.0);
        let cps = report.clicks as f64 / elapsed_s;
        let kps = report.keys as f64 / elapsed_s;
        let mps = report.moves as f64 / elapsed_s;

        let rules = [
            (
                RiskTag::SpeedSpikes,
                pm.max_speed > th.max_speed || pm.speed_std > th.speed_std,
            ),
            (RiskTag::JerkyDirection, pm.dir_changes_rate > th.dir_changes_rate),
            (
                RiskTag::LowStraightness,
                pm.straightness < th.straightness && pm.total_dist > th.min_total_dist,
            ),
            (RiskTag::HighJitter, pm.jitter > th.jitter),
            (
                RiskTag::HighActivity,
                cps > th.clicks_per_sec || kps > th.keys_per_sec || mps > th.moves_per_sec,
            ),
        ];

        let mut tags: Vec<RiskTag> = rules
            .iter()
            .filter(|(_, fired)| *fired)
            .map(|(tag, _)| *tag)
            .collect();

        let score = tags.iter().filter(|t| t.is_primary()).count();
        let severity = if score >= HIGH_SCORE {
            if !tags.contains(&RiskTag::Erratic) {
                tags.push(RiskTag::Erratic);
            }
            Severity::High
        } else if score == MEDIUM_SCORE {
            Severity::Medium
        } else {
            Severity::Info
        };

        AnalysisResult {
            severity,
            tags,
            telemetry: TelemetrySummary {
                clicks: report.clicks,
                keys: report.keys,
                moves: report.moves,
                duration_ms: report.duration_ms,
                path_samples: pm.sample_count,
            },
            metrics: InteractionMetrics {
                cps,
                kps,
                mps,
                kinematics: pm,
            },
        }
    }

    /// Parse and analyze a raw JSON report.
    pub fn analyze_value(&self, raw: &Value) -> (AnalysisResult, Vec<FieldFallback>) {
        let (report, fallbacks) = TelemetryReport::parse(raw);
        (self.analyze(&report), fallbacks)
    }
}
