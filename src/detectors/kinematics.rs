//! Kinematic features of a pointer path.
//!
//! Turns an ordered list of timestamped positions into distance, speed,
//! direction and jitter statistics.

use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_4, PI};

/// Smallest time step in seconds; guards against zero or negative deltas.
const MIN_DT_SECS: f64 = 0.001;

/// One timestamped pointer position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub x: f64,
    pub y: f64,
    /// Milliseconds
    pub t: i64,
}

impl TelemetrySample {
    pub fn new(x: f64, y: f64, t: i64) -> Self {
        Self { x, y, t }
    }
}

/// Derived statistics over a pointer path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KinematicMetrics {
    pub total_dist: f64,
    pub net_disp: f64,
    /// Net displacement over path length; 1.0 is perfectly straight
    pub straightness: f64,
    pub max_speed: f64,
    pub avg_speed: f64,
    pub speed_std: f64,
    pub dir_changes_rate: f64,
    pub jitter: f64,
    #[serde(rename = "samples")]
    pub sample_count: usize,
}

impl KinematicMetrics {
    /// Metrics for a path too short to move along.
    pub fn degenerate(sample_count: usize) -> Self {
        Self {
            total_dist: 0.0,
            net_disp: 0.0,
            straightness: 1.0,
            max_speed: 0.0,
            avg_speed: 0.0,
            speed_std: 0.0,
            dir_changes_rate: 0.0,
            jitter: 0.0,
            sample_count,
        }
    }
}

fn step_secs(from: i64, to: i64) -> f64 {
    ((to.saturating_sub(from)) as f64 / 1000.0).max(MIN_DT_SECS)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Count direction changes sharper than 45 degrees.
///
/// `directions` holds one entry per path step, `None` where the pointer did
/// not move. Comparison starts at the third step.
fn count_direction_changes(directions: &[Option<f64>]) -> usize {
    let mut changes = 0;
    for i in 2..directions.len() {
        let (Some(prev), Some(cur)) = (directions[i - 1], directions[i]) else {
            continue;
        };
        let raw = (cur - prev).abs();
        let delta = raw.min(2.0 * PI - raw);
        if delta > FRAC_PI_4 {
            changes += 1;
        }
    }
    changes
}

/// Compute kinematic metrics for a pointer path.
pub fn extract_metrics(path: &[TelemetrySample]) -> KinematicMetrics {
    let (first, last) = match (path.first(), path.last()) {
        (Some(first), Some(last)) if path.len() >= 2 => (first, last),
        _ => return KinematicMetrics::degenerate(path.len()),
    };

    let steps = path.len() - 1;
    let mut speeds: Vec<f64> = Vec::with_capacity(steps);
    let mut directions: Vec<Option<f64>> = Vec::with_capacity(steps);
    let mut speed_deltas: Vec<f64> = Vec::with_capacity(steps.saturating_sub(1));
    let mut total_dist = 0.0;

    for pair in path.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let dt = step_secs(a.t, b.t);
        let (dx, dy) = (b.x - a.x, b.y - a.y);
        let dist = dx.hypot(dy);
        let speed = dist / dt;

        if let Some(&prev_speed) = speeds.last() {
            speed_deltas.push((speed - prev_speed).abs() / dt);
        }
        speeds.push(speed);
        directions.push((dist > 0.0).then(|| dy.atan2(dx)));
        total_dist += dist;
    }

    let duration_s = step_secs(first.t, last.t);
    let net_disp = (last.x - first.x).hypot(last.y - first.y);
    let straightness = if total_dist > 0.0 {
        net_disp / total_dist
    } else {
        1.0
    };

    let avg_speed = mean(&speeds);
    let max_speed = speeds.iter().copied().fold(0.0, f64::max);
    let variance = speeds
        .iter()
        .map(|v| (v - avg_speed).powi(2))
        .sum::<f64>()
        / speeds.len() as f64;

    KinematicMetrics {
        total_dist,
        net_disp,
        straightness,
        max_speed,
        avg_speed,
        speed_std: variance.sqrt(),
        dir_changes_rate: count_direction_changes(&directions) as f64 / duration_s,
        jitter: mean(&speed_deltas),
        sample_count: path.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(points: &[(f64, f64, i64)]) -> Vec<TelemetrySample> {
        points
            .iter()
            .map(|&(x, y, t)| TelemetrySample::new(x, y, t))
            .collect()
    }

    #[test]
    fn test_degenerate_paths() {
        for samples in [path(&[]), path(&[(5.0, 5.0, 10)])] {
            let m = extract_metrics(&samples);
            assert_eq!(m, KinematicMetrics::degenerate(samples.len()));
            assert_eq!(m.straightness, 1.0);
            assert_eq!(m.sample_count, samples.len());
        }
    }

    #[test]
    fn test_straight_fast_line() {
        let m = extract_metrics(&path(&[(0.0, 0.0, 0), (500.0, 0.0, 100), (1000.0, 0.0, 200)]));

        assert_eq!(m.total_dist, 1000.0);
        assert_eq!(m.net_disp, 1000.0);
        assert_eq!(m.straightness, 1.0);
        assert!((m.max_speed - 5000.0).abs() < 1e-9);
        assert!((m.avg_speed - 5000.0).abs() < 1e-9);
        assert!(m.speed_std < 1e-9);
        assert_eq!(m.dir_changes_rate, 0.0);
        assert!(m.jitter < 1e-6);
        assert_eq!(m.sample_count, 3);
    }

    #[test]
    fn test_zero_time_delta_is_floored() {
        let m = extract_metrics(&path(&[(0.0, 0.0, 0), (10.0, 0.0, 0)]));
        // 10px over the 1ms floor
        assert!((m.max_speed - 10_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_negative_time_delta_is_floored() {
        let m = extract_metrics(&path(&[(0.0, 0.0, 500), (3.0, 4.0, 100)]));
        assert!((m.max_speed - 5_000.0).abs() < 1e-6);
        // duration is floored too, so a single change-free step yields zero rate
        assert_eq!(m.dir_changes_rate, 0.0);
    }

    #[test]
    fn test_back_and_forth_is_not_straight() {
        let m = extract_metrics(&path(&[
            (0.0, 0.0, 0),
            (500.0, 0.0, 1000),
            (0.0, 0.0, 2000),
            (500.0, 0.0, 3000),
            (0.0, 0.0, 4000),
        ]));

        assert_eq!(m.total_dist, 2000.0);
        assert_eq!(m.net_disp, 0.0);
        assert_eq!(m.straightness, 0.0);
        // Reversals at steps 2 and 3 are counted; the one at step 1 is not.
        assert!((m.dir_changes_rate - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_direction_changes_start_at_third_step() {
        // A single right-angle turn between the first two steps is not counted.
        let m = extract_metrics(&path(&[(0.0, 0.0, 0), (100.0, 0.0, 1000), (100.0, 100.0, 2000)]));
        assert_eq!(m.dir_changes_rate, 0.0);

        // The same turn one step later is.
        let m = extract_metrics(&path(&[
            (0.0, 0.0, 0),
            (100.0, 0.0, 1000),
            (200.0, 0.0, 2000),
            (200.0, 100.0, 3000),
        ]));
        assert!((m.dir_changes_rate - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_stationary_steps_are_skipped_for_direction() {
        // Step 2 has no movement, so neither (1,2) nor (2,3) can count.
        let m = extract_metrics(&path(&[
            (0.0, 0.0, 0),
            (100.0, 0.0, 1000),
            (100.0, 0.0, 2000),
            (100.0, 100.0, 3000),
        ]));
        assert_eq!(m.dir_changes_rate, 0.0);
    }

    #[test]
    fn test_wrapped_angle_difference() {
        // Directions just either side of ±π differ by a tiny wrapped angle.
        let m = extract_metrics(&path(&[
            (0.0, 0.0, 0),
            (-100.0, 1.0, 1000),
            (-200.0, 0.0, 2000),
            (-300.0, 1.0, 3000),
        ]));
        assert_eq!(m.dir_changes_rate, 0.0);
    }

    #[test]
    fn test_jitter_uses_later_step_dt() {
        // speeds: 100 px/s then 1000 px/s over a 0.5s step
        let m = extract_metrics(&path(&[(0.0, 0.0, 0), (100.0, 0.0, 1000), (600.0, 0.0, 1500)]));
        assert!((m.jitter - 1800.0).abs() < 1e-6);
        assert!((m.avg_speed - 550.0).abs() < 1e-9);
        assert!((m.speed_std - 450.0).abs() < 1e-9);
    }

    #[test]
    fn test_idempotent() {
        let samples = path(&[(3.0, 4.0, 0), (10.0, -2.0, 37), (11.5, 9.25, 80), (0.0, 0.0, 81)]);
        let a = extract_metrics(&samples);
        let b = extract_metrics(&samples);
        assert_eq!(a.total_dist.to_bits(), b.total_dist.to_bits());
        assert_eq!(a.jitter.to_bits(), b.jitter.to_bits());
        assert_eq!(a.speed_std.to_bits(), b.speed_std.to_bits());
        assert_eq!(a, b);
    }

    #[test]
    fn test_serializes_sample_count_as_samples() {
        let json = serde_json::to_value(KinematicMetrics::degenerate(1)).unwrap();
        assert_eq!(json["samples"], 1);
        assert!(json.get("sample_count").is_none());
    }
}
