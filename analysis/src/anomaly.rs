//! Anomaly detection with thresholds normalized to the sampling interval.
//!
//! Base thresholds are calibrated for a 30 second interval and grow
//! linearly with the actual gap between two samples. The percentage
//! threshold grows twice as fast as the capacity threshold.

use chrono::TimeDelta;
use log::debug;
use powerwatch_rs_core::{format, Measurement};
use serde::Serialize;
use std::fmt;

use crate::minutes;

pub const BASE_CHARGE_THRESHOLD: f64 = 20.0;
pub const BASE_CAPACITY_THRESHOLD: f64 = 500.0;
pub const MAX_CHARGE_THRESHOLD: i32 = 50;
pub const MAX_CAPACITY_THRESHOLD: i64 = 2000;

/// Interval assumed when neither timestamp of a pair parses.
pub const DEFAULT_INTERVAL: TimeDelta = TimeDelta::seconds(30);

/// Thresholds for one pair of samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnomalyThresholds {
    /// Percentage points
    pub charge: i32,
    /// mAh
    pub capacity: i64,
}

/// Scale the base thresholds to `interval`, never below half a minute.
pub fn normalize_thresholds(interval: TimeDelta) -> AnomalyThresholds {
    let scale = minutes(interval).max(0.5);

    let charge = (BASE_CHARGE_THRESHOLD * scale * 2.0) as i32;
    let capacity = (BASE_CAPACITY_THRESHOLD * scale) as i64;

    AnomalyThresholds {
        charge: charge.min(MAX_CHARGE_THRESHOLD),
        capacity: capacity.min(MAX_CAPACITY_THRESHOLD),
    }
}

/// A suspicious change between two consecutive samples.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Anomaly {
    ChargeJump { from: u8, to: u8, minutes: f64, at: String },
    ChargeDrop { from: u8, to: u8, minutes: f64, at: String },
    StateChange { from: String, to: String, at: String },
    CapacityJump { from: u32, to: u32, minutes: f64, at: String },
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anomaly::ChargeJump { from, to, minutes, at } => write!(
                f,
                "Sudden charge rise: {}% → {}% in {:.1} min ({})",
                from, to, minutes, at
            ),
            Anomaly::ChargeDrop { from, to, minutes, at } => write!(
                f,
                "Sudden charge drop: {}% → {}% in {:.1} min ({})",
                from, to, minutes, at
            ),
            Anomaly::StateChange { from, to, at } => {
                write!(f, "State change: {} → {} ({})", from, to, at)
            }
            Anomaly::CapacityJump { from, to, minutes, at } => write!(
                f,
                "Sudden capacity change: {} → {} mAh in {:.1} min ({})",
                from, to, minutes, at
            ),
        }
    }
}

/// Structured anomalies in the order of the pairs that triggered them.
///
/// One pair may yield several anomalies. A pair with exactly one malformed
/// timestamp is skipped; a pair where both are malformed is checked against
/// the thresholds for a 30 second interval.
pub fn detect_anomaly_records(measurements: &[Measurement]) -> Vec<Anomaly> {
    let mut anomalies = Vec::new();

    for pair in measurements.windows(2) {
        let (prev, curr) = (&pair[0], &pair[1]);

        let interval = match (prev.parsed_timestamp(), curr.parsed_timestamp()) {
            (Some(start), Some(end)) => end - start,
            (None, None) => DEFAULT_INTERVAL,
            _ => {
                debug!("skipping pair with one malformed timestamp near {}", curr.timestamp);
                continue;
            }
        };

        let thresholds = normalize_thresholds(interval);
        let elapsed = minutes(interval);
        let at = format::time_of_day(&curr.timestamp).to_string();

        let charge_delta = i32::from(curr.percentage) - i32::from(prev.percentage);
        if charge_delta > thresholds.charge {
            anomalies.push(Anomaly::ChargeJump {
                from: prev.percentage,
                to: curr.percentage,
                minutes: elapsed,
                at: at.clone(),
            });
        }
        if charge_delta < -thresholds.charge {
            anomalies.push(Anomaly::ChargeDrop {
                from: prev.percentage,
                to: curr.percentage,
                minutes: elapsed,
                at: at.clone(),
            });
        }

        if prev.state != curr.state {
            anomalies.push(Anomaly::StateChange {
                from: prev.state.clone(),
                to: curr.state.clone(),
                at: at.clone(),
            });
        }

        let capacity_delta = (i64::from(curr.current_capacity) - i64::from(prev.current_capacity)).abs();
        if capacity_delta > thresholds.capacity {
            anomalies.push(Anomaly::CapacityJump {
                from: prev.current_capacity,
                to: curr.current_capacity,
                minutes: elapsed,
                at,
            });
        }
    }

    anomalies
}

/// Human-readable anomaly descriptions, ordered chronologically.
pub fn detect_anomalies(measurements: &[Measurement]) -> Vec<String> {
    detect_anomaly_records(measurements)
        .iter()
        .map(ToString::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::at;

    #[test]
    fn test_thresholds_at_one_minute() {
        let t = normalize_thresholds(TimeDelta::seconds(60));
        assert_eq!(t.charge, 40);
        assert_eq!(t.capacity, 500);
    }

    #[test]
    fn test_thresholds_clamp() {
        let t = normalize_thresholds(TimeDelta::minutes(10));
        assert_eq!(t.charge, 50);
        assert_eq!(t.capacity, 2000);
    }

    #[test]
    fn test_thresholds_floor_at_half_minute() {
        let base = normalize_thresholds(TimeDelta::seconds(30));
        assert_eq!(base, AnomalyThresholds { charge: 20, capacity: 250 });
        assert_eq!(normalize_thresholds(TimeDelta::seconds(5)), base);
        assert_eq!(normalize_thresholds(TimeDelta::seconds(-120)), base);
    }

    #[test]
    fn test_quiet_discharge_has_no_anomalies() {
        let ms: Vec<_> = (0..10)
            .map(|i| at(i * 30, 90 - i as u8, "discharging", 4000 - 10 * i as u32))
            .collect();
        assert!(detect_anomalies(&ms).is_empty());
    }

    #[test]
    fn test_charge_jump_and_drop() {
        let ms = vec![
            at(0, 20, "charging", 0),
            at(30, 45, "charging", 0),
            at(60, 10, "charging", 0),
        ];
        let records = detect_anomaly_records(&ms);
        assert_eq!(records.len(), 2);
        assert!(matches!(records[0], Anomaly::ChargeJump { from: 20, to: 45, .. }));
        assert!(matches!(records[1], Anomaly::ChargeDrop { from: 45, to: 10, .. }));

        let text = detect_anomalies(&ms);
        assert_eq!(text[0], "Sudden charge rise: 20% → 45% in 0.5 min (08:00:30)");
    }

    #[test]
    fn test_sparse_interval_tolerates_larger_steps() {
        // 30 points over 5 minutes stays under the clamped threshold of 50
        let ms = vec![at(0, 40, "charging", 3000), at(300, 70, "charging", 4200)];
        assert!(detect_anomalies(&ms).is_empty());
    }

    #[test]
    fn test_every_state_change_is_reported() {
        let ms = vec![
            at(0, 80, "discharging", 4000),
            at(30, 80, "charging", 4000),
            at(60, 80, "charged", 4000),
            at(90, 80, "charged", 4000),
        ];
        assert_eq!(
            detect_anomalies(&ms),
            vec![
                "State change: discharging → charging (08:00:30)".to_string(),
                "State change: charging → charged (08:01:00)".to_string(),
            ]
        );
    }

    #[test]
    fn test_one_pair_can_yield_several_anomalies() {
        let ms = vec![at(0, 80, "discharging", 4000), at(60, 20, "charging", 3000)];
        let records = detect_anomaly_records(&ms);
        assert_eq!(records.len(), 3);
        assert!(matches!(records[0], Anomaly::ChargeDrop { .. }));
        assert!(matches!(records[1], Anomaly::StateChange { .. }));
        assert!(matches!(records[2], Anomaly::CapacityJump { from: 4000, to: 3000, .. }));
    }

    #[test]
    fn test_malformed_timestamps() {
        let mut one_bad = vec![at(0, 80, "discharging", 4000), at(30, 20, "charging", 4000)];
        one_bad[0].timestamp = "not a time".to_string();
        assert!(detect_anomalies(&one_bad).is_empty());

        let mut both_bad = one_bad.clone();
        both_bad[1].timestamp = "also not a time".to_string();
        let records = detect_anomaly_records(&both_bad);
        assert_eq!(records.len(), 2);
        assert!(matches!(records[0], Anomaly::ChargeDrop { minutes, .. } if minutes == 0.5));
        assert!(matches!(records[1], Anomaly::StateChange { .. }));
    }

    #[test]
    fn test_short_input() {
        assert!(detect_anomalies(&[]).is_empty());
        assert!(detect_anomalies(&[at(0, 50, "charging", 0)]).is_empty());
    }
}
