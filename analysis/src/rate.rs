//! Discharge rate estimation over a trailing window.

use log::debug;
use powerwatch_rs_core::Measurement;
use serde::Serialize;

use crate::{hours, interval_between};

/// Largest percentage step between two samples the robust estimator accepts.
pub const MAX_PERCENT_STEP: i32 = 20;
/// Largest capacity step (mAh) between two samples the robust estimator accepts.
pub const MAX_CAPACITY_STEP: i64 = 500;
/// Longest interval (hours) the robust estimator accepts.
pub const MAX_INTERVAL_HOURS: f64 = 2.0;

/// Robust rate with the number of intervals that produced it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RateEstimate {
    /// mAh per hour
    pub rate: f64,
    pub valid_intervals: usize,
}

/// The last `window_size + 1` samples, clamped to what is available.
fn trailing_window(measurements: &[Measurement], window_size: usize) -> &[Measurement] {
    let start = measurements
        .len()
        .saturating_sub(window_size.saturating_add(1));
    &measurements[start..]
}

fn capacity_drop(prev: &Measurement, curr: &Measurement) -> i64 {
    i64::from(prev.current_capacity) - i64::from(curr.current_capacity)
}

/// Naive discharge rate in mAh/hour over the last `window_size` intervals.
///
/// Only pairs where the capacity went down contribute. Returns `0.0` when no
/// pair qualifies or the accumulated time is exactly zero.
pub fn average_discharge_rate(measurements: &[Measurement], window_size: usize) -> f64 {
    let mut total_drop = 0.0;
    let mut total_hours = 0.0;

    for pair in trailing_window(measurements, window_size).windows(2) {
        let (prev, curr) = (&pair[0], &pair[1]);

        let drop = capacity_drop(prev, curr);
        if drop <= 0 {
            continue;
        }
        let Some(elapsed) = interval_between(prev, curr) else {
            continue;
        };

        total_drop += drop as f64;
        total_hours += hours(elapsed);
    }

    if total_hours == 0.0 {
        return 0.0;
    }
    total_drop / total_hours
}

/// Discharge rate with outlier rejection.
///
/// A pair is skipped when the percentage moved more than 20 points, the
/// capacity moved more than 500 mAh, or the interval is not in `(0, 2h]`.
/// The returned interval count tells callers how much data backs the rate.
pub fn robust_average_discharge_rate(measurements: &[Measurement], window_size: usize) -> RateEstimate {
    let mut total_drop = 0.0;
    let mut total_hours = 0.0;
    let mut valid_intervals = 0;

    for pair in trailing_window(measurements, window_size).windows(2) {
        let (prev, curr) = (&pair[0], &pair[1]);

        let percent_step = (i32::from(curr.percentage) - i32::from(prev.percentage)).abs();
        let drop = capacity_drop(prev, curr);
        if percent_step > MAX_PERCENT_STEP || drop.abs() > MAX_CAPACITY_STEP {
            debug!(
                "rejecting outlier pair at {}: {} points, {} mAh",
                curr.timestamp, percent_step, drop
            );
            continue;
        }
        if drop <= 0 {
            continue;
        }
        let Some(elapsed) = interval_between(prev, curr) else {
            continue;
        };

        let elapsed_hours = hours(elapsed);
        if elapsed_hours <= 0.0 || elapsed_hours > MAX_INTERVAL_HOURS {
            debug!("rejecting interval of {:.2}h ending at {}", elapsed_hours, curr.timestamp);
            continue;
        }

        total_drop += drop as f64;
        total_hours += elapsed_hours;
        valid_intervals += 1;
    }

    let rate = if total_hours == 0.0 {
        0.0
    } else {
        total_drop / total_hours
    };

    RateEstimate {
        rate,
        valid_intervals,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{assert_close, at};

    fn steady_discharge() -> Vec<Measurement> {
        // 100 mAh every 15 minutes
        (0..6)
            .map(|i| at(i * 900, 90 - i as u8, "discharging", 5000 - 100 * i as u32))
            .collect()
    }

    #[test]
    fn test_strictly_decreasing_capacity() {
        let ms = steady_discharge();
        // 500 mAh over 1.25 hours
        assert_eq!(average_discharge_rate(&ms, 10), 400.0);

        let robust = robust_average_discharge_rate(&ms, 10);
        assert_eq!(robust.rate, 400.0);
        assert_eq!(robust.valid_intervals, 5);
    }

    #[test]
    fn test_window_limits_intervals() {
        let mut ms = steady_discharge();
        // older history with a much steeper drop that falls outside the window
        ms.insert(0, at(-900, 95, "discharging", 5400));

        assert_eq!(average_discharge_rate(&ms, 5), 400.0);
        assert_eq!(robust_average_discharge_rate(&ms, 2).valid_intervals, 2);
    }

    #[test]
    fn test_charging_pairs_are_skipped() {
        let ms = vec![
            at(0, 50, "discharging", 3000),
            at(1800, 48, "discharging", 2900),
            at(3600, 55, "charging", 3200),
            at(5400, 60, "charging", 3200),
        ];
        // only the first pair counts: 100 mAh over half an hour
        assert_eq!(average_discharge_rate(&ms, 10), 200.0);
        assert_eq!(robust_average_discharge_rate(&ms, 10).valid_intervals, 1);
    }

    #[test]
    fn test_percentage_outlier_rejected_by_robust_only() {
        let ms = vec![
            at(0, 80, "discharging", 4000),
            at(600, 79, "discharging", 3950),
            at(1200, 54, "discharging", 3900),
            at(1800, 53, "discharging", 3850),
            at(2400, 52, "discharging", 3800),
        ];
        let pairs = ms.len() - 1;

        let robust = robust_average_discharge_rate(&ms, 10);
        assert_eq!(robust.valid_intervals, pairs - 1);
        assert_close(robust.rate, 300.0);

        // 200 mAh over 40 minutes, the jump pair included
        assert_close(average_discharge_rate(&ms, 10), 300.0);
    }

    #[test]
    fn test_capacity_outlier_and_long_interval_rejected() {
        let ms = vec![
            at(0, 80, "discharging", 4000),
            at(600, 78, "discharging", 3400),
            at(1200, 77, "discharging", 3350),
            at(1200 + 3 * 3600, 70, "discharging", 3000),
        ];
        let robust = robust_average_discharge_rate(&ms, 10);
        assert_eq!(robust.valid_intervals, 1);
        assert_close(robust.rate, 300.0);
    }

    #[test]
    fn test_malformed_timestamp_skips_pair() {
        let mut ms = steady_discharge();
        ms[2].timestamp = "garbage".to_string();
        // pairs (1,2) and (2,3) drop out: 300 mAh over 0.75h
        assert_eq!(average_discharge_rate(&ms, 10), 400.0);
        assert_eq!(robust_average_discharge_rate(&ms, 10).valid_intervals, 3);
    }

    #[test]
    fn test_insufficient_samples() {
        assert_eq!(average_discharge_rate(&[], 10), 0.0);
        let single = vec![at(0, 50, "discharging", 3000)];
        assert_eq!(average_discharge_rate(&single, 10), 0.0);
        assert_eq!(robust_average_discharge_rate(&single, 10), RateEstimate::default());
    }

    #[test]
    fn test_zero_elapsed_time_returns_zero() {
        let ms = vec![
            at(0, 50, "discharging", 3000),
            at(0, 49, "discharging", 2950),
        ];
        assert_eq!(average_discharge_rate(&ms, 10), 0.0);
        assert_eq!(robust_average_discharge_rate(&ms, 10).valid_intervals, 0);
    }

    #[test]
    fn test_huge_window_does_not_overflow() {
        let ms = steady_discharge();
        assert_eq!(average_discharge_rate(&ms, usize::MAX), 400.0);
    }
}
