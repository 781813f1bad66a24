//! Long-horizon capacity degradation trend.

use chrono::{DateTime, TimeDelta, Utc};
use log::debug;
use powerwatch_rs_core::{Measurement, TrendAnalysis};

use crate::hours;

/// Minimum history length before a trend is attempted.
pub const MIN_SAMPLES: usize = 10;
/// Minimum number of samples carrying capacity data inside the window.
pub const MIN_CAPACITY_SAMPLES: usize = 5;
/// Minimum span (days) between the first and last capacity sample.
pub const MIN_SPAN_DAYS: f64 = 7.0;
/// Degradation faster than this (% of design per month) is unhealthy.
pub const HEALTHY_MONTHLY_LOSS: f64 = -0.5;
/// Capacity (% of design) the end-of-life projection counts down to.
pub const END_OF_LIFE_PERCENT: f64 = 80.0;

const WINDOW_DAYS: i64 = 30;
const DAYS_PER_MONTH: f64 = 30.0;

/// Capacity trend over the 30 days before now.
pub fn analyze_capacity_trend(measurements: &[Measurement]) -> TrendAnalysis {
    analyze_capacity_trend_at(measurements, Utc::now())
}

/// Capacity trend over the 30 days before `now`.
///
/// The slope comes from the first and last sample in the window that carry
/// both full-charge and design capacity. Too little data yields a healthy
/// result rather than a guess.
pub fn analyze_capacity_trend_at(measurements: &[Measurement], now: DateTime<Utc>) -> TrendAnalysis {
    if measurements.len() < MIN_SAMPLES {
        return TrendAnalysis::healthy_by_default();
    }

    let cutoff = now - TimeDelta::days(WINDOW_DAYS);
    let window: Vec<(DateTime<Utc>, &Measurement)> = measurements
        .iter()
        .filter(|m| m.full_charge_capacity > 0 && m.design_capacity > 0)
        .filter_map(|m| m.parsed_timestamp().map(|t| (t, m)))
        .filter(|(t, _)| *t > cutoff)
        .collect();

    if window.len() < MIN_CAPACITY_SAMPLES {
        debug!("{} capacity samples in window, trend skipped", window.len());
        return TrendAnalysis::healthy_by_default();
    }

    let (first_time, first) = window[0];
    let (last_time, last) = window[window.len() - 1];

    let span_days = hours(last_time - first_time) / 24.0;
    if span_days < MIN_SPAN_DAYS {
        debug!("capacity history spans {:.1} days, trend skipped", span_days);
        return TrendAnalysis::healthy_by_default();
    }

    let capacity_delta = f64::from(last.full_charge_capacity) - f64::from(first.full_charge_capacity);
    let monthly_delta = capacity_delta / span_days * DAYS_PER_MONTH;
    let design = f64::from(last.design_capacity);
    let degradation_rate = monthly_delta / design * 100.0;

    let current_health = f64::from(last.full_charge_capacity) / design * 100.0;
    let projected_days = if degradation_rate < 0.0 && current_health > END_OF_LIFE_PERCENT {
        let months = (current_health - END_OF_LIFE_PERCENT) / -degradation_rate;
        Some((months * DAYS_PER_MONTH) as u32)
    } else {
        None
    };

    TrendAnalysis {
        degradation_rate,
        projected_days,
        is_healthy: degradation_rate > HEALTHY_MONTHLY_LOSS,
    }
}
