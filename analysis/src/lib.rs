//! # powerwatch-rs-analysis
//!
//! Pure, stateless computations over an ascending slice of battery
//! measurements: discharge rate, remaining time, wear, anomalies, capacity
//! trend, charge cycle segmentation and a composite health score.
//!
//! Every function recomputes from the slice it is given. Nothing here
//! performs I/O, keeps state between calls or fails: sparse or malformed
//! input degrades to zero, empty or healthy-by-default results.
//!
//! ```rust
//! use chrono::{Duration, TimeZone, Utc};
//! use powerwatch_rs_analysis::{average_discharge_rate, remaining_time};
//! use powerwatch_rs_core::Measurement;
//!
//! let start = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
//! let history: Vec<Measurement> = (0..4)
//!     .map(|i| {
//!         let mut m = Measurement::new(start + Duration::minutes(30 * i), 90 - i as u8, "discharging");
//!         m.current_capacity = 4000 - 200 * i as u32;
//!         m
//!     })
//!     .collect();
//!
//! let rate = average_discharge_rate(&history, 10);
//! assert_eq!(rate, 400.0);
//! assert_eq!(remaining_time(3400, rate).as_secs(), 8 * 3600 + 30 * 60);
//! ```

pub mod anomaly;
pub mod cycles;
pub mod health;
pub mod metrics;
pub mod rate;
pub mod trend;
pub mod wear;

pub use anomaly::{detect_anomalies, detect_anomaly_records, normalize_thresholds, Anomaly, AnomalyThresholds};
pub use cycles::detect_charge_cycles;
pub use health::{analyze_battery_health, analyze_battery_health_at, classify, recommendations};
pub use metrics::analyze_advanced_metrics;
pub use rate::{average_discharge_rate, robust_average_discharge_rate, RateEstimate};
pub use trend::{analyze_capacity_trend, analyze_capacity_trend_at};
pub use wear::{remaining_time, wear_percent};

use chrono::TimeDelta;
use powerwatch_rs_core::Measurement;

/// Elapsed time from `prev` to `curr`, or `None` if either timestamp is malformed.
pub(crate) fn interval_between(prev: &Measurement, curr: &Measurement) -> Option<TimeDelta> {
    Some(curr.parsed_timestamp()? - prev.parsed_timestamp()?)
}

pub(crate) fn hours(delta: TimeDelta) -> f64 {
    delta.num_milliseconds() as f64 / 3_600_000.0
}

pub(crate) fn minutes(delta: TimeDelta) -> f64 {
    delta.num_milliseconds() as f64 / 60_000.0
}
