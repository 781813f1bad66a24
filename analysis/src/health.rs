//! Composite battery health: classification, score adjustments and
//! recommendations.

use chrono::{DateTime, Utc};
use log::debug;
use powerwatch_rs_core::{HealthAnalysis, HealthStatus, Measurement, TrendAnalysis};

use crate::{
    analyze_advanced_metrics, analyze_capacity_trend_at, detect_anomalies, detect_charge_cycles,
    robust_average_discharge_rate, wear_percent,
};

/// Rate window used for health scoring.
pub const HEALTH_RATE_WINDOW: usize = 10;

/// `(wear below, cycles below, status)`, first match wins.
const CLASSIFICATION: [(f64, u32, HealthStatus); 4] = [
    (5.0, 300, HealthStatus::Excellent),
    (10.0, 500, HealthStatus::Good),
    (20.0, 800, HealthStatus::Fair),
    (30.0, 1200, HealthStatus::NeedsAttention),
];

const UNSTABLE_ANOMALY_COUNT: usize = 5;
const UNSTABLE_PENALTY: i32 = 10;
const FAST_DEGRADATION_RATE: f64 = -1.0;
const FAST_DEGRADATION_PENALTY: i32 = 15;

/// Base status from wear and cycle count.
pub fn classify(wear: f64, cycle_count: u32) -> HealthStatus {
    CLASSIFICATION
        .iter()
        .find(|(max_wear, max_cycles, _)| wear < *max_wear && cycle_count < *max_cycles)
        .map_or(HealthStatus::Poor, |(_, _, status)| *status)
}

/// Advice for the user, in display order. Rules fire independently.
pub fn recommendations(
    latest: &Measurement,
    wear: f64,
    anomaly_count: usize,
    discharge_rate: f64,
    trend: &TrendAnalysis,
) -> Vec<String> {
    let mut advice = Vec::new();

    if wear > 20.0 {
        advice.push("Consider replacing the battery".to_string());
    }
    if anomaly_count > 3 {
        advice.push("Check power-saving settings".to_string());
    }
    if latest.cycle_count > 1000 {
        advice.push("Battery is nearing the end of its life cycle".to_string());
    }
    if discharge_rate > 1000.0 {
        advice.push("High power consumption - close resource-heavy applications".to_string());
    }
    if latest.temperature > 40 {
        advice.push(format!(
            "High battery temperature ({}°C) - avoid heavy load",
            latest.temperature
        ));
    } else if latest.temperature > 35 {
        advice.push("Elevated battery temperature - consider improving cooling".to_string());
    }
    if !trend.is_healthy && trend.degradation_rate < -0.5 {
        advice.push(format!(
            "Fast battery degradation ({:.2}% per month) - check usage conditions",
            -trend.degradation_rate
        ));
    }
    if latest.state == "charging" && latest.percentage == 100 {
        advice.push("Avoid keeping the battery at 100% charge constantly".to_string());
    }
    if wear > 15.0 && latest.cycle_count > 500 {
        advice.push("Consider calibrating the battery (full discharge and charge)".to_string());
    }

    advice
}

/// Full health analysis with the trend window ending now.
pub fn analyze_battery_health(measurements: &[Measurement]) -> Option<HealthAnalysis> {
    analyze_battery_health_at(measurements, Utc::now())
}

/// Full health analysis with the trend window ending at `now`.
///
/// Returns `None` for an empty history.
pub fn analyze_battery_health_at(measurements: &[Measurement], now: DateTime<Utc>) -> Option<HealthAnalysis> {
    let latest = measurements.last()?;

    let wear = wear_percent(latest.design_capacity, latest.full_charge_capacity);
    let anomalies = detect_anomalies(measurements);
    let rate = robust_average_discharge_rate(measurements, HEALTH_RATE_WINDOW);
    let trend = analyze_capacity_trend_at(measurements, now);
    let cycles = detect_charge_cycles(measurements);

    let base_status = classify(wear, latest.cycle_count);
    let mut score = base_status.base_score();
    let mut status = base_status.to_string();

    if anomalies.len() > UNSTABLE_ANOMALY_COUNT {
        score -= UNSTABLE_PENALTY;
        status.push_str(" (unstable)");
    }
    if !trend.is_healthy && trend.degradation_rate < FAST_DEGRADATION_RATE {
        score -= FAST_DEGRADATION_PENALTY;
        status.push_str(" (fast degradation)");
    }

    debug!(
        "health: wear {:.1}%, {} cycles, {} anomalies, {} rate intervals -> {} ({})",
        wear,
        latest.cycle_count,
        anomalies.len(),
        rate.valid_intervals,
        status,
        score
    );

    let recommendations = recommendations(latest, wear, anomalies.len(), rate.rate, &trend);

    Some(HealthAnalysis {
        wear_percent: wear,
        cycle_count: latest.cycle_count,
        base_status,
        status,
        score,
        discharge_rate: rate.rate,
        valid_intervals: rate.valid_intervals,
        anomalies,
        recommendations,
        trend,
        cycles,
        metrics: analyze_advanced_metrics(measurements),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{at, at_from, base_time};
    use chrono::TimeDelta;

    fn detailed(seconds: i64, state: &str, design: u32, full: u32, cycles: u32) -> Measurement {
        let mut m = at(seconds, 70, state, 3000);
        m.design_capacity = design;
        m.full_charge_capacity = full;
        m.cycle_count = cycles;
        m
    }

    #[test]
    fn test_classification_table() {
        assert_eq!(classify(3.0, 100), HealthStatus::Excellent);
        assert_eq!(classify(3.0, 400), HealthStatus::Good);
        assert_eq!(classify(12.0, 100), HealthStatus::Fair);
        assert_eq!(classify(25.0, 900), HealthStatus::NeedsAttention);
        assert_eq!(classify(25.0, 1500), HealthStatus::Poor);
        assert_eq!(classify(35.0, 10), HealthStatus::Poor);
        // cutoffs are exclusive
        assert_eq!(classify(5.0, 299), HealthStatus::Good);
    }

    #[test]
    fn test_excellent_battery() {
        let ms = vec![detailed(0, "discharging", 5000, 4850, 100)];
        let analysis = analyze_battery_health_at(&ms, base_time()).unwrap();
        assert_eq!(analysis.base_status, HealthStatus::Excellent);
        assert_eq!(analysis.score, 95);
        assert_eq!(analysis.status, "Excellent");
        assert!(analysis.recommendations.is_empty());
    }

    #[test]
    fn test_poor_battery() {
        let ms = vec![detailed(0, "discharging", 4000, 3000, 1500)];
        let analysis = analyze_battery_health_at(&ms, base_time()).unwrap();
        assert_eq!(analysis.score, 30);
        assert_eq!(analysis.status, "Poor");
        assert_eq!(
            analysis.recommendations,
            vec![
                "Consider replacing the battery".to_string(),
                "Battery is nearing the end of its life cycle".to_string(),
                "Consider calibrating the battery (full discharge and charge)".to_string(),
            ]
        );
    }

    #[test]
    fn test_unstable_adjustment() {
        // six state changes
        let ms: Vec<_> = (0..7)
            .map(|i| {
                let state = if i % 2 == 0 { "discharging" } else { "charging" };
                detailed(i * 30, state, 5000, 4900, 50)
            })
            .collect();
        let analysis = analyze_battery_health_at(&ms, base_time()).unwrap();
        assert_eq!(analysis.anomalies.len(), 6);
        assert_eq!(analysis.score, 85);
        assert_eq!(analysis.status, "Excellent (unstable)");
        assert!(analysis
            .recommendations
            .contains(&"Check power-saving settings".to_string()));
        assert_eq!(analysis.cycles.len(), 7);
    }

    #[test]
    fn test_fast_degradation_adjustment() {
        let now = base_time() + TimeDelta::days(60);
        let start = now - TimeDelta::days(20);
        // 5000 -> 4900 over 20 days of a 5000 mAh design: -3% per month
        let ms: Vec<_> = (0..11)
            .map(|i| {
                let mut m = at_from(start, i * 2 * 86_400, 80, "discharging");
                m.design_capacity = 5000;
                m.full_charge_capacity = 5000 - 10 * i as u32;
                m
            })
            .collect();

        let analysis = analyze_battery_health_at(&ms, now).unwrap();
        assert_eq!(analysis.base_status, HealthStatus::Excellent);
        assert_eq!(analysis.score, 80);
        assert_eq!(analysis.status, "Excellent (fast degradation)");
        assert!(analysis
            .recommendations
            .contains(&"Fast battery degradation (3.00% per month) - check usage conditions".to_string()));
    }

    #[test]
    fn test_temperature_and_charging_advice() {
        let trend = TrendAnalysis::healthy_by_default();

        let mut hot = at(0, 100, "charging", 5000);
        hot.temperature = 42;
        assert_eq!(
            recommendations(&hot, 0.0, 0, 0.0, &trend),
            vec![
                "High battery temperature (42°C) - avoid heavy load".to_string(),
                "Avoid keeping the battery at 100% charge constantly".to_string(),
            ]
        );

        let mut warm = at(0, 80, "discharging", 5000);
        warm.temperature = 37;
        assert_eq!(
            recommendations(&warm, 0.0, 0, 1200.0, &trend),
            vec![
                "High power consumption - close resource-heavy applications".to_string(),
                "Elevated battery temperature - consider improving cooling".to_string(),
            ]
        );
    }

    #[test]
    fn test_empty_history() {
        assert!(analyze_battery_health_at(&[], base_time()).is_none());
    }

    #[test]
    fn test_idempotent() {
        let ms: Vec<_> = (0..12)
            .map(|i| {
                let state = if i < 8 { "discharging" } else { "charging" };
                let mut m = detailed(i * 45, state, 5200, 4700, 420);
                m.current_capacity = 4000 - 40 * i as u32;
                m.voltage = 11_800 + 10 * i as i32;
                m.power = -9_000 - 100 * i as i32;
                m
            })
            .collect();

        let first = serde_json::to_string(&analyze_battery_health_at(&ms, base_time())).unwrap();
        let second = serde_json::to_string(&analyze_battery_health_at(&ms, base_time())).unwrap();
        assert_eq!(first, second);
    }
}
