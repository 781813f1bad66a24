//! Electrical and efficiency metrics.

use powerwatch_rs_core::{AdvancedMetrics, Measurement, PowerTrend};

use crate::wear_percent;

const RATING_TEMPERATURE_LIMIT: i32 = 45;
const RATING_VOLTAGE_STABILITY: f64 = 95.0;

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// `100 * (1 - stddev / mean)`, `None` with fewer than two samples.
fn voltage_stability(voltages: &[f64]) -> Option<f64> {
    if voltages.len() < 2 {
        return None;
    }
    let avg = mean(voltages);
    if avg <= 0.0 {
        return None;
    }
    let variance = voltages.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / voltages.len() as f64;
    Some(100.0 * (1.0 - variance.sqrt() / avg))
}

fn power_trend(powers: &[f64]) -> PowerTrend {
    match powers {
        [.., a, b, c] if c > b && b > a => PowerTrend::Rising,
        [.., a, b, c] if c < b && b < a => PowerTrend::Falling,
        [.., _, _, _] => PowerTrend::Stable,
        _ => PowerTrend::Unknown,
    }
}

fn condition_for(rating: u8) -> &'static str {
    match rating {
        85.. => "Normal",
        70..=84 => "Service Recommended",
        _ => "Replace Soon",
    }
}

/// Derive voltage stability, efficiencies, power trend and a 0-100 rating.
pub fn analyze_advanced_metrics(measurements: &[Measurement]) -> AdvancedMetrics {
    let Some(latest) = measurements.last() else {
        return AdvancedMetrics::default();
    };

    let voltages: Vec<f64> = measurements
        .iter()
        .filter(|m| m.voltage > 0)
        .map(|m| f64::from(m.voltage))
        .collect();
    let powers: Vec<f64> = measurements
        .iter()
        .filter(|m| m.power != 0)
        .map(|m| f64::from(m.power))
        .collect();
    let charging_ratios: Vec<f64> = measurements
        .iter()
        .filter(|m| m.power > 0 && m.current_capacity > 0)
        .map(|m| f64::from(m.current_capacity) / f64::from(m.power))
        .collect();

    let stability = voltage_stability(&voltages);

    let power_efficiency = if powers.is_empty() {
        0.0
    } else {
        let avg_draw = powers.iter().map(|p| p.abs()).sum::<f64>() / powers.len() as f64;
        (100.0 - avg_draw / 100.0).max(0.0)
    };

    let charging_efficiency = if charging_ratios.is_empty() {
        0.0
    } else {
        mean(&charging_ratios)
    };

    let mut rating: i64 = 100;
    if latest.design_capacity > 0 {
        rating -= (wear_percent(latest.design_capacity, latest.full_charge_capacity) * 0.5) as i64;
    }
    rating -= i64::from(latest.cycle_count / 10);
    if latest.temperature > RATING_TEMPERATURE_LIMIT {
        rating -= i64::from(latest.temperature - RATING_TEMPERATURE_LIMIT);
    }
    if let Some(stability) = stability.filter(|s| *s < RATING_VOLTAGE_STABILITY) {
        rating -= (RATING_VOLTAGE_STABILITY - stability) as i64;
    }
    let health_rating = rating.clamp(0, 100) as u8;

    let condition = if latest.condition.is_empty() {
        condition_for(health_rating).to_string()
    } else {
        latest.condition.clone()
    };

    AdvancedMetrics {
        power_efficiency,
        voltage_stability: stability,
        charging_efficiency,
        power_trend: power_trend(&powers),
        health_rating,
        condition,
    }
}
