use std::time::Duration;

/// Capacity lost relative to design, in percent.
///
/// Returns `0.0` when the design capacity is unknown.
pub fn wear_percent(design_capacity: u32, full_charge_capacity: u32) -> f64 {
    if design_capacity == 0 {
        return 0.0;
    }
    (f64::from(design_capacity) - f64::from(full_charge_capacity)) / f64::from(design_capacity) * 100.0
}

/// Time until empty at `rate_mah_per_hour`. Zero when the rate is not positive.
pub fn remaining_time(current_capacity: u32, rate_mah_per_hour: f64) -> Duration {
    if rate_mah_per_hour.is_nan() || rate_mah_per_hour <= 0.0 {
        return Duration::ZERO;
    }
    let hours = f64::from(current_capacity) / rate_mah_per_hour;
    Duration::try_from_secs_f64(hours * 3600.0).unwrap_or(Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wear_percent() {
        assert_eq!(wear_percent(5000, 4500), 10.0);
        assert_eq!(wear_percent(5000, 5000), 0.0);
        // new cells can report above design
        assert_eq!(wear_percent(5000, 5250), -5.0);
    }

    #[test]
    fn test_wear_zero_design() {
        for full in [0, 1, 4500, u32::MAX] {
            assert_eq!(wear_percent(0, full), 0.0);
        }
    }

    #[test]
    fn test_remaining_time() {
        assert_eq!(remaining_time(3000, 1000.0), Duration::from_secs(3 * 3600));
        assert_eq!(remaining_time(500, 2000.0), Duration::from_secs(15 * 60));
    }

    #[test]
    fn test_remaining_time_without_rate() {
        assert_eq!(remaining_time(3000, 0.0), Duration::ZERO);
        assert_eq!(remaining_time(3000, -250.0), Duration::ZERO);
        assert_eq!(remaining_time(3000, f64::NAN), Duration::ZERO);
    }

    #[test]
    fn test_remaining_time_tiny_rate_saturates() {
        assert_eq!(remaining_time(u32::MAX, f64::MIN_POSITIVE), Duration::MAX);
    }
}
