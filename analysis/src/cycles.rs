//! Charge/discharge segmentation on state transitions.

use chrono::{DateTime, Utc};
use log::debug;
use powerwatch_rs_core::{ChargeCycle, Measurement};

/// Minimum history length before segmentation is attempted.
pub const MIN_SAMPLES: usize = 3;

struct OpenSegment {
    cycle: ChargeCycle,
}

impl OpenSegment {
    fn start(at: DateTime<Utc>, m: &Measurement) -> Self {
        Self {
            cycle: ChargeCycle {
                start_time: at,
                end_time: at,
                start_percent: m.percentage,
                end_percent: m.percentage,
                cycle_type: m.state.to_lowercase(),
                capacity_loss: 0,
            },
        }
    }

    fn extend(&mut self, at: DateTime<Utc>, m: &Measurement) {
        self.cycle.end_time = at;
        self.cycle.end_percent = m.percentage;
    }

    /// Close on a transition; loss is measured across the transition pair.
    fn close(mut self, before: &Measurement, after: &Measurement) -> ChargeCycle {
        if before.current_capacity > 0 && after.current_capacity > 0 {
            self.cycle.capacity_loss = i64::from(before.current_capacity) - i64::from(after.current_capacity);
        }
        self.cycle
    }
}

/// Split the history into segments of constant state.
///
/// The first usable sample opens a segment; every state change relative to
/// the preceding sample closes the open one and starts a new one tagged with
/// the new state. A segment ends at the last sample before the next
/// transition, and its capacity loss is the drop across the transition pair.
/// The final segment is still open, so its loss stays 0. Samples with
/// malformed timestamps are skipped but still count as the preceding sample
/// for the next comparison.
pub fn detect_charge_cycles(measurements: &[Measurement]) -> Vec<ChargeCycle> {
    if measurements.len() < MIN_SAMPLES {
        return Vec::new();
    }

    let mut cycles = Vec::new();
    let mut open: Option<OpenSegment> = None;

    for (index, m) in measurements.iter().enumerate() {
        let Some(at) = m.parsed_timestamp() else {
            debug!("ignoring sample with malformed timestamp {:?}", m.timestamp);
            continue;
        };

        let prev = index.checked_sub(1).map(|i| &measurements[i]);
        match (open.take(), prev) {
            (Some(segment), Some(prev)) if prev.state != m.state => {
                cycles.push(segment.close(prev, m));
                open = Some(OpenSegment::start(at, m));
            }
            (Some(mut segment), _) => {
                segment.extend(at, m);
                open = Some(segment);
            }
            (None, _) => open = Some(OpenSegment::start(at, m)),
        }
    }

    if let Some(segment) = open {
        cycles.push(segment.cycle);
    }

    cycles
}
