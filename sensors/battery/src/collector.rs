//! Sparse sampling loop body: cheap samples every tick, detail reads on a
//! slower cadence, detail fields carried forward in between.

use chrono::{DateTime, TimeDelta, Utc};
use log::{debug, info, warn};
use powerwatch_rs_core::{ChargeState, HistoryStore, Measurement, SampleSource};
use std::time::Duration;

use crate::error::Result;
use crate::store::{MemoryBuffer, Retention};

/// Sampling interval used while the battery sits at 100% on the charger.
pub const IDLE_INTERVAL: Duration = Duration::from_secs(300);

const STATS_EVERY: usize = 50;

pub struct Collector<S, H> {
    source: S,
    store: H,
    buffer: MemoryBuffer,
    detail_interval: TimeDelta,
    last_detail: Option<DateTime<Utc>>,
    retention: Retention,
}

impl<S, H> Collector<S, H>
where
    S: SampleSource<Error = crate::BatteryError>,
    H: HistoryStore,
{
    pub fn new(source: S, store: H, buffer_size: usize, detail_interval: Duration, retention: Retention) -> Self {
        Self {
            source,
            store,
            buffer: MemoryBuffer::new(buffer_size),
            detail_interval: TimeDelta::from_std(detail_interval).unwrap_or(TimeDelta::MAX),
            last_detail: None,
            retention,
        }
    }

    /// Seed the in-memory buffer from the persisted history.
    pub fn load_buffer(&mut self, count: usize) -> Result<usize> {
        let history = self.store.last(count)?;
        let loaded = history.len();
        for m in history {
            self.buffer.push(m);
        }
        debug!("loaded {} samples into the buffer", loaded);
        Ok(loaded)
    }

    fn details_due(&self, now: DateTime<Utc>) -> bool {
        self.last_detail
            .map_or(true, |last| now - last >= self.detail_interval)
    }

    /// Take one sample, persist it and return it.
    pub fn collect(&mut self) -> Result<Measurement> {
        let mut m = self.source.sample()?;
        let now = m.parsed_timestamp().unwrap_or_else(Utc::now);

        let fresh = if self.details_due(now) {
            match self.source.read_details(&mut m) {
                Ok(()) => {
                    self.last_detail = Some(now);
                    true
                }
                Err(e) => {
                    warn!("{}: detail read failed, using cached values: {}", self.source.name(), e);
                    false
                }
            }
        } else {
            false
        };

        if fresh {
            m.derive_power();
        } else if let Some(cached) = self.buffer.latest_detailed() {
            m.carry_details_from(cached);
        }

        self.store.append(&m)?;
        self.buffer.push(m.clone());

        if let Err(e) = self.retention.run(&mut self.store, now) {
            warn!("history cleanup failed: {}", e);
        }

        if self.buffer.len() % STATS_EVERY == 0 {
            info!("buffer holds {} samples", self.buffer.len());
        }

        Ok(m)
    }

    /// Tick length for the next sample given the latest state.
    pub fn next_interval(&self, base: Duration) -> Duration {
        match self.buffer.latest() {
            Some(m) if m.charge_state() == ChargeState::Charging && m.percentage >= 100 => {
                IDLE_INTERVAL.max(base)
            }
            _ => base,
        }
    }

    /// Most recent `limit` samples from the store, oldest first.
    pub fn history(&self, limit: usize) -> Result<Vec<Measurement>> {
        Ok(self.store.last(limit)?)
    }

    pub fn buffer(&self) -> &MemoryBuffer {
        &self.buffer
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}
