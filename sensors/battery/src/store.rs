//! Measurement history: the on-disk JSON lines log, the in-memory ring
//! buffer and the retention policy that trims the log.

use chrono::{DateTime, TimeDelta, Utc};
use log::{debug, warn};
use powerwatch_rs_core::{HistoryStore, Measurement, SensorError};
use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// File name of the history log inside the data directory.
pub const HISTORY_FILE: &str = "history.jsonl";

/// Append-only JSON lines log, one measurement per line.
#[derive(Debug, Clone)]
pub struct JsonlStore {
    path: PathBuf,
}

impl JsonlStore {
    /// Open (creating the directory if needed) the log inside `dir`.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, SensorError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        Ok(Self {
            path: dir.join(HISTORY_FILE),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw lines of the log, or nothing when it does not exist yet.
    fn read_lines(&self) -> Result<Vec<String>, SensorError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        BufReader::new(file)
            .lines()
            .map(|line| line.map_err(SensorError::from))
            .collect()
    }
}

impl HistoryStore for JsonlStore {
    fn append(&mut self, measurement: &Measurement) -> Result<(), SensorError> {
        let line = serde_json::to_string(measurement)
            .map_err(|e| SensorError::parse_with_source("Failed to serialize measurement", e))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }

    fn last(&self, n: usize) -> Result<Vec<Measurement>, SensorError> {
        let mut measurements: Vec<Measurement> = self
            .read_lines()?
            .iter()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .filter_map(|(index, line)| match serde_json::from_str(line) {
                Ok(m) => Some(m),
                Err(e) => {
                    warn!("{}:{}: skipping malformed record: {}", self.path.display(), index + 1, e);
                    None
                }
            })
            .collect();

        measurements.sort_by_key(Measurement::parsed_timestamp);
        let skip = measurements.len().saturating_sub(n);
        Ok(measurements.split_off(skip))
    }

    fn prune_before(&mut self, cutoff: DateTime<Utc>) -> Result<usize, SensorError> {
        let lines = self.read_lines()?;
        let total = lines.len();

        let kept: Vec<String> = lines
            .into_iter()
            .filter(|line| {
                let expired = serde_json::from_str::<Measurement>(line)
                    .ok()
                    .and_then(|m| m.parsed_timestamp())
                    .is_some_and(|ts| ts < cutoff);
                !expired
            })
            .collect();

        let removed = total - kept.len();
        if removed == 0 {
            return Ok(0);
        }

        let tmp_path = self.path.with_extension("jsonl.tmp");
        {
            let mut tmp = File::create(&tmp_path)?;
            for line in &kept {
                writeln!(tmp, "{}", line)?;
            }
            tmp.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;

        debug!("pruned {} records older than {}", removed, cutoff);
        Ok(removed)
    }
}

/// Bounded in-memory history; the oldest sample is dropped when full.
#[derive(Debug, Clone)]
pub struct MemoryBuffer {
    samples: VecDeque<Measurement>,
    capacity: usize,
}

impl MemoryBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, measurement: Measurement) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(measurement);
    }

    /// Up to `n` most recent samples, oldest first.
    pub fn last(&self, n: usize) -> Vec<Measurement> {
        let skip = self.samples.len().saturating_sub(n);
        self.samples.iter().skip(skip).cloned().collect()
    }

    pub fn latest(&self) -> Option<&Measurement> {
        self.samples.back()
    }

    /// Most recent sample that carries detail fields.
    pub fn latest_detailed(&self) -> Option<&Measurement> {
        self.samples.iter().rev().find(|m| m.has_details())
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl HistoryStore for MemoryBuffer {
    fn append(&mut self, measurement: &Measurement) -> Result<(), SensorError> {
        self.push(measurement.clone());
        Ok(())
    }

    fn last(&self, n: usize) -> Result<Vec<Measurement>, SensorError> {
        Ok(MemoryBuffer::last(self, n))
    }

    fn prune_before(&mut self, cutoff: DateTime<Utc>) -> Result<usize, SensorError> {
        let before = self.samples.len();
        self.samples
            .retain(|m| m.parsed_timestamp().map_or(true, |ts| ts >= cutoff));
        Ok(before - self.samples.len())
    }
}

/// Age-based pruning of a history store, run at most once per cleanup interval.
#[derive(Debug, Clone)]
pub struct Retention {
    pub period: TimeDelta,
    pub cleanup_interval: TimeDelta,
    last_cleanup: Option<DateTime<Utc>>,
}

impl Retention {
    pub fn new(period: TimeDelta) -> Self {
        Self {
            period,
            cleanup_interval: TimeDelta::hours(24),
            last_cleanup: None,
        }
    }

    pub fn days(days: u32) -> Self {
        Self::new(TimeDelta::days(i64::from(days)))
    }

    /// Prune `store` if the cleanup interval elapsed since the last run.
    pub fn run<H: HistoryStore>(&mut self, store: &mut H, now: DateTime<Utc>) -> Result<usize, SensorError> {
        if let Some(last) = self.last_cleanup {
            if now - last < self.cleanup_interval {
                return Ok(0);
            }
        }

        let removed = store.prune_before(now - self.period)?;
        self.last_cleanup = Some(now);
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn sample(hours: i64, percentage: u8) -> Measurement {
        let base = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        Measurement::new(base + TimeDelta::hours(hours), percentage, "discharging")
    }

    #[test]
    fn test_jsonl_append_and_last() {
        let dir = TempDir::new().unwrap();
        let mut store = JsonlStore::open(dir.path().join("nested")).unwrap();
        assert!(store.last(10).unwrap().is_empty());

        for (hours, pct) in [(0, 90), (2, 80), (1, 85)] {
            store.append(&sample(hours, pct)).unwrap();
        }

        let all = store.last(10).unwrap();
        let percentages: Vec<u8> = all.iter().map(|m| m.percentage).collect();
        assert_eq!(percentages, vec![90, 85, 80]);

        let newest = store.last(2).unwrap();
        assert_eq!(newest.len(), 2);
        assert_eq!(newest[1].percentage, 80);
    }

    #[test]
    fn test_jsonl_skips_malformed_lines() {
        let dir = TempDir::new().unwrap();
        let mut store = JsonlStore::open(dir.path()).unwrap();
        store.append(&sample(0, 70)).unwrap();

        let mut file = OpenOptions::new().append(true).open(store.path()).unwrap();
        writeln!(file, "{{not json").unwrap();
        writeln!(file).unwrap();
        drop(file);

        store.append(&sample(1, 69)).unwrap();
        assert_eq!(store.last(10).unwrap().len(), 2);
    }

    #[test]
    fn test_jsonl_prune() {
        let dir = TempDir::new().unwrap();
        let mut store = JsonlStore::open(dir.path()).unwrap();
        for hours in 0..5 {
            store.append(&sample(hours, 90 - hours as u8)).unwrap();
        }
        let mut broken = sample(0, 50);
        broken.timestamp = "yesterday".to_string();
        store.append(&broken).unwrap();

        let cutoff = sample(3, 0).parsed_timestamp().unwrap();
        assert_eq!(store.prune_before(cutoff).unwrap(), 3);

        let remaining = store.last(10).unwrap();
        assert_eq!(remaining.len(), 3);
        assert!(remaining.iter().any(|m| m.timestamp == "yesterday"));
        assert_eq!(store.prune_before(cutoff).unwrap(), 0);
    }

    #[test]
    fn test_memory_buffer_bounded() {
        let mut buffer = MemoryBuffer::new(3);
        assert!(buffer.is_empty());
        for pct in [90, 89, 88, 87] {
            buffer.push(sample(0, pct));
        }
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.latest().map(|m| m.percentage), Some(87));

        let last_two: Vec<u8> = buffer.last(2).iter().map(|m| m.percentage).collect();
        assert_eq!(last_two, vec![88, 87]);
        assert_eq!(buffer.last(10).len(), 3);
    }

    #[test]
    fn test_memory_buffer_latest_detailed() {
        let mut buffer = MemoryBuffer::new(5);
        let mut detailed = sample(0, 80);
        detailed.full_charge_capacity = 4800;
        buffer.push(detailed);
        buffer.push(sample(1, 79));

        assert_eq!(buffer.latest_detailed().map(|m| m.percentage), Some(80));
    }

    #[test]
    fn test_retention_runs_once_per_interval() {
        let mut buffer = MemoryBuffer::new(10);
        for hours in 0..4 {
            buffer.push(sample(hours * 24, 80));
        }

        let mut retention = Retention::days(2);
        let now = sample(72, 0).parsed_timestamp().unwrap();
        // keeps days 1..=3
        assert_eq!(retention.run(&mut buffer, now).unwrap(), 1);

        buffer.push(sample(0, 80));
        assert_eq!(retention.run(&mut buffer, now + TimeDelta::hours(1)).unwrap(), 0);
        // cutoff moves past hour 48, taking the late arrival with it
        assert_eq!(retention.run(&mut buffer, now + TimeDelta::hours(25)).unwrap(), 3);
    }
}
