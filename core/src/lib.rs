//! # powerwatch-rs-core
//!
//! Core library for the powerwatch-rs battery telemetry suite providing the
//! shared data model and plumbing used by the analysis engine and the
//! battery collector.
//!
//! ## Features
//!
//! - **Measurement model** - One record per sampled battery observation
//! - **Derived records** - Cycles, trend, health and advanced metrics
//! - **Collaborator traits** - `SampleSource` and `HistoryStore` seams
//! - **Configuration management** - RON-based configuration with validation
//! - **Error handling** - Comprehensive error types with context
//!
//! ## Quick Start
//!
//! ```rust
//! use powerwatch_rs_core::{HistoryStore, Measurement, SensorError};
//!
//! // Keep everything in a plain vector
//! struct VecStore(Vec<Measurement>);
//!
//! impl HistoryStore for VecStore {
//!     fn append(&mut self, measurement: &Measurement) -> Result<(), SensorError> {
//!         self.0.push(measurement.clone());
//!         Ok(())
//!     }
//!
//!     fn last(&self, n: usize) -> Result<Vec<Measurement>, SensorError> {
//!         let start = self.0.len().saturating_sub(n);
//!         Ok(self.0[start..].to_vec())
//!     }
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// One sampled observation of battery state.
///
/// Capacity, temperature and electrical fields use `0` for "not sampled this
/// round": expensive metrics are refreshed less often than percentage and
/// state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Measurement {
    /// RFC 3339 UTC timestamp
    pub timestamp: String,
    /// Charge level (0-100)
    pub percentage: u8,
    /// Free-form charging state (`charging`, `discharging`, `charged`, `finishing`, ...)
    pub state: String,
    /// Cumulative charge cycles reported by hardware
    #[serde(default)]
    pub cycle_count: u32,
    /// Full charge capacity (mAh)
    #[serde(default)]
    pub full_charge_capacity: u32,
    /// Design capacity (mAh)
    #[serde(default)]
    pub design_capacity: u32,
    /// Current capacity (mAh)
    #[serde(default)]
    pub current_capacity: u32,
    /// Temperature (°C), 0 when unknown
    #[serde(default)]
    pub temperature: i32,
    /// Voltage (mV)
    #[serde(default)]
    pub voltage: i32,
    /// Current (mA) - positive while charging, negative while discharging
    #[serde(default)]
    pub amperage: i32,
    /// Power (mW)
    #[serde(default)]
    pub power: i32,
    /// Hardware condition label from firmware, empty when absent
    #[serde(default, rename = "apple_condition")]
    pub condition: String,
}

impl Measurement {
    /// Create a basic measurement with only the cheap fields populated.
    pub fn new(timestamp: DateTime<Utc>, percentage: u8, state: impl Into<String>) -> Self {
        Self {
            timestamp: format_timestamp(&timestamp),
            percentage: percentage.min(100),
            state: state.into(),
            ..Self::default()
        }
    }

    /// Parse the stored timestamp. Returns `None` for malformed text.
    pub fn parsed_timestamp(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.timestamp)
    }

    /// Classify the free-form state string.
    pub fn charge_state(&self) -> ChargeState {
        ChargeState::from_state(&self.state)
    }

    /// Whether the expensive detail fields were sampled for this record.
    pub fn has_details(&self) -> bool {
        self.design_capacity > 0 || self.full_charge_capacity > 0 || self.current_capacity > 0
    }

    /// Copy detail fields (capacities, electrical values, condition) from `other`.
    pub fn carry_details_from(&mut self, other: &Measurement) {
        self.cycle_count = other.cycle_count;
        self.full_charge_capacity = other.full_charge_capacity;
        self.design_capacity = other.design_capacity;
        self.current_capacity = other.current_capacity;
        self.temperature = other.temperature;
        self.voltage = other.voltage;
        self.amperage = other.amperage;
        self.power = other.power;
        self.condition = other.condition.clone();
    }

    /// Set `power` from voltage and amperage when both were sampled.
    pub fn derive_power(&mut self) {
        if self.voltage > 0 && self.amperage != 0 {
            self.power = ((i64::from(self.voltage) * i64::from(self.amperage)) / 1000) as i32;
        }
    }
}

/// Format an instant the way measurements store it.
pub fn format_timestamp(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

/// Parse an RFC 3339 timestamp into UTC.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Charging state classification.
///
/// Unknown strings map to `Other` instead of being rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChargeState {
    Charging,
    Discharging,
    Charged,
    Finishing,
    Other(String),
}

impl ChargeState {
    pub fn from_state(state: &str) -> Self {
        match state.trim().to_lowercase().as_str() {
            "charging" => Self::Charging,
            "discharging" => Self::Discharging,
            "charged" => Self::Charged,
            "finishing" => Self::Finishing,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Charging => "charging",
            Self::Discharging => "discharging",
            Self::Charged => "charged",
            Self::Finishing => "finishing",
            Self::Other(s) => s,
        }
    }
}

impl fmt::Display for ChargeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A charge or discharge segment between two state transitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeCycle {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub start_percent: u8,
    pub end_percent: u8,
    /// Lower-cased state of the segment
    pub cycle_type: String,
    /// Capacity lost over the segment (mAh); zero when capacities were not sampled
    pub capacity_loss: i64,
}

/// Long-horizon capacity degradation estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendAnalysis {
    /// Percent of design capacity per month, negative while degrading
    pub degradation_rate: f64,
    /// Days until capacity reaches 80% of design
    pub projected_days: Option<u32>,
    pub is_healthy: bool,
}

impl TrendAnalysis {
    /// Result used whenever the data is too sparse to judge.
    pub const fn healthy_by_default() -> Self {
        Self {
            degradation_rate: 0.0,
            projected_days: None,
            is_healthy: true,
        }
    }
}

impl Default for TrendAnalysis {
    fn default() -> Self {
        Self::healthy_by_default()
    }
}

/// Direction of recent power draw.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerTrend {
    Rising,
    Falling,
    Stable,
    #[default]
    Unknown,
}

impl fmt::Display for PowerTrend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerTrend::Rising => write!(f, "rising consumption"),
            PowerTrend::Falling => write!(f, "falling consumption"),
            PowerTrend::Stable => write!(f, "stable"),
            PowerTrend::Unknown => write!(f, "unknown"),
        }
    }
}

/// Electrical and efficiency metrics derived from a history window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdvancedMetrics {
    pub power_efficiency: f64,
    /// Percent, 100 means perfectly flat voltage; `None` with fewer than two voltage samples
    pub voltage_stability: Option<f64>,
    pub charging_efficiency: f64,
    pub power_trend: PowerTrend,
    /// Composite rating (0-100)
    pub health_rating: u8,
    /// Firmware condition label, or one derived from the rating
    pub condition: String,
}

/// Base health classification from wear and cycle count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    Excellent,
    Good,
    Fair,
    NeedsAttention,
    Poor,
}

impl HealthStatus {
    /// Score before anomaly and trend adjustments.
    pub const fn base_score(self) -> i32 {
        match self {
            HealthStatus::Excellent => 95,
            HealthStatus::Good => 85,
            HealthStatus::Fair => 70,
            HealthStatus::NeedsAttention => 50,
            HealthStatus::Poor => 30,
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::Excellent => write!(f, "Excellent"),
            HealthStatus::Good => write!(f, "Good"),
            HealthStatus::Fair => write!(f, "Fair"),
            HealthStatus::NeedsAttention => write!(f, "Needs attention"),
            HealthStatus::Poor => write!(f, "Poor"),
        }
    }
}

/// Composite health analysis. Only ever exists as a return value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthAnalysis {
    pub wear_percent: f64,
    pub cycle_count: u32,
    pub base_status: HealthStatus,
    /// Status label including adjustment suffixes
    pub status: String,
    pub score: i32,
    /// Robust discharge rate (mAh/h)
    pub discharge_rate: f64,
    /// Intervals that survived outlier rejection
    pub valid_intervals: usize,
    pub anomalies: Vec<String>,
    pub recommendations: Vec<String>,
    pub trend: TrendAnalysis,
    pub cycles: Vec<ChargeCycle>,
    pub metrics: AdvancedMetrics,
}

/// Something that can produce a measurement on demand.
pub trait SampleSource {
    /// Error type for sampling operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Take a cheap sample: timestamp, percentage and state.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be read.
    fn sample(&mut self) -> Result<Measurement, Self::Error>;

    /// Fill in the expensive detail fields of `measurement`.
    ///
    /// # Errors
    ///
    /// Returns an error if the detail data cannot be read.
    fn read_details(&mut self, measurement: &mut Measurement) -> Result<(), Self::Error>;

    /// Stable identifier for logging.
    fn name(&self) -> &str;

    /// Check if the source is available on this system.
    fn check_availability(&self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Append-only measurement history.
pub trait HistoryStore {
    /// Append one measurement.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be persisted.
    fn append(&mut self, measurement: &Measurement) -> Result<(), SensorError>;

    /// Return the most recent `n` measurements, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the history cannot be read.
    fn last(&self, n: usize) -> Result<Vec<Measurement>, SensorError>;

    /// Drop measurements older than `cutoff`, returning how many were removed.
    fn prune_before(&mut self, _cutoff: DateTime<Utc>) -> Result<usize, SensorError> {
        Ok(0)
    }
}

/// Global configuration loaded from ~/.config/powerwatch-rs/config.ron
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GlobalConfig {
    /// Basic sample interval in milliseconds
    #[serde(default = "default_sample_interval")]
    pub sample_interval: u64,
    /// Interval between detail reads in milliseconds
    #[serde(default = "default_detail_interval")]
    pub detail_interval: u64,
    /// Number of samples fed to the analysis engine
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    /// In-memory buffer size
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    /// Days of history kept on disk
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    /// Trailing window (intervals) for discharge rate estimation
    #[serde(default = "default_rate_window")]
    pub rate_window: usize,
    /// Override for the history directory
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    /// Battery device name (e.g. BAT0); auto-detected when unset
    #[serde(default)]
    pub battery: Option<String>,
}

fn default_sample_interval() -> u64 {
    30_000
}

fn default_detail_interval() -> u64 {
    120_000
}

fn default_history_limit() -> usize {
    1000
}

fn default_buffer_size() -> usize {
    500
}

fn default_retention_days() -> u32 {
    90
}

fn default_rate_window() -> usize {
    10
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            sample_interval: default_sample_interval(),
            detail_interval: default_detail_interval(),
            history_limit: default_history_limit(),
            buffer_size: default_buffer_size(),
            retention_days: default_retention_days(),
            rate_window: default_rate_window(),
            data_dir: None,
            battery: None,
        }
    }
}

impl GlobalConfig {
    /// Load configuration from the standard config file location.
    ///
    /// Searches for config in:
    /// 1. ~/.config/powerwatch-rs/config.ron
    /// 2. ~/.powerwatch-rs/config.ron (fallback)
    ///
    /// Returns default config if no file is found.
    pub fn load() -> Result<Self, SensorError> {
        if let Some(config_path) = Self::find_config_file() {
            Self::load_from_file(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from_file(path: &Path) -> Result<Self, SensorError> {
        let content = std::fs::read_to_string(path)?;

        let config: GlobalConfig = ron::from_str(&content)
            .map_err(|e| SensorError::parse_with_source("Failed to parse config file", e))?;

        config.validate()?;
        Ok(config)
    }

    /// Find the config file in standard locations.
    pub fn find_config_file() -> Option<PathBuf> {
        if let Some(config_dir) = dirs::config_dir() {
            let xdg_path = config_dir.join("powerwatch-rs").join("config.ron");
            if xdg_path.exists() {
                return Some(xdg_path);
            }
        }

        if let Some(home_dir) = dirs::home_dir() {
            let home_path = home_dir.join(".powerwatch-rs").join("config.ron");
            if home_path.exists() {
                return Some(home_path);
            }
        }

        None
    }

    /// Get the default config file path for writing.
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("powerwatch-rs").join("config.ron"))
    }

    /// Resolve the directory holding the measurement history.
    pub fn data_dir(&self) -> Option<PathBuf> {
        self.data_dir.clone().or_else(|| {
            dirs::data_dir()
                .map(|dir| dir.join("powerwatch-rs"))
                .or_else(|| dirs::home_dir().map(|dir| dir.join(".powerwatch-rs")))
        })
    }

    /// Check that the settings make sense together.
    pub fn validate(&self) -> Result<(), SensorError> {
        if self.sample_interval < 1000 {
            return Err(SensorError::config_with_value(
                "sample_interval must be at least 1000ms",
                self.sample_interval.to_string(),
            ));
        }
        if self.detail_interval < self.sample_interval {
            return Err(SensorError::config_with_value(
                "detail_interval must not be shorter than sample_interval",
                self.detail_interval.to_string(),
            ));
        }
        if self.history_limit == 0 {
            return Err(SensorError::config("history_limit must be positive"));
        }
        if self.buffer_size == 0 {
            return Err(SensorError::config("buffer_size must be positive"));
        }
        Ok(())
    }

    pub fn sample_interval_duration(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.sample_interval)
    }

    pub fn detail_interval_duration(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.detail_interval)
    }

    /// Save configuration to a specific file path.
    pub fn save_to_file(&self, path: &Path) -> Result<(), SensorError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| SensorError::parse_with_source("Failed to serialize config", e))?;

        std::fs::write(path, content)?;

        Ok(())
    }

    /// Create an example configuration with common settings.
    pub fn example_config() -> Self {
        let mut config = Self::default();
        config.battery = Some("BAT0".to_string());
        config.retention_days = 180;
        config
    }

    /// Save example configuration with documentation to a file.
    pub fn save_example_config_to_file(path: &Path) -> Result<(), SensorError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let body = ron::ser::to_string_pretty(&Self::example_config(), ron::ser::PrettyConfig::default())
            .map_err(|e| SensorError::parse_with_source("Failed to serialize config", e))?;

        let content = format!(
            "// powerwatch-rs configuration\n\
             //\n\
             // sample_interval:  milliseconds between percentage/state samples\n\
             // detail_interval:  milliseconds between capacity/voltage reads\n\
             // history_limit:    samples fed to the analysis engine\n\
             // retention_days:   history older than this is pruned\n\
             // rate_window:      intervals used for the discharge rate\n\
             {}\n",
            body
        );

        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Formatting helpers shared by the CLI and the analysis engine.
pub mod format {
    use std::time::Duration;

    /// Render a duration as `Xh YYm`, or `Ym` below one hour.
    pub fn duration_hm(duration: Duration) -> String {
        let total_minutes = duration.as_secs() / 60;
        let hours = total_minutes / 60;
        let minutes = total_minutes % 60;
        if hours > 0 {
            format!("{}h {:02}m", hours, minutes)
        } else {
            format!("{}m", minutes)
        }
    }

    /// Extract `HH:MM:SS` from an RFC 3339 timestamp, or the whole text if it is too short.
    pub fn time_of_day(timestamp: &str) -> &str {
        timestamp.get(11..19).unwrap_or(timestamp)
    }

    /// Create a bar gauge for a percentage value.
    pub fn create_gauge(percentage: f64, width: usize) -> String {
        let filled = ((percentage.clamp(0.0, 100.0) / 100.0) * width as f64).round() as usize;
        let empty = width.saturating_sub(filled);
        format!("{}{}", "█".repeat(filled), "░".repeat(empty))
    }

    /// Format a key/value summary line with aligned keys.
    pub fn key_value(key: &str, value: &str) -> String {
        format!("{:<22} {}", format!("{}:", key), value)
    }
}

/// Common error types for collection, storage and configuration.
#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    /// I/O error occurred while reading or writing data.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error parsing data from text format.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of what failed to parse
        message: String,
        /// Optional source error for chaining
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration error (invalid settings, etc.).
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration issue
        message: String,
        /// The invalid configuration value if applicable
        value: Option<String>,
    },

    /// Source is not available on this system.
    #[error("Sensor unavailable: {reason}")]
    Unavailable {
        /// Reason why the source is unavailable
        reason: String,
        /// Whether this is a temporary or permanent condition
        is_temporary: bool,
    },
}

impl SensorError {
    /// Create a new parse error with a source error.
    pub fn parse_with_source<S: Into<String>, E>(message: S, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Parse {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a new configuration error.
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
            value: None,
        }
    }

    /// Create a new configuration error with the invalid value.
    pub fn config_with_value<S: Into<String>, V: Into<String>>(message: S, value: V) -> Self {
        Self::Config {
            message: message.into(),
            value: Some(value.into()),
        }
    }

    /// Create a new unavailable error.
    pub fn unavailable<S: Into<String>>(reason: S) -> Self {
        Self::Unavailable {
            reason: reason.into(),
            is_temporary: false,
        }
    }

    /// Create a new temporary unavailable error.
    pub fn temporarily_unavailable<S: Into<String>>(reason: S) -> Self {
        Self::Unavailable {
            reason: reason.into(),
            is_temporary: true,
        }
    }

    /// Check if this error represents a temporary condition.
    #[must_use]
    pub fn is_temporary(&self) -> bool {
        match self {
            Self::Unavailable { is_temporary, .. } => *is_temporary,
            Self::Io(err) => matches!(
                err.kind(),
                std::io::ErrorKind::Interrupted | std::io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }
}
