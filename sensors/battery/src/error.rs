//! Error handling for battery sampling operations.

use powerwatch_rs_core::SensorError;
use thiserror::Error;

/// Result type for battery operations
pub type Result<T> = std::result::Result<T, BatteryError>;

/// Error types for battery sampling
#[derive(Error, Debug, Clone)]
pub enum BatteryError {
    /// I/O error while reading sysfs
    #[error("Battery I/O error: {message}")]
    Io { message: String },

    /// Battery not found or unavailable
    #[error("Battery not found: {battery_id}")]
    BatteryNotFound { battery_id: String },

    /// Device exists but is not a battery
    #[error("Not a battery: {path} (type: {device_type})")]
    NotABattery { path: String, device_type: String },

    /// Parsing error for battery data
    #[error("Failed to parse battery data: {data_type} - {reason}")]
    Parse { data_type: String, reason: String },

    /// Permission denied for battery operations
    #[error("Permission denied: {operation}")]
    Permission { operation: String },

    /// Storage error while persisting samples
    #[error("History storage error: {reason}")]
    Storage { reason: String },
}

impl BatteryError {
    /// Create an I/O error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Create a battery not found error
    pub fn battery_not_found(battery_id: impl Into<String>) -> Self {
        Self::BatteryNotFound {
            battery_id: battery_id.into(),
        }
    }

    /// Create a parsing error
    pub fn parse(data_type: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parse {
            data_type: data_type.into(),
            reason: reason.into(),
        }
    }

    /// Create a storage error
    pub fn storage(reason: impl Into<String>) -> Self {
        Self::Storage {
            reason: reason.into(),
        }
    }

    /// Check if error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            BatteryError::Io { .. } => true,
            BatteryError::BatteryNotFound { .. } => false,
            BatteryError::NotABattery { .. } => false,
            BatteryError::Parse { .. } => true,
            BatteryError::Permission { .. } => false,
            BatteryError::Storage { .. } => true,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            BatteryError::Io { .. } => "io",
            BatteryError::BatteryNotFound { .. } => "not_found",
            BatteryError::NotABattery { .. } => "not_a_battery",
            BatteryError::Parse { .. } => "parse",
            BatteryError::Permission { .. } => "permission",
            BatteryError::Storage { .. } => "storage",
        }
    }
}

impl From<std::io::Error> for BatteryError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => BatteryError::Permission {
                operation: err.to_string(),
            },
            _ => BatteryError::io(err.to_string()),
        }
    }
}

impl From<std::num::ParseIntError> for BatteryError {
    fn from(err: std::num::ParseIntError) -> Self {
        BatteryError::parse("integer", err.to_string())
    }
}

impl From<SensorError> for BatteryError {
    fn from(err: SensorError) -> Self {
        BatteryError::storage(err.to_string())
    }
}

impl From<BatteryError> for SensorError {
    fn from(err: BatteryError) -> Self {
        match err {
            BatteryError::BatteryNotFound { .. } | BatteryError::NotABattery { .. } => {
                SensorError::unavailable(err.to_string())
            }
            BatteryError::Parse { .. } => SensorError::parse_with_source("battery data", err),
            other if other.is_recoverable() => SensorError::temporarily_unavailable(other.to_string()),
            other => SensorError::unavailable(other.to_string()),
        }
    }
}
