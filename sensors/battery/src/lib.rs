//! Battery sampling, history storage and the collection loop for powerwatch-rs.

pub mod battery;
pub mod collector;
pub mod error;
pub mod store;

pub use battery::{map_status, SysfsBattery, POWER_SUPPLY_ROOT};
pub use collector::Collector;
pub use error::{BatteryError, Result};
pub use store::{JsonlStore, MemoryBuffer, Retention};
