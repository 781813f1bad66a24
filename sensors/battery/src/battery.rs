use chrono::Utc;
use log::debug;
use powerwatch_rs_core::{ChargeState, Measurement, SampleSource};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{BatteryError, Result};

/// Default sysfs location of power supply devices.
pub const POWER_SUPPLY_ROOT: &str = "/sys/class/power_supply";

/// Battery sample source backed by the Linux power supply class.
#[derive(Debug)]
pub struct SysfsBattery {
    name: String,
    battery_path: PathBuf,
}

/// Map a sysfs `status` value onto the measurement state vocabulary.
pub fn map_status(raw: &str) -> ChargeState {
    match raw.trim() {
        "Full" => ChargeState::Charged,
        "Not charging" => ChargeState::Finishing,
        other => ChargeState::from_state(other),
    }
}

fn is_battery(path: &Path) -> bool {
    fs::read_to_string(path.join("type"))
        .map(|device_type| device_type.trim() == "Battery")
        .unwrap_or(false)
}

impl SysfsBattery {
    pub fn new(battery_name: Option<String>) -> Result<Self> {
        Self::with_root(POWER_SUPPLY_ROOT, battery_name)
    }

    /// Open a battery below `root`, auto-detecting the first one when no name is given.
    pub fn with_root(root: impl AsRef<Path>, battery_name: Option<String>) -> Result<Self> {
        let root = root.as_ref();
        let battery_path = if let Some(name) = battery_name {
            root.join(name)
        } else {
            Self::find_battery(root)?
        };

        if !battery_path.exists() {
            return Err(BatteryError::battery_not_found(battery_path.display().to_string()));
        }

        let type_path = battery_path.join("type");
        if type_path.exists() {
            let device_type = fs::read_to_string(&type_path)?.trim().to_string();
            if device_type != "Battery" {
                return Err(BatteryError::NotABattery {
                    path: battery_path.display().to_string(),
                    device_type,
                });
            }
        }

        let name = battery_path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("battery")
            .to_string();

        Ok(Self { name, battery_path })
    }

    fn find_battery(root: &Path) -> Result<PathBuf> {
        let mut candidates: Vec<PathBuf> = fs::read_dir(root)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_battery(path))
            .collect();
        candidates.sort();

        candidates
            .into_iter()
            .next()
            .ok_or_else(|| BatteryError::battery_not_found(root.display().to_string()))
    }

    /// Names of all battery devices below `root`.
    pub fn list_available_batteries(root: impl AsRef<Path>) -> Result<Vec<String>> {
        let root = root.as_ref();
        if !root.exists() {
            return Ok(Vec::new());
        }

        let mut batteries: Vec<String> = fs::read_dir(root)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_battery(path))
            .filter_map(|path| path.file_name().and_then(|s| s.to_str()).map(str::to_string))
            .collect();
        batteries.sort();

        Ok(batteries)
    }

    pub fn path(&self) -> &Path {
        &self.battery_path
    }

    fn read_file(&self, filename: &str) -> Result<String> {
        Ok(fs::read_to_string(self.battery_path.join(filename))?
            .trim()
            .to_string())
    }

    fn read_u64(&self, filename: &str) -> Option<u64> {
        self.read_file(filename).ok()?.parse().ok()
    }

    fn read_i64(&self, filename: &str) -> Option<i64> {
        self.read_file(filename).ok()?.parse().ok()
    }

    fn read_string(&self, filename: &str) -> Option<String> {
        self.read_file(filename).ok().filter(|s| !s.is_empty())
    }

    /// Capacities in mAh: (full, design, now).
    fn read_capacities(&self) -> Option<(u32, u32, u32)> {
        let to_mah = |micro_ah: u64| (micro_ah / 1000) as u32;

        if let (Some(full), Some(design)) = (self.read_u64("charge_full"), self.read_u64("charge_full_design")) {
            let now = self.read_u64("charge_now").unwrap_or(0);
            return Some((to_mah(full), to_mah(design), to_mah(now)));
        }

        // energy-reporting batteries: µWh / V -> µAh
        let (full, design) = (self.read_u64("energy_full")?, self.read_u64("energy_full_design")?);
        let now = self.read_u64("energy_now").unwrap_or(0);
        let voltage = self
            .read_u64("voltage_min_design")
            .or_else(|| self.read_u64("voltage_now"))
            .filter(|v| *v > 0)?;
        let micro_ah = |micro_wh: u64| micro_wh.saturating_mul(1_000_000) / voltage;
        Some((to_mah(micro_ah(full)), to_mah(micro_ah(design)), to_mah(micro_ah(now))))
    }
}

impl SampleSource for SysfsBattery {
    type Error = BatteryError;

    fn sample(&mut self) -> Result<Measurement> {
        let percentage: u8 = self.read_file("capacity")?.parse()?;
        let state = map_status(&self.read_file("status")?);

        Ok(Measurement::new(Utc::now(), percentage, state.as_str()))
    }

    fn read_details(&mut self, measurement: &mut Measurement) -> Result<()> {
        let (full, design, now) = self
            .read_capacities()
            .ok_or_else(|| BatteryError::parse("capacity", "no charge_* or energy_* files"))?;
        measurement.full_charge_capacity = full;
        measurement.design_capacity = design;
        measurement.current_capacity = now;

        if let Some(cycles) = self.read_u64("cycle_count") {
            measurement.cycle_count = cycles as u32;
        }

        let voltage_uv = self.read_i64("voltage_now");
        if let Some(voltage) = voltage_uv {
            measurement.voltage = (voltage / 1000) as i32;
        }

        let current_ua = self.read_i64("current_now").or_else(|| {
            let power_uw = self.read_i64("power_now")?;
            let voltage = voltage_uv.filter(|v| *v > 0)?;
            Some(power_uw * 1_000_000 / voltage)
        });
        if let Some(current) = current_ua {
            let milliamps = (current / 1000) as i32;
            // sysfs reports magnitude only on many drivers
            measurement.amperage = if measurement.charge_state() == ChargeState::Discharging {
                -milliamps.abs()
            } else {
                milliamps.abs()
            };
        }

        if let Some(tenths) = self.read_i64("temp") {
            measurement.temperature = (tenths / 10) as i32;
        }

        if let Some(condition) = self.read_string("health").or_else(|| self.read_string("capacity_level")) {
            measurement.condition = condition;
        }

        debug!(
            "{}: full {} mAh, design {} mAh, now {} mAh",
            self.name, full, design, now
        );
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn check_availability(&self) -> Result<()> {
        self.read_file("capacity")?;
        self.read_file("status")?;
        Ok(())
    }
}
