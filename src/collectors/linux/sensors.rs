//! Battery state from /sys/class/power_supply

use crate::data::{Battery, BatteryStatus};
use crate::error::Result;
use std::fs;
use std::path::Path;
use std::time::Duration;

const POWER_SUPPLY: &str = "/sys/class/power_supply";

pub fn battery() -> Result<Battery> {
    battery_from(Path::new(POWER_SUPPLY))
}

/// First `type=Battery` supply under `root`; no battery hardware is `NotPresent`
pub(crate) fn battery_from(root: &Path) -> Result<Battery> {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(_) => return Ok(Battery::not_present()),
    };

    let mut supplies: Vec<_> = entries.filter_map(|e| e.ok()).map(|e| e.path()).collect();
    supplies.sort();

    for supply in supplies {
        let kind = read_value(&supply, "type");
        let is_battery = match kind.as_deref() {
            Some(kind) => kind == "Battery",
            None => supply
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with("BAT"))
                .unwrap_or(false),
        };
        // Peripheral batteries (mice, headsets) report scope=Device
        if !is_battery || read_value(&supply, "scope").as_deref() == Some("Device") {
            continue;
        }
        if read_value(&supply, "present").as_deref() == Some("0") {
            continue;
        }

        let status = match read_value(&supply, "status").as_deref() {
            Some("Charging") => BatteryStatus::Charging,
            Some("Discharging") => BatteryStatus::Discharging,
            Some("Full") => BatteryStatus::Full,
            _ => BatteryStatus::Unknown,
        };
        let percentage = read_value(&supply, "capacity")
            .and_then(|c| c.parse::<u8>().ok())
            .map(|c| c.min(100));
        let time_remaining = if status == BatteryStatus::Discharging {
            time_to_empty(&supply)
        } else {
            None
        };

        return Ok(Battery::new(status, percentage, time_remaining));
    }

    Ok(Battery::not_present())
}

fn read_value(dir: &Path, name: &str) -> Option<String> {
    fs::read_to_string(dir.join(name))
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn read_number(dir: &Path, name: &str) -> Option<f64> {
    read_value(dir, name)?.parse().ok()
}

/// energy_now / power_now (µWh / µW) or charge_now / current_now (µAh / µA)
fn time_to_empty(supply: &Path) -> Option<Duration> {
    if let Some(secs) = read_number(supply, "time_to_empty_now") {
        return (secs > 0.0).then(|| Duration::from_secs(secs as u64));
    }
    let (remaining, rate) = match (read_number(supply, "energy_now"), read_number(supply, "power_now")) {
        (Some(energy), Some(power)) => (energy, power),
        _ => (read_number(supply, "charge_now")?, read_number(supply, "current_now")?),
    };
    if rate <= 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(remaining / rate * 3600.0).ok()
}
