//! Hardware-specific information structures

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Used and total bytes of a resource (memory, disk)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceUsage {
    pub used_bytes: u64,
    pub total_bytes: u64,
}

impl ResourceUsage {
    /// Build a usage record, clamping `used` so it never exceeds `total`
    pub fn new(used_bytes: u64, total_bytes: u64) -> Self {
        Self {
            used_bytes: used_bytes.min(total_bytes),
            total_bytes,
        }
    }

    pub fn percent(&self) -> f64 {
        if self.total_bytes == 0 {
            0.0
        } else {
            self.used_bytes as f64 / self.total_bytes as f64 * 100.0
        }
    }
}

/// Logical and physical core counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuCores {
    pub logical: usize,
    pub physical: usize,
}

impl CpuCores {
    /// `physical` is capped at `logical`; a zero physical count falls back to logical
    pub fn new(logical: usize, physical: usize) -> Self {
        let physical = if physical == 0 { logical } else { physical.min(logical) };
        Self { logical, physical }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatteryStatus {
    Unknown,
    Charging,
    Discharging,
    Full,
    NotPresent,
}

/// Battery state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Battery {
    pub status: BatteryStatus,
    pub percentage: Option<u8>,
    pub time_remaining: Option<Duration>,
}

impl Battery {
    pub fn new(status: BatteryStatus, percentage: Option<u8>, time_remaining: Option<Duration>) -> Self {
        if status == BatteryStatus::NotPresent {
            return Self::not_present();
        }
        Self {
            status,
            percentage: percentage.map(|p| p.min(100)),
            time_remaining,
        }
    }

    pub fn not_present() -> Self {
        Self {
            status: BatteryStatus::NotPresent,
            percentage: None,
            time_remaining: None,
        }
    }
}

/// A connected display output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayInfo {
    pub id: String,
    pub width: u32,
    pub height: u32,
    pub refresh_hz: f64,
    pub primary: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInterface {
    pub name: String,
    pub addresses: Vec<String>,
    pub primary: bool,
    pub up: bool,
}
