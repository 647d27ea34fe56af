//! Platform-independent result shapes returned by the collectors

pub mod hardware;
pub mod system;

pub use hardware::{Battery, BatteryStatus, CpuCores, DisplayInfo, NetworkInterface, ResourceUsage};
pub use system::{MediaInfo, OperatingSystem};
