//! Host information collectors
//!
//! Each collector has one platform-independent result shape. The backend is chosen
//! at compile time; collectors marked cacheable memoise their result through the
//! [`CacheManager`] under a fixed key, the rest always hit the OS.

use crate::cache::CacheManager;
use crate::data::{Battery, CpuCores, DisplayInfo, MediaInfo, NetworkInterface};
use crate::data::{OperatingSystem, ResourceUsage};
use crate::error::{DracError, DracErrorCode, Result};
use chrono::Datelike;
use std::time::Duration;

pub mod packages;

#[cfg(unix)]
mod unix;

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "linux")]
use linux as platform;

#[cfg(target_os = "macos")]
mod macos;
#[cfg(target_os = "macos")]
use macos as platform;

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
mod unsupported;
#[cfg(not(any(target_os = "linux", target_os = "macos")))]
use unsupported as platform;

/// Cache keys of the memoised collectors
pub mod keys {
    pub const OS_VERSION: &str = "os_version";
    pub const KERNEL: &str = "kernel";
    pub const HOST: &str = "host";
    pub const CPU_MODEL: &str = "cpu_model";
    pub const CPU_CORES: &str = "cpu_cores";
    pub const GPU_MODEL: &str = "gpu_model";
    pub const SHELL: &str = "shell";
    pub const DESKTOP_ENVIRONMENT: &str = "desktop_environment";
    pub const WINDOW_MANAGER: &str = "window_manager";
    pub const DISPLAYS: &str = "displays";
    pub const NETWORK_INTERFACES: &str = "network_interfaces";
}

pub fn get_operating_system(cache: &CacheManager) -> Result<OperatingSystem> {
    cache.get_or_set_default(keys::OS_VERSION, platform::operating_system)
}

pub fn get_kernel_version(cache: &CacheManager) -> Result<String> {
    cache.get_or_set_default(keys::KERNEL, platform::kernel_version)
}

/// Host/product model, e.g. "MacBookPro18,3" or "ThinkPad X1 Carbon Gen 9"
pub fn get_host(cache: &CacheManager) -> Result<String> {
    cache.get_or_set_default(keys::HOST, platform::host)
}

pub fn get_cpu_model(cache: &CacheManager) -> Result<String> {
    cache.get_or_set_default(keys::CPU_MODEL, platform::cpu_model)
}

pub fn get_cpu_cores(cache: &CacheManager) -> Result<CpuCores> {
    cache.get_or_set_default(keys::CPU_CORES, platform::cpu_cores)
}

/// Primary GPU; `NotSupported` without a display subsystem
pub fn get_gpu_model(cache: &CacheManager) -> Result<String> {
    cache.get_or_set_default(keys::GPU_MODEL, platform::gpu_model)
}

/// Physical memory usage. Never cached.
pub fn get_mem_info() -> Result<ResourceUsage> {
    platform::mem_info()
}

/// Usage of the filesystem mounted at `/`. Never cached.
pub fn get_disk_usage() -> Result<ResourceUsage> {
    platform::disk_usage()
}

/// Time since boot. Never cached.
pub fn get_uptime() -> Result<Duration> {
    platform::uptime()
}

/// Battery state. Hardware without a battery reports `BatteryStatus::NotPresent`.
pub fn get_battery_info() -> Result<Battery> {
    platform::battery()
}

pub fn get_shell(cache: &CacheManager) -> Result<String> {
    cache.get_or_set_default(keys::SHELL, platform::shell)
}

pub fn get_desktop_environment(cache: &CacheManager) -> Result<String> {
    cache.get_or_set_default(keys::DESKTOP_ENVIRONMENT, platform::desktop_environment)
}

pub fn get_window_manager(cache: &CacheManager) -> Result<String> {
    cache.get_or_set_default(keys::WINDOW_MANAGER, platform::window_manager)
}

/// Connected displays; `NotSupported` when headless
pub fn get_outputs(cache: &CacheManager) -> Result<Vec<DisplayInfo>> {
    cache.get_or_set_default(keys::DISPLAYS, platform::outputs)
}

/// The display flagged primary, else the first one
pub fn get_primary_output(cache: &CacheManager) -> Result<DisplayInfo> {
    pick_primary(get_outputs(cache)?)
}

fn pick_primary(outputs: Vec<DisplayInfo>) -> Result<DisplayInfo> {
    let index = outputs.iter().position(|d| d.primary).unwrap_or(0);
    outputs
        .into_iter()
        .nth(index)
        .ok_or_else(|| DracError::new(DracErrorCode::NotSupported, "no displays attached"))
}

pub fn get_network_interfaces(cache: &CacheManager) -> Result<Vec<NetworkInterface>> {
    cache.get_or_set_default(keys::NETWORK_INTERFACES, platform::network_interfaces)
}

/// Currently playing media. Never cached.
pub fn get_now_playing() -> Result<MediaInfo> {
    platform::now_playing()
}

/// Today's date as "Month Nth", e.g. "June 1st"
pub fn get_date() -> Result<String> {
    let today = chrono::Local::now().date_naive();
    Ok(format_date(today.month(), today.day()))
}

/// "January 2nd" style date. Months outside 1..=12 render as "Unknown".
pub fn format_date(month: u32, day: u32) -> String {
    const MONTHS: [&str; 12] = [
        "January",
        "February",
        "March",
        "April",
        "May",
        "June",
        "July",
        "August",
        "September",
        "October",
        "November",
        "December",
    ];
    let name = month
        .checked_sub(1)
        .and_then(|i| MONTHS.get(i as usize))
        .copied()
        .unwrap_or("Unknown");
    format!("{} {}{}", name, day, ordinal_suffix(day))
}

/// English ordinal suffix; 11 through 13 always take "th"
pub fn ordinal_suffix(day: u32) -> &'static str {
    if (11..=13).contains(&day) {
        return "th";
    }
    match day % 10 {
        1 => "st",
        2 => "nd",
        3 => "rd",
        _ => "th",
    }
}
