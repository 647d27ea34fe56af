//! draconis library
//!
//! Cross-platform system information collectors with an on-disk TTL cache and a
//! weather client. Every operation returns [`Result`] with a [`DracError`].

pub mod cache;
pub mod collectors;
pub mod config;
pub mod data;
pub mod error;
pub mod services;
pub mod utils;

pub use cache::{CacheManager, DEFAULT_TTL};
pub use collectors::packages::{get_total_count, get_total_count_with, CountOptions, PackageManagers};
pub use collectors::{
    format_date, get_battery_info, get_cpu_cores, get_cpu_model, get_date, get_desktop_environment,
    get_disk_usage, get_gpu_model, get_host, get_kernel_version, get_mem_info,
    get_network_interfaces, get_now_playing, get_operating_system, get_outputs,
    get_primary_output, get_shell, get_uptime, get_window_manager, ordinal_suffix,
};
pub use data::{
    Battery, BatteryStatus, CpuCores, DisplayInfo, MediaInfo, NetworkInterface, OperatingSystem,
    ResourceUsage,
};
pub use error::{DracError, DracErrorCode, Result};
pub use services::weather::{
    create_weather_service, Coords, Location, Units, WeatherProvider, WeatherReport,
    WeatherService,
};
