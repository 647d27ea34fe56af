//! Linux backend: /proc, /sys, statvfs, getifaddrs and MPRIS

mod desktop;
mod display;
mod hardware;
mod media;
mod network;
mod sensors;
mod system;

use crate::data::ResourceUsage;
use crate::error::Result;

pub use desktop::{desktop_environment, window_manager};
pub use display::outputs;
pub use hardware::{cpu_cores, cpu_model, gpu_model, mem_info};
pub use media::now_playing;
pub use network::network_interfaces;
pub use sensors::battery;
pub use system::{host, kernel_version, operating_system, shell, uptime};

pub fn disk_usage() -> Result<ResourceUsage> {
    super::unix::disk_usage("/")
}
