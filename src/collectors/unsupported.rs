//! Fallback backend for targets without a dedicated implementation.
//! Other unix systems still get the statvfs, getifaddrs and sysconf readers.

use crate::data::{Battery, CpuCores, DisplayInfo, MediaInfo, NetworkInterface};
use crate::data::{OperatingSystem, ResourceUsage};
use crate::error::{DracError, DracErrorCode, Result};
use crate::utils::parsing::pretty_program_name;
use std::time::Duration;

pub fn operating_system() -> Result<OperatingSystem> {
    Ok(OperatingSystem {
        name: std::env::consts::OS.to_string(),
        version: String::new(),
    })
}

pub fn kernel_version() -> Result<String> {
    Ok(std::env::consts::OS.to_string())
}

pub fn host() -> Result<String> {
    Err(DracError::not_supported("host model"))
}

pub fn cpu_model() -> Result<String> {
    Ok(std::env::consts::ARCH.to_string())
}

pub fn cpu_cores() -> Result<CpuCores> {
    let logical = std::thread::available_parallelism()?.get();
    Ok(CpuCores::new(logical, logical))
}

pub fn gpu_model() -> Result<String> {
    Err(DracError::not_supported("GPU detection"))
}

#[cfg(any(
    target_os = "freebsd",
    target_os = "dragonfly",
    target_os = "openbsd",
    target_os = "solaris",
    target_os = "illumos",
    target_os = "android",
    target_os = "haiku"
))]
pub fn mem_info() -> Result<ResourceUsage> {
    use super::unix::{memory_from_pages, sysconf};

    let page_size = sysconf(libc::_SC_PAGESIZE)?;
    let total_pages = sysconf(libc::_SC_PHYS_PAGES)?;
    Ok(memory_from_pages(total_pages, free_pages()?, page_size))
}

#[cfg(not(any(
    target_os = "freebsd",
    target_os = "dragonfly",
    target_os = "openbsd",
    target_os = "solaris",
    target_os = "illumos",
    target_os = "android",
    target_os = "haiku"
)))]
pub fn mem_info() -> Result<ResourceUsage> {
    Err(DracError::new(
        DracErrorCode::PlatformSpecific,
        "no memory statistics source on this platform",
    ))
}

/// FreeBSD has no `_SC_AVPHYS_PAGES`
#[cfg(any(target_os = "freebsd", target_os = "dragonfly"))]
fn free_pages() -> Result<u64> {
    let mut free: libc::c_uint = 0;
    let mut len = std::mem::size_of::<libc::c_uint>();
    // SAFETY: the name is NUL terminated and sysctl writes at most `len`
    // bytes into `free`
    let rc = unsafe {
        libc::sysctlbyname(
            b"vm.stats.vm.v_free_count\0".as_ptr() as *const libc::c_char,
            &mut free as *mut libc::c_uint as *mut libc::c_void,
            &mut len,
            std::ptr::null(),
            0,
        )
    };
    if rc != 0 {
        return Err(std::io::Error::last_os_error().into());
    }
    Ok(u64::from(free))
}

#[cfg(any(
    target_os = "openbsd",
    target_os = "solaris",
    target_os = "illumos",
    target_os = "android",
    target_os = "haiku"
))]
fn free_pages() -> Result<u64> {
    super::unix::sysconf(libc::_SC_AVPHYS_PAGES)
}

#[cfg(unix)]
pub fn disk_usage() -> Result<ResourceUsage> {
    super::unix::disk_usage("/")
}

#[cfg(not(unix))]
pub fn disk_usage() -> Result<ResourceUsage> {
    Err(DracError::not_supported("disk usage"))
}

pub fn uptime() -> Result<Duration> {
    Err(DracError::new(
        DracErrorCode::PlatformSpecific,
        "no uptime source on this platform",
    ))
}

pub fn battery() -> Result<Battery> {
    Ok(Battery::not_present())
}

pub fn shell() -> Result<String> {
    shell_from(std::env::var("SHELL").ok().as_deref())
}

fn shell_from(var: Option<&str>) -> Result<String> {
    var.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(pretty_program_name)
        .ok_or_else(|| DracError::new(DracErrorCode::NotFound, "SHELL is not set"))
}

pub fn desktop_environment() -> Result<String> {
    Err(DracError::not_supported("desktop environment"))
}

pub fn window_manager() -> Result<String> {
    Err(DracError::not_supported("window manager"))
}

pub fn outputs() -> Result<Vec<DisplayInfo>> {
    Err(DracError::not_supported("display enumeration"))
}

#[cfg(unix)]
pub fn network_interfaces() -> Result<Vec<NetworkInterface>> {
    let mut interfaces = super::unix::network_interfaces(None)?;
    super::unix::mark_first_active_primary(&mut interfaces);
    Ok(interfaces)
}

#[cfg(not(unix))]
pub fn network_interfaces() -> Result<Vec<NetworkInterface>> {
    Err(DracError::not_supported("network interfaces"))
}

pub fn now_playing() -> Result<MediaInfo> {
    Err(DracError::not_supported("now-playing metadata"))
}
