//! macOS backend: sysctl, statvfs, getifaddrs and a few system tools

use crate::data::{Battery, BatteryStatus, CpuCores, DisplayInfo, MediaInfo, NetworkInterface};
use crate::data::{OperatingSystem, ResourceUsage};
use crate::error::{DracError, DracErrorCode, Result};
use crate::utils::command::run_command;
use crate::utils::parsing::{extract_after_colon, pretty_program_name};
use std::ffi::CString;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

fn sysctl_string(name: &str) -> Result<String> {
    let c_name = CString::new(name)
        .map_err(|_| DracError::new(DracErrorCode::InvalidArgument, "sysctl name contains NUL"))?;
    let mut len: libc::size_t = 0;

    // SAFETY: first call sizes the buffer, second fills a buffer of that size
    unsafe {
        if libc::sysctlbyname(c_name.as_ptr(), std::ptr::null_mut(), &mut len, std::ptr::null_mut(), 0) != 0 {
            return Err(std::io::Error::last_os_error().into());
        }
        let mut buf = vec![0u8; len];
        if libc::sysctlbyname(
            c_name.as_ptr(),
            buf.as_mut_ptr() as *mut libc::c_void,
            &mut len,
            std::ptr::null_mut(),
            0,
        ) != 0
        {
            return Err(std::io::Error::last_os_error().into());
        }
        buf.truncate(len);
        Ok(String::from_utf8_lossy(&buf).trim_end_matches('\0').trim().to_string())
    }
}

fn sysctl_value<T: Copy>(name: &str) -> Result<T> {
    let c_name = CString::new(name)
        .map_err(|_| DracError::new(DracErrorCode::InvalidArgument, "sysctl name contains NUL"))?;
    let mut len = std::mem::size_of::<T>();

    // SAFETY: only called with plain integers and C structs, for which the
    // all-zero bit pattern is valid; sysctl writes at most `len` bytes.
    let mut value: T = unsafe { std::mem::zeroed() };
    let rc = unsafe {
        libc::sysctlbyname(
            c_name.as_ptr(),
            &mut value as *mut T as *mut libc::c_void,
            &mut len,
            std::ptr::null_mut(),
            0,
        )
    };
    if rc != 0 {
        return Err(std::io::Error::last_os_error().into());
    }
    Ok(value)
}

pub fn operating_system() -> Result<OperatingSystem> {
    let version = run_command("sw_vers", &["-productVersion"])
        .or_else(|_| sysctl_string("kern.osproductversion"))?;
    Ok(OperatingSystem {
        name: "macOS".to_string(),
        version,
    })
}

pub fn kernel_version() -> Result<String> {
    sysctl_string("kern.osrelease")
}

pub fn host() -> Result<String> {
    sysctl_string("hw.model")
}

pub fn cpu_model() -> Result<String> {
    sysctl_string("machdep.cpu.brand_string")
}

pub fn cpu_cores() -> Result<CpuCores> {
    let logical: i32 = sysctl_value("hw.logicalcpu")?;
    let physical: i32 = sysctl_value("hw.physicalcpu").unwrap_or(logical);
    Ok(CpuCores::new(logical.max(1) as usize, physical.max(0) as usize))
}

pub fn gpu_model() -> Result<String> {
    let report = run_command("system_profiler", &["SPDisplaysDataType"])?;
    report
        .lines()
        .find(|line| line.trim_start().starts_with("Chipset Model:"))
        .and_then(extract_after_colon)
        .ok_or_else(|| DracError::new(DracErrorCode::NotFound, "no GPU reported"))
}

pub fn mem_info() -> Result<ResourceUsage> {
    let total: u64 = sysctl_value("hw.memsize")?;
    let page_size: u64 = sysctl_value::<i64>("hw.pagesize")? as u64;
    let vm_stat = run_command("vm_stat", &[])?;
    let used_pages = used_pages_from_vm_stat(&vm_stat)
        .ok_or_else(|| DracError::new(DracErrorCode::ParseError, "unexpected vm_stat output"))?;
    Ok(ResourceUsage::new(used_pages * page_size, total))
}

/// active + wired + compressed pages, as Activity Monitor counts "used"
fn used_pages_from_vm_stat(output: &str) -> Option<u64> {
    let pages = |label: &str| -> Option<u64> {
        output
            .lines()
            .find(|line| line.starts_with(label))
            .and_then(extract_after_colon)
            .and_then(|v| v.trim_end_matches('.').parse().ok())
    };
    Some(pages("Pages active")? + pages("Pages wired down")? + pages("Pages occupied by compressor").unwrap_or(0))
}

pub fn disk_usage() -> Result<ResourceUsage> {
    super::unix::disk_usage("/")
}

pub fn uptime() -> Result<Duration> {
    let boot: libc::timeval = sysctl_value("kern.boottime")?;
    let now = SystemTime::now().duration_since(UNIX_EPOCH).map_err(|_| {
        DracError::new(DracErrorCode::PlatformSpecific, "system clock is before the epoch")
    })?;
    Ok(now.saturating_sub(Duration::from_secs(boot.tv_sec as u64)))
}

pub fn battery() -> Result<Battery> {
    let output = run_command("pmset", &["-g", "batt"])?;
    Ok(parse_pmset(&output))
}

/// ` -InternalBattery-0 (id=123)	87%; discharging; 4:12 remaining present: true`
fn parse_pmset(output: &str) -> Battery {
    let Some(line) = output.lines().find(|l| l.contains("InternalBattery")) else {
        return Battery::not_present();
    };
    let fields: Vec<&str> = line
        .split(|c: char| c == '\t' || c == ';')
        .map(str::trim)
        .collect();

    let percentage = fields
        .iter()
        .find_map(|f| f.strip_suffix('%').and_then(|p| p.parse::<u8>().ok()));
    let status = if fields.iter().any(|f| *f == "discharging") {
        BatteryStatus::Discharging
    } else if fields.iter().any(|f| *f == "charging") {
        BatteryStatus::Charging
    } else if fields.iter().any(|f| *f == "charged") {
        BatteryStatus::Full
    } else {
        BatteryStatus::Unknown
    };
    let time_remaining = fields
        .iter()
        .find_map(|f| f.strip_suffix(" remaining present: true").or_else(|| f.strip_suffix(" remaining")))
        .and_then(|t| t.split_once(':'))
        .and_then(|(h, m)| Some(Duration::from_secs(h.parse::<u64>().ok()? * 3600 + m.parse::<u64>().ok()? * 60)));

    Battery::new(status, percentage, time_remaining)
}

pub fn shell() -> Result<String> {
    std::env::var("SHELL")
        .ok()
        .filter(|s| !s.is_empty())
        .map(|s| pretty_program_name(&s))
        .ok_or_else(|| DracError::new(DracErrorCode::NotFound, "SHELL is not set"))
}

pub fn desktop_environment() -> Result<String> {
    Ok("Aqua".to_string())
}

pub fn window_manager() -> Result<String> {
    Ok("Quartz Compositor".to_string())
}

pub fn outputs() -> Result<Vec<DisplayInfo>> {
    let report = run_command("system_profiler", &["SPDisplaysDataType"])?;
    let displays = parse_display_report(&report);
    if displays.is_empty() {
        return Err(DracError::new(DracErrorCode::NotSupported, "no displays attached"));
    }
    Ok(displays)
}

/// `Resolution: 3024 x 1964 Retina` / `UI Looks like: ... @ 120.00Hz` / `Main Display: Yes`
fn parse_display_report(report: &str) -> Vec<DisplayInfo> {
    let mut displays: Vec<DisplayInfo> = Vec::new();
    for line in report.lines().map(str::trim) {
        if let Some(resolution) = line.strip_prefix("Resolution:") {
            let mut dims = resolution
                .split_whitespace()
                .filter_map(|tok| tok.parse::<u32>().ok());
            if let (Some(width), Some(height)) = (dims.next(), dims.next()) {
                displays.push(DisplayInfo {
                    id: displays.len().to_string(),
                    width,
                    height,
                    refresh_hz: 0.0,
                    primary: false,
                });
            }
        } else if let Some(display) = displays.last_mut() {
            if line.starts_with("Main Display: Yes") {
                display.primary = true;
            } else if let Some(hz) = line.rsplit('@').next().filter(|_| line.contains('@')) {
                if let Ok(hz) = hz.trim().trim_end_matches("Hz").parse::<f64>() {
                    display.refresh_hz = hz;
                }
            }
        }
    }
    if !displays.is_empty() && !displays.iter().any(|d| d.primary) {
        displays[0].primary = true;
    }
    displays
}

pub fn network_interfaces() -> Result<Vec<NetworkInterface>> {
    let mut interfaces = super::unix::network_interfaces(None)?;
    super::unix::mark_first_active_primary(&mut interfaces);
    Ok(interfaces)
}

pub fn now_playing() -> Result<MediaInfo> {
    Err(DracError::not_supported("now-playing metadata"))
}
