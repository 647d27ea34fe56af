//! Collectors shared by every unix backend (statvfs, getifaddrs, sysconf)

use crate::data::{NetworkInterface, ResourceUsage};
use crate::error::{DracError, DracErrorCode, Result};
use std::collections::BTreeMap;
use std::ffi::{CStr, CString};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::ptr;

/// Used/total bytes of the filesystem mounted at `path`
pub fn disk_usage(path: &str) -> Result<ResourceUsage> {
    let c_path = CString::new(path)
        .map_err(|_| DracError::new(DracErrorCode::InvalidArgument, "path contains a NUL byte"))?;

    // SAFETY: statvfs only writes into the zeroed struct we own
    let stat = unsafe {
        let mut stat: libc::statvfs = std::mem::zeroed();
        if libc::statvfs(c_path.as_ptr(), &mut stat) != 0 {
            return Err(std::io::Error::last_os_error().into());
        }
        stat
    };

    let fragment = stat.f_frsize as u64;
    let total_bytes = (stat.f_blocks as u64).wrapping_mul(fragment);
    let free_bytes = (stat.f_bfree as u64).wrapping_mul(fragment);
    Ok(ResourceUsage::new(total_bytes.saturating_sub(free_bytes), total_bytes))
}

/// Interfaces and their IPv4/IPv6 addresses via getifaddrs(3).
/// `primary` names the interface that should be flagged as primary, if known.
pub fn network_interfaces(primary: Option<&str>) -> Result<Vec<NetworkInterface>> {
    let mut by_name: BTreeMap<String, NetworkInterface> = BTreeMap::new();
    let mut ifap: *mut libc::ifaddrs = ptr::null_mut();

    // SAFETY: getifaddrs hands us a linked list that stays valid until
    // freeifaddrs, which the guard runs on every exit path.
    unsafe {
        if libc::getifaddrs(&mut ifap) != 0 {
            return Err(std::io::Error::last_os_error().into());
        }
        let _guard = scopeguard::guard(ifap, |ifap| libc::freeifaddrs(ifap));

        let mut current = ifap;
        while !current.is_null() {
            let ifa = &*current;
            current = ifa.ifa_next;

            if ifa.ifa_name.is_null() {
                continue;
            }
            let name = match CStr::from_ptr(ifa.ifa_name).to_str() {
                Ok(name) if !name.is_empty() => name.to_string(),
                _ => continue,
            };

            let entry = by_name.entry(name.clone()).or_insert_with(|| NetworkInterface {
                primary: primary == Some(name.as_str()),
                name,
                addresses: Vec::new(),
                up: false,
            });
            entry.up |= ifa.ifa_flags & (libc::IFF_UP as libc::c_uint) != 0;

            if let Some(addr) = sockaddr_to_ip(ifa.ifa_addr) {
                let addr = addr.to_string();
                if !entry.addresses.contains(&addr) {
                    entry.addresses.push(addr);
                }
            }
        }
    }

    Ok(by_name.into_values().collect())
}

/// Flag the first interface that is up, not loopback, and has an address
pub fn mark_first_active_primary(interfaces: &mut [NetworkInterface]) {
    if let Some(primary) = interfaces
        .iter_mut()
        .find(|i| i.up && !i.name.starts_with("lo") && !i.addresses.is_empty())
    {
        primary.primary = true;
    }
}

/// sysconf(3) lookup; a negative answer means the variable is unknown here
#[cfg_attr(any(target_os = "linux", target_os = "macos"), allow(dead_code))]
pub fn sysconf(name: libc::c_int) -> Result<u64> {
    // SAFETY: sysconf only reads its integer argument
    let value = unsafe { libc::sysconf(name) };
    if value < 0 {
        return Err(DracError::new(
            DracErrorCode::PlatformSpecific,
            format!("sysconf variable {} is unavailable", name),
        ));
    }
    Ok(value as u64)
}

#[cfg_attr(any(target_os = "linux", target_os = "macos"), allow(dead_code))]
pub fn memory_from_pages(total_pages: u64, free_pages: u64, page_size: u64) -> ResourceUsage {
    let total_bytes = total_pages.saturating_mul(page_size);
    let free_bytes = free_pages.saturating_mul(page_size);
    ResourceUsage::new(total_bytes.saturating_sub(free_bytes), total_bytes)
}

/// # Safety
/// `addr` must be null or point to a valid sockaddr from getifaddrs
unsafe fn sockaddr_to_ip(addr: *const libc::sockaddr) -> Option<IpAddr> {
    if addr.is_null() {
        return None;
    }
    match (*addr).sa_family as libc::c_int {
        libc::AF_INET => {
            let sin = &*(addr as *const libc::sockaddr_in);
            Some(IpAddr::V4(Ipv4Addr::from(u32::from_be(sin.sin_addr.s_addr))))
        }
        libc::AF_INET6 => {
            let sin6 = &*(addr as *const libc::sockaddr_in6);
            Some(IpAddr::V6(Ipv6Addr::from(sin6.sin6_addr.s6_addr)))
        }
        _ => None,
    }
}
