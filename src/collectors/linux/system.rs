//! System information collection (OS, kernel, host, uptime, shell)

use crate::data::OperatingSystem;
use crate::error::{DracError, DracErrorCode, Result};
use crate::utils::file::{parse_key_value, read_first_line, read_trimmed};
use crate::utils::parsing::pretty_program_name;
use std::fs;
use std::time::Duration;
use tracing::debug;

const OS_RELEASE_PATHS: [&str; 2] = ["/etc/os-release", "/usr/lib/os-release"];

pub fn operating_system() -> Result<OperatingSystem> {
    let mut last_err = None;
    for path in OS_RELEASE_PATHS {
        match fs::read_to_string(path) {
            Ok(content) => return parse_os_release(&content),
            Err(err) => last_err = Some(DracError::from(err)),
        }
    }
    Err(last_err.unwrap_or_else(|| DracError::new(DracErrorCode::NotFound, "os-release not found")))
}

/// Name comes from `NAME` (falling back to `PRETTY_NAME`), version from
/// `VERSION_ID`, `VERSION` or `BUILD_ID` in that order.
pub(crate) fn parse_os_release(content: &str) -> Result<OperatingSystem> {
    let name = parse_key_value(content, "NAME")
        .or_else(|| parse_key_value(content, "PRETTY_NAME"))
        .ok_or_else(|| DracError::new(DracErrorCode::ParseError, "os-release has no NAME"))?;
    let version = parse_key_value(content, "VERSION_ID")
        .or_else(|| parse_key_value(content, "VERSION"))
        .or_else(|| parse_key_value(content, "BUILD_ID"))
        .unwrap_or_default();
    Ok(OperatingSystem { name, version })
}

pub fn kernel_version() -> Result<String> {
    match read_first_line("/proc/sys/kernel/osrelease") {
        Ok(release) if !release.is_empty() => Ok(release),
        _ => {
            // /proc/version: "Linux version 6.9.1-arch1-1 (...)"
            let version_info = read_first_line("/proc/version")?;
            version_info
                .split_whitespace()
                .nth(2)
                .map(|v| v.to_string())
                .ok_or_else(|| DracError::new(DracErrorCode::ParseError, "kernel version not found"))
        }
    }
}

pub fn host() -> Result<String> {
    let family = read_trimmed("/sys/class/dmi/id/product_family").ok();
    let name = read_trimmed("/sys/class/dmi/id/product_name").ok();

    if let Some(host) = combine_host(family, name) {
        return Ok(host);
    }

    // Device-tree boards (Raspberry Pi and friends)
    let model = fs::read_to_string("/sys/firmware/devicetree/base/model")?;
    let model = model.trim_matches(char::from(0)).trim();
    if model.is_empty() {
        return Err(DracError::new(DracErrorCode::NotFound, "no host model reported"));
    }
    Ok(model.to_string())
}

fn combine_host(family: Option<String>, name: Option<String>) -> Option<String> {
    const PLACEHOLDERS: [&str; 4] = [
        "To Be Filled By O.E.M.",
        "Default string",
        "System Product Name",
        "None",
    ];
    let clean = |s: Option<String>| s.filter(|v| !v.is_empty() && !PLACEHOLDERS.contains(&v.as_str()));

    match (clean(family), clean(name)) {
        (Some(family), Some(name)) if family == name => Some(name),
        (Some(family), Some(name)) if name.contains(&family) => Some(name),
        (Some(family), Some(name)) => Some(format!("{} {}", family, name)),
        (None, Some(name)) => Some(name),
        (Some(family), None) => Some(family),
        (None, None) => None,
    }
}

pub fn uptime() -> Result<Duration> {
    parse_uptime(&read_first_line("/proc/uptime")?)
}

fn parse_uptime(line: &str) -> Result<Duration> {
    let malformed = || DracError::new(DracErrorCode::ParseError, format!("malformed /proc/uptime: {:?}", line));
    let secs: f64 = line
        .split_whitespace()
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(malformed)?;
    Duration::try_from_secs_f64(secs).map_err(|_| malformed())
}

pub fn shell() -> Result<String> {
    if let Ok(shell) = std::env::var("SHELL") {
        if !shell.is_empty() {
            return Ok(pretty_program_name(&shell));
        }
    }

    debug!("SHELL unset, walking the process tree");
    shell_from_process_tree()
}

/// Walk up from our parent looking for a known interactive shell
fn shell_from_process_tree() -> Result<String> {
    const KNOWN_SHELLS: [&str; 10] = [
        "bash", "zsh", "fish", "nu", "pwsh", "ksh", "tcsh", "elvish", "xonsh", "dash",
    ];

    let mut pid = std::os::unix::process::parent_id();
    // Max 10 levels to avoid loops on odd /proc layouts
    for _ in 0..10 {
        if pid <= 1 {
            break;
        }
        let comm = read_trimmed(format!("/proc/{}/comm", pid)).unwrap_or_default();
        if KNOWN_SHELLS.contains(&comm.as_str()) {
            return Ok(pretty_program_name(&comm));
        }

        let stat = match fs::read_to_string(format!("/proc/{}/stat", pid)) {
            Ok(stat) => stat,
            Err(_) => break,
        };
        match parent_pid_from_stat(&stat) {
            Some(ppid) => pid = ppid,
            None => break,
        }
    }

    Err(DracError::new(DracErrorCode::NotFound, "could not determine the user's shell"))
}

/// The comm field may contain spaces, so parse after the closing paren
fn parent_pid_from_stat(stat: &str) -> Option<u32> {
    let after_comm = &stat[stat.rfind(')')? + 1..];
    after_comm.split_whitespace().nth(1)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uptime_rejects_non_finite_and_negative_values() {
        assert_eq!(
            parse_uptime("12345.67 54321.00").unwrap(),
            Duration::from_secs_f64(12345.67)
        );
        for bad in ["inf 0.00", "NaN 0.00", "-5.0 0.00", "", "uptime"] {
            assert_eq!(parse_uptime(bad).unwrap_err().code, DracErrorCode::ParseError, "{:?}", bad);
        }
    }

    #[test]
    fn os_release_prefers_name_and_version_id() {
        let os = parse_os_release(
            "NAME=\"Fedora Linux\"\nVERSION=\"40 (Workstation Edition)\"\nVERSION_ID=40\nPRETTY_NAME=\"Fedora Linux 40\"\n",
        )
        .unwrap();
        assert_eq!(os.name, "Fedora Linux");
        assert_eq!(os.version, "40");
    }

    #[test]
    fn rolling_release_uses_build_id() {
        let os = parse_os_release("NAME=\"Arch Linux\"\nBUILD_ID=rolling\n").unwrap();
        assert_eq!(os.version, "rolling");
    }

    #[test]
    fn os_release_without_name_is_parse_error() {
        let err = parse_os_release("ID=weird\n").unwrap_err();
        assert_eq!(err.code, DracErrorCode::ParseError);
    }

    #[test]
    fn host_combines_family_and_name() {
        assert_eq!(
            combine_host(Some("ThinkPad X1 Carbon Gen 9".into()), Some("20XW0055US".into())).as_deref(),
            Some("ThinkPad X1 Carbon Gen 9 20XW0055US")
        );
        assert_eq!(
            combine_host(Some("Default string".into()), Some("MS-7C56".into())).as_deref(),
            Some("MS-7C56")
        );
        assert_eq!(combine_host(None, Some("None".into())), None);
    }

    #[test]
    fn stat_parent_pid_handles_spaces_in_comm() {
        assert_eq!(parent_pid_from_stat("1234 (tmux: server) S 42 1234 1234"), Some(42));
        assert_eq!(parent_pid_from_stat("garbage"), None);
    }
}
