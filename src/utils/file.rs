//! File reading utilities

use crate::error::{DracError, DracErrorCode, Result};
use std::fs;
use std::path::Path;

/// Read a file to string, trimmed
pub fn read_trimmed<P: AsRef<Path>>(path: P) -> Result<String> {
    Ok(fs::read_to_string(path)?.trim().to_string())
}

/// Read first line of a file, trimmed.
/// Meant for single-line pseudo files like /proc/sys/kernel/osrelease.
#[cfg(unix)]
pub fn read_first_line<P: AsRef<Path>>(path: P) -> Result<String> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let path_cstr = CString::new(path.as_ref().as_os_str().as_bytes())
        .map_err(|_| DracError::new(DracErrorCode::InvalidArgument, "path contains a NUL byte"))?;

    let mut buffer = [0u8; 256];

    // SAFETY: the path is NUL-terminated, the buffer outlives the read and
    // the descriptor is closed on every path below.
    let bytes_read = unsafe {
        let fd = libc::open(path_cstr.as_ptr(), libc::O_RDONLY | libc::O_CLOEXEC);
        if fd < 0 {
            return Err(DracError::from(std::io::Error::last_os_error()));
        }
        let n = libc::read(fd, buffer.as_mut_ptr() as *mut libc::c_void, buffer.len());
        libc::close(fd);
        n
    };

    if bytes_read < 0 {
        return Err(DracError::from(std::io::Error::last_os_error()));
    }

    let content = std::str::from_utf8(&buffer[..bytes_read as usize])
        .map_err(|_| DracError::new(DracErrorCode::ParseError, "invalid UTF-8"))?;
    Ok(content.lines().next().unwrap_or("").trim().to_string())
}

#[cfg(not(unix))]
pub fn read_first_line<P: AsRef<Path>>(path: P) -> Result<String> {
    Ok(read_trimmed(path)?.lines().next().unwrap_or("").to_string())
}

/// Parse `KEY=value` lines (os-release style), stripping optional quotes
pub fn parse_key_value(content: &str, key: &str) -> Option<String> {
    content
        .lines()
        .filter_map(|line| line.split_once('='))
        .find(|(k, _)| k.trim() == key)
        .map(|(_, v)| v.trim().trim_matches('"').trim_matches('\'').to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_value_strips_quotes() {
        let content = "NAME=\"Arch Linux\"\nBUILD_ID=rolling\nVERSION_ID='12'\nEMPTY=\n";
        assert_eq!(parse_key_value(content, "NAME").as_deref(), Some("Arch Linux"));
        assert_eq!(parse_key_value(content, "BUILD_ID").as_deref(), Some("rolling"));
        assert_eq!(parse_key_value(content, "VERSION_ID").as_deref(), Some("12"));
        assert_eq!(parse_key_value(content, "EMPTY"), None);
        assert_eq!(parse_key_value(content, "MISSING"), None);
    }

    #[cfg(unix)]
    #[test]
    fn first_line_of_missing_file_is_not_found() {
        let err = read_first_line("/definitely/not/here").unwrap_err();
        assert_eq!(err.code, DracErrorCode::NotFound);
    }

    #[cfg(unix)]
    #[test]
    fn first_line_is_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        std::fs::write(&path, "  6.9.1-arch1  \nsecond\n").unwrap();
        assert_eq!(read_first_line(&path).unwrap(), "6.9.1-arch1");
    }
}
