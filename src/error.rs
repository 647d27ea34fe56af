//! Centralized error handling for draconis

use std::fmt;
use std::io;

/// Normalised error kinds reported by every collector, the cache and the weather client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DracErrorCode {
    /// A missing file or absent entity
    NotFound,
    /// Generic I/O failure
    IoError,
    /// Structured-format failure (malformed payload, bad cache entry)
    ParseError,
    /// The service exists but could not be reached at runtime
    ApiUnavailable,
    PermissionDenied,
    InvalidArgument,
    /// Definitively absent on this platform or build
    NotSupported,
    Timeout,
    NetworkError,
    PlatformSpecific,
    InternalError,
    Other,
}

impl fmt::Display for DracErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DracErrorCode::NotFound => "not found",
            DracErrorCode::IoError => "I/O error",
            DracErrorCode::ParseError => "parse error",
            DracErrorCode::ApiUnavailable => "API unavailable",
            DracErrorCode::PermissionDenied => "permission denied",
            DracErrorCode::InvalidArgument => "invalid argument",
            DracErrorCode::NotSupported => "not supported",
            DracErrorCode::Timeout => "timed out",
            DracErrorCode::NetworkError => "network error",
            DracErrorCode::PlatformSpecific => "platform error",
            DracErrorCode::InternalError => "internal error",
            DracErrorCode::Other => "error",
        };
        f.write_str(name)
    }
}

/// Error type returned by every fallible draconis operation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct DracError {
    pub code: DracErrorCode,
    pub message: String,
}

impl DracError {
    pub fn new(code: DracErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn not_supported(what: &str) -> Self {
        Self::new(
            DracErrorCode::NotSupported,
            format!("{} is not supported on this platform", what),
        )
    }

    pub fn is_not_found(&self) -> bool {
        self.code == DracErrorCode::NotFound
    }
}

impl From<io::Error> for DracError {
    fn from(error: io::Error) -> Self {
        let code = match error.kind() {
            io::ErrorKind::NotFound => DracErrorCode::NotFound,
            io::ErrorKind::PermissionDenied => DracErrorCode::PermissionDenied,
            io::ErrorKind::TimedOut => DracErrorCode::Timeout,
            io::ErrorKind::Unsupported => DracErrorCode::NotSupported,
            io::ErrorKind::InvalidInput => DracErrorCode::InvalidArgument,
            io::ErrorKind::InvalidData => DracErrorCode::ParseError,
            _ => DracErrorCode::IoError,
        };
        DracError::new(code, error.to_string())
    }
}

impl From<serde_json::Error> for DracError {
    fn from(error: serde_json::Error) -> Self {
        DracError::new(DracErrorCode::ParseError, error.to_string())
    }
}

impl From<toml::de::Error> for DracError {
    fn from(error: toml::de::Error) -> Self {
        DracError::new(DracErrorCode::ParseError, error.to_string())
    }
}

#[cfg(feature = "weather")]
impl From<reqwest::Error> for DracError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            DracError::new(DracErrorCode::ParseError, error.to_string())
        } else {
            DracError::new(DracErrorCode::NetworkError, error.to_string())
        }
    }
}

#[cfg(feature = "packagecount")]
impl From<rusqlite::Error> for DracError {
    fn from(error: rusqlite::Error) -> Self {
        let message = error.to_string();
        if message.contains("no such table") || message.contains("no such column") {
            DracError::new(DracErrorCode::ParseError, message)
        } else {
            DracError::new(DracErrorCode::ApiUnavailable, message)
        }
    }
}

#[cfg(all(target_os = "linux", feature = "nowplaying"))]
impl From<zbus::Error> for DracError {
    fn from(error: zbus::Error) -> Self {
        DracError::new(DracErrorCode::ApiUnavailable, error.to_string())
    }
}

#[cfg(all(target_os = "linux", feature = "nowplaying"))]
impl From<zbus::fdo::Error> for DracError {
    fn from(error: zbus::fdo::Error) -> Self {
        DracError::new(DracErrorCode::ApiUnavailable, error.to_string())
    }
}

/// Type alias for Results in draconis
pub type Result<T> = std::result::Result<T, DracError>;
