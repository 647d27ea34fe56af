//! Command execution utilities

use crate::error::{DracError, DracErrorCode, Result};
use std::process::Command;

/// Execute a command and return stdout as String
pub fn run_command(program: &str, args: &[&str]) -> Result<String> {
    let output = Command::new(program).args(args).output().map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            DracError::new(
                DracErrorCode::NotFound,
                format!("command '{}' not found", program),
            )
        } else {
            DracError::from(err)
        }
    })?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        Err(DracError::new(
            DracErrorCode::PlatformSpecific,
            format!(
                "command '{}' failed with exit code: {:?}",
                program,
                output.status.code()
            ),
        ))
    }
}
