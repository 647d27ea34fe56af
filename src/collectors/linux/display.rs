//! Connected outputs from DRM connectors and their EDID blocks

use crate::data::DisplayInfo;
use crate::error::{DracError, DracErrorCode, Result};
use std::fs;
use std::path::Path;

const DRM: &str = "/sys/class/drm";

pub fn outputs() -> Result<Vec<DisplayInfo>> {
    outputs_from(Path::new(DRM))
}

pub(crate) fn outputs_from(drm: &Path) -> Result<Vec<DisplayInfo>> {
    let entries = fs::read_dir(drm)
        .map_err(|_| DracError::not_supported("display enumeration without DRM"))?;

    let mut connectors: Vec<_> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with("card") && n.contains('-'))
                .unwrap_or(false)
        })
        .collect();
    connectors.sort();

    let mut displays = Vec::new();
    for connector in connectors {
        let connected = fs::read_to_string(connector.join("status"))
            .map(|s| s.trim() == "connected")
            .unwrap_or(false);
        if !connected {
            continue;
        }

        let id = connector
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.split_once('-'))
            .map(|(_, port)| port.to_string())
            .unwrap_or_default();

        let timing = fs::read(connector.join("edid"))
            .ok()
            .and_then(|edid| preferred_timing(&edid));
        let (width, height, refresh_hz) = match timing {
            Some(timing) => timing,
            None => match fs::read_to_string(connector.join("modes"))
                .ok()
                .and_then(|modes| parse_mode_line(modes.lines().next()?))
            {
                Some((w, h)) => (w, h, 0.0),
                None => continue,
            },
        };

        displays.push(DisplayInfo {
            id,
            width,
            height,
            refresh_hz,
            primary: false,
        });
    }

    if displays.is_empty() {
        return Err(DracError::new(DracErrorCode::NotSupported, "no connected displays"));
    }

    // Internal panels win, otherwise the first connector
    let primary = displays
        .iter()
        .position(|d| d.id.starts_with("eDP") || d.id.starts_with("LVDS") || d.id.starts_with("DSI"))
        .unwrap_or(0);
    displays[primary].primary = true;

    Ok(displays)
}

/// `1920x1080` (possibly with a trailing `i`)
fn parse_mode_line(line: &str) -> Option<(u32, u32)> {
    let (w, h) = line.trim().split_once('x')?;
    let h: String = h.chars().take_while(|c| c.is_ascii_digit()).collect();
    Some((w.parse().ok()?, h.parse().ok()?))
}

/// Resolution and refresh rate from the first detailed timing descriptor
pub(crate) fn preferred_timing(edid: &[u8]) -> Option<(u32, u32, f64)> {
    const HEADER: [u8; 8] = [0x00, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x00];
    if edid.len() < 128 || edid[..8] != HEADER {
        return None;
    }

    let dtd = &edid[54..72];
    let pixel_clock_khz = u16::from_le_bytes([dtd[0], dtd[1]]) as u64 * 10;
    if pixel_clock_khz == 0 {
        return None;
    }

    let h_active = dtd[2] as u32 | ((dtd[4] as u32 & 0xf0) << 4);
    let h_blank = dtd[3] as u32 | ((dtd[4] as u32 & 0x0f) << 8);
    let v_active = dtd[5] as u32 | ((dtd[7] as u32 & 0xf0) << 4);
    let v_blank = dtd[6] as u32 | ((dtd[7] as u32 & 0x0f) << 8);

    let total = (h_active + h_blank) as u64 * (v_active + v_blank) as u64;
    if total == 0 {
        return None;
    }
    let refresh = (pixel_clock_khz * 1000) as f64 / total as f64;

    Some((h_active, v_active, (refresh * 100.0).round() / 100.0))
}
