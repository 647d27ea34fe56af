//! Desktop environment and window manager detection

use crate::error::{DracError, DracErrorCode, Result};
use crate::utils::parsing::capitalize_first_letter;
use std::env;
use std::fs;

/// Process names of known window managers and compositors, with display names
const KNOWN_WMS: [(&str, &str); 20] = [
    ("sway", "Sway"),
    ("Hyprland", "Hyprland"),
    ("hyprland", "Hyprland"),
    ("kwin_wayland", "KWin"),
    ("kwin_x11", "KWin"),
    ("niri", "niri"),
    ("gnome-shell", "Mutter"),
    ("mutter", "Mutter"),
    ("xfwm4", "Xfwm4"),
    ("openbox", "Openbox"),
    ("i3", "i3"),
    ("bspwm", "bspwm"),
    ("awesome", "awesome"),
    ("dwm", "dwm"),
    ("river", "river"),
    ("wayfire", "Wayfire"),
    ("weston", "Weston"),
    ("labwc", "labwc"),
    ("cosmic-comp", "COSMIC"),
    ("marco", "Marco"),
];

fn has_graphical_session() -> bool {
    ["WAYLAND_DISPLAY", "DISPLAY"]
        .iter()
        .any(|var| env::var(var).map(|v| !v.is_empty()).unwrap_or(false))
}

fn headless(what: &str) -> DracError {
    DracError::new(
        DracErrorCode::NotSupported,
        format!("no graphical session, so no {}", what),
    )
}

pub fn desktop_environment() -> Result<String> {
    let from_env = env::var("XDG_CURRENT_DESKTOP")
        .ok()
        .and_then(|v| desktop_from_xdg(&v))
        .or_else(|| {
            env::var("DESKTOP_SESSION")
                .ok()
                .and_then(|v| desktop_from_session(&v))
        });

    if let Some(de) = from_env {
        return Ok(de);
    }

    if !has_graphical_session() {
        return Err(headless("desktop environment"));
    }
    Err(DracError::new(DracErrorCode::NotFound, "desktop environment not reported"))
}

/// `XDG_CURRENT_DESKTOP` is a colon-separated list, most specific last ("ubuntu:GNOME")
pub(crate) fn desktop_from_xdg(value: &str) -> Option<String> {
    value
        .split(':')
        .filter(|part| !part.is_empty())
        .last()
        .map(normalize_desktop)
}

fn desktop_from_session(value: &str) -> Option<String> {
    let session = value.rsplit('/').next().unwrap_or(value);
    if session.is_empty() {
        None
    } else {
        Some(normalize_desktop(session))
    }
}

fn normalize_desktop(name: &str) -> String {
    match name.to_lowercase().as_str() {
        "gnome" | "gnome-xorg" | "gnome-wayland" => "GNOME".to_string(),
        "kde" | "plasma" | "plasmawayland" => "KDE".to_string(),
        "xfce" | "xfce4" => "Xfce".to_string(),
        "x-cinnamon" | "cinnamon" => "Cinnamon".to_string(),
        "lxqt" => "LXQt".to_string(),
        "lxde" => "LXDE".to_string(),
        "mate" => "MATE".to_string(),
        "unity" => "Unity".to_string(),
        "budgie" | "budgie:gnome" => "Budgie".to_string(),
        "cosmic" => "COSMIC".to_string(),
        _ => capitalize_first_letter(name),
    }
}

pub fn window_manager() -> Result<String> {
    if !has_graphical_session() {
        return Err(headless("window manager"));
    }

    // Scan /proc for a running WM; stop at the first match
    let entries = fs::read_dir("/proc")?;
    for entry in entries.filter_map(|e| e.ok()) {
        let is_pid = entry
            .file_name()
            .to_str()
            .map(|name| name.bytes().all(|b| b.is_ascii_digit()))
            .unwrap_or(false);
        if !is_pid {
            continue;
        }
        if let Ok(comm) = fs::read_to_string(entry.path().join("comm")) {
            if let Some(name) = match_window_manager(comm.trim()) {
                return Ok(name.to_string());
            }
        }
    }

    Err(DracError::new(DracErrorCode::NotFound, "no known window manager running"))
}

pub(crate) fn match_window_manager(comm: &str) -> Option<&'static str> {
    KNOWN_WMS
        .iter()
        .find(|(process, _)| comm == *process)
        .map(|(_, name)| *name)
}
