//! Hardware information collection (CPU, GPU, memory)

use crate::data::{CpuCores, ResourceUsage};
use crate::error::{DracError, DracErrorCode, Result};
use crate::utils::command::run_command;
use crate::utils::parsing::{clean_gpu_name, extract_after_colon, parse_kib_line};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::debug;

pub fn cpu_model() -> Result<String> {
    let content = fs::read_to_string("/proc/cpuinfo")?;
    parse_cpu_model(&content)
        .ok_or_else(|| DracError::new(DracErrorCode::NotFound, "CPU model not found in /proc/cpuinfo"))
}

/// x86 reports `model name`; many ARM kernels only have `Hardware` or `Processor`
pub(crate) fn parse_cpu_model(cpuinfo: &str) -> Option<String> {
    ["model name", "Hardware", "Processor", "cpu model"]
        .iter()
        .find_map(|key| {
            cpuinfo
                .lines()
                .find(|line| line.split(':').next().map(str::trim) == Some(*key))
                .and_then(extract_after_colon)
        })
}

pub fn cpu_cores() -> Result<CpuCores> {
    // SAFETY: sysconf has no memory-safety preconditions
    let online = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_ONLN) };
    let logical = if online > 0 {
        online as usize
    } else {
        std::thread::available_parallelism()?.get()
    };

    let physical = fs::read_to_string("/proc/cpuinfo")
        .map(|content| count_physical_cores(&content))
        .unwrap_or(0);

    Ok(CpuCores::new(logical, physical))
}

/// Distinct `(physical id, core id)` pairs; 0 when the kernel does not report them
pub(crate) fn count_physical_cores(cpuinfo: &str) -> usize {
    let mut cores = HashSet::new();
    let mut physical_id = None;
    let mut core_id = None;

    for line in cpuinfo.lines().chain(std::iter::once("")) {
        if line.trim().is_empty() {
            if let (Some(p), Some(c)) = (physical_id.take(), core_id.take()) {
                cores.insert((p, c));
            }
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        match key.trim() {
            "physical id" => physical_id = value.trim().parse::<u32>().ok(),
            "core id" => core_id = value.trim().parse::<u32>().ok(),
            _ => {}
        }
    }

    cores.len()
}

pub fn mem_info() -> Result<ResourceUsage> {
    // Read line by line to extract memory values early
    let file = File::open("/proc/meminfo")?;
    let mut reader = BufReader::new(file);
    let mut line = String::with_capacity(64);

    let mut total = None;
    let mut available = None;

    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            break;
        }

        if total.is_none() && line.starts_with("MemTotal") {
            total = parse_kib_line(&line);
        } else if available.is_none() && line.starts_with("MemAvailable") {
            available = parse_kib_line(&line);
        }

        if total.is_some() && available.is_some() {
            break;
        }
    }

    match (total, available) {
        (Some(total), Some(available)) if total > 0 => {
            Ok(ResourceUsage::new(total.saturating_sub(available), total))
        }
        _ => Err(DracError::new(
            DracErrorCode::ParseError,
            "MemTotal/MemAvailable missing from /proc/meminfo",
        )),
    }
}

pub fn gpu_model() -> Result<String> {
    let drm = Path::new("/sys/class/drm");
    if !drm.exists() {
        return Err(DracError::not_supported("GPU detection without a DRM subsystem"));
    }

    let mut gpus = gpus_from_sysfs(drm);
    if gpus.is_empty() {
        debug!("no GPU names in sysfs, falling back to lspci");
        gpus = gpus_from_lspci();
    }

    // Discrete first, then integrated
    gpus.sort_by_key(|(_, integrated)| *integrated);
    gpus.into_iter()
        .map(|(name, _)| name)
        .next()
        .ok_or_else(|| DracError::new(DracErrorCode::NotFound, "no GPU found"))
}

fn gpus_from_sysfs(drm: &Path) -> Vec<(String, bool)> {
    let mut gpus = Vec::new();
    let Ok(entries) = fs::read_dir(drm) else {
        return gpus;
    };

    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !name.starts_with("card") || name.contains('-') {
            continue;
        }
        let device = path.join("device");
        let label = fs::read_to_string(device.join("product_name"))
            .or_else(|_| fs::read_to_string(device.join("label")))
            .or_else(|_| fs::read_to_string(device.join("name")));
        if let Ok(label) = label {
            let label = label.trim();
            if !label.is_empty() {
                gpus.push((clean_gpu_name(label), is_integrated_gpu(&path)));
            }
        }
    }
    gpus
}

fn is_integrated_gpu(card_path: &Path) -> bool {
    // Intel GPUs are usually integrated
    if let Ok(vendor) = fs::read_to_string(card_path.join("device/vendor")) {
        if vendor.trim() == "0x8086" {
            return true;
        }
    }

    // Typical integrated GPU slot (00:02.0)
    fs::read_link(card_path.join("device"))
        .map(|target| target.to_string_lossy().contains("0000:00:02"))
        .unwrap_or(false)
}

fn gpus_from_lspci() -> Vec<(String, bool)> {
    let Ok(output) = run_command("lspci", &[]) else {
        return Vec::new();
    };
    output
        .lines()
        .filter(|line| {
            line.contains("VGA compatible controller")
                || line.contains("3D controller")
                || line.contains("Display controller")
        })
        .filter_map(parse_gpu_from_lspci)
        .collect()
}

pub(crate) fn parse_gpu_from_lspci(line: &str) -> Option<(String, bool)> {
    let description = line.splitn(3, ": ").nth(1).or_else(|| line.rsplit(": ").next())?;
    let cleaned = description.split(" (rev ").next().unwrap_or(description).trim();
    let name = extract_gpu_model_name(cleaned);
    let integrated = looks_integrated(line, &name);
    Some((name, integrated))
}

fn extract_gpu_model_name(description: &str) -> String {
    if description.contains("AMD") || description.contains("Advanced Micro Devices") {
        parse_amd_gpu(description)
    } else if description.contains("NVIDIA") || description.contains("GeForce") {
        parse_nvidia_gpu(description)
    } else if description.contains("Intel") {
        format!(
            "Intel {}",
            description
                .replace("Intel Corporation ", "")
                .split(" [")
                .next()
                .unwrap_or(description)
                .trim()
        )
    } else {
        last_bracket(description)
            .filter(|b| !b.contains('/') && b.len() > 3)
            .map(str::to_string)
            .unwrap_or_else(|| clean_gpu_name(description))
    }
}

fn last_bracket(description: &str) -> Option<&str> {
    let start = description.rfind('[')?;
    let end = description[start..].find(']')?;
    Some(&description[start + 1..start + end])
}

fn parse_amd_gpu(description: &str) -> String {
    if let Some(bracket) = last_bracket(description) {
        if bracket.contains("Radeon") {
            // "RX 7700 XT / 7800 XT": take the higher-end model
            let model = bracket.rsplit(" / ").next().unwrap_or(bracket).trim();
            return format!("AMD {}", model);
        }
        if !bracket.contains('/') && bracket.len() > 2 {
            return format!("AMD {}", bracket);
        }
    }
    "AMD GPU".to_string()
}

fn parse_nvidia_gpu(description: &str) -> String {
    if let Some(bracket) = last_bracket(description) {
        if bracket.contains("GeForce") || bracket.contains("RTX") || bracket.contains("GTX") {
            return format!("NVIDIA {}", bracket.trim_start_matches("NVIDIA ").trim());
        }
    }
    "NVIDIA GPU".to_string()
}

fn looks_integrated(lspci_line: &str, gpu_name: &str) -> bool {
    let name = gpu_name.to_lowercase();
    lspci_line.starts_with("00:02.0")
        || ["raphael", "renoir", "cezanne", "iris", "uhd", "hd graphics"]
            .iter()
            .any(|hint| name.contains(hint))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CPUINFO: &str = "processor\t: 0\nmodel name\t: AMD Ryzen 7 7700X 8-Core Processor\nphysical id\t: 0\ncore id\t\t: 0\n\nprocessor\t: 1\nmodel name\t: AMD Ryzen 7 7700X 8-Core Processor\nphysical id\t: 0\ncore id\t\t: 0\n\nprocessor\t: 2\nmodel name\t: AMD Ryzen 7 7700X 8-Core Processor\nphysical id\t: 0\ncore id\t\t: 1\n";

    #[test]
    fn cpu_model_from_cpuinfo() {
        assert_eq!(
            parse_cpu_model(CPUINFO).as_deref(),
            Some("AMD Ryzen 7 7700X 8-Core Processor")
        );
        assert_eq!(
            parse_cpu_model("processor : 0\nHardware : BCM2835\n").as_deref(),
            Some("BCM2835")
        );
        assert_eq!(parse_cpu_model("processor : 0\n"), None);
    }

    #[test]
    fn physical_cores_from_sibling_pairs() {
        assert_eq!(count_physical_cores(CPUINFO), 2);
        assert_eq!(count_physical_cores("processor : 0\n"), 0);
    }

    #[test]
    fn lspci_lines() {
        let (name, integrated) = parse_gpu_from_lspci(
            "03:00.0 VGA compatible controller: Advanced Micro Devices, Inc. [AMD/ATI] Navi 32 [Radeon RX 7700 XT / 7800 XT] (rev c8)",
        )
        .unwrap();
        assert_eq!(name, "AMD 7800 XT");
        assert!(!integrated);

        let (name, integrated) = parse_gpu_from_lspci(
            "00:02.0 VGA compatible controller: Intel Corporation Alder Lake-P GT2 [Iris Xe Graphics] (rev 0c)",
        )
        .unwrap();
        assert_eq!(name, "Intel Alder Lake-P GT2");
        assert!(integrated);

        let (name, _) = parse_gpu_from_lspci(
            "01:00.0 VGA compatible controller: NVIDIA Corporation AD104 [GeForce RTX 4070] (rev a1)",
        )
        .unwrap();
        assert_eq!(name, "NVIDIA GeForce RTX 4070");
    }
}
