//! String parsing utilities

/// Extract value after a colon and space
pub fn extract_after_colon(line: &str) -> Option<String> {
    line.split_once(':')
        .map(|(_, value)| value.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Parse a `/proc/meminfo`-style line (`MemTotal:  16318412 kB`) into bytes
pub fn parse_kib_line(line: &str) -> Option<u64> {
    let value = line.split_once(':')?.1.trim();
    let kib: u64 = value.trim_end_matches("kB").trim().parse().ok()?;
    Some(kib * 1024)
}

/// Clean and simplify GPU names
pub fn clean_gpu_name(raw_name: &str) -> String {
    raw_name
        .replace("Advanced Micro Devices, Inc.", "AMD")
        .replace("Intel Corporation", "Intel")
        .replace("NVIDIA Corporation", "NVIDIA")
        .replace("Corporation", "")
        .split(" (rev ")
        .next()
        .unwrap_or(raw_name)
        .trim()
        .to_string()
}

/// Prettify a shell or program basename (`/usr/bin/zsh` -> `Zsh`)
pub fn pretty_program_name(path: &str) -> String {
    let base = path.rsplit('/').next().unwrap_or(path);
    match base {
        "bash" => "Bash".to_string(),
        "zsh" => "Zsh".to_string(),
        "fish" => "Fish".to_string(),
        "nu" => "Nushell".to_string(),
        "pwsh" => "PowerShell".to_string(),
        "ksh" => "KornShell".to_string(),
        "tcsh" => "Tcsh".to_string(),
        "dash" => "Dash".to_string(),
        "elvish" => "Elvish".to_string(),
        "xonsh" => "Xonsh".to_string(),
        other => capitalize_first_letter(other),
    }
}

pub fn capitalize_first_letter(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
