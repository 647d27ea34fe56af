use clap::Parser;
use draconis::config::Config;
use draconis::{
    collectors, BatteryStatus, CacheManager, DracError, DracErrorCode, ResourceUsage, Units,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{debug, error, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "draconis")]
#[command(about = "Print a summary of this machine")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Config file (default: <config_dir>/draconis/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run every collector and overwrite cached values
    #[arg(long)]
    ignore_cache: bool,

    /// Remove cached values and exit
    #[arg(long)]
    clear_cache: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn hex_to_ansi(hex: &str) -> String {
    if hex.starts_with('#') && hex.len() == 7 {
        if let (Ok(r), Ok(g), Ok(b)) = (
            u8::from_str_radix(&hex[1..3], 16),
            u8::from_str_radix(&hex[3..5], 16),
            u8::from_str_radix(&hex[5..7], 16),
        ) {
            return format!("\x1b[38;2;{};{};{}m", r, g, b);
        }
    }
    "\x1b[0m".to_string()
}

fn format_uptime(uptime: Duration) -> String {
    let secs = uptime.as_secs();
    let (days, hours, minutes) = (secs / 86_400, (secs % 86_400) / 3600, (secs % 3600) / 60);
    if days > 0 {
        format!("{}d {}h {:02}m", days, hours, minutes)
    } else if hours > 0 {
        format!("{}h {:02}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}

fn format_usage(usage: ResourceUsage) -> String {
    const GIB: f64 = 1024.0 * 1024.0 * 1024.0;
    format!(
        "{:.2} GiB / {:.2} GiB ({:.0}%)",
        usage.used_bytes as f64 / GIB,
        usage.total_bytes as f64 / GIB,
        usage.percent()
    )
}

struct Printer {
    label_color: String,
    separator: String,
}

impl Printer {
    fn line(&self, label: &str, value: draconis::Result<String>) {
        match value {
            Ok(value) => println!("{}{}\x1b[0m{}{}", self.label_color, label, self.separator, value),
            // Absent features are expected, not worth a warning
            Err(err) if err.code == DracErrorCode::NotSupported => {
                debug!("Failed to get {}: {}", label, err)
            }
            Err(err) => warn!("Failed to get {}: {}", label, err),
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let cache = CacheManager::new().ignore_cache(cli.ignore_cache);

    if cli.clear_cache {
        return match cache.clear() {
            Ok(removed) => {
                println!("Removed {} cached entries from {}", removed, cache.dir().display());
                ExitCode::SUCCESS
            }
            Err(err) => {
                error!("Failed to clear cache: {}", err);
                ExitCode::FAILURE
            }
        };
    }

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            error!("Failed to load config: {}", err);
            return ExitCode::FAILURE;
        }
    };

    let printer = Printer {
        label_color: config
            .display
            .label_color
            .as_deref()
            .map(hex_to_ansi)
            .unwrap_or_else(|| "\x1b[1m".to_string()),
        separator: config.display.separator.clone(),
    };

    match collectors::get_date() {
        Ok(date) => println!("Hello {}! Today is {}", config.general.name, date),
        Err(_) => println!("Hello {}!", config.general.name),
    }

    print_system(&printer, &cache);
    print_hardware(&printer, &cache);
    print_session(&printer, &cache);

    printer.line(
        "Packages",
        config.package_managers().and_then(|managers| {
            draconis::get_total_count_with(
                &cache,
                managers,
                &config.count_options(),
            )
            .map(|count| count.to_string())
        }),
    );

    if let Some(service) = config.weather_service() {
        let report = service.and_then(|service| service.get_weather_info(&cache));
        printer.line(
            "Weather",
            report.map(|report| {
                let unit = match report.units {
                    Units::Metric => "C",
                    Units::Imperial => "F",
                };
                let place = report.name.map(|name| format!(" in {}", name)).unwrap_or_default();
                format!("{:.0}°{}, {}{}", report.temperature, unit, report.description, place)
            }),
        );
    }

    if config.now_playing.enabled {
        match collectors::get_now_playing() {
            Ok(media) => printer.line(
                "Playing",
                Ok(match media.artist {
                    Some(artist) => format!("{} by {}", media.title.unwrap_or_default(), artist),
                    None => media.title.unwrap_or_default(),
                }),
            ),
            // Nothing playing is the common case
            Err(err) if err.is_not_found() => debug!("nothing playing: {}", err),
            Err(err) => printer.line("Playing", Err(err)),
        }
    }

    ExitCode::SUCCESS
}

fn print_system(printer: &Printer, cache: &CacheManager) {
    printer.line(
        "OS",
        collectors::get_operating_system(cache).map(|os| format!("{} {}", os.name, os.version).trim().to_string()),
    );
    printer.line("Kernel", collectors::get_kernel_version(cache));
    printer.line("Host", collectors::get_host(cache));
    printer.line("Uptime", collectors::get_uptime().map(format_uptime));
}

fn print_hardware(printer: &Printer, cache: &CacheManager) {
    let cpu = collectors::get_cpu_model(cache).map(|model| match collectors::get_cpu_cores(cache) {
        Ok(cores) => format!("{} ({}C/{}T)", model, cores.physical, cores.logical),
        Err(_) => model,
    });
    printer.line("CPU", cpu);
    printer.line("GPU", collectors::get_gpu_model(cache));
    printer.line("Memory", collectors::get_mem_info().map(format_usage));
    printer.line("Disk (/)", collectors::get_disk_usage().map(format_usage));

    match collectors::get_battery_info() {
        Ok(battery) if battery.status == BatteryStatus::NotPresent => {}
        Ok(battery) => {
            let mut value = format!("{:?}", battery.status);
            if let Some(percentage) = battery.percentage {
                value = format!("{}% ({})", percentage, value);
            }
            if let Some(remaining) = battery.time_remaining {
                value = format!("{}, {} left", value, format_uptime(remaining));
            }
            printer.line("Battery", Ok(value));
        }
        Err(err) => printer.line("Battery", Err(err)),
    }

    printer.line(
        "Display",
        collectors::get_primary_output(cache)
            .map(|d| format!("{}x{} @ {:.0}Hz", d.width, d.height, d.refresh_hz)),
    );
}

fn print_session(printer: &Printer, cache: &CacheManager) {
    printer.line("Shell", collectors::get_shell(cache));
    printer.line("DE", collectors::get_desktop_environment(cache));
    printer.line("WM", collectors::get_window_manager(cache));

    let network = collectors::get_network_interfaces(cache).and_then(|interfaces| {
        interfaces
            .into_iter()
            .find(|iface| iface.primary)
            .map(|iface| format!("{} {}", iface.name, iface.addresses.join(", ")))
            .ok_or_else(|| DracError::new(DracErrorCode::NotFound, "no primary interface"))
    });
    printer.line("Network", network);
}
