//! Installed-package totals across package managers

use crate::cache::CacheManager;
use crate::error::{DracError, DracErrorCode, Result};
use bitflags::bitflags;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

bitflags! {
    /// Set of package managers to count
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PackageManagers: u32 {
        const CARGO = 1 << 0;
        const NIX = 1 << 1;
        const PACMAN = 1 << 2;
        const DPKG = 1 << 3;
        const RPM = 1 << 4;
        const PORTAGE = 1 << 5;
        const ZYPPER = 1 << 6;
        const APK = 1 << 7;
        const FLATPAK = 1 << 8;
        const SNAP = 1 << 9;
        const APPIMAGE = 1 << 10;
        const HOMEBREW = 1 << 11;
        const WINGET = 1 << 12;
        const CHOCOLATEY = 1 << 13;
        const XBPS = 1 << 14;
        const PKGSRC = 1 << 15;
        const MACPORTS = 1 << 16;
    }
}

const NAMES: [(PackageManagers, &str); 17] = [
    (PackageManagers::CARGO, "cargo"),
    (PackageManagers::NIX, "nix"),
    (PackageManagers::PACMAN, "pacman"),
    (PackageManagers::DPKG, "dpkg"),
    (PackageManagers::RPM, "rpm"),
    (PackageManagers::PORTAGE, "portage"),
    (PackageManagers::ZYPPER, "zypper"),
    (PackageManagers::APK, "apk"),
    (PackageManagers::FLATPAK, "flatpak"),
    (PackageManagers::SNAP, "snap"),
    (PackageManagers::APPIMAGE, "appimage"),
    (PackageManagers::HOMEBREW, "homebrew"),
    (PackageManagers::WINGET, "winget"),
    (PackageManagers::CHOCOLATEY, "chocolatey"),
    (PackageManagers::XBPS, "xbps"),
    (PackageManagers::PKGSRC, "pkgsrc"),
    (PackageManagers::MACPORTS, "macports"),
];

impl PackageManagers {
    /// Lowercase name of a single manager flag
    pub fn name(self) -> Option<&'static str> {
        NAMES.iter().find(|(flag, _)| *flag == self).map(|(_, name)| *name)
    }

    pub fn from_config_name(name: &str) -> Option<Self> {
        let name = name.trim().to_lowercase();
        NAMES.iter().find(|(_, n)| *n == name).map(|(flag, _)| *flag)
    }

    /// Managers that can exist on the build target
    pub fn all_for_platform() -> Self {
        if cfg!(target_os = "linux") {
            Self::CARGO
                | Self::NIX
                | Self::PACMAN
                | Self::DPKG
                | Self::RPM
                | Self::PORTAGE
                | Self::APK
                | Self::FLATPAK
                | Self::SNAP
                | Self::APPIMAGE
                | Self::HOMEBREW
                | Self::XBPS
        } else if cfg!(target_os = "macos") {
            Self::CARGO | Self::NIX | Self::HOMEBREW | Self::MACPORTS
        } else if cfg!(windows) {
            Self::CARGO | Self::WINGET | Self::CHOCOLATEY
        } else {
            Self::CARGO | Self::NIX | Self::PKGSRC
        }
    }

    fn cache_key(self) -> String {
        format!("pkg_count_{}", self.name().unwrap_or("unknown"))
    }
}

/// Tunables for the filesystem-based strategies
#[derive(Debug, Clone)]
pub struct CountOptions {
    /// Directories scanned for `*.AppImage` files
    pub appimage_dirs: Vec<PathBuf>,
}

impl Default for CountOptions {
    fn default() -> Self {
        let appimage_dirs = ["~/Applications", "~/.local/bin", "~/AppImages", "/opt"]
            .iter()
            .map(|dir| PathBuf::from(shellexpand::tilde(dir).into_owned()))
            .collect();
        Self { appimage_dirs }
    }
}

/// Count entries in `path` whose name ends with `extension` (all entries if `None`).
/// `subtract_one` discounts a sentinel entry the manager always keeps there.
pub fn count_dir(manager: &str, path: &Path, extension: Option<&str>, subtract_one: bool) -> Result<u64> {
    let entries = fs::read_dir(path).map_err(|err| {
        if err.kind() == io::ErrorKind::NotFound {
            DracError::new(
                DracErrorCode::NotFound,
                format!("{}: {} does not exist", manager, path.display()),
            )
        } else {
            DracError::new(
                DracError::from(err).code,
                format!("{}: failed to read {}", manager, path.display()),
            )
        }
    })?;

    let count = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| match extension {
            Some(ext) => entry
                .file_name()
                .to_str()
                .map(|name| name.ends_with(ext))
                .unwrap_or(false),
            None => true,
        })
        .count() as u64;

    Ok(if subtract_one { count.saturating_sub(1) } else { count })
}

/// Run a scalar `COUNT` query against a local SQLite database
#[cfg(feature = "packagecount")]
pub fn count_db(manager: &str, db_path: &Path, query: &str) -> Result<u64> {
    use rusqlite::{Connection, OpenFlags};

    if !db_path.exists() {
        return Err(DracError::new(
            DracErrorCode::NotFound,
            format!("{}: database {} does not exist", manager, db_path.display()),
        ));
    }

    let conn = Connection::open_with_flags(
        db_path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    let count: i64 = conn.query_row(query, [], |row| row.get(0))?;

    u64::try_from(count).map_err(|_| {
        DracError::new(
            DracErrorCode::ParseError,
            format!("{}: negative package count {}", manager, count),
        )
    })
}

#[cfg(not(feature = "packagecount"))]
pub fn count_db(_manager: &str, _db_path: &Path, _query: &str) -> Result<u64> {
    Err(DracError::new(
        DracErrorCode::NotSupported,
        "built without package counting",
    ))
}

/// Installed packages for one manager, cached under `pkg_count_<manager>`
pub fn get_count(cache: &CacheManager, manager: PackageManagers, options: &CountOptions) -> Result<u64> {
    let name = manager.name().ok_or_else(|| {
        DracError::new(
            DracErrorCode::InvalidArgument,
            "get_count takes exactly one package manager",
        )
    })?;
    cache.get_or_set_default(&manager.cache_key(), || count_manager(name, options))
}

/// Sum of installed packages across `managers` with default options
pub fn get_total_count(cache: &CacheManager, managers: PackageManagers) -> Result<u64> {
    get_total_count_with(cache, managers, &CountOptions::default())
}

/// Per-manager failures are dropped in favour of the partial sum; only when
/// every manager fails is the first error returned.
#[cfg(feature = "packagecount")]
pub fn get_total_count_with(cache: &CacheManager, managers: PackageManagers, options: &CountOptions) -> Result<u64> {
    use rayon::prelude::*;

    if managers.is_empty() {
        return Err(DracError::new(
            DracErrorCode::InvalidArgument,
            "no package managers selected",
        ));
    }

    let selected: Vec<PackageManagers> = managers.iter().collect();
    let results: Vec<Result<u64>> = selected
        .par_iter()
        .map(|manager| get_count(cache, *manager, options))
        .collect();

    sum_counts(&selected, results)
}

#[cfg(not(feature = "packagecount"))]
pub fn get_total_count_with(_cache: &CacheManager, _managers: PackageManagers, _options: &CountOptions) -> Result<u64> {
    Err(DracError::new(
        DracErrorCode::NotSupported,
        "built without package counting",
    ))
}

pub(crate) fn sum_counts(managers: &[PackageManagers], results: Vec<Result<u64>>) -> Result<u64> {
    let mut total = 0u64;
    let mut any_ok = false;
    let mut first_err = None;

    for (manager, result) in managers.iter().zip(results) {
        match result {
            Ok(count) => {
                debug!(manager = manager.name().unwrap_or("?"), count, "package count");
                total += count;
                any_ok = true;
            }
            Err(err) => {
                debug!(manager = manager.name().unwrap_or("?"), %err, "package count failed");
                if first_err.is_none() {
                    first_err = Some(err);
                }
            }
        }
    }

    match (any_ok, first_err) {
        (true, _) => Ok(total),
        (false, Some(err)) => {
            warn!(%err, "every package manager failed");
            Err(err)
        }
        (false, None) => Err(DracError::new(
            DracErrorCode::InvalidArgument,
            "no package managers selected",
        )),
    }
}

fn count_manager(name: &str, options: &CountOptions) -> Result<u64> {
    match name {
        "cargo" => count_dir(name, &cargo_bin_dir()?, None, false),
        "nix" => count_db(
            name,
            Path::new("/nix/var/nix/db/db.sqlite"),
            "SELECT COUNT(path) FROM ValidPaths WHERE sigs IS NOT NULL",
        ),
        // ALPM_DB_VERSION sits next to the package directories
        "pacman" => count_dir(name, Path::new("/var/lib/pacman/local"), None, true),
        "dpkg" => count_dir(name, Path::new("/var/lib/dpkg/info"), Some(".list"), false),
        "rpm" | "zypper" => count_db(
            name,
            Path::new("/var/lib/rpm/rpmdb.sqlite"),
            "SELECT COUNT(*) FROM Packages",
        ),
        "portage" => count_nested(name, Path::new("/var/db/pkg")),
        "apk" => count_prefixed_lines(name, Path::new("/lib/apk/db/installed"), "P:"),
        "flatpak" => count_flatpak(name),
        // /snap/bin is always present
        "snap" => count_dir(name, Path::new("/snap"), None, true),
        "appimage" => count_appimages(name, &options.appimage_dirs),
        "homebrew" => count_homebrew(name),
        "macports" => count_db(
            name,
            Path::new("/opt/local/var/macports/registry/registry.db"),
            "SELECT COUNT(*) FROM ports WHERE state = 'installed'",
        ),
        "xbps" => count_dir(name, Path::new("/var/db/xbps"), Some(".plist"), false),
        "pkgsrc" => count_dir(name, Path::new("/usr/pkg/pkgdb"), None, false),
        "chocolatey" if cfg!(windows) => {
            count_dir(name, Path::new(r"C:\ProgramData\chocolatey\lib"), None, false)
        }
        _ => Err(DracError::new(
            DracErrorCode::NotSupported,
            format!("{} counting is not supported on this platform", name),
        )),
    }
}

fn cargo_bin_dir() -> Result<PathBuf> {
    if let Some(home) = std::env::var_os("CARGO_HOME").filter(|h| !h.is_empty()) {
        return Ok(PathBuf::from(home).join("bin"));
    }
    dirs::home_dir()
        .map(|home| home.join(".cargo").join("bin"))
        .ok_or_else(|| DracError::new(DracErrorCode::NotFound, "cargo: no home directory"))
}

/// Portage keeps one directory per package under a category directory
fn count_nested(manager: &str, root: &Path) -> Result<u64> {
    let categories = fs::read_dir(root).map_err(|err| {
        DracError::new(
            DracError::from(err).code,
            format!("{}: failed to read {}", manager, root.display()),
        )
    })?;

    let mut count = 0;
    for category in categories.filter_map(|entry| entry.ok()) {
        let path = category.path();
        if path.is_dir() {
            count += count_dir(manager, &path, None, false).unwrap_or(0);
        }
    }
    Ok(count)
}

fn count_prefixed_lines(manager: &str, path: &Path, prefix: &str) -> Result<u64> {
    let content = fs::read_to_string(path).map_err(|err| {
        DracError::new(
            DracError::from(err).code,
            format!("{}: failed to read {}", manager, path.display()),
        )
    })?;
    Ok(content.lines().filter(|line| line.starts_with(prefix)).count() as u64)
}

fn sum_existing(manager: &str, dirs: &[PathBuf], extension: Option<&str>) -> Result<u64> {
    let mut total = None;
    for dir in dirs {
        match count_dir(manager, dir, extension, false) {
            Ok(count) => *total.get_or_insert(0) += count,
            Err(err) if err.is_not_found() => continue,
            Err(err) => return Err(err),
        }
    }
    total.ok_or_else(|| {
        DracError::new(
            DracErrorCode::NotFound,
            format!("{}: none of the package directories exist", manager),
        )
    })
}

fn count_flatpak(manager: &str) -> Result<u64> {
    let mut dirs = vec![PathBuf::from("/var/lib/flatpak/app")];
    if let Some(data) = dirs::data_dir() {
        dirs.push(data.join("flatpak").join("app"));
    }
    sum_existing(manager, &dirs, None)
}

fn count_appimages(manager: &str, dirs: &[PathBuf]) -> Result<u64> {
    sum_existing(manager, dirs, Some(".AppImage"))
}

fn count_homebrew(manager: &str) -> Result<u64> {
    let prefixes = ["/opt/homebrew", "/usr/local", "/home/linuxbrew/.linuxbrew"];
    let dirs: Vec<PathBuf> = prefixes
        .iter()
        .flat_map(|prefix| {
            let prefix = Path::new(prefix);
            [prefix.join("Cellar"), prefix.join("Caskroom")]
        })
        .collect();
    sum_existing(manager, &dirs, None)
}
