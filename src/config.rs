//! Front-end configuration loaded from `<config_dir>/draconis/config.toml`

use crate::collectors::packages::{CountOptions, PackageManagers};
use crate::error::{DracError, DracErrorCode, Result};
use crate::services::weather::{self, Location, Units, WeatherProvider, WeatherService};
use dirs::config_dir;
use serde::Deserialize;
use std::{
    fs, io,
    path::{Path, PathBuf},
};

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub display: DisplayConfig,
    pub weather: WeatherConfig,
    pub packages: PackagesConfig,
    pub now_playing: NowPlayingConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct GeneralConfig {
    /// Name used in the greeting line
    pub name: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        let name = std::env::var("USER")
            .ok()
            .filter(|user| !user.is_empty())
            .or_else(|| {
                dirs::home_dir()
                    .and_then(|home| home.file_name().map(|n| n.to_string_lossy().into_owned()))
            })
            .unwrap_or_else(|| "User".to_string());
        Self { name }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct DisplayConfig {
    pub separator: String,
    /// `#rrggbb` colour for labels
    pub label_color: Option<String>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            separator: ": ".to_string(),
            label_color: None,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct WeatherConfig {
    pub enabled: bool,
    pub provider: WeatherProvider,
    pub units: Units,
    pub api_key: Option<String>,
    pub location: Option<Location>,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: WeatherProvider::OpenMeteo,
            units: Units::Metric,
            api_key: None,
            location: None,
        }
    }
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(default)]
pub struct PackagesConfig {
    /// Manager names; unset means every manager for this platform
    pub managers: Option<Vec<String>>,
    pub appimage_dirs: Option<Vec<String>>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct NowPlayingConfig {
    pub enabled: bool,
}

impl Default for NowPlayingConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Config {
    pub fn default_path() -> Option<PathBuf> {
        config_dir().map(|p| p.join("draconis").join("config.toml"))
    }

    /// Load from `path`, or from the default location.
    ///
    /// A missing default file yields the built-in defaults; a missing
    /// explicit path is an error.
    pub fn load(path: Option<&Path>) -> Result<Config> {
        let (path, explicit) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => match Self::default_path() {
                Some(path) => (path, false),
                None => return Ok(Config::default()),
            },
        };

        let config_data = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(err) if err.kind() == io::ErrorKind::NotFound && !explicit => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Config::default());
            }
            Err(err) => {
                let code = match err.kind() {
                    io::ErrorKind::NotFound => DracErrorCode::NotFound,
                    _ => DracErrorCode::IoError,
                };
                return Err(DracError::new(
                    code,
                    format!("failed to read {}: {}", path.display(), err),
                ));
            }
        };

        Self::from_toml_str(&config_data).map_err(|err| {
            DracError::new(err.code, format!("{}: {}", path.display(), err.message))
        })
    }

    pub fn from_toml_str(config_data: &str) -> Result<Config> {
        let config: Config = toml::de::from_str(config_data)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.weather.enabled && self.weather.location.is_none() {
            return Err(DracError::new(
                DracErrorCode::InvalidArgument,
                "weather is enabled but no location is set",
            ));
        }
        self.package_managers()?;
        Ok(())
    }

    pub fn package_managers(&self) -> Result<PackageManagers> {
        let Some(names) = &self.packages.managers else {
            return Ok(PackageManagers::all_for_platform());
        };

        names.iter().try_fold(PackageManagers::empty(), |set, name| {
            PackageManagers::from_config_name(name)
                .map(|manager| set | manager)
                .ok_or_else(|| {
                    DracError::new(
                        DracErrorCode::InvalidArgument,
                        format!("unknown package manager {:?}", name),
                    )
                })
        })
    }

    pub fn count_options(&self) -> CountOptions {
        match &self.packages.appimage_dirs {
            Some(dirs) => CountOptions {
                appimage_dirs: dirs
                    .iter()
                    .map(|dir| PathBuf::from(shellexpand::tilde(dir).into_owned()))
                    .collect(),
            },
            None => CountOptions::default(),
        }
    }

    /// The configured weather service, or `None` when weather is off
    pub fn weather_service(&self) -> Option<Result<WeatherService>> {
        if !self.weather.enabled {
            return None;
        }
        let location = self.weather.location.clone()?;
        Some(weather::create_weather_service(
            self.weather.provider,
            location,
            self.weather.units,
            self.weather.api_key.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::weather::Coords;

    #[test]
    fn empty_file_gives_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert!(!config.weather.enabled);
        assert!(config.now_playing.enabled);
        assert_eq!(config.display.separator, ": ");
        assert_eq!(config.package_managers().unwrap(), PackageManagers::all_for_platform());
        assert!(config.weather_service().is_none());
    }

    #[test]
    fn parses_full_file() {
        let config = Config::from_toml_str(
            r##"
            [general]
            name = "Mars"

            [display]
            separator = " -> "
            label_color = "#ff8800"

            [weather]
            enabled = true
            provider = "metno"
            units = "imperial"
            location = { lat = 59.91, lon = 10.75 }

            [packages]
            managers = ["cargo", "pacman", "Flatpak"]
            appimage_dirs = ["~/Apps", "/opt/appimages"]

            [now_playing]
            enabled = false
            "##,
        )
        .unwrap();

        assert_eq!(config.general.name, "Mars");
        assert_eq!(config.display.label_color.as_deref(), Some("#ff8800"));
        assert_eq!(config.weather.provider, WeatherProvider::MetNo);
        assert_eq!(config.weather.units, Units::Imperial);
        assert_eq!(
            config.weather.location,
            Some(Location::Coords(Coords { lat: 59.91, lon: 10.75 }))
        );
        assert_eq!(
            config.package_managers().unwrap(),
            PackageManagers::CARGO | PackageManagers::PACMAN | PackageManagers::FLATPAK
        );
        assert!(!config.now_playing.enabled);

        let options = config.count_options();
        assert_eq!(options.appimage_dirs.len(), 2);
        assert!(!options.appimage_dirs[0].to_string_lossy().starts_with('~'));
        assert_eq!(options.appimage_dirs[1], PathBuf::from("/opt/appimages"));
    }

    #[test]
    fn city_location() {
        let config = Config::from_toml_str(
            r#"
            [weather]
            enabled = true
            provider = "openweathermap"
            api_key = "abc"
            location = "Oslo"
            "#,
        )
        .unwrap();
        assert_eq!(config.weather.location, Some(Location::City("Oslo".into())));
    }

    #[test]
    fn weather_without_location_is_rejected() {
        let err = Config::from_toml_str("[weather]\nenabled = true\n").unwrap_err();
        assert_eq!(err.code, DracErrorCode::InvalidArgument);
    }

    #[test]
    fn unknown_manager_is_rejected() {
        let err = Config::from_toml_str("[packages]\nmanagers = [\"emerge\"]\n").unwrap_err();
        assert_eq!(err.code, DracErrorCode::InvalidArgument);
        assert!(err.message.contains("emerge"));
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let err = Config::from_toml_str("[weather\nenabled = ").unwrap_err();
        assert_eq!(err.code, DracErrorCode::ParseError);
    }

    #[test]
    fn load_reports_missing_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert_eq!(
            Config::load(Some(&missing)).unwrap_err().code,
            DracErrorCode::NotFound
        );

        let path = dir.path().join("config.toml");
        fs::write(&path, "[general]\nname = \"Ada\"\n").unwrap();
        assert_eq!(Config::load(Some(&path)).unwrap().general.name, "Ada");
    }
}
