//! Weather lookups against OpenWeatherMap, Open-Meteo and MET Norway
//!
//! Every provider is projected onto one [`WeatherReport`]. Fetches go through
//! the [`CacheManager`] under the `weather` key with a ten minute TTL, so a
//! prompt redrawn every few seconds costs one request per interval.

mod metno;
mod openmeteo;
mod openweathermap;

use crate::cache::CacheManager;
use crate::error::{DracError, DracErrorCode, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use metno::MetNo;
pub use openmeteo::OpenMeteo;
pub use openweathermap::OpenWeatherMap;

pub const CACHE_KEY: &str = "weather";
pub const WEATHER_TTL: Duration = Duration::from_secs(10 * 60);
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Unit system of a [`WeatherReport`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    /// Degrees Celsius
    #[default]
    Metric,
    /// Degrees Fahrenheit
    Imperial,
}

impl Units {
    fn as_query(self) -> &'static str {
        match self {
            Units::Metric => "metric",
            Units::Imperial => "imperial",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeatherProvider {
    OpenWeatherMap,
    OpenMeteo,
    MetNo,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coords {
    pub lat: f64,
    pub lon: f64,
}

/// Where to look up the weather. Only OpenWeatherMap resolves city names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Location {
    Coords(Coords),
    City(String),
}

/// Provider-independent current conditions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    /// °C for [`Units::Metric`], °F for [`Units::Imperial`]
    pub temperature: f64,
    /// Place name, when the provider reports one
    pub name: Option<String>,
    /// Short lowercase phrase, e.g. "partly cloudy"
    pub description: String,
    pub units: Units,
    /// Observation time as UTC epoch seconds
    pub fetched_at: u64,
}

/// What is stored under [`CACHE_KEY`]
#[derive(Debug, Serialize, Deserialize)]
struct CachedReport {
    provider: WeatherProvider,
    location: Location,
    report: WeatherReport,
}

/// A configured weather backend
#[derive(Debug, Clone)]
pub enum WeatherService {
    OpenWeatherMap(OpenWeatherMap),
    OpenMeteo(OpenMeteo),
    MetNo(MetNo),
}

/// Build a service for `provider`.
///
/// Fails with `InvalidArgument` when OpenWeatherMap has no API key, when a
/// coordinates-only provider is given a city name, or when coordinates are
/// out of range.
pub fn create_weather_service(
    provider: WeatherProvider,
    location: Location,
    units: Units,
    api_key: Option<String>,
) -> Result<WeatherService> {
    if !cfg!(feature = "weather") {
        return Err(DracError::new(
            DracErrorCode::NotSupported,
            "built without weather support",
        ));
    }

    if let Location::Coords(coords) = &location {
        validate_coords(coords)?;
    }

    let client = build_client()?;
    let service = match provider {
        WeatherProvider::OpenWeatherMap => {
            let api_key = api_key.filter(|key| !key.trim().is_empty()).ok_or_else(|| {
                DracError::new(
                    DracErrorCode::InvalidArgument,
                    "OpenWeatherMap requires an API key",
                )
            })?;
            WeatherService::OpenWeatherMap(OpenWeatherMap::new(client, location, units, api_key))
        }
        WeatherProvider::OpenMeteo => {
            WeatherService::OpenMeteo(OpenMeteo::new(client, coords_only("Open-Meteo", location)?, units))
        }
        WeatherProvider::MetNo => {
            WeatherService::MetNo(MetNo::new(client, coords_only("MET Norway", location)?, units))
        }
    };
    Ok(service)
}

impl WeatherService {
    pub fn provider(&self) -> WeatherProvider {
        match self {
            WeatherService::OpenWeatherMap(_) => WeatherProvider::OpenWeatherMap,
            WeatherService::OpenMeteo(_) => WeatherProvider::OpenMeteo,
            WeatherService::MetNo(_) => WeatherProvider::MetNo,
        }
    }

    /// Point the service at a different base URL (proxies, test servers)
    pub fn with_endpoint(self, endpoint: &str) -> Self {
        let endpoint = endpoint.trim_end_matches('/').to_string();
        match self {
            WeatherService::OpenWeatherMap(mut p) => {
                p.endpoint = endpoint;
                WeatherService::OpenWeatherMap(p)
            }
            WeatherService::OpenMeteo(mut p) => {
                p.endpoint = endpoint;
                WeatherService::OpenMeteo(p)
            }
            WeatherService::MetNo(mut p) => {
                p.endpoint = endpoint;
                WeatherService::MetNo(p)
            }
        }
    }

    pub fn units(&self) -> Units {
        match self {
            WeatherService::OpenWeatherMap(p) => p.units,
            WeatherService::OpenMeteo(p) => p.units,
            WeatherService::MetNo(p) => p.units,
        }
    }

    pub fn location(&self) -> Location {
        match self {
            WeatherService::OpenWeatherMap(p) => p.location.clone(),
            WeatherService::OpenMeteo(p) => Location::Coords(p.coords),
            WeatherService::MetNo(p) => Location::Coords(p.coords),
        }
    }

    /// Current conditions, memoised for [`WEATHER_TTL`]. A cached report
    /// from another provider, location or unit system is refetched. A failed
    /// fetch leaves any cached report untouched.
    pub fn get_weather_info(&self, cache: &CacheManager) -> Result<WeatherReport> {
        let (provider, location, units) = (self.provider(), self.location(), self.units());
        cache
            .get_or_set_if(
                CACHE_KEY,
                WEATHER_TTL,
                |cached: &CachedReport| {
                    cached.provider == provider
                        && cached.location == location
                        && cached.report.units == units
                },
                || {
                    Ok(CachedReport {
                        provider,
                        location: location.clone(),
                        report: self.fetch()?,
                    })
                },
            )
            .map(|cached| cached.report)
    }

    /// Fetch bypassing the cache
    pub fn fetch(&self) -> Result<WeatherReport> {
        match self {
            WeatherService::OpenWeatherMap(p) => p.fetch(),
            WeatherService::OpenMeteo(p) => p.fetch(),
            WeatherService::MetNo(p) => p.fetch(),
        }
    }
}

fn validate_coords(coords: &Coords) -> Result<()> {
    let lat_ok = coords.lat.is_finite() && (-90.0..=90.0).contains(&coords.lat);
    let lon_ok = coords.lon.is_finite() && (-180.0..=180.0).contains(&coords.lon);
    if lat_ok && lon_ok {
        Ok(())
    } else {
        Err(DracError::new(
            DracErrorCode::InvalidArgument,
            format!("coordinates out of range: {}, {}", coords.lat, coords.lon),
        ))
    }
}

fn coords_only(provider: &str, location: Location) -> Result<Coords> {
    match location {
        Location::Coords(coords) => Ok(coords),
        Location::City(city) => Err(DracError::new(
            DracErrorCode::InvalidArgument,
            format!("{} only accepts coordinates, got city {:?}", provider, city),
        )),
    }
}

pub(crate) fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}

/// Convert a metric temperature into the caller's units
pub(crate) fn from_celsius(celsius: f64, units: Units) -> f64 {
    match units {
        Units::Metric => celsius,
        Units::Imperial => celsius_to_fahrenheit(celsius),
    }
}

/// Parse `YYYY-MM-DDTHH:MM:SSZ` (exactly 20 characters) to UTC epoch seconds
pub fn parse_iso8601(timestamp: &str) -> Result<u64> {
    let invalid = || {
        DracError::new(
            DracErrorCode::ParseError,
            format!("invalid ISO-8601 timestamp {:?}", timestamp),
        )
    };

    let bytes = timestamp.as_bytes();
    if bytes.len() != 20 {
        return Err(invalid());
    }
    let separators = [(4, b'-'), (7, b'-'), (10, b'T'), (13, b':'), (16, b':'), (19, b'Z')];
    if separators.iter().any(|&(i, c)| bytes[i] != c) {
        return Err(invalid());
    }

    let field = |range: std::ops::Range<usize>| -> Result<u32> {
        let digits = &timestamp[range];
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        digits.parse().map_err(|_| invalid())
    };

    let year = field(0..4)?;
    let (month, day) = (field(5..7)?, field(8..10)?);
    let (hour, minute, second) = (field(11..13)?, field(14..16)?, field(17..19)?);

    let epoch = i32::try_from(year)
        .ok()
        .and_then(|year| chrono::NaiveDate::from_ymd_opt(year, month, day))
        .and_then(|date| date.and_hms_opt(hour, minute, second))
        .map(|datetime| datetime.and_utc().timestamp())
        .ok_or_else(invalid)?;

    u64::try_from(epoch).map_err(|_| invalid())
}

#[cfg(feature = "weather")]
pub(crate) type HttpClient = reqwest::blocking::Client;

#[cfg(not(feature = "weather"))]
#[derive(Debug, Clone)]
pub(crate) struct HttpClient;

#[cfg(feature = "weather")]
fn build_client() -> Result<HttpClient> {
    let client = reqwest::blocking::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .connect_timeout(REQUEST_TIMEOUT)
        .user_agent(concat!("draconis/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

#[cfg(not(feature = "weather"))]
fn build_client() -> Result<HttpClient> {
    Ok(HttpClient)
}

/// GET `url` and decode a JSON body. 4xx responses carry the provider's
/// reason in the error message.
#[cfg(feature = "weather")]
pub(crate) fn get_json<T: serde::de::DeserializeOwned>(
    client: &HttpClient,
    url: &str,
    query: &[(&str, String)],
) -> Result<T> {
    tracing::debug!(url, "weather request");
    let response = client.get(url).query(query).send()?;
    let status = response.status();

    if status.is_client_error() {
        let body = response.text().unwrap_or_default();
        return Err(DracError::new(
            DracErrorCode::ApiUnavailable,
            format!("HTTP {}: {}", status.as_u16(), error_reason(&body)),
        ));
    }
    if !status.is_success() {
        return Err(DracError::new(
            DracErrorCode::ApiUnavailable,
            format!("HTTP {}", status.as_u16()),
        ));
    }

    let body = response.text()?;
    Ok(serde_json::from_str(&body)?)
}

#[cfg(not(feature = "weather"))]
pub(crate) fn get_json<T: serde::de::DeserializeOwned>(
    _client: &HttpClient,
    _url: &str,
    _query: &[(&str, String)],
) -> Result<T> {
    Err(DracError::new(
        DracErrorCode::NotSupported,
        "built without weather support",
    ))
}

/// Providers report failures as `{"message": ..}` or `{"reason": ..}`
#[cfg_attr(not(feature = "weather"), allow(dead_code))]
fn error_reason(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["message", "reason"] {
            if let Some(reason) = value.get(key).and_then(|v| v.as_str()) {
                return reason.to_string();
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "no reason given".to_string()
    } else {
        trimmed.chars().take(200).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_strict_iso8601() {
        assert_eq!(parse_iso8601("2024-01-02T03:04:05Z").unwrap(), 1704164645);
        assert_eq!(parse_iso8601("2024-06-01T12:00:00Z").unwrap(), 1717243200);
        assert_eq!(parse_iso8601("1970-01-01T00:00:00Z").unwrap(), 0);
    }

    #[test]
    fn rejects_malformed_timestamps() {
        for bad in [
            "2024-01-02T03:04:05",
            "2024-01-02 03:04:05Z",
            "2024-01-02T03:04:05+0",
            "2024-1-02T03:04:05Z",
            "2024-0a-02T03:04:05Z",
            "2024-02-30T00:00:00Z",
            "2024-01-02T25:00:00Z",
            "",
        ] {
            let err = parse_iso8601(bad).unwrap_err();
            assert_eq!(err.code, DracErrorCode::ParseError, "{:?}", bad);
        }
    }

    #[test]
    fn converts_to_fahrenheit() {
        assert!((celsius_to_fahrenheit(21.3) - 70.34).abs() < 0.01);
        assert_eq!(celsius_to_fahrenheit(-40.0), -40.0);
        assert_eq!(from_celsius(12.5, Units::Metric), 12.5);
    }

    #[test]
    fn coordinate_bounds() {
        assert!(validate_coords(&Coords { lat: 59.91, lon: 10.75 }).is_ok());
        assert!(validate_coords(&Coords { lat: -90.0, lon: 180.0 }).is_ok());
        assert!(validate_coords(&Coords { lat: 90.5, lon: 0.0 }).is_err());
        assert!(validate_coords(&Coords { lat: 0.0, lon: -181.0 }).is_err());
        assert!(validate_coords(&Coords { lat: f64::NAN, lon: 0.0 }).is_err());
    }

    #[test]
    fn error_reason_prefers_json_fields() {
        assert_eq!(
            error_reason(r#"{"cod":401,"message":"Invalid API key"}"#),
            "Invalid API key"
        );
        assert_eq!(
            error_reason(r#"{"error":true,"reason":"Latitude must be in range"}"#),
            "Latitude must be in range"
        );
        assert_eq!(error_reason("  plain text  "), "plain text");
        assert_eq!(error_reason(""), "no reason given");
    }

    #[test]
    fn location_deserializes_untagged() {
        #[derive(Deserialize)]
        struct Wrapper {
            location: Location,
        }
        let city: Wrapper = toml::from_str(r#"location = "Oslo""#).unwrap();
        assert_eq!(city.location, Location::City("Oslo".into()));
        let coords: Wrapper = toml::from_str("location = { lat = 59.9, lon = 10.7 }").unwrap();
        assert_eq!(coords.location, Location::Coords(Coords { lat: 59.9, lon: 10.7 }));
    }

    #[cfg(feature = "weather")]
    #[test]
    fn construction_rejects_bad_arguments() {
        let oslo = Location::Coords(Coords { lat: 59.91, lon: 10.75 });

        let err = create_weather_service(WeatherProvider::OpenWeatherMap, oslo.clone(), Units::Metric, None)
            .unwrap_err();
        assert_eq!(err.code, DracErrorCode::InvalidArgument);

        let err = create_weather_service(
            WeatherProvider::OpenMeteo,
            Location::City("Oslo".into()),
            Units::Metric,
            None,
        )
        .unwrap_err();
        assert_eq!(err.code, DracErrorCode::InvalidArgument);

        let err = create_weather_service(
            WeatherProvider::MetNo,
            Location::Coords(Coords { lat: 123.0, lon: 0.0 }),
            Units::Metric,
            None,
        )
        .unwrap_err();
        assert_eq!(err.code, DracErrorCode::InvalidArgument);

        let service = create_weather_service(
            WeatherProvider::OpenWeatherMap,
            Location::City("Oslo".into()),
            Units::Imperial,
            Some("key".into()),
        )
        .unwrap();
        assert_eq!(service.provider(), WeatherProvider::OpenWeatherMap);

        let service = create_weather_service(WeatherProvider::MetNo, oslo, Units::Metric, None).unwrap();
        assert_eq!(service.provider(), WeatherProvider::MetNo);
    }

    #[cfg(not(feature = "weather"))]
    #[test]
    fn disabled_build_reports_not_supported() {
        let err = create_weather_service(
            WeatherProvider::OpenMeteo,
            Location::Coords(Coords { lat: 0.0, lon: 0.0 }),
            Units::Metric,
            None,
        )
        .unwrap_err();
        assert_eq!(err.code, DracErrorCode::NotSupported);
    }
}
