use super::{from_celsius, get_json, parse_iso8601, Coords, HttpClient, Units, WeatherReport};
use crate::error::Result;
use serde::Deserialize;

const DEFAULT_ENDPOINT: &str = "https://api.open-meteo.com";

/// Open-Meteo forecast API. Coordinates only, no key.
#[derive(Debug, Clone)]
pub struct OpenMeteo {
    client: HttpClient,
    pub(super) coords: Coords,
    pub(super) units: Units,
    pub(super) endpoint: String,
}

#[derive(Debug, Deserialize)]
struct Response {
    current_weather: CurrentWeather,
}

#[derive(Debug, Deserialize)]
struct CurrentWeather {
    temperature: f64,
    weathercode: i32,
    time: String,
}

impl OpenMeteo {
    pub(super) fn new(client: HttpClient, coords: Coords, units: Units) -> Self {
        Self {
            client,
            coords,
            units,
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }

    pub(super) fn fetch(&self) -> Result<WeatherReport> {
        let url = format!("{}/v1/forecast", self.endpoint);
        let query = [
            ("latitude", self.coords.lat.to_string()),
            ("longitude", self.coords.lon.to_string()),
            ("current_weather", "true".to_string()),
            ("timezone", "GMT".to_string()),
        ];
        let response: Response = get_json(&self.client, &url, &query)?;
        project(response, self.units)
    }
}

/// Always fetched in Celsius; converted here
fn project(response: Response, units: Units) -> Result<WeatherReport> {
    let current = response.current_weather;
    Ok(WeatherReport {
        temperature: from_celsius(current.temperature, units),
        name: None,
        description: describe(current.weathercode).to_string(),
        units,
        fetched_at: parse_iso8601(&widen_time(&current.time))?,
    })
}

/// Open-Meteo reports `YYYY-MM-DDTHH:MM` in GMT
fn widen_time(time: &str) -> String {
    if time.len() == 16 && time.as_bytes().get(10) == Some(&b'T') {
        format!("{}:00Z", time)
    } else {
        time.to_string()
    }
}

/// WMO weather interpretation code
fn describe(code: i32) -> &'static str {
    match code {
        0 => "clear sky",
        1 => "mainly clear",
        2 => "partly cloudy",
        3 => "overcast",
        45 | 48 => "fog",
        51..=55 => "drizzle",
        56 | 57 => "freezing drizzle",
        61..=65 => "rain",
        66 | 67 => "freezing rain",
        71..=75 => "snow fall",
        77 => "snow grains",
        80..=82 => "rain showers",
        85 | 86 => "snow showers",
        95 => "thunderstorm",
        96..=99 => "thunderstorm with hail",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DracErrorCode;

    fn payload(time: &str) -> Response {
        serde_json::from_value(serde_json::json!({
            "latitude": 59.9,
            "longitude": 10.75,
            "current_weather": { "temperature": 21.3, "weathercode": 3, "time": time }
        }))
        .unwrap()
    }

    #[test]
    fn projects_metric_payload() {
        let report = project(payload("2024-06-01T12:00:00Z"), Units::Metric).unwrap();
        assert_eq!(report.temperature, 21.3);
        assert_eq!(report.description, "overcast");
        assert_eq!(report.units, Units::Metric);
        assert_eq!(report.fetched_at, 1717243200);
        assert_eq!(report.name, None);
    }

    #[test]
    fn converts_for_imperial() {
        let report = project(payload("2024-06-01T12:00:00Z"), Units::Imperial).unwrap();
        assert!((report.temperature - 70.34).abs() < 0.01);
        assert_eq!(report.units, Units::Imperial);
    }

    #[test]
    fn accepts_minute_precision_times() {
        let report = project(payload("2024-06-01T12:00"), Units::Metric).unwrap();
        assert_eq!(report.fetched_at, 1717243200);

        let err = project(payload("June 1st"), Units::Metric).unwrap_err();
        assert_eq!(err.code, DracErrorCode::ParseError);
    }

    #[test]
    fn wmo_table() {
        let cases = [
            (0, "clear sky"),
            (1, "mainly clear"),
            (2, "partly cloudy"),
            (45, "fog"),
            (48, "fog"),
            (53, "drizzle"),
            (57, "freezing drizzle"),
            (63, "rain"),
            (65, "rain"),
            (66, "freezing rain"),
            (73, "snow fall"),
            (77, "snow grains"),
            (81, "rain showers"),
            (86, "snow showers"),
            (95, "thunderstorm"),
            (99, "thunderstorm with hail"),
            (4, "unknown"),
            (1000, "unknown"),
            (-1, "unknown"),
        ];
        for (code, phrase) in cases {
            assert_eq!(describe(code), phrase, "code {}", code);
        }
    }
}
