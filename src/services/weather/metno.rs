use super::{from_celsius, get_json, parse_iso8601, Coords, HttpClient, Units, WeatherReport};
use crate::error::{DracError, DracErrorCode, Result};
use serde::Deserialize;

const DEFAULT_ENDPOINT: &str = "https://api.met.no";

/// MET Norway locationforecast. Coordinates only; requires a User-Agent.
#[derive(Debug, Clone)]
pub struct MetNo {
    client: HttpClient,
    pub(super) coords: Coords,
    pub(super) units: Units,
    pub(super) endpoint: String,
}

#[derive(Debug, Deserialize)]
struct Response {
    properties: Properties,
}

#[derive(Debug, Deserialize)]
struct Properties {
    timeseries: Vec<TimeStep>,
}

#[derive(Debug, Deserialize)]
struct TimeStep {
    time: String,
    data: StepData,
}

#[derive(Debug, Deserialize)]
struct StepData {
    instant: Instant,
    next_1_hours: Option<NextHours>,
}

#[derive(Debug, Deserialize)]
struct Instant {
    details: InstantDetails,
}

#[derive(Debug, Deserialize)]
struct InstantDetails {
    air_temperature: f64,
}

#[derive(Debug, Deserialize)]
struct NextHours {
    summary: Summary,
}

#[derive(Debug, Deserialize)]
struct Summary {
    symbol_code: String,
}

impl MetNo {
    pub(super) fn new(client: HttpClient, coords: Coords, units: Units) -> Self {
        Self {
            client,
            coords,
            units,
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }

    pub(super) fn fetch(&self) -> Result<WeatherReport> {
        let url = format!("{}/weatherapi/locationforecast/2.0/compact", self.endpoint);
        // The API asks for at most four decimals
        let query = [
            ("lat", format!("{:.4}", self.coords.lat)),
            ("lon", format!("{:.4}", self.coords.lon)),
        ];
        let response: Response = get_json(&self.client, &url, &query)?;
        project(response, self.units)
    }
}

fn project(response: Response, units: Units) -> Result<WeatherReport> {
    let step = response.properties.timeseries.into_iter().next().ok_or_else(|| {
        DracError::new(DracErrorCode::ParseError, "MET Norway returned an empty timeseries")
    })?;

    let description = match &step.data.next_1_hours {
        Some(next) => describe(strip_time_of_day(&next.summary.symbol_code)),
        None => "unknown".to_string(),
    };

    Ok(WeatherReport {
        temperature: from_celsius(step.data.instant.details.air_temperature, units),
        name: None,
        description,
        units,
        fetched_at: parse_iso8601(&step.time)?,
    })
}

/// `clearsky_day` -> `clearsky`
fn strip_time_of_day(symbol: &str) -> &str {
    ["_polartwilight", "_night", "_day"]
        .iter()
        .find_map(|suffix| symbol.strip_suffix(suffix))
        .unwrap_or(symbol)
}

/// Phrase for a stripped symbol code. Unknown codes come back unchanged.
fn describe(symbol: &str) -> String {
    let fixed = match symbol {
        "clearsky" => Some("clear sky"),
        "fair" => Some("fair"),
        "partlycloudy" => Some("partly cloudy"),
        "cloudy" => Some("cloudy"),
        "fog" => Some("fog"),
        _ => None,
    };
    if let Some(phrase) = fixed {
        return phrase.to_string();
    }
    precipitation(correct_misspelling(symbol)).unwrap_or_else(|| symbol.to_string())
}

/// MET publishes two thunder codes with a doubled "s"
fn correct_misspelling(symbol: &str) -> &str {
    match symbol {
        "lightssnowshowersandthunder" => "lightsnowshowersandthunder",
        "lightssleetshowersandthunder" => "lightsleetshowersandthunder",
        other => other,
    }
}

/// `[light|heavy]<rain|sleet|snow>[showers][andthunder]`
fn precipitation(symbol: &str) -> Option<String> {
    let (intensity, rest) = if let Some(rest) = symbol.strip_prefix("light") {
        (Some("light"), rest)
    } else if let Some(rest) = symbol.strip_prefix("heavy") {
        (Some("heavy"), rest)
    } else {
        (None, symbol)
    };

    let kind = ["rain", "sleet", "snow"]
        .into_iter()
        .find(|kind| rest.starts_with(kind))?;
    let qualifiers = match &rest[kind.len()..] {
        "" => &[][..],
        "showers" => &["showers"][..],
        "andthunder" => &["and thunder"][..],
        "showersandthunder" => &["showers", "and thunder"][..],
        _ => return None,
    };

    let words: Vec<&str> = intensity.into_iter().chain([kind]).chain(qualifiers.iter().copied()).collect();
    Some(words.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_longest_time_of_day_suffix() {
        assert_eq!(strip_time_of_day("clearsky_day"), "clearsky");
        assert_eq!(strip_time_of_day("fair_night"), "fair");
        assert_eq!(strip_time_of_day("partlycloudy_polartwilight"), "partlycloudy");
        assert_eq!(strip_time_of_day("cloudy"), "cloudy");
    }

    #[test]
    fn symbol_phrases() {
        let cases = [
            ("clearsky", "clear sky"),
            ("partlycloudy", "partly cloudy"),
            ("fog", "fog"),
            ("rain", "rain"),
            ("lightrain", "light rain"),
            ("heavysleetshowers", "heavy sleet showers"),
            ("snowandthunder", "snow and thunder"),
            ("lightssnowshowersandthunder", "light snow showers and thunder"),
            ("lightssleetshowersandthunder", "light sleet showers and thunder"),
            ("lightsleetshowersandthunder", "light sleet showers and thunder"),
            ("lightsrain", "lightsrain"),
            ("heavyrainshowersandthunder", "heavy rain showers and thunder"),
            ("lightsnowshowers", "light snow showers"),
            ("tornado", "tornado"),
        ];
        for (symbol, phrase) in cases {
            assert_eq!(describe(symbol), phrase, "{}", symbol);
        }
    }

    fn payload(symbol: Option<&str>) -> Response {
        let mut data = serde_json::json!({
            "instant": { "details": { "air_temperature": 21.3, "wind_speed": 3.1 } }
        });
        if let Some(symbol) = symbol {
            data["next_1_hours"] = serde_json::json!({ "summary": { "symbol_code": symbol } });
        }
        serde_json::from_value(serde_json::json!({
            "type": "Feature",
            "properties": {
                "timeseries": [{ "time": "2024-06-01T12:00:00Z", "data": data }]
            }
        }))
        .unwrap()
    }

    #[test]
    fn projects_first_timestep() {
        let report = project(payload(Some("lightrainshowers_day")), Units::Metric).unwrap();
        assert_eq!(report.temperature, 21.3);
        assert_eq!(report.description, "light rain showers");
        assert_eq!(report.fetched_at, 1717243200);

        let report = project(payload(None), Units::Imperial).unwrap();
        assert_eq!(report.description, "unknown");
        assert!((report.temperature - 70.34).abs() < 0.01);
    }

    #[test]
    fn empty_timeseries_is_parse_error() {
        let response: Response =
            serde_json::from_value(serde_json::json!({ "properties": { "timeseries": [] } })).unwrap();
        assert_eq!(project(response, Units::Metric).unwrap_err().code, DracErrorCode::ParseError);
    }
}
