use super::{get_json, HttpClient, Location, Units, WeatherReport};
use crate::error::Result;
use serde::Deserialize;

const DEFAULT_ENDPOINT: &str = "https://api.openweathermap.org";

/// OpenWeatherMap current weather. Needs an API key; accepts city names.
#[derive(Debug, Clone)]
pub struct OpenWeatherMap {
    client: HttpClient,
    pub(super) location: Location,
    pub(super) units: Units,
    api_key: String,
    pub(super) endpoint: String,
}

#[derive(Debug, Deserialize)]
struct Response {
    name: Option<String>,
    main: Main,
    #[serde(default)]
    weather: Vec<Condition>,
    dt: u64,
}

#[derive(Debug, Deserialize)]
struct Main {
    temp: f64,
}

#[derive(Debug, Deserialize)]
struct Condition {
    description: String,
}

impl OpenWeatherMap {
    pub(super) fn new(client: HttpClient, location: Location, units: Units, api_key: String) -> Self {
        Self {
            client,
            location,
            units,
            api_key,
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }

    pub(super) fn fetch(&self) -> Result<WeatherReport> {
        let url = format!("{}/data/2.5/weather", self.endpoint);
        let mut query = vec![
            ("appid", self.api_key.clone()),
            ("units", self.units.as_query().to_string()),
        ];
        match &self.location {
            Location::Coords(coords) => {
                query.push(("lat", coords.lat.to_string()));
                query.push(("lon", coords.lon.to_string()));
            }
            Location::City(city) => query.push(("q", city.clone())),
        }

        let response: Response = get_json(&self.client, &url, &query)?;
        Ok(project(response, self.units))
    }
}

/// The request already asked for `units`, so no conversion
fn project(response: Response, units: Units) -> WeatherReport {
    let description = response
        .weather
        .into_iter()
        .next()
        .map(|condition| condition.description.to_lowercase())
        .unwrap_or_else(|| "unknown".to_string());

    WeatherReport {
        temperature: response.main.temp,
        name: response.name.filter(|name| !name.is_empty()),
        description,
        units,
        fetched_at: response.dt,
    }
}
