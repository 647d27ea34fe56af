//! Integration tests for the weather client using wiremock.
//!
//! The client is blocking, so each request runs on tokio's blocking pool
//! while the mock server is driven by the test runtime.
#![cfg(feature = "weather")]

use draconis::{
    create_weather_service, CacheManager, Coords, DracErrorCode, Location, Units, WeatherProvider,
    WeatherReport,
};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const OSLO: Location = Location::Coords(Coords { lat: 59.91, lon: 10.75 });

fn open_meteo_payload() -> serde_json::Value {
    serde_json::json!({
        "latitude": 59.91,
        "longitude": 10.75,
        "current_weather": {
            "temperature": 21.3,
            "weathercode": 3,
            "time": "2024-06-01T12:00:00Z"
        }
    })
}

async fn fetch(
    server: &MockServer,
    provider: WeatherProvider,
    location: Location,
    units: Units,
    api_key: Option<&str>,
) -> draconis::Result<WeatherReport> {
    let uri = server.uri();
    let api_key = api_key.map(str::to_string);
    tokio::task::spawn_blocking(move || {
        create_weather_service(provider, location, units, api_key)?
            .with_endpoint(&uri)
            .fetch()
    })
    .await
    .unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn test_open_meteo_metric() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .and(query_param("current_weather", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(open_meteo_payload()))
        .mount(&mock_server)
        .await;

    let report = fetch(&mock_server, WeatherProvider::OpenMeteo, OSLO, Units::Metric, None)
        .await
        .unwrap();

    assert_eq!(
        report,
        WeatherReport {
            temperature: 21.3,
            name: None,
            description: "overcast".into(),
            units: Units::Metric,
            fetched_at: 1717243200,
        }
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_open_meteo_imperial_converts() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .respond_with(ResponseTemplate::new(200).set_body_json(open_meteo_payload()))
        .mount(&mock_server)
        .await;

    let report = fetch(&mock_server, WeatherProvider::OpenMeteo, OSLO, Units::Imperial, None)
        .await
        .unwrap();

    assert!((report.temperature - 70.34).abs() < 0.01);
    assert_eq!(report.units, Units::Imperial);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_met_no_strips_symbol_suffix() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/weatherapi/locationforecast/2.0/compact"))
        .and(query_param("lat", "59.9100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "type": "Feature",
            "properties": {
                "timeseries": [{
                    "time": "2024-06-01T12:00:00Z",
                    "data": {
                        "instant": { "details": { "air_temperature": 14.0 } },
                        "next_1_hours": { "summary": { "symbol_code": "partlycloudy_day" } }
                    }
                }]
            }
        })))
        .mount(&mock_server)
        .await;

    let report = fetch(&mock_server, WeatherProvider::MetNo, OSLO, Units::Metric, None)
        .await
        .unwrap();

    assert_eq!(report.temperature, 14.0);
    assert_eq!(report.description, "partly cloudy");
    assert_eq!(report.fetched_at, 1717243200);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_openweathermap_requests_native_units() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .and(query_param("q", "Oslo"))
        .and(query_param("units", "imperial"))
        .and(query_param("appid", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "weather": [{ "id": 803, "main": "Clouds", "description": "broken clouds" }],
            "main": { "temp": 57.2 },
            "dt": 1717243200,
            "name": "Oslo"
        })))
        .mount(&mock_server)
        .await;

    let report = fetch(
        &mock_server,
        WeatherProvider::OpenWeatherMap,
        Location::City("Oslo".into()),
        Units::Imperial,
        Some("secret"),
    )
    .await
    .unwrap();

    assert_eq!(report.temperature, 57.2);
    assert_eq!(report.description, "broken clouds");
    assert_eq!(report.name.as_deref(), Some("Oslo"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_client_error_carries_reason() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "cod": 401,
            "message": "Invalid API key"
        })))
        .mount(&mock_server)
        .await;

    let err = fetch(
        &mock_server,
        WeatherProvider::OpenWeatherMap,
        OSLO,
        Units::Metric,
        Some("bad"),
    )
    .await
    .unwrap_err();

    assert_eq!(err.code, DracErrorCode::ApiUnavailable);
    assert!(err.message.contains("Invalid API key"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_server_error_is_api_unavailable() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let err = fetch(&mock_server, WeatherProvider::OpenMeteo, OSLO, Units::Metric, None)
        .await
        .unwrap_err();
    assert_eq!(err.code, DracErrorCode::ApiUnavailable);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_malformed_body_is_parse_error() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"current_weather\": 7}"))
        .mount(&mock_server)
        .await;

    let err = fetch(&mock_server, WeatherProvider::OpenMeteo, OSLO, Units::Metric, None)
        .await
        .unwrap_err();
    assert_eq!(err.code, DracErrorCode::ParseError);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cached_report_survives_outage() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(open_meteo_payload()))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let cache_dir = dir.path().to_path_buf();
    let uri = mock_server.uri();

    let (first, second, uncached) = tokio::task::spawn_blocking(move || {
        let cache = CacheManager::with_dir(cache_dir);
        let service = create_weather_service(WeatherProvider::OpenMeteo, OSLO, Units::Metric, None)
            .unwrap()
            .with_endpoint(&uri);
        (
            service.get_weather_info(&cache),
            service.get_weather_info(&cache),
            service.fetch(),
        )
    })
    .await
    .unwrap();

    assert_eq!(first.unwrap().description, "overcast");
    assert_eq!(second.unwrap().fetched_at, 1717243200);
    assert_eq!(uncached.unwrap_err().code, DracErrorCode::ApiUnavailable);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cached_report_respects_units_and_location() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .respond_with(ResponseTemplate::new(200).set_body_json(open_meteo_payload()))
        .expect(3)
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let cache_dir = dir.path().to_path_buf();
    let uri = mock_server.uri();

    let (metric, imperial, imperial_again, elsewhere) = tokio::task::spawn_blocking(move || {
        let cache = CacheManager::with_dir(cache_dir);
        let service = |location: Location, units: Units| {
            create_weather_service(WeatherProvider::OpenMeteo, location, units, None)
                .unwrap()
                .with_endpoint(&uri)
        };
        let bergen = Location::Coords(Coords { lat: 60.39, lon: 5.32 });
        (
            service(OSLO, Units::Metric).get_weather_info(&cache).unwrap(),
            service(OSLO, Units::Imperial).get_weather_info(&cache).unwrap(),
            service(OSLO, Units::Imperial).get_weather_info(&cache).unwrap(),
            service(bergen, Units::Imperial).get_weather_info(&cache).unwrap(),
        )
    })
    .await
    .unwrap();

    assert_eq!(metric.units, Units::Metric);
    assert_eq!(metric.temperature, 21.3);
    assert_eq!(imperial.units, Units::Imperial);
    assert!((imperial.temperature - 70.34).abs() < 0.01);
    assert_eq!(imperial_again, imperial);
    assert_eq!(elsewhere.units, Units::Imperial);
}

#[test]
fn test_connection_refused_is_network_error() {
    let err = create_weather_service(WeatherProvider::OpenMeteo, OSLO, Units::Metric, None)
        .unwrap()
        .with_endpoint("http://127.0.0.1:1")
        .fetch()
        .unwrap_err();
    assert_eq!(err.code, DracErrorCode::NetworkError);
}
