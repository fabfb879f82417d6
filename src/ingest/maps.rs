/// Google Maps Platform API client.
///
/// Geocoding and reverse geocoding via the Geocode API, and hourly
/// precipitation forecasts via the Weather API. All calls are blocking
/// with a bounded timeout; the caller decides how a failure degrades.
///
/// API documentation:
///   https://developers.google.com/maps/documentation/geocoding
///   https://developers.google.com/maps/documentation/weather

use serde::Deserialize;
use std::time::Duration;

use crate::logging::{self, DataSource};
use crate::model::{ForecastHour, UpstreamError};

const GEOCODE_API_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";
const WEATHER_API_URL: &str = "https://weather.googleapis.com/v1";

const MM_PER_INCH: f64 = 25.4;

// ============================================================================
// Geocode API Response Structures
// ============================================================================

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    formatted_address: String,
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

/// First geocoding hit for an address string.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodedAddress {
    pub formatted_address: String,
    pub latitude: f64,
    pub longitude: f64,
}

// ============================================================================
// Weather API Response Structures
// ============================================================================

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    #[serde(rename = "forecastHours", default)]
    forecast_hours: Vec<RawForecastHour>,
}

#[derive(Debug, Deserialize)]
struct RawForecastHour {
    #[serde(default)]
    interval: Option<Interval>,
    #[serde(default)]
    precipitation: Option<RawPrecipitation>,
    #[serde(default)]
    weather: Option<RawWeather>,
    #[serde(default)]
    temperature: Option<RawTemperature>,
}

#[derive(Debug, Deserialize)]
struct Interval {
    #[serde(rename = "startTime")]
    start_time: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawPrecipitation {
    #[serde(default)]
    probability: Option<NumberOrValue>,
    #[serde(default)]
    amount: Option<NumberOrValue>,
}

#[derive(Debug, Deserialize)]
struct RawWeather {
    condition: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawTemperature {
    degrees: Option<f64>,
    unit: Option<String>,
}

/// The Weather API serializes probability and amount either as a bare
/// number or wrapped in an object, e.g. `0.25` or `{"value": 0.25}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NumberOrValue {
    Wrapped { value: f64 },
    Plain(f64),
}

impl NumberOrValue {
    fn value(&self) -> f64 {
        match self {
            NumberOrValue::Wrapped { value } => *value,
            NumberOrValue::Plain(v) => *v,
        }
    }
}

// ============================================================================
// Client
// ============================================================================

/// A client for the Google Maps Platform APIs used by this service.
pub struct GoogleMapsClient {
    api_key: String,
    client: reqwest::blocking::Client,
}

impl GoogleMapsClient {
    pub fn new(api_key: String, timeout_secs: u64) -> Result<Self, UpstreamError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(GoogleMapsClient { api_key, client })
    }

    /// Geocode a text address. Returns the first result, or `None` when
    /// the provider finds nothing for the address.
    pub fn geocode_by_address(&self, address: &str) -> Result<Option<GeocodedAddress>, UpstreamError> {
        let response = self
            .client
            .get(GEOCODE_API_URL)
            .query(&[
                ("address", address),
                ("language", "en"),
                ("key", self.api_key.as_str()),
            ])
            .send()?;

        if !response.status().is_success() {
            return Err(UpstreamError::HttpError(response.status().as_u16()));
        }

        let body: GeocodeResponse = response
            .json()
            .map_err(|e| UpstreamError::ParseError(e.to_string()))?;

        first_geocode_hit(body)
    }

    /// Reverse-geocode coordinates to a formatted address. Best-effort:
    /// any failure is logged and collapses to `None`.
    pub fn reverse_geocode(&self, lat: f64, lng: f64) -> Option<String> {
        let latlng = format!("{},{}", lat, lng);
        let result = self
            .client
            .get(GEOCODE_API_URL)
            .query(&[
                ("latlng", latlng.as_str()),
                ("language", "en"),
                ("key", self.api_key.as_str()),
            ])
            .send();

        let response = match result {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                logging::debug(
                    DataSource::Maps,
                    Some(&latlng),
                    &format!("reverse geocode returned HTTP {}", r.status()),
                );
                return None;
            }
            Err(e) => {
                logging::debug(
                    DataSource::Maps,
                    Some(&latlng),
                    &format!("reverse geocode request failed: {}", e),
                );
                return None;
            }
        };

        let body: GeocodeResponse = response.json().ok()?;
        body.results.into_iter().next().map(|r| r.formatted_address)
    }

    /// Fetch the hourly precipitation forecast for a point.
    ///
    /// Returns at most `hours` entries, chronological. A response without
    /// the `forecastHours` key yields an empty list.
    pub fn hourly_forecast(
        &self,
        lat: f64,
        lng: f64,
        hours: i64,
    ) -> Result<Vec<ForecastHour>, UpstreamError> {
        let url = format!("{}/forecast/hours:lookup", WEATHER_API_URL);
        let lat_param = lat.to_string();
        let lng_param = lng.to_string();
        let hours_param = hours.to_string();
        let response = self
            .client
            .get(&url)
            .query(&[
                ("location.latitude", lat_param.as_str()),
                ("location.longitude", lng_param.as_str()),
                ("hours", hours_param.as_str()),
                ("key", self.api_key.as_str()),
            ])
            .send()?;

        if !response.status().is_success() {
            return Err(UpstreamError::HttpError(response.status().as_u16()));
        }

        let body: ForecastResponse = response
            .json()
            .map_err(|e| UpstreamError::ParseError(e.to_string()))?;

        Ok(body.forecast_hours.into_iter().map(parse_forecast_hour).collect())
    }
}

// ============================================================================
// Response Mapping
// ============================================================================

fn first_geocode_hit(body: GeocodeResponse) -> Result<Option<GeocodedAddress>, UpstreamError> {
    match body.status.as_str() {
        "OK" => Ok(body.results.into_iter().next().map(|r| GeocodedAddress {
            formatted_address: r.formatted_address,
            latitude: r.geometry.location.lat,
            longitude: r.geometry.location.lng,
        })),
        "ZERO_RESULTS" => Ok(None),
        other => Err(UpstreamError::NoData(format!(
            "geocode status {}{}",
            other,
            body.error_message
                .map(|m| format!(" - {}", m))
                .unwrap_or_default()
        ))),
    }
}

/// Flatten one raw forecast hour into the domain record, converting the
/// precipitation amount from millimetres to inches and the probability
/// from 0–1 to 0–100.
fn parse_forecast_hour(raw: RawForecastHour) -> ForecastHour {
    let time = raw
        .interval
        .and_then(|i| i.start_time)
        .unwrap_or_else(|| "N/A".to_string());

    let precipitation = raw.precipitation.unwrap_or_default();
    let probability = precipitation.probability.map(|p| p.value()).unwrap_or(0.0);
    let amount_mm = precipitation.amount.map(|a| a.value()).unwrap_or(0.0);

    let (temperature_degrees, temperature_unit) = match raw.temperature {
        Some(t) => (t.degrees, t.unit),
        None => (None, None),
    };

    ForecastHour {
        time,
        precipitation_probability: round1(probability * 100.0),
        precipitation_amount_mm: amount_mm,
        precipitation_amount_in: round2(amount_mm / MM_PER_INCH),
        weather_condition: raw
            .weather
            .and_then(|w| w.condition)
            .unwrap_or_else(|| "N/A".to_string()),
        temperature_degrees,
        temperature_unit,
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geocode_first_hit() {
        let body: GeocodeResponse = serde_json::from_str(
            r#"{
                "status": "OK",
                "results": [
                    {
                        "formatted_address": "Tuscaloosa, AL, USA",
                        "geometry": {"location": {"lat": 33.2098, "lng": -87.5692}}
                    },
                    {
                        "formatted_address": "Tuscaloosa County, AL, USA",
                        "geometry": {"location": {"lat": 33.3, "lng": -87.5}}
                    }
                ]
            }"#,
        )
        .unwrap();
        let hit = first_geocode_hit(body).unwrap().unwrap();
        assert_eq!(hit.formatted_address, "Tuscaloosa, AL, USA");
        assert_eq!(hit.latitude, 33.2098);
        assert_eq!(hit.longitude, -87.5692);
    }

    #[test]
    fn test_geocode_zero_results_is_none() {
        let body: GeocodeResponse =
            serde_json::from_str(r#"{"status": "ZERO_RESULTS", "results": []}"#).unwrap();
        assert_eq!(first_geocode_hit(body).unwrap(), None);
    }

    #[test]
    fn test_geocode_denied_status_is_error() {
        let body: GeocodeResponse = serde_json::from_str(
            r#"{"status": "REQUEST_DENIED", "results": [], "error_message": "The provided API key is invalid."}"#,
        )
        .unwrap();
        let err = first_geocode_hit(body).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("REQUEST_DENIED"), "unexpected error: {}", msg);
        assert!(msg.contains("invalid"), "unexpected error: {}", msg);
    }

    #[test]
    fn test_forecast_hour_with_wrapped_values() {
        let body: ForecastResponse = serde_json::from_str(
            r#"{
                "forecastHours": [
                    {
                        "interval": {"startTime": "2026-08-07T15:00:00Z"},
                        "precipitation": {
                            "probability": {"value": 0.25},
                            "amount": {"value": 25.4}
                        },
                        "weather": {"condition": "RAIN"},
                        "temperature": {"degrees": 27.5, "unit": "CELSIUS"}
                    }
                ]
            }"#,
        )
        .unwrap();
        let hour = parse_forecast_hour(body.forecast_hours.into_iter().next().unwrap());
        assert_eq!(hour.time, "2026-08-07T15:00:00Z");
        assert_eq!(hour.precipitation_probability, 25.0);
        assert_eq!(hour.precipitation_amount_mm, 25.4);
        assert_eq!(hour.precipitation_amount_in, 1.0);
        assert_eq!(hour.weather_condition, "RAIN");
        assert_eq!(hour.temperature_degrees, Some(27.5));
        assert_eq!(hour.temperature_unit, Some("CELSIUS".to_string()));
    }

    #[test]
    fn test_forecast_hour_with_bare_numbers() {
        // Some responses carry probability/amount as plain numbers.
        let body: ForecastResponse = serde_json::from_str(
            r#"{
                "forecastHours": [
                    {
                        "interval": {"startTime": "2026-08-07T16:00:00Z"},
                        "precipitation": {"probability": 0.8, "amount": 12.7}
                    }
                ]
            }"#,
        )
        .unwrap();
        let hour = parse_forecast_hour(body.forecast_hours.into_iter().next().unwrap());
        assert_eq!(hour.precipitation_probability, 80.0);
        assert_eq!(hour.precipitation_amount_in, 0.5);
        assert_eq!(hour.weather_condition, "N/A");
        assert!(hour.temperature_degrees.is_none());
    }

    #[test]
    fn test_forecast_hour_with_missing_fields() {
        let body: ForecastResponse = serde_json::from_str(r#"{"forecastHours": [{}]}"#).unwrap();
        let hour = parse_forecast_hour(body.forecast_hours.into_iter().next().unwrap());
        assert_eq!(hour.time, "N/A");
        assert_eq!(hour.precipitation_probability, 0.0);
        assert_eq!(hour.precipitation_amount_mm, 0.0);
    }

    #[test]
    fn test_forecast_response_without_hours_key_is_empty() {
        let body: ForecastResponse = serde_json::from_str("{}").unwrap();
        assert!(body.forecast_hours.is_empty());
    }
}
