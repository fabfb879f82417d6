/// Core data types for the flood question-answering service.
///
/// This module defines the shared domain model imported by all other
/// modules: the per-location records produced by retrieval, the filtered
/// records produced by context selection, and the error type for upstream
/// service calls. It contains no I/O — only types and serde derives.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Input locations
// ---------------------------------------------------------------------------

/// A geocoded location extracted from the user's query.
///
/// Created once at geocoding time and copied verbatim into every
/// downstream record; never mutated by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputLocation {
    /// The location string as extracted from the query, e.g. "Tuscaloosa, AL".
    pub name: String,
    /// Formatted address returned by the geocoder.
    pub formatted_address: String,
    /// WGS84 latitude.
    pub latitude: f64,
    /// WGS84 longitude.
    pub longitude: f64,
}

/// Why downstream enrichment was impossible for a location.
///
/// When one of the failure variants is set, most other record fields are
/// absent or partial, and context selection short-circuits for that
/// location (precipitation forecast excepted — it does not depend on
/// county resolution).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationStatus {
    Ok,
    NoCountyFound,
    MissingFips,
    MissingCoordinates,
}

impl LocationStatus {
    /// True for the failure variants that make county-keyed enrichment
    /// (county data, histories, flood events, SVI) unavailable.
    pub fn blocks_enrichment(self) -> bool {
        !matches!(self, LocationStatus::Ok)
    }
}

// ---------------------------------------------------------------------------
// Retrieved categories
// ---------------------------------------------------------------------------

/// County metadata for the county containing the query point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountyData {
    pub fips_code: String,
    pub county_name: String,
    pub state_name: String,
    pub area_sqmi: f64,
}

/// One month of historical precipitation for a county.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyPrecipitation {
    pub year: i32,
    pub month: i32,
    pub precipitation_in: f64,
}

/// One hour of forecast precipitation for a point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastHour {
    /// Interval start, ISO 8601.
    pub time: String,
    /// Probability of precipitation, 0–100.
    pub precipitation_probability: f64,
    pub precipitation_amount_mm: f64,
    pub precipitation_amount_in: f64,
    pub weather_condition: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature_degrees: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature_unit: Option<String>,
}

/// Coordinates of a historical flood event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventLocation {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// A historical flood event in the county of the query point.
///
/// Events arrive from retrieval sorted ascending by distance (nearest
/// first); filtering preserves that order. The source query does not
/// deduplicate, so join fan-out duplicates may appear.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloodEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event begin date, ISO 8601.
    pub date: String,
    /// Distance from the query point. Absent when the event geometry
    /// could not be resolved; the flood filter treats absent as
    /// infinitely far whenever a distance cap is active.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_from_query_point_miles: Option<f64>,
    pub warning_zone: Option<String>,
    pub county: String,
    pub location: EventLocation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nearest_address: Option<String>,
}

/// National/state percentile ranks for overall social vulnerability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallRanking {
    pub national: Option<f64>,
    pub state: Option<f64>,
}

/// Social Vulnerability Index data for one county and release year.
///
/// `themes` holds theme-level aggregate percentiles; `variables` holds the
/// nested theme → variable → percentile mapping that the SVI filter
/// narrows. BTreeMap keeps serialized output deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SviData {
    pub release_year: i32,
    pub overall_ranking: OverallRanking,
    pub themes: BTreeMap<String, Option<f64>>,
    pub variables: BTreeMap<String, BTreeMap<String, Option<f64>>>,
}

// ---------------------------------------------------------------------------
// Per-location records
// ---------------------------------------------------------------------------

/// Everything retrieval could gather for one query-derived location.
///
/// `input_location` is optional so that records arriving from an external
/// retrieval collaborator always deserialize; the context selector skips
/// (with a warning) any record where it is missing rather than failing
/// the batch. Records built by this crate's own retrieval always set it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_location: Option<InputLocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<LocationStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub county_data: Option<CountyData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precipitation_history: Option<Vec<MonthlyPrecipitation>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precipitation_forecast: Option<Vec<ForecastHour>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flood_event_history: Option<Vec<FloodEvent>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub social_vulnerability_index: Option<SviData>,
}

/// The narrowed counterpart of a `LocationRecord` after context selection.
///
/// `input_location` is always present; every category field appears only
/// when the query intent asked for it, the source record carried it, and
/// (for flood events and SVI) filtering left content behind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilteredLocation {
    pub input_location: InputLocation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<LocationStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub county_data: Option<CountyData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precipitation_history: Option<Vec<MonthlyPrecipitation>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precipitation_forecast: Option<Vec<ForecastHour>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flood_event_history: Option<Vec<FloodEvent>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub social_vulnerability_index: Option<SviData>,
}

impl FilteredLocation {
    /// A filtered record carrying only the immutable input location.
    pub fn bare(input_location: InputLocation) -> Self {
        FilteredLocation {
            input_location,
            status: None,
            county_data: None,
            precipitation_history: None,
            precipitation_forecast: None,
            flood_event_history: None,
            social_vulnerability_index: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can arise when calling an upstream service (Google Maps,
/// OpenAI) or parsing its response.
///
/// These never escape the context selector — the selector's collaborator
/// contracts recover locally (intent defaults, embedding fail-open) and
/// log a warning. They do surface from the outer pipeline stages
/// (geocoding, forecast, answer generation) where there is no sensible
/// fallback.
#[derive(Debug, PartialEq)]
pub enum UpstreamError {
    /// Non-2xx HTTP response.
    HttpError(u16),
    /// The request could not be sent or the body could not be read.
    RequestError(String),
    /// The response body could not be deserialized.
    ParseError(String),
    /// The service answered but carried no usable payload.
    NoData(String),
}

impl std::fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpstreamError::HttpError(code) => write!(f, "HTTP error: {}", code),
            UpstreamError::RequestError(msg) => write!(f, "Request failed: {}", msg),
            UpstreamError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            UpstreamError::NoData(what) => write!(f, "No data available: {}", what),
        }
    }
}

impl std::error::Error for UpstreamError {}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        UpstreamError::RequestError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_with_snake_case_tags() {
        let json = serde_json::to_string(&LocationStatus::NoCountyFound).unwrap();
        assert_eq!(json, "\"no_county_found\"");
        let json = serde_json::to_string(&LocationStatus::MissingCoordinates).unwrap();
        assert_eq!(json, "\"missing_coordinates\"");
    }

    #[test]
    fn test_only_failure_statuses_block_enrichment() {
        assert!(!LocationStatus::Ok.blocks_enrichment());
        assert!(LocationStatus::NoCountyFound.blocks_enrichment());
        assert!(LocationStatus::MissingFips.blocks_enrichment());
        assert!(LocationStatus::MissingCoordinates.blocks_enrichment());
    }

    #[test]
    fn test_location_record_deserializes_without_input_location() {
        // Records from an external retrieval collaborator may be malformed;
        // they must still deserialize so the selector can skip them.
        let record: LocationRecord = serde_json::from_str("{\"status\": \"missing_fips\"}").unwrap();
        assert!(record.input_location.is_none());
        assert_eq!(record.status, Some(LocationStatus::MissingFips));
    }

    #[test]
    fn test_filtered_location_omits_absent_categories() {
        let filtered = FilteredLocation::bare(InputLocation {
            name: "Tuscaloosa, AL".to_string(),
            formatted_address: "Tuscaloosa, AL, USA".to_string(),
            latitude: 33.2098,
            longitude: -87.5692,
        });
        let json = serde_json::to_string(&filtered).unwrap();
        assert!(json.contains("input_location"));
        assert!(!json.contains("county_data"));
        assert!(!json.contains("flood_event_history"));
        assert!(!json.contains("social_vulnerability_index"));
    }
}
