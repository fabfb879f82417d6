/// Query preprocessing.
///
/// Two LLM-backed extractions run before retrieval: consolidating
/// location mentions into geocodable strings, and deciding whether the
/// query asks for an hourly precipitation forecast (and for how long).
/// The geocoding loop then turns location strings into `InputLocation`
/// records, skipping anything the geocoder cannot place.

use serde::Deserialize;

use crate::ingest::maps::GoogleMapsClient;
use crate::ingest::openai::OpenAiClient;
use crate::logging::{self, DataSource};
use crate::model::{InputLocation, UpstreamError};

// ---------------------------------------------------------------------------
// Location extraction
// ---------------------------------------------------------------------------

const LOCATION_SYSTEM_PROMPT: &str =
    "You are a helpful and precise location extraction assistant that consolidates location information.";

fn location_user_prompt(query: &str) -> String {
    format!(
        r#"You are an expert geographer at identifying and consolidating location information from text.
Your task is to extract locations and combine them into the most specific strings possible
for geocoding. If a specific place (like a building, park, or address) is mentioned
with its city or region, you MUST combine them into a single string. Do not split
a single conceptual place into multiple parts.

Your answer MUST be a JSON object with a single key named "result", which contains an
array of the final location strings.

Example 1:
- User query: 'What is the weather forecast for the area around the Northeast Medical Building in Tuscaloosa?'
- Correct output: {{"result": ["Northeast Medical Building, Tuscaloosa"]}}

Example 2:
- User query: 'I want to know the elevation of the Eiffel Tower and the weather in Rome.'
- Correct output: {{"result": ["Eiffel Tower, Paris", "Rome"]}}

Now, process the following query:
User query: '{query}'"#
    )
}

#[derive(Debug, Deserialize)]
struct LocationExtraction {
    result: Vec<String>,
}

/// Extract consolidated location strings from a query.
pub fn extract_locations(llm: &OpenAiClient, query: &str) -> Result<Vec<String>, UpstreamError> {
    let content = llm.chat_json(LOCATION_SYSTEM_PROMPT, &location_user_prompt(query))?;
    parse_location_response(&content)
}

fn parse_location_response(content: &str) -> Result<Vec<String>, UpstreamError> {
    let parsed: LocationExtraction =
        serde_json::from_str(content).map_err(|e| UpstreamError::ParseError(e.to_string()))?;
    Ok(parsed.result)
}

// ---------------------------------------------------------------------------
// Forecast-hours extraction
// ---------------------------------------------------------------------------

const FORECAST_SYSTEM_PROMPT: &str =
    "You are a helpful assistant that analyzes weather and precipitation queries.";

fn forecast_user_prompt(query: &str) -> String {
    format!(
        r#"You are an expert at analyzing user queries to determine if they are requesting
precipitation or rainfall forecast/prediction data.

Analyze the following query and determine:
1. Does the user want precipitation forecast/prediction data? (yes/no)
2. If yes, how many hours into the future? (extract the number)

Your answer MUST be a JSON object with these keys:
- "requested": boolean (true if precipitation forecast is requested, false otherwise)
- "hours": integer or null (number of hours if specified, null if not specified but requested, 0 if not requested)

Examples:
- "What will the rainfall be like in the next 2 hours in Tuscaloosa?"
  -> {{"requested": true, "hours": 2}}

- "Show me precipitation forecast for the next 24 hours"
  -> {{"requested": true, "hours": 24}}

- "Will it rain tomorrow in Birmingham?"
  -> {{"requested": true, "hours": 24}}

- "What is the flood history at this address?"
  -> {{"requested": false, "hours": 0}}

User query: '{query}'"#
    )
}

#[derive(Debug, Deserialize)]
struct ForecastExtraction {
    requested: bool,
    hours: Option<i64>,
}

/// Determine whether the query asks for a precipitation forecast, and
/// for how many hours.
///
/// A requested forecast without an explicit count gets `default_hours`.
/// Extraction failures map to `None` — the forecast is simply not
/// fetched, which is the same outcome as "not requested".
pub fn extract_forecast_hours(llm: &OpenAiClient, query: &str, default_hours: i64) -> Option<i64> {
    match llm.chat_json(FORECAST_SYSTEM_PROMPT, &forecast_user_prompt(query)) {
        Ok(content) => forecast_hours_from_response(&content, default_hours),
        Err(e) => {
            logging::log_upstream_failure(
                DataSource::OpenAi,
                "forecast-hours",
                "extract forecast request",
                &e,
            );
            None
        }
    }
}

fn forecast_hours_from_response(content: &str, default_hours: i64) -> Option<i64> {
    match serde_json::from_str::<ForecastExtraction>(content) {
        Ok(parsed) if parsed.requested => {
            Some(parsed.hours.filter(|h| *h > 0).unwrap_or(default_hours))
        }
        Ok(_) => None,
        Err(e) => {
            logging::warn(
                DataSource::OpenAi,
                Some("forecast-hours"),
                &format!("unparseable forecast extraction ({}); skipping forecast", e),
            );
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Geocoding
// ---------------------------------------------------------------------------

/// Geocode each extracted location string, keeping the first hit per
/// string. Strings the geocoder cannot place are skipped with a warning;
/// the batch continues.
pub fn geocode_locations(maps: &GoogleMapsClient, names: &[String]) -> Vec<InputLocation> {
    let mut geocoded = Vec::with_capacity(names.len());

    for name in names {
        logging::info(DataSource::Maps, Some(name), "Geocoding...");
        match maps.geocode_by_address(name) {
            Ok(Some(hit)) => {
                logging::info(
                    DataSource::Maps,
                    Some(name),
                    &format!(
                        "{} ({}, {})",
                        hit.formatted_address, hit.latitude, hit.longitude
                    ),
                );
                geocoded.push(InputLocation {
                    name: name.clone(),
                    formatted_address: hit.formatted_address,
                    latitude: hit.latitude,
                    longitude: hit.longitude,
                });
            }
            Ok(None) => {
                logging::warn(
                    DataSource::Maps,
                    Some(name),
                    "could not geocode; moving to the next location",
                );
            }
            Err(e) => {
                logging::log_upstream_failure(DataSource::Maps, name, "geocode", &e);
            }
        }
    }

    geocoded
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_location_response() {
        let locations =
            parse_location_response(r#"{"result": ["Eiffel Tower, Paris", "Rome"]}"#).unwrap();
        assert_eq!(locations, vec!["Eiffel Tower, Paris", "Rome"]);
    }

    #[test]
    fn test_parse_location_response_empty_array() {
        let locations = parse_location_response(r#"{"result": []}"#).unwrap();
        assert!(locations.is_empty());
    }

    #[test]
    fn test_parse_location_response_missing_key_is_error() {
        assert!(parse_location_response(r#"{"locations": ["Rome"]}"#).is_err());
        assert!(parse_location_response("not json").is_err());
    }

    #[test]
    fn test_forecast_hours_explicit_count() {
        let hours = forecast_hours_from_response(r#"{"requested": true, "hours": 2}"#, 24);
        assert_eq!(hours, Some(2));
    }

    #[test]
    fn test_forecast_hours_requested_without_count_uses_default() {
        let hours = forecast_hours_from_response(r#"{"requested": true, "hours": null}"#, 24);
        assert_eq!(hours, Some(24));

        // A zero count means "requested" slipped through without a real
        // duration; fall back to the default rather than fetching nothing.
        let hours = forecast_hours_from_response(r#"{"requested": true, "hours": 0}"#, 24);
        assert_eq!(hours, Some(24));
    }

    #[test]
    fn test_forecast_hours_not_requested() {
        let hours = forecast_hours_from_response(r#"{"requested": false, "hours": 0}"#, 24);
        assert_eq!(hours, None);
    }

    #[test]
    fn test_forecast_hours_unparseable_is_none() {
        assert_eq!(forecast_hours_from_response("not json", 24), None);
        assert_eq!(forecast_hours_from_response(r#"{"hours": 4}"#, 24), None);
    }
}
