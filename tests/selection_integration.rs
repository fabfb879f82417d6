//! Context Selection Integration Tests
//!
//! Exercises the full selector — intent, category dispatch, flood and
//! SVI filtering — over realistic multi-location batches, using stub
//! classifier/embedding providers so the tests are deterministic and
//! need no network access.

use std::collections::BTreeMap;

use flai_service::model::{
    CountyData, EventLocation, FloodEvent, ForecastHour, InputLocation, LocationRecord,
    LocationStatus, MonthlyPrecipitation, OverallRanking, SviData,
};
use flai_service::selection::intent::{FloodEventFilters, QueryIntent};
use flai_service::selection::{ContextSelector, EmbeddingProvider, IntentClassifier};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

/// Classifier stub returning a fixed intent, standing in for the LLM.
struct FixedIntent(QueryIntent);

impl IntentClassifier for FixedIntent {
    fn classify(&self, _query: &str) -> QueryIntent {
        self.0.clone()
    }
}

/// Classifier stub simulating an upstream failure: per the classifier
/// contract it must surface the fixed default record, never an error.
struct FailedClassifier;

impl IntentClassifier for FailedClassifier {
    fn classify(&self, _query: &str) -> QueryIntent {
        QueryIntent::default()
    }
}

/// Embedding stub scoring every variable identical to the query.
struct MatchAllEmbedder;

impl EmbeddingProvider for MatchAllEmbedder {
    fn embed(&self, texts: &[String]) -> Vec<Vec<f32>> {
        vec![vec![1.0, 0.0]; texts.len()]
    }
}

/// Embedding stub simulating a failed provider call.
struct DownEmbedder;

impl EmbeddingProvider for DownEmbedder {
    fn embed(&self, _texts: &[String]) -> Vec<Vec<f32>> {
        Vec::new()
    }
}

fn tuscaloosa() -> InputLocation {
    InputLocation {
        name: "Tuscaloosa, AL".to_string(),
        formatted_address: "Tuscaloosa, AL, USA".to_string(),
        latitude: 33.2098,
        longitude: -87.5692,
    }
}

fn offshore() -> InputLocation {
    InputLocation {
        name: "somewhere offshore".to_string(),
        formatted_address: "Gulf of Mexico".to_string(),
        latitude: f64::NAN,
        longitude: f64::NAN,
    }
}

fn flood_event(distance: f64) -> FloodEvent {
    FloodEvent {
        event_type: "Flash Flood".to_string(),
        date: "2019-06-08".to_string(),
        distance_from_query_point_miles: Some(distance),
        warning_zone: Some("ALZ023".to_string()),
        county: "Tuscaloosa".to_string(),
        location: EventLocation {
            latitude: Some(33.2),
            longitude: Some(-87.5),
        },
        nearest_address: None,
    }
}

fn forecast_hour(time: &str) -> ForecastHour {
    ForecastHour {
        time: time.to_string(),
        precipitation_probability: 40.0,
        precipitation_amount_mm: 2.5,
        precipitation_amount_in: 0.1,
        weather_condition: "RAIN".to_string(),
        temperature_degrees: None,
        temperature_unit: None,
    }
}

fn svi() -> SviData {
    SviData {
        release_year: 2022,
        overall_ranking: OverallRanking {
            national: Some(71.3),
            state: Some(64.0),
        },
        themes: BTreeMap::from([("Socioeconomic Status".to_string(), Some(80.1))]),
        variables: BTreeMap::from([(
            "Socioeconomic Status".to_string(),
            BTreeMap::from([
                ("Below Poverty".to_string(), Some(90.0)),
                ("Unemployed".to_string(), Some(62.5)),
            ]),
        )]),
    }
}

/// A location with every category populated.
fn full_location() -> LocationRecord {
    LocationRecord {
        input_location: Some(tuscaloosa()),
        status: None,
        county_data: Some(CountyData {
            fips_code: "01125".to_string(),
            county_name: "Tuscaloosa".to_string(),
            state_name: "Alabama".to_string(),
            area_sqmi: 1351.8,
        }),
        precipitation_history: Some(vec![MonthlyPrecipitation {
            year: 2023,
            month: 4,
            precipitation_in: 5.6,
        }]),
        precipitation_forecast: Some(vec![forecast_hour("2026-08-07T15:00:00Z")]),
        flood_event_history: Some(vec![flood_event(1.0), flood_event(3.0), flood_event(7.0)]),
        social_vulnerability_index: Some(svi()),
    }
}

/// A location whose enrichment failed on coordinates, but which still
/// carries a forecast (the forecast does not depend on county lookup).
fn coordinates_failed_location() -> LocationRecord {
    LocationRecord {
        input_location: Some(offshore()),
        status: Some(LocationStatus::MissingCoordinates),
        precipitation_forecast: Some(vec![forecast_hour("2026-08-07T15:00:00Z")]),
        ..Default::default()
    }
}

fn all_needs_intent() -> QueryIntent {
    QueryIntent {
        needs_precipitation_forecast: true,
        needs_precipitation_history: true,
        needs_flood_history: true,
        needs_svi_data: true,
        needs_county_info: true,
        flood_event_filters: FloodEventFilters {
            max_events: None,
            max_distance_miles: None,
            recent_only: false,
        },
        svi_relevance_threshold: 0.3,
    }
}

// ---------------------------------------------------------------------------
// End-to-End Selection
// ---------------------------------------------------------------------------

#[test]
fn test_mixed_batch_selects_per_location() {
    let records = vec![full_location(), coordinates_failed_location()];
    let classifier = FixedIntent(all_needs_intent());
    let selector = ContextSelector::new(&classifier, &MatchAllEmbedder, "");

    let output = selector.select(&records, "Tell me everything about flooding here");

    assert_eq!(output.filtered_data.len(), 2);

    // Entry 1: all five categories present.
    let first = &output.filtered_data[0];
    assert!(first.status.is_none());
    assert!(first.county_data.is_some());
    assert!(first.precipitation_history.is_some());
    assert!(first.precipitation_forecast.is_some());
    assert!(first.flood_event_history.is_some());
    assert!(first.social_vulnerability_index.is_some());

    // Entry 2: input location and status only, plus the forecast that
    // was present upstream.
    let second = &output.filtered_data[1];
    assert_eq!(second.status, Some(LocationStatus::MissingCoordinates));
    assert!(second.county_data.is_none());
    assert!(second.precipitation_history.is_none());
    assert!(second.flood_event_history.is_none());
    assert!(second.social_vulnerability_index.is_none());
    assert!(second.precipitation_forecast.is_some());

    println!(
        "mixed batch: {} locations in, {} out",
        records.len(),
        output.filtered_data.len()
    );
}

#[test]
fn test_status_location_never_gets_flood_history() {
    let mut record = full_location();
    record.status = Some(LocationStatus::NoCountyFound);
    let classifier = FixedIntent(all_needs_intent());
    let selector = ContextSelector::new(&classifier, &MatchAllEmbedder, "");

    let output = selector.select(&[record], "What is the flood history here?");

    assert!(output.filtered_data[0].flood_event_history.is_none());
}

#[test]
fn test_flood_filters_apply_end_to_end() {
    let mut intent = all_needs_intent();
    intent.flood_event_filters = FloodEventFilters {
        max_events: Some(2),
        max_distance_miles: Some(5.0),
        recent_only: false,
    };
    let classifier = FixedIntent(intent);
    let selector = ContextSelector::new(&classifier, &MatchAllEmbedder, "");

    let output = selector.select(&[full_location()], "Recent floods within 5 miles?");

    let events = output.filtered_data[0].flood_event_history.as_ref().unwrap();
    let distances: Vec<Option<f64>> = events
        .iter()
        .map(|e| e.distance_from_query_point_miles)
        .collect();
    // Distance cap drops the 7-mile event; the count cap keeps the first
    // two survivors in stored order.
    assert_eq!(distances, vec![Some(1.0), Some(3.0)]);
}

#[test]
fn test_embedding_outage_keeps_all_svi_variables() {
    let classifier = FixedIntent(all_needs_intent());
    let selector = ContextSelector::new(&classifier, &DownEmbedder, "");

    let output = selector.select(&[full_location()], "Why is this area vulnerable?");

    let filtered_svi = output.filtered_data[0]
        .social_vulnerability_index
        .as_ref()
        .unwrap();
    assert_eq!(filtered_svi, &svi(), "fail-open must preserve the unfiltered SVI data");
}

#[test]
fn test_classifier_failure_still_produces_complete_output() {
    // A failed classifier degrades to the default intent (all
    // categories), so the batch still selects everything.
    let selector = ContextSelector::new(&FailedClassifier, &MatchAllEmbedder, "");

    let output = selector.select(&[full_location()], "anything at all");

    assert_eq!(output.intent_analysis, QueryIntent::default());
    let first = &output.filtered_data[0];
    assert!(first.county_data.is_some());
    assert!(first.flood_event_history.is_some());
}

#[test]
fn test_selection_output_serializes_expected_shape() {
    let classifier = FixedIntent(all_needs_intent());
    let selector = ContextSelector::new(&classifier, &MatchAllEmbedder, "");
    let output = selector.select(&[full_location()], "flood history in Tuscaloosa");

    let json = serde_json::to_value(&output).unwrap();
    assert_eq!(json["query"], "flood history in Tuscaloosa");
    assert!(json["intent_analysis"]["needs_flood_history"].as_bool().unwrap());
    assert!(json["filtered_data"].is_array());
    assert_eq!(
        json["filtered_data"][0]["input_location"]["name"],
        "Tuscaloosa, AL"
    );
}
