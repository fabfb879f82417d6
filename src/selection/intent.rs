/// Query intent classification.
///
/// Maps a free-text query to a structured record describing which data
/// categories are needed and with what filter parameters. The record
/// schema, defaulting, and validation live here; the text-generation call
/// itself goes through the OpenAI client.
///
/// Classification can never fail outward: any upstream error, timeout,
/// or schema mismatch yields the fixed default record, so downstream
/// code never special-cases classifier failure.

use serde::{Deserialize, Serialize};

use crate::ingest::openai::OpenAiClient;
use crate::logging::{self, DataSource};
use crate::selection::IntentClassifier;

// ---------------------------------------------------------------------------
// Intent record schema
// ---------------------------------------------------------------------------

/// Filter parameters for the flood-event category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloodEventFilters {
    /// Keep at most this many events; `None` keeps all.
    pub max_events: Option<usize>,
    /// Keep only events within this radius; `None` keeps all.
    pub max_distance_miles: Option<f64>,
    /// Accepted by the schema; currently has no filtering semantics.
    pub recent_only: bool,
}

/// Which data categories a query needs, and how tightly to filter them.
///
/// Created fresh per query and never mutated afterwards. Every field is
/// required by the serde schema — a classifier response missing any key
/// fails validation and falls back to `QueryIntent::default()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryIntent {
    pub needs_precipitation_forecast: bool,
    pub needs_precipitation_history: bool,
    pub needs_flood_history: bool,
    pub needs_svi_data: bool,
    pub needs_county_info: bool,
    pub flood_event_filters: FloodEventFilters,
    /// Minimum cosine similarity for an SVI variable to survive, in [0, 1].
    pub svi_relevance_threshold: f32,
}

impl Default for QueryIntent {
    /// The fixed fallback record: every category included, a modest
    /// event cap, and a permissive SVI threshold.
    fn default() -> Self {
        QueryIntent {
            needs_precipitation_forecast: true,
            needs_precipitation_history: true,
            needs_flood_history: true,
            needs_svi_data: true,
            needs_county_info: true,
            flood_event_filters: FloodEventFilters {
                max_events: Some(10),
                max_distance_miles: None,
                recent_only: false,
            },
            svi_relevance_threshold: 0.3,
        }
    }
}

impl QueryIntent {
    /// Clamp out-of-range values a language model may produce. Only the
    /// similarity threshold needs it; booleans and the optional caps are
    /// already constrained by their types.
    pub fn normalized(mut self) -> Self {
        self.svi_relevance_threshold = self.svi_relevance_threshold.clamp(0.0, 1.0);
        self
    }
}

/// Parse a classifier response body into a validated intent record.
pub fn parse_intent_response(content: &str) -> Result<QueryIntent, serde_json::Error> {
    serde_json::from_str::<QueryIntent>(content).map(QueryIntent::normalized)
}

// ---------------------------------------------------------------------------
// LLM-backed classifier
// ---------------------------------------------------------------------------

const INTENT_SYSTEM_PROMPT: &str =
    "You are an expert at analyzing data requirements for flood-related queries.";

fn intent_user_prompt(query: &str) -> String {
    format!(
        r#"You are an expert at analyzing flood-related queries to determine what information is needed.

Context: The user has access to the following data types:
1. Precipitation forecast (future rainfall predictions)
2. Precipitation history (past monthly rainfall data)
3. Flood event history (historical flood occurrences with locations and dates)
4. Social Vulnerability Index (SVI) - demographic and socioeconomic risk factors
5. County information (basic geographic data)

Social Vulnerability Index includes 16 variables grouped into 4 themes:
- Socioeconomic Status (poverty, unemployment, housing cost, education, insurance)
- Household Characteristics (age groups, disabilities, single parents, language)
- Racial & Ethnic Minority Status
- Housing Type & Transportation (multi-unit, mobile homes, crowding, vehicles, group quarters)

Analyze this query and determine what data is needed:
Query: "{query}"

Return a JSON object with these fields:
{{
    "needs_precipitation_forecast": boolean,
    "needs_precipitation_history": boolean,
    "needs_flood_history": boolean,
    "needs_svi_data": boolean,
    "needs_county_info": boolean,
    "flood_event_filters": {{
        "max_events": integer (suggest 5-20, or null for all),
        "max_distance_miles": float (suggest radius, or null for all),
        "recent_only": boolean (true if query mentions "recent" or a time period)
    }},
    "svi_relevance_threshold": float (0.0-1.0, higher means more selective)
}}

Guidelines:
- If query asks about "why" or "vulnerability", set needs_svi_data to true
- If query is about future weather/rain, needs_precipitation_forecast is true
- If query is about past flooding, needs_flood_history is true
- If query mentions demographics, poverty, housing, etc., needs_svi_data is true
- For specific questions, use stricter filters; for exploratory questions, be more inclusive"#
    )
}

/// Intent classifier backed by an OpenAI chat completion in JSON mode.
pub struct LlmIntentClassifier<'a> {
    llm: &'a OpenAiClient,
}

impl<'a> LlmIntentClassifier<'a> {
    pub fn new(llm: &'a OpenAiClient) -> Self {
        LlmIntentClassifier { llm }
    }
}

impl IntentClassifier for LlmIntentClassifier<'_> {
    fn classify(&self, query: &str) -> QueryIntent {
        match self.llm.chat_json(INTENT_SYSTEM_PROMPT, &intent_user_prompt(query)) {
            Ok(content) => match parse_intent_response(&content) {
                Ok(intent) => intent,
                Err(e) => {
                    logging::warn(
                        DataSource::OpenAi,
                        None,
                        &format!(
                            "intent response did not match schema ({}); using default intent",
                            e
                        ),
                    );
                    QueryIntent::default()
                }
            },
            Err(e) => {
                logging::log_upstream_failure(DataSource::OpenAi, "intent", "classify query", &e);
                QueryIntent::default()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_intent_validates_against_schema() {
        // The fallback record must round-trip through the same serde
        // schema used for classifier output.
        let default = QueryIntent::default();
        let json = serde_json::to_string(&default).unwrap();
        let parsed = parse_intent_response(&json).unwrap();
        assert_eq!(parsed, default);
    }

    #[test]
    fn test_default_intent_values() {
        let intent = QueryIntent::default();
        assert!(intent.needs_precipitation_forecast);
        assert!(intent.needs_precipitation_history);
        assert!(intent.needs_flood_history);
        assert!(intent.needs_svi_data);
        assert!(intent.needs_county_info);
        assert_eq!(intent.flood_event_filters.max_events, Some(10));
        assert_eq!(intent.flood_event_filters.max_distance_miles, None);
        assert!(!intent.flood_event_filters.recent_only);
        assert!((intent.svi_relevance_threshold - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_parse_complete_response() {
        let content = r#"{
            "needs_precipitation_forecast": false,
            "needs_precipitation_history": true,
            "needs_flood_history": true,
            "needs_svi_data": false,
            "needs_county_info": true,
            "flood_event_filters": {
                "max_events": 5,
                "max_distance_miles": 25.0,
                "recent_only": true
            },
            "svi_relevance_threshold": 0.55
        }"#;
        let intent = parse_intent_response(content).unwrap();
        assert!(!intent.needs_precipitation_forecast);
        assert_eq!(intent.flood_event_filters.max_events, Some(5));
        assert_eq!(intent.flood_event_filters.max_distance_miles, Some(25.0));
        assert!(intent.flood_event_filters.recent_only);
    }

    #[test]
    fn test_parse_null_caps() {
        let content = r#"{
            "needs_precipitation_forecast": true,
            "needs_precipitation_history": true,
            "needs_flood_history": true,
            "needs_svi_data": true,
            "needs_county_info": true,
            "flood_event_filters": {
                "max_events": null,
                "max_distance_miles": null,
                "recent_only": false
            },
            "svi_relevance_threshold": 0.3
        }"#;
        let intent = parse_intent_response(content).unwrap();
        assert_eq!(intent.flood_event_filters.max_events, None);
        assert_eq!(intent.flood_event_filters.max_distance_miles, None);
    }

    #[test]
    fn test_parse_rejects_missing_top_level_key() {
        // needs_svi_data is absent.
        let content = r#"{
            "needs_precipitation_forecast": true,
            "needs_precipitation_history": true,
            "needs_flood_history": true,
            "needs_county_info": true,
            "flood_event_filters": {
                "max_events": 10,
                "max_distance_miles": null,
                "recent_only": false
            },
            "svi_relevance_threshold": 0.3
        }"#;
        assert!(parse_intent_response(content).is_err());
    }

    #[test]
    fn test_parse_rejects_missing_filter_sub_key() {
        // flood_event_filters.recent_only is absent.
        let content = r#"{
            "needs_precipitation_forecast": true,
            "needs_precipitation_history": true,
            "needs_flood_history": true,
            "needs_svi_data": true,
            "needs_county_info": true,
            "flood_event_filters": {
                "max_events": 10,
                "max_distance_miles": null
            },
            "svi_relevance_threshold": 0.3
        }"#;
        assert!(parse_intent_response(content).is_err());
    }

    #[test]
    fn test_out_of_range_threshold_is_clamped() {
        let content = r#"{
            "needs_precipitation_forecast": true,
            "needs_precipitation_history": true,
            "needs_flood_history": true,
            "needs_svi_data": true,
            "needs_county_info": true,
            "flood_event_filters": {
                "max_events": 10,
                "max_distance_miles": null,
                "recent_only": false
            },
            "svi_relevance_threshold": 1.7
        }"#;
        let intent = parse_intent_response(content).unwrap();
        assert_eq!(intent.svi_relevance_threshold, 1.0);

        let negative = content.replace("1.7", "-0.4");
        let intent = parse_intent_response(&negative).unwrap();
        assert_eq!(intent.svi_relevance_threshold, 0.0);
    }
}
