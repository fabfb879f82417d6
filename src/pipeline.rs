/// End-to-end query pipeline.
///
/// Stage 1 retrieves flood context data (query preprocessing, geocoding,
/// database enrichment), stage 2 selects the relevant context, stage 3
/// generates the natural-language answer. Each run is an independent,
/// stateless batch job; nothing is shared between queries.

use std::error::Error;
use std::path::PathBuf;

use chrono::Utc;
use postgres::NoTls;

use crate::answer;
use crate::config::{self, AppConfig, Settings};
use crate::extract;
use crate::ingest::maps::GoogleMapsClient;
use crate::ingest::openai::OpenAiClient;
use crate::logging::{self, DataSource};
use crate::model::LocationRecord;
use crate::retrieval;
use crate::selection::intent::LlmIntentClassifier;
use crate::selection::{ContextSelector, SelectionOutput};
use serde::{Deserialize, Serialize};

/// Everything a query run produces: the answer, the filtered context it
/// was grounded in, and the unfiltered retrieval data for reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub query: String,
    pub answer: String,
    pub filtered_context: SelectionOutput,
    pub full_retrieval_data: Vec<LocationRecord>,
}

/// Run the full pipeline for one query.
///
/// Fails only when the query yields no geocodable locations, a client or
/// the database cannot be constructed, or answer generation fails.
/// Collaborator failures inside context selection degrade per that
/// module's contracts and never abort the run.
pub fn run_query(
    cfg: &AppConfig,
    settings: &Settings,
    query: &str,
) -> Result<QueryResult, Box<dyn Error>> {
    let maps = GoogleMapsClient::new(cfg.google_maps_api_key.clone(), settings.request_timeout_secs)?;
    let llm = OpenAiClient::new(cfg.openai_api_key.clone(), settings.request_timeout_secs)?;
    let mut db = postgres::Client::connect(&cfg.postgres_connection_string(), NoTls)?;
    let svi_context = config::load_svi_context(&settings.svi_context_path);

    // ---- Stage 1: retrieve flood context data -----------------------------
    logging::info(DataSource::System, None, "Stage 1: retrieving flood context data");

    let forecast_hours =
        extract::extract_forecast_hours(&llm, query, settings.default_forecast_hours);
    match forecast_hours {
        Some(hours) => logging::info(
            DataSource::System,
            None,
            &format!("User requested a {}-hour precipitation forecast", hours),
        ),
        None => logging::info(DataSource::System, None, "No precipitation forecast requested"),
    }

    let location_names = extract::extract_locations(&llm, query)?;
    if location_names.is_empty() {
        return Err("no locations were identified in the query".into());
    }
    logging::info(
        DataSource::System,
        None,
        &format!("Locations identified: {}", location_names.join("; ")),
    );

    let geocoded = extract::geocode_locations(&maps, &location_names);
    if geocoded.is_empty() {
        return Err("none of the identified locations could be geocoded".into());
    }

    let retrieval_results = retrieval::contextual_data_for_locations(
        &mut db,
        &maps,
        &geocoded,
        forecast_hours,
        settings.svi_release_year,
    );

    // ---- Stage 2: select relevant context ---------------------------------
    logging::info(DataSource::System, None, "Stage 2: selecting relevant context");

    let classifier = LlmIntentClassifier::new(&llm);
    let selector = ContextSelector::new(&classifier, &llm, &svi_context);
    let filtered_context = selector.select(&retrieval_results, query);

    // ---- Stage 3: generate the answer -------------------------------------
    logging::info(DataSource::System, None, "Stage 3: generating answer");

    let answer = answer::generate_answer(&llm, query, &filtered_context)?;

    Ok(QueryResult {
        query: query.to_string(),
        answer,
        filtered_context,
        full_retrieval_data: retrieval_results,
    })
}

/// Save the full result object as pretty-printed JSON under `dir`.
/// Returns the path of the written file.
pub fn save_json(result: &QueryResult, dir: &str) -> Result<PathBuf, Box<dyn Error>> {
    std::fs::create_dir_all(dir)?;
    let filename = format!("flood_query_results_{}.json", Utc::now().format("%Y%m%d_%H%M%S"));
    let path = PathBuf::from(dir).join(filename);
    std::fs::write(&path, serde_json::to_string_pretty(result)?)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::intent::QueryIntent;

    #[test]
    fn test_query_result_serializes_round_trip() {
        let result = QueryResult {
            query: "Will it rain in Mobile?".to_string(),
            answer: "Light rain is expected.".to_string(),
            filtered_context: SelectionOutput {
                query: "Will it rain in Mobile?".to_string(),
                intent_analysis: QueryIntent::default(),
                filtered_data: Vec::new(),
            },
            full_retrieval_data: Vec::new(),
        };
        let json = serde_json::to_string(&result).unwrap();
        let parsed: QueryResult = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.query, result.query);
        assert_eq!(parsed.answer, result.answer);
    }
}
