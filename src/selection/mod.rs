/// Context selection for flood queries.
///
/// Given the raw per-location records produced by retrieval and the
/// user's query, this module decides which data categories are relevant
/// and narrows each one: rule-based filters for flood events (distance
/// and count caps), embedding similarity for SVI variables, and
/// pass-through inclusion for county data and precipitation.
///
/// Submodules:
/// - `intent` — query → structured intent record, with a hard fallback.
/// - `similarity` — cosine similarity over embedding vectors.
/// - `flood_filter` — distance/count narrowing of flood events.
/// - `svi_filter` — semantic narrowing of SVI variables.
///
/// The selector never aborts on a collaborator failure: classification
/// falls back to the default intent, embedding failures fail open, and a
/// malformed location record is skipped with a warning while the batch
/// continues.

pub mod flood_filter;
pub mod intent;
pub mod similarity;
pub mod svi_filter;

use serde::{Deserialize, Serialize};

use crate::logging::{self, DataSource};
use crate::model::{FilteredLocation, LocationRecord, SviData};
use intent::QueryIntent;
use svi_filter::SviFilter;

// ---------------------------------------------------------------------------
// Collaborator seams
// ---------------------------------------------------------------------------

/// Maps a batch of texts to embedding vectors, same length and order as
/// the input — or an empty `Vec` on any failure. Implementations must not
/// propagate errors; the SVI filter's fail-open policy depends on the
/// empty-on-failure contract.
pub trait EmbeddingProvider {
    fn embed(&self, texts: &[String]) -> Vec<Vec<f32>>;
}

/// Maps a free-text query to an intent record. Implementations must
/// return the fixed default record instead of failing.
pub trait IntentClassifier {
    fn classify(&self, query: &str) -> QueryIntent;
}

// ---------------------------------------------------------------------------
// Selection output
// ---------------------------------------------------------------------------

/// The result of one context-selection run, ready for answer generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionOutput {
    pub query: String,
    pub intent_analysis: QueryIntent,
    pub filtered_data: Vec<FilteredLocation>,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Assembles filtered per-location records from raw retrieval output.
pub struct ContextSelector<'a> {
    classifier: &'a dyn IntentClassifier,
    svi_filter: SviFilter<'a>,
}

impl<'a> ContextSelector<'a> {
    /// `svi_context` is the domain-description text for SVI semantic
    /// matching; pass an empty string to match bare variable names.
    pub fn new(
        classifier: &'a dyn IntentClassifier,
        embedder: &'a dyn EmbeddingProvider,
        svi_context: &'a str,
    ) -> Self {
        ContextSelector {
            classifier,
            svi_filter: SviFilter::new(embedder, svi_context),
        }
    }

    /// Classify the query and narrow every location record accordingly.
    ///
    /// Output order matches input order 1:1; the only records missing
    /// from the output are malformed ones (no `input_location`), which
    /// are skipped with a warning. This function never fails for a
    /// well-formed batch and a non-empty query.
    pub fn select(&self, locations: &[LocationRecord], query: &str) -> SelectionOutput {
        let intent = self.classifier.classify(query);

        logging::info(
            DataSource::Selection,
            None,
            &format!(
                "Intent: forecast={} history={} floods={} svi={} county={}",
                intent.needs_precipitation_forecast,
                intent.needs_precipitation_history,
                intent.needs_flood_history,
                intent.needs_svi_data,
                intent.needs_county_info
            ),
        );

        let mut filtered_data = Vec::with_capacity(locations.len());
        let mut skipped = 0usize;

        for record in locations {
            match self.select_location(record, query, &intent) {
                Some(filtered) => filtered_data.push(filtered),
                None => skipped += 1,
            }
        }

        logging::log_selection_summary(locations.len(), filtered_data.len(), skipped);

        SelectionOutput {
            query: query.to_string(),
            intent_analysis: intent,
            filtered_data,
        }
    }

    /// Narrow one location record. Returns `None` only for a malformed
    /// record missing its `input_location`.
    fn select_location(
        &self,
        record: &LocationRecord,
        query: &str,
        intent: &QueryIntent,
    ) -> Option<FilteredLocation> {
        let Some(input_location) = record.input_location.clone() else {
            logging::warn(
                DataSource::Selection,
                None,
                "skipping location record with no input_location",
            );
            return None;
        };

        let mut filtered = FilteredLocation::bare(input_location);

        // A failed-enrichment status short-circuits every county-keyed
        // category. The forecast is the one exception: it is fetched by
        // coordinates, not county, so it may still be present and wanted.
        if let Some(status) = record.status.filter(|s| s.blocks_enrichment()) {
            filtered.status = Some(status);
            if intent.needs_precipitation_forecast {
                filtered.precipitation_forecast = record.precipitation_forecast.clone();
            }
            return Some(filtered);
        }
        filtered.status = record.status;

        if intent.needs_county_info {
            filtered.county_data = record.county_data.clone();
        }
        if intent.needs_precipitation_history {
            filtered.precipitation_history = record.precipitation_history.clone();
        }
        if intent.needs_precipitation_forecast {
            filtered.precipitation_forecast = record.precipitation_forecast.clone();
        }

        if intent.needs_flood_history {
            if let Some(events) = &record.flood_event_history {
                let kept = flood_filter::filter_flood_events(events, &intent.flood_event_filters);
                if !kept.is_empty() {
                    filtered.flood_event_history = Some(kept);
                }
            }
        }

        if intent.needs_svi_data {
            if let Some(svi) = &record.social_vulnerability_index {
                let narrowed = self.svi_filter.filter(svi, query, intent.svi_relevance_threshold);
                if svi_has_content(&narrowed) {
                    filtered.social_vulnerability_index = Some(narrowed);
                }
            }
        }

        Some(filtered)
    }
}

/// The "has content" check for filtered SVI data: at least one overall
/// percentile, or any theme aggregate, or any surviving variable.
pub fn svi_has_content(svi: &SviData) -> bool {
    svi.overall_ranking.national.is_some()
        || svi.overall_ranking.state.is_some()
        || !svi.themes.is_empty()
        || !svi.variables.is_empty()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
