/// Semantic SVI variable filtering.
///
/// Keeps only the Social Vulnerability Index variables whose meaning is
/// close enough to the query, measured by cosine similarity of text
/// embeddings. Only leaf variables are subject to filtering — theme-level
/// aggregates and the overall ranking always pass through untouched, and
/// values are never transformed, only kept or dropped.
///
/// The filter is fail-open: when the embedding provider returns nothing
/// (network error, auth failure, malformed response), the full unfiltered
/// structure is returned. Losing data because an embedding call failed
/// would be strictly worse than returning too much.

use std::collections::{BTreeMap, BTreeSet};

use crate::logging::{self, DataSource};
use crate::model::SviData;
use crate::selection::EmbeddingProvider;
use crate::selection::similarity::cosine_similarity;

/// Embedding-backed relevance filter for SVI variables.
///
/// `svi_context` is the domain-description text explaining what SVI
/// themes and variables mean. It is loaded once at startup and shared by
/// reference; when present it is concatenated onto both the query text
/// and every variable text so that terse variable names embed with their
/// domain meaning attached.
pub struct SviFilter<'a> {
    embedder: &'a dyn EmbeddingProvider,
    svi_context: &'a str,
}

impl<'a> SviFilter<'a> {
    pub fn new(embedder: &'a dyn EmbeddingProvider, svi_context: &'a str) -> Self {
        SviFilter { embedder, svi_context }
    }

    /// Narrow `svi.variables` to the entries relevant to `query`.
    ///
    /// Variables scoring at or above `threshold` survive; themes left
    /// with no surviving variables are dropped from the nested mapping.
    /// A duplicate variable name appearing under several themes embeds
    /// once, and the verdict applies to every occurrence.
    pub fn filter(&self, svi: &SviData, query: &str, threshold: f32) -> SviData {
        // Unique variable names across all themes, in stable order.
        let unique_names: BTreeSet<&str> = svi
            .variables
            .values()
            .flat_map(|vars| vars.keys().map(String::as_str))
            .collect();

        if unique_names.is_empty() {
            return svi.clone();
        }

        let names: Vec<&str> = unique_names.into_iter().collect();

        logging::info(
            DataSource::Selection,
            None,
            &format!("Analyzing relevance of {} SVI variables...", names.len()),
        );

        // One batch per filtering decision: the query text first, then
        // every variable text, so all vectors come from a single
        // embedding space/version.
        let mut texts = Vec::with_capacity(names.len() + 1);
        texts.push(self.query_text(query));
        texts.extend(names.iter().map(|name| self.variable_text(name)));

        let embeddings = self.embedder.embed(&texts);
        if embeddings.len() != texts.len() {
            logging::warn(
                DataSource::Selection,
                None,
                "Could not get embeddings. Returning all variables.",
            );
            return svi.clone();
        }

        let query_embedding = &embeddings[0];
        let verdicts: BTreeMap<&str, f32> = names
            .iter()
            .zip(embeddings[1..].iter())
            .map(|(name, embedding)| (*name, cosine_similarity(query_embedding, embedding)))
            .collect();

        // Rebuild the nested theme → variable mapping with only the
        // survivors; themes emptied by filtering disappear entirely.
        let mut variables: BTreeMap<String, BTreeMap<String, Option<f64>>> = BTreeMap::new();
        for (theme, vars) in &svi.variables {
            let surviving: BTreeMap<String, Option<f64>> = vars
                .iter()
                .filter(|(name, _)| {
                    verdicts
                        .get(name.as_str())
                        .is_some_and(|sim| *sim >= threshold)
                })
                .map(|(name, value)| (name.clone(), *value))
                .collect();
            if !surviving.is_empty() {
                variables.insert(theme.clone(), surviving);
            }
        }

        let kept: usize = variables.values().map(BTreeMap::len).sum();
        let total: usize = svi.variables.values().map(BTreeMap::len).sum();
        logging::info(
            DataSource::Selection,
            None,
            &format!("Kept {}/{} SVI variables (threshold: {})", kept, total, threshold),
        );

        SviData {
            release_year: svi.release_year,
            overall_ranking: svi.overall_ranking.clone(),
            themes: svi.themes.clone(),
            variables,
        }
    }

    fn query_text(&self, query: &str) -> String {
        if self.svi_context.is_empty() {
            query.to_string()
        } else {
            format!("Query: {}\n\nContext: {}", query, self.svi_context)
        }
    }

    fn variable_text(&self, name: &str) -> String {
        if self.svi_context.is_empty() {
            name.to_string()
        } else {
            format!("{}: {}", name, self.svi_context)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
