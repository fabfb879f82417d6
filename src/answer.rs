/// Natural-language answer generation.
///
/// Serializes the filtered per-location context and asks the chat model
/// to answer the user's question from it. This is the last pipeline
/// stage; a failure here is surfaced to the caller rather than recovered.

use crate::ingest::openai::OpenAiClient;
use crate::model::UpstreamError;
use crate::selection::SelectionOutput;

const ANSWER_SYSTEM_PROMPT: &str = "You are an expert flood information assistant. You have access to flood-related data including:
- Precipitation forecasts and historical data
- Historical flood events with locations and dates
- Social Vulnerability Index (SVI) data indicating community risk factors
- County-level geographic information

Your task is to provide clear, accurate, and helpful answers based on the provided data.
If the data doesn't contain enough information to fully answer the question, acknowledge what you can answer and what information is missing.
Always cite specific data points when making claims.";

/// Sampling temperature for answers: low, to keep the model anchored to
/// the supplied data.
const ANSWER_TEMPERATURE: f32 = 0.2;

/// Generate an answer to `query` grounded in the filtered context.
pub fn generate_answer(
    llm: &OpenAiClient,
    query: &str,
    selection: &SelectionOutput,
) -> Result<String, UpstreamError> {
    let context = serde_json::to_string_pretty(&selection.filtered_data)
        .map_err(|e| UpstreamError::ParseError(e.to_string()))?;

    let user_prompt = format!(
        "User Question: {}\n\n\
         Available Data:\n{}\n\n\
         Please provide a comprehensive answer to the user's question based on the available data above.\n\
         Structure your response clearly and include specific numbers, dates, and locations when relevant.",
        query, context
    );

    llm.chat_text(ANSWER_SYSTEM_PROMPT, &user_prompt, ANSWER_TEMPERATURE)
}
