/// OpenAI API client.
///
/// Chat completions (JSON mode for structured extraction, free text for
/// answer generation) and batched text embeddings. Calls are blocking
/// with a bounded timeout. The embedding path doubles as the selection
/// layer's `EmbeddingProvider`: that impl swallows errors into an empty
/// batch, which is the signal the SVI filter fails open on.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::logging::{self, DataSource};
use crate::model::UpstreamError;
use crate::selection::EmbeddingProvider;

const OPENAI_API_URL: &str = "https://api.openai.com/v1";

/// Chat model used for extraction, intent analysis, and answers.
const CHAT_MODEL: &str = "gpt-4o";

/// Embedding model used for SVI relevance scoring.
const EMBEDDING_MODEL: &str = "text-embedding-3-large";

// ============================================================================
// Request / Response Structures
// ============================================================================

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    format_type: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

// ============================================================================
// Client
// ============================================================================

/// A client for the OpenAI chat-completions and embeddings endpoints.
pub struct OpenAiClient {
    api_key: String,
    client: reqwest::blocking::Client,
}

impl OpenAiClient {
    pub fn new(api_key: String, timeout_secs: u64) -> Result<Self, UpstreamError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(OpenAiClient { api_key, client })
    }

    /// Chat completion in JSON mode. Returns the raw content string; the
    /// caller owns parsing it into its schema.
    pub fn chat_json(&self, system: &str, user: &str) -> Result<String, UpstreamError> {
        self.chat(system, user, true, None)
    }

    /// Free-text chat completion at the given sampling temperature.
    pub fn chat_text(
        &self,
        system: &str,
        user: &str,
        temperature: f32,
    ) -> Result<String, UpstreamError> {
        self.chat(system, user, false, Some(temperature))
    }

    fn chat(
        &self,
        system: &str,
        user: &str,
        json_mode: bool,
        temperature: Option<f32>,
    ) -> Result<String, UpstreamError> {
        let request = ChatRequest {
            model: CHAT_MODEL,
            messages: vec![
                ChatMessage { role: "system", content: system },
                ChatMessage { role: "user", content: user },
            ],
            response_format: json_mode.then_some(ResponseFormat { format_type: "json_object" }),
            temperature,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", OPENAI_API_URL))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()?;

        if !response.status().is_success() {
            return Err(UpstreamError::HttpError(response.status().as_u16()));
        }

        let body: ChatResponse = response
            .json()
            .map_err(|e| UpstreamError::ParseError(e.to_string()))?;

        first_chat_content(body)
    }

    /// Embed a batch of texts in one request.
    ///
    /// The returned vectors are in request order, one per input text; a
    /// response with a different count is an error rather than a silent
    /// misalignment.
    pub fn embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, UpstreamError> {
        let request = EmbeddingsRequest { model: EMBEDDING_MODEL, input: texts };

        let response = self
            .client
            .post(format!("{}/embeddings", OPENAI_API_URL))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()?;

        if !response.status().is_success() {
            return Err(UpstreamError::HttpError(response.status().as_u16()));
        }

        let body: EmbeddingsResponse = response
            .json()
            .map_err(|e| UpstreamError::ParseError(e.to_string()))?;

        vectors_in_request_order(body, texts.len())
    }
}

impl EmbeddingProvider for OpenAiClient {
    /// Empty on any failure — the SVI filter's fail-open policy depends
    /// on this never propagating an error.
    fn embed(&self, texts: &[String]) -> Vec<Vec<f32>> {
        match self.embeddings(texts) {
            Ok(vectors) => vectors,
            Err(e) => {
                logging::log_upstream_failure(
                    DataSource::OpenAi,
                    "embeddings",
                    "embed batch",
                    &e,
                );
                Vec::new()
            }
        }
    }
}

// ============================================================================
// Response Mapping
// ============================================================================

fn first_chat_content(body: ChatResponse) -> Result<String, UpstreamError> {
    body.choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| UpstreamError::NoData("chat completion had no content".to_string()))
}

fn vectors_in_request_order(
    body: EmbeddingsResponse,
    expected: usize,
) -> Result<Vec<Vec<f32>>, UpstreamError> {
    let mut data = body.data;
    // Items carry their request index; sort defensively in case the
    // provider ever returns them out of order.
    data.sort_by_key(|item| item.index);

    if data.len() != expected {
        return Err(UpstreamError::NoData(format!(
            "embedding count mismatch: requested {}, received {}",
            expected,
            data.len()
        )));
    }

    Ok(data.into_iter().map(|item| item.embedding).collect())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_chat_content() {
        let body: ChatResponse = serde_json::from_str(
            r#"{"choices": [{"message": {"content": "{\"result\": []}"}}]}"#,
        )
        .unwrap();
        assert_eq!(first_chat_content(body).unwrap(), "{\"result\": []}");
    }

    #[test]
    fn test_chat_without_content_is_error() {
        let body: ChatResponse =
            serde_json::from_str(r#"{"choices": [{"message": {"content": null}}]}"#).unwrap();
        assert!(first_chat_content(body).is_err());

        let body: ChatResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(first_chat_content(body).is_err());
    }

    #[test]
    fn test_embeddings_sorted_back_into_request_order() {
        let body: EmbeddingsResponse = serde_json::from_str(
            r#"{
                "data": [
                    {"index": 1, "embedding": [0.0, 1.0]},
                    {"index": 0, "embedding": [1.0, 0.0]}
                ]
            }"#,
        )
        .unwrap();
        let vectors = vectors_in_request_order(body, 2).unwrap();
        assert_eq!(vectors[0], vec![1.0, 0.0]);
        assert_eq!(vectors[1], vec![0.0, 1.0]);
    }

    #[test]
    fn test_embedding_count_mismatch_is_error() {
        let body: EmbeddingsResponse =
            serde_json::from_str(r#"{"data": [{"index": 0, "embedding": [1.0]}]}"#).unwrap();
        let err = vectors_in_request_order(body, 3).unwrap_err();
        assert!(err.to_string().contains("mismatch"));
    }
}
