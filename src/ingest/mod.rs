/// Upstream API clients.
///
/// Each submodule wraps one external service behind a blocking reqwest
/// client with a bounded timeout:
/// - `maps` — Google Maps Platform (geocoding, reverse geocoding, hourly
///   weather forecast).
/// - `openai` — OpenAI (chat completions, text embeddings).

pub mod maps;
pub mod openai;
