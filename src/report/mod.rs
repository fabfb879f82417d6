/// Report rendering for query results.
///
/// Submodules:
/// - `markdown` — Markdown report builder and file writer.

pub mod markdown;
