/// Cosine similarity between embedding vectors.
///
/// Pure numeric utility — no I/O, deterministic. Degenerate input
/// (zero-norm or length-mismatched vectors) scores 0.0 rather than
/// erroring, so a single bad embedding can never poison a filtering
/// decision.

/// Cosine similarity of two vectors, in [-1, 1].
///
/// Returns 0.0 when either vector has zero norm or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a.sqrt() * norm_b.sqrt())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
