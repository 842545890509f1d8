//! Cosine similarity and ranking

/// Cosine similarity between two vectors, accumulated in f64.
///
/// Returns `None` when the lengths differ, either vector is empty, or either
/// has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }

    let (mut dot, mut mag_a, mut mag_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        mag_a += x * x;
        mag_b += y * y;
    }

    let denom = mag_a.sqrt() * mag_b.sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return None;
    }
    Some((dot / denom).clamp(-1.0, 1.0))
}

pub fn is_zero_norm(v: &[f32]) -> bool {
    v.iter().all(|x| *x == 0.0)
}

/// Score every candidate against `query` and keep the best `limit`.
///
/// Returns `(candidate index, score)` pairs, highest score first. Equal
/// scores keep candidate order. Candidates that cannot be scored are
/// skipped; a zero-norm query scores nothing.
pub fn rank<'a, I>(query: &[f32], candidates: I, limit: usize) -> Vec<(usize, f64)>
where
    I: IntoIterator<Item = &'a [f32]>,
{
    if is_zero_norm(query) {
        return Vec::new();
    }

    let mut scored: Vec<(usize, f64)> = candidates
        .into_iter()
        .enumerate()
        .filter_map(|(idx, embedding)| cosine_similarity(query, embedding).map(|s| (idx, s)))
        .collect();

    // sort_by is stable
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.truncate(limit);
    scored
}
