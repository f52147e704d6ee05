//! Embedding comparison and identity ranking.

use crate::image::Embedding;
use smartatt_core::FaceLibraryEntry;

/// Cosine similarity between two embeddings.
///
/// Mismatched lengths score 0.0 (distinct model versions must never
/// accidentally match). The norms carry a small epsilon so a zero
/// vector scores 0.0 instead of dividing by zero.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt() + 1e-9;
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt() + 1e-9;
    dot / (na * nb)
}

/// One ranked identity candidate: the best score across all of that
/// identity's stored embeddings.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchCandidate {
    pub entry: FaceLibraryEntry,
    pub score: f32,
}

/// Pick the accepted identity from a descending ranking, if any.
///
/// The top candidate is accepted only when its score clears the
/// threshold AND it beats the runner-up by at least the separation
/// margin; a close second place means the match is ambiguous and is
/// rejected outright.
#[must_use]
pub fn accept_top_candidate(
    ranked: &[MatchCandidate],
    threshold: f32,
    margin: f32,
) -> Option<&MatchCandidate> {
    let top = ranked.first()?;
    if top.score < threshold {
        return None;
    }
    let runner_up = ranked.get(1).map_or(0.0, |c| c.score);
    if top.score - runner_up < margin {
        return None;
    }
    Some(top)
}

/// Per-identity max similarity of `probe` against `stored`, unsorted.
#[must_use]
pub fn best_similarity(probe: &Embedding, stored: &[Embedding]) -> f32 {
    stored
        .iter()
        .map(|e| cosine_similarity(probe, e))
        .fold(0.0, f32::max)
}
