//! Face library cache.
//!
//! Embeddings for the enrolled roster are expensive to compute, so they
//! are built once and swapped wholesale (copy-on-rebuild): a match
//! evaluation always sees one immutable snapshot. Rebuilds are
//! reconsidered on a fixed cadence but executed only when the supplier's
//! entry count changed since the last build, which bounds their cost on
//! a stable roster.

use crate::image::Embedding;
use crate::matching::{MatchCandidate, best_similarity};
use crate::traits::{FaceEmbedder, FaceLibrarySupplier};
use smartatt_core::{EmployeeId, FaceLibraryEntry};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Immutable snapshot of the enrolled roster with precomputed embeddings.
#[derive(Debug, Default)]
pub struct FaceLibrary {
    entries: Vec<FaceLibraryEntry>,
    embeddings: HashMap<EmployeeId, Vec<Embedding>>,
}

impl FaceLibrary {
    /// Build a snapshot from supplier entries. Entries whose enrollment
    /// image cannot be embedded are skipped with a warning.
    pub fn build<E: FaceEmbedder + ?Sized>(source: &[FaceLibraryEntry], embedder: &E) -> Self {
        let mut entries = Vec::new();
        let mut embeddings: HashMap<EmployeeId, Vec<Embedding>> = HashMap::new();

        for entry in source {
            match embedder.embed_reference(&entry.image_path) {
                Some(embedding) => {
                    embeddings
                        .entry(entry.employee_id)
                        .or_default()
                        .push(embedding);
                    entries.push(entry.clone());
                }
                None => {
                    warn!(
                        employee = %entry.employee_id,
                        path = entry.image_path.as_str(),
                        "enrollment image could not be embedded, skipped"
                    );
                }
            }
        }

        Self {
            entries,
            embeddings,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Rank all identities against a probe embedding, best first.
    ///
    /// Per identity the score is the maximum over its stored embeddings.
    #[must_use]
    pub fn rank(&self, probe: &Embedding) -> Vec<MatchCandidate> {
        let mut ranked: Vec<MatchCandidate> = self
            .entries
            .iter()
            .filter_map(|entry| {
                let stored = self.embeddings.get(&entry.employee_id)?;
                Some(MatchCandidate {
                    entry: entry.clone(),
                    score: best_similarity(probe, stored),
                })
            })
            .collect();
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        ranked
    }
}

/// Owns the current snapshot and the rebuild policy.
pub struct LibraryCache {
    snapshot: Arc<FaceLibrary>,
    last_source_count: Option<usize>,
    last_checked: Instant,
    interval: std::time::Duration,
}

impl LibraryCache {
    #[must_use]
    pub fn new(interval: std::time::Duration) -> Self {
        Self {
            snapshot: Arc::new(FaceLibrary::default()),
            last_source_count: None,
            last_checked: Instant::now(),
            interval,
        }
    }

    /// The current snapshot. Cheap; holders keep it valid across a
    /// concurrent rebuild.
    #[must_use]
    pub fn snapshot(&self) -> Arc<FaceLibrary> {
        Arc::clone(&self.snapshot)
    }

    /// Unconditional rebuild from the supplier.
    pub fn rebuild<S, E>(&mut self, supplier: &S, embedder: &E)
    where
        S: FaceLibrarySupplier + ?Sized,
        E: FaceEmbedder + ?Sized,
    {
        let source = supplier.entries();
        let library = FaceLibrary::build(&source, embedder);
        info!(
            enrolled = source.len(),
            usable = library.len(),
            "face library rebuilt"
        );
        self.last_source_count = Some(source.len());
        self.last_checked = Instant::now();
        self.snapshot = Arc::new(library);
    }

    /// Reconsult the supplier if the cadence elapsed; rebuild only when
    /// the entry count changed.
    pub fn maybe_rebuild<S, E>(&mut self, supplier: &S, embedder: &E)
    where
        S: FaceLibrarySupplier + ?Sized,
        E: FaceEmbedder + ?Sized,
    {
        if self.last_checked.elapsed() < self.interval {
            return;
        }
        let count = supplier.entries().len();
        if self.last_source_count == Some(count) {
            debug!(count, "face library unchanged, rebuild skipped");
            self.last_checked = Instant::now();
            return;
        }
        self.rebuild(supplier, embedder);
    }
}
