//! Mock pipeline implementations for testing without a camera or model.

use crate::image::{Detection, Embedding, Frame};
use crate::traits::{FaceDetector, FaceEmbedder, FaceLibrarySupplier, FrameGrabber, FrameSource};
use smartatt_core::FaceLibraryEntry;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

fn lock_recover<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Shared mutable frame slot.
#[derive(Debug, Clone, Default)]
pub struct MockFrameSource {
    frame: Arc<Mutex<Option<Frame>>>,
}

impl MockFrameSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_frame(&self, frame: Option<Frame>) {
        *lock_recover(&self.frame) = frame;
    }
}

impl FrameSource for MockFrameSource {
    fn latest_frame(&self) -> Option<Frame> {
        lock_recover(&self.frame).clone()
    }
}

/// Detector returning a fixed detection list.
#[derive(Debug, Clone, Default)]
pub struct MockDetector {
    detections: Arc<Mutex<Vec<Detection>>>,
}

impl MockDetector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_detections(&self, detections: Vec<Detection>) {
        *lock_recover(&self.detections) = detections;
    }
}

impl FaceDetector for MockDetector {
    fn detect(&self, _frame: &Frame) -> Vec<Detection> {
        lock_recover(&self.detections).clone()
    }
}

/// Embedder with fixed reference vectors and a scripted probe queue.
///
/// `embed` pops the front of the probe queue on every call; an exhausted
/// queue embeds to `None` (scorer failure).
#[derive(Debug, Clone, Default)]
pub struct MockEmbedder {
    references: Arc<Mutex<HashMap<String, Embedding>>>,
    probes: Arc<Mutex<VecDeque<Option<Embedding>>>>,
}

impl MockEmbedder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_reference(&self, path: &str, embedding: Embedding) {
        lock_recover(&self.references).insert(path.to_string(), embedding);
    }

    pub fn push_probe(&self, embedding: Option<Embedding>) {
        lock_recover(&self.probes).push_back(embedding);
    }
}

impl FaceEmbedder for MockEmbedder {
    fn embed(&self, _face: &Frame) -> Option<Embedding> {
        lock_recover(&self.probes).pop_front().flatten()
    }

    fn embed_reference(&self, image_path: &str) -> Option<Embedding> {
        lock_recover(&self.references).get(image_path).cloned()
    }
}

/// Supplier over a mutable in-memory roster.
#[derive(Debug, Clone, Default)]
pub struct MockSupplier {
    entries: Arc<Mutex<Vec<FaceLibraryEntry>>>,
}

impl MockSupplier {
    #[must_use]
    pub fn new(entries: Vec<FaceLibraryEntry>) -> Self {
        Self {
            entries: Arc::new(Mutex::new(entries)),
        }
    }

    pub fn set_entries(&self, entries: Vec<FaceLibraryEntry>) {
        *lock_recover(&self.entries) = entries;
    }
}

impl FaceLibrarySupplier for MockSupplier {
    fn entries(&self) -> Vec<FaceLibraryEntry> {
        lock_recover(&self.entries).clone()
    }
}

/// Grabber replaying a scripted frame sequence.
#[derive(Debug, Default)]
pub struct MockGrabber {
    frames: VecDeque<Option<Frame>>,
}

impl MockGrabber {
    #[must_use]
    pub fn new(frames: Vec<Option<Frame>>) -> Self {
        Self {
            frames: frames.into(),
        }
    }
}

impl FrameGrabber for MockGrabber {
    fn grab(&mut self) -> Option<Frame> {
        self.frames.pop_front().flatten()
    }
}
