//! Deployment seams for the recognition pipeline.
//!
//! The camera and the detection/embedding model are integration points:
//! a deployment links its backend of choice behind the recognition
//! traits. This module provides the pieces the headless daemon ships
//! with: a roster loaded from a JSON file, and inert camera/scorer
//! placeholders under which every session resolves by timeout.

use anyhow::{Context, Result};
use smartatt_core::FaceLibraryEntry;
use smartatt_recognition::{
    Detection, Embedding, FaceDetector, FaceEmbedder, FaceLibrarySupplier, Frame, FrameGrabber,
};
use std::path::Path;
use tracing::warn;

/// Roster snapshot loaded once from a JSON file.
///
/// The file is an array of entries:
///
/// ```json
/// [{"employee_id": 1, "student_id": 101,
///   "full_name": "Jane Doe", "image_path": "/faces/1.jpg"}]
/// ```
pub struct FileRoster {
    entries: Vec<FaceLibraryEntry>,
}

impl FileRoster {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading roster {}", path.display()))?;
        let entries: Vec<FaceLibraryEntry> = serde_json::from_str(&raw)
            .with_context(|| format!("parsing roster {}", path.display()))?;
        Ok(Self { entries })
    }

    pub fn empty() -> Self {
        warn!("no roster file given, face library will be empty");
        Self {
            entries: Vec::new(),
        }
    }
}

impl FaceLibrarySupplier for FileRoster {
    fn entries(&self) -> Vec<FaceLibraryEntry> {
        self.entries.clone()
    }
}

/// Camera placeholder: no frames. The status channel reports the camera
/// as absent and the arbiter idles inside its armed windows.
pub struct UnconfiguredCamera;

impl FrameGrabber for UnconfiguredCamera {
    fn grab(&mut self) -> Option<Frame> {
        None
    }
}

/// Scorer placeholder: detects nothing and embeds nothing, so sessions
/// resolve by timeout until a model backend is wired in.
pub struct UnconfiguredScorer;

impl FaceDetector for UnconfiguredScorer {
    fn detect(&self, _frame: &Frame) -> Vec<Detection> {
        Vec::new()
    }
}

impl FaceEmbedder for UnconfiguredScorer {
    fn embed(&self, _face: &Frame) -> Option<Embedding> {
        None
    }

    fn embed_reference(&self, _image_path: &str) -> Option<Embedding> {
        None
    }
}
