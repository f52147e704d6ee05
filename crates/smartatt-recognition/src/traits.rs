//! Collaborator trait definitions.
//!
//! These traits are the seams between the arbiter and the components
//! this crate treats as opaque: the camera, the detection/embedding
//! model, and the roster database. Production wires real
//! implementations; tests inject the mocks from [`crate::mock`].
//!
//! Implementations are called from the recognition poll task on every
//! tick; they are expected to be non-blocking or bounded (the poll
//! period bounds how long they may take).

use crate::image::{Detection, Embedding, Frame};
use smartatt_core::FaceLibraryEntry;

/// Most recent camera frame, non-blocking.
pub trait FrameSource: Send + Sync {
    /// Latest published frame, or `None` when the camera has not
    /// produced one yet (or is disconnected).
    fn latest_frame(&self) -> Option<Frame>;
}

/// Opaque face detector.
pub trait FaceDetector: Send + Sync {
    /// All face candidates in the frame, unfiltered; the arbiter applies
    /// the size and confidence gates.
    fn detect(&self, frame: &Frame) -> Vec<Detection>;
}

/// Opaque embedding scorer.
pub trait FaceEmbedder: Send + Sync {
    /// Embed a cropped face. `None` means the scorer could not produce
    /// a vector (degraded input); the tick treats that as no-match.
    fn embed(&self, face: &Frame) -> Option<Embedding>;

    /// Embed an enrollment image by path, used when (re)building the
    /// face library.
    fn embed_reference(&self, image_path: &str) -> Option<Embedding>;
}

/// Current roster of enrolled faces.
pub trait FaceLibrarySupplier: Send + Sync {
    fn entries(&self) -> Vec<FaceLibraryEntry>;
}

/// Opaque camera, pulled by the publisher task.
pub trait FrameGrabber: Send {
    /// Grab the next frame, or `None` when the camera has no frame
    /// ready (the publisher keeps the last published value).
    fn grab(&mut self) -> Option<Frame>;
}
