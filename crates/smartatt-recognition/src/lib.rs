//! Session-gated face recognition for the attendance kiosk.
//!
//! A recognition worker polls the latest camera frame on a fixed period,
//! but its outcomes only "count" inside an armed window tied to a
//! hardware handshake session. The [`RecognitionArbiter`] owns that
//! gating: arming, pausing, the two-frame confirmation streak that
//! debounces single-frame misdetections, and the quality gates that
//! refuse to match tiny or blurry faces.
//!
//! The detector and embedder are opaque scorers behind traits
//! ([`FaceDetector`], [`FaceEmbedder`]); this crate owns everything
//! around them: candidate ranking with a separation margin, the streak
//! policy, library caching with count-gated rebuilds, and the
//! coalesce-to-latest status/visual outputs.
//!
//! # Pipeline (one poll tick)
//!
//! ```text
//! latest frame ─► detect ─► quality gates ─► crop ─► embed ─► rank ─► streak ─► hit
//!                 (size,      (sharpness)                     (threshold,
//!                  confidence)                                 margin)
//! ```
//!
//! Every failure short of a confirmed hit resets the streak and reports
//! a status line; absence of a hit is the only observable effect; the
//! pipeline never raises.

pub mod arbiter;
pub mod image;
pub mod library;
pub mod mailbox;
pub mod matching;
pub mod mock;
pub mod traits;

pub use arbiter::{ArbiterOutputs, RecognitionArbiter, RecognitionHit, VisualHint};
pub use image::{BoundingBox, Detection, Embedding, Frame};
pub use library::{FaceLibrary, LibraryCache};
pub use mailbox::{FrameMailbox, FrameMailboxReader, run_camera_publisher};
pub use traits::{FaceDetector, FaceEmbedder, FaceLibrarySupplier, FrameGrabber, FrameSource};
