//! Session-gated recognition arbiter.
//!
//! Wraps the continuously polling recognition pipeline with the gating
//! that ties outcomes to a hardware handshake session:
//!
//! - recognition only "counts" between [`arm_session`](RecognitionArbiter::arm_session)
//!   and the window deadline (or an explicit [`pause`](RecognitionArbiter::pause));
//!   the worker keeps ticking while paused so it resyncs instantly on
//!   the next arm, but every outcome is suppressed
//! - a hit requires two consecutive ticks matching the *same* identity
//!   (the confirmation streak); a changed identity or any degraded tick
//!   restarts the streak, which debounces single-frame misdetections
//! - the hit callback fires exactly once per session: the moment the
//!   streak reaches the target the arbiter pauses itself
//!
//! Status and visual-overlay outputs go through watch channels: only
//! the latest value matters and intermediate values are dropped under
//! load, which is exactly the UI contract.

use crate::image::{BoundingBox, Detection, Frame};
use crate::library::{FaceLibrary, LibraryCache};
use crate::matching::accept_top_candidate;
use crate::traits::{FaceDetector, FaceEmbedder, FaceLibrarySupplier, FrameSource};
use smartatt_core::config::RecognitionConfig;
use smartatt_core::constants::{CROP_PAD_RATIO, STREAK_TARGET};
use smartatt_core::{EmployeeId, Severity, StatusUpdate, StudentId};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::debug;

/// A confirmed recognition inside an armed window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionHit {
    pub employee_id: EmployeeId,
    pub student_id: StudentId,
    pub full_name: String,
}

/// Overlay drawn over the camera preview. `None` clears it.
#[derive(Debug, Clone, PartialEq)]
pub struct VisualHint {
    pub bbox: BoundingBox,
    pub label: String,
    /// Whether the label is a confirmed identity (green) or an
    /// intermediate state (unknown / verifying).
    pub confirmed: bool,
}

/// Receiving ends of the arbiter's outputs.
pub struct ArbiterOutputs {
    pub hits: mpsc::UnboundedReceiver<RecognitionHit>,
    pub status: watch::Receiver<StatusUpdate>,
    pub visual: watch::Receiver<Option<VisualHint>>,
}

struct Gate {
    paused: bool,
    /// Whether the idle status for the current pause was already
    /// published (notify once, not every tick).
    paused_notified: bool,
    armed_until: Option<Instant>,
    /// First instant a frame was considered in this window; ticks
    /// before `armed_at + arm_delay` are skipped.
    armed_at: Option<Instant>,
    streak: u32,
    candidate: Option<EmployeeId>,
}

fn lock_recover<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// See the module docs.
pub struct RecognitionArbiter {
    frames: Arc<dyn FrameSource>,
    detector: Arc<dyn FaceDetector>,
    embedder: Arc<dyn FaceEmbedder>,
    supplier: Arc<dyn FaceLibrarySupplier>,
    cfg: RecognitionConfig,
    gate: Mutex<Gate>,
    hits: mpsc::UnboundedSender<RecognitionHit>,
    status: watch::Sender<StatusUpdate>,
    visual: watch::Sender<Option<VisualHint>>,
}

impl RecognitionArbiter {
    /// Create the arbiter, initially paused.
    pub fn new(
        frames: Arc<dyn FrameSource>,
        detector: Arc<dyn FaceDetector>,
        embedder: Arc<dyn FaceEmbedder>,
        supplier: Arc<dyn FaceLibrarySupplier>,
        cfg: RecognitionConfig,
    ) -> (Arc<Self>, ArbiterOutputs) {
        let (hit_tx, hit_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) =
            watch::channel(StatusUpdate::new("Recognition starting", Severity::Idle));
        let (visual_tx, visual_rx) = watch::channel(None);

        let arbiter = Arc::new(Self {
            frames,
            detector,
            embedder,
            supplier,
            cfg,
            gate: Mutex::new(Gate {
                paused: true,
                paused_notified: false,
                armed_until: None,
                armed_at: None,
                streak: 0,
                candidate: None,
            }),
            hits: hit_tx,
            status: status_tx,
            visual: visual_tx,
        });
        let outputs = ArbiterOutputs {
            hits: hit_rx,
            status: status_rx,
            visual: visual_rx,
        };
        (arbiter, outputs)
    }

    /// Open a new recognition window. Resets streak and candidate state
    /// and restarts the arm delay.
    pub fn arm_session(&self, window: Duration) {
        let mut gate = lock_recover(&self.gate);
        gate.streak = 0;
        gate.candidate = None;
        gate.armed_at = None;
        gate.armed_until = Some(Instant::now() + window);
        gate.paused = false;
        gate.paused_notified = false;
        debug!(window_secs = window.as_secs_f64(), "recognition armed");
    }

    /// Close the window immediately and discard in-flight streak state.
    pub fn pause(&self) {
        let mut gate = lock_recover(&self.gate);
        gate.paused = true;
        gate.paused_notified = false;
        gate.armed_until = None;
        gate.armed_at = None;
        gate.streak = 0;
        gate.candidate = None;
        debug!("recognition paused");
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        lock_recover(&self.gate).paused
    }

    /// One pipeline pass against the given library snapshot.
    pub fn poll_tick(&self, library: &FaceLibrary) {
        let now = Instant::now();

        {
            let mut gate = lock_recover(&self.gate);
            if !gate.paused && gate.armed_until.is_none_or(|end| now > end) {
                gate.paused = true;
                gate.paused_notified = false;
                debug!("recognition window expired");
            }
            if gate.paused {
                if !gate.paused_notified {
                    gate.paused_notified = true;
                    drop(gate);
                    self.set_status("Idle, waiting for sensor trigger", Severity::Idle);
                }
                return;
            }
        }

        let Some(frame) = self.frames.latest_frame() else {
            self.set_visual(None);
            return;
        };

        // Arm delay: the first frames after the sensor fires still show
        // the person approaching, not a steady face.
        {
            let mut gate = lock_recover(&self.gate);
            let armed_at = *gate.armed_at.get_or_insert(now);
            if now.duration_since(armed_at) < self.cfg.arm_delay() {
                return;
            }
        }

        if library.is_empty() {
            self.set_status("No faces in database", Severity::Warn);
            return;
        }

        let min = self.cfg.min_face_size_px;
        let conf_min = self.cfg.min_detector_confidence;
        let detections: Vec<Detection> = self
            .detector
            .detect(&frame)
            .into_iter()
            .filter(|d| d.bbox.width >= min && d.bbox.height >= min && d.confidence >= conf_min)
            .collect();

        let Some(best) = choose_best_box(&detections, frame.width(), frame.height()) else {
            self.reset_streak();
            self.set_visual(None);
            self.set_status("No face detected", Severity::None);
            return;
        };

        let pad = (CROP_PAD_RATIO * best.bbox.width.max(best.bbox.height) as f32) as u32;
        let region = best.bbox.padded(pad);
        let Some(crop) = frame.crop(region) else {
            self.reset_streak();
            self.set_visual(None);
            self.set_status("No face detected", Severity::None);
            return;
        };

        if crop.variance_of_laplacian() < self.cfg.blur_threshold {
            self.reset_streak();
            self.set_unknown_visual(region);
            self.set_status("Face detected but not recognized", Severity::Warn);
            return;
        }

        let Some(probe) = self.embedder.embed(&crop) else {
            self.reset_streak();
            self.set_unknown_visual(region);
            return;
        };

        let ranked = library.rank(&probe);
        let Some(top) = accept_top_candidate(
            &ranked,
            self.cfg.match_threshold,
            self.cfg.separation_margin,
        ) else {
            self.reset_streak();
            self.set_unknown_visual(region);
            return;
        };
        let entry = top.entry.clone();

        let streak = {
            let mut gate = lock_recover(&self.gate);
            if gate.paused {
                // A pause raced the pipeline; the outcome no longer counts.
                return;
            }
            if gate.candidate == Some(entry.employee_id) {
                gate.streak += 1;
            } else {
                gate.streak = 1;
                gate.candidate = Some(entry.employee_id);
            }
            gate.streak
        };

        if streak >= STREAK_TARGET {
            let label = format!("{} - {}", entry.student_id, entry.full_name);
            self.set_visual(Some(VisualHint {
                bbox: region,
                label,
                confirmed: true,
            }));
            self.set_status(
                format!("Recognized: {} - {}", entry.student_id, entry.full_name),
                Severity::Ok,
            );

            if streak == STREAK_TARGET {
                let _ = self.hits.send(RecognitionHit {
                    employee_id: entry.employee_id,
                    student_id: entry.student_id,
                    full_name: entry.full_name,
                });
                // Self-pause so one face cannot fire repeat callbacks.
                let mut gate = lock_recover(&self.gate);
                gate.paused = true;
                gate.paused_notified = false;
                gate.armed_at = None;
            }
        } else {
            self.set_visual(Some(VisualHint {
                bbox: region,
                label: "Verifying".to_string(),
                confirmed: false,
            }));
            self.set_status("Verifying match", Severity::Warn);
        }
    }

    /// Poll loop: library rebuild cadence plus one
    /// [`poll_tick`](Self::poll_tick) per period. Spawn exactly once;
    /// abort the task to stop.
    pub async fn run(self: Arc<Self>) {
        let mut cache = LibraryCache::new(self.cfg.rebuild_interval());

        self.set_status("Building face library", Severity::Idle);
        cache.rebuild(self.supplier.as_ref(), self.embedder.as_ref());
        if cache.snapshot().is_empty() {
            self.set_status("No faces in database", Severity::Warn);
        } else {
            self.set_status("Recognition ready, waiting for sensor", Severity::Idle);
        }

        let mut interval = tokio::time::interval(self.cfg.poll_period());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if !self.is_paused() {
                cache.maybe_rebuild(self.supplier.as_ref(), self.embedder.as_ref());
            }
            let snapshot = cache.snapshot();
            self.poll_tick(&snapshot);
        }
    }

    fn reset_streak(&self) {
        let mut gate = lock_recover(&self.gate);
        gate.streak = 0;
        gate.candidate = None;
    }

    fn set_status(&self, message: impl Into<String>, severity: Severity) {
        let update = StatusUpdate::new(message, severity);
        self.status.send_if_modified(|current| {
            if *current == update {
                false
            } else {
                *current = update;
                true
            }
        });
    }

    fn set_unknown_visual(&self, bbox: BoundingBox) {
        self.set_visual(Some(VisualHint {
            bbox,
            label: "Unknown".to_string(),
            confirmed: false,
        }));
    }

    fn set_visual(&self, hint: Option<VisualHint>) {
        self.visual.send_if_modified(|current| {
            if *current == hint {
                false
            } else {
                *current = hint;
                true
            }
        });
    }
}

/// Pick the detection to attempt: highest confidence, then largest
/// area, then closest to the frame center.
fn choose_best_box(detections: &[Detection], width: u32, height: u32) -> Option<Detection> {
    let (cx, cy) = (f64::from(width) / 2.0, f64::from(height) / 2.0);
    let center_dist = |d: &Detection| {
        let (bx, by) = d.bbox.center();
        ((bx - cx).powi(2) + (by - cy).powi(2)).sqrt()
    };
    detections
        .iter()
        .min_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then(b.bbox.area().cmp(&a.bbox.area()))
                .then(center_dist(a).total_cmp(&center_dist(b)))
        })
        .copied()
}
