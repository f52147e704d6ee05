//! Single-slot frame mailbox and the camera publisher task.
//!
//! The camera produces frames faster than recognition consumes them, so
//! the hand-off is a latest-frame-wins slot: publishing never blocks the
//! producer, and the poll loop reads whatever is newest at tick time,
//! shedding load naturally.

use crate::image::Frame;
use crate::traits::{FrameGrabber, FrameSource};
use smartatt_core::{Severity, StatusUpdate};
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

/// Writing side of the frame slot.
pub struct FrameMailbox {
    tx: watch::Sender<Option<Frame>>,
}

/// Reading side; implements [`FrameSource`] for the arbiter.
#[derive(Clone)]
pub struct FrameMailboxReader {
    rx: watch::Receiver<Option<Frame>>,
}

impl FrameMailbox {
    #[must_use]
    pub fn new() -> (Self, FrameMailboxReader) {
        let (tx, rx) = watch::channel(None);
        (Self { tx }, FrameMailboxReader { rx })
    }

    /// Overwrite the slot. Never blocks.
    pub fn publish(&self, frame: Option<Frame>) {
        let _ = self.tx.send(frame);
    }
}

impl FrameSource for FrameMailboxReader {
    fn latest_frame(&self) -> Option<Frame> {
        self.rx.borrow().clone()
    }
}

/// Pull frames from an opaque camera at a fixed rate and publish them
/// into the mailbox. Reports streaming/no-frame transitions on the
/// status channel, deduplicated. Runs until the grabber is exhausted
/// (mocks) or the task is aborted.
pub async fn run_camera_publisher<G: FrameGrabber>(
    mut grabber: G,
    mailbox: FrameMailbox,
    period: Duration,
    status: watch::Sender<StatusUpdate>,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut streaming: Option<bool> = None;

    loop {
        interval.tick().await;
        match grabber.grab() {
            Some(frame) => {
                mailbox.publish(Some(frame));
                if streaming != Some(true) {
                    streaming = Some(true);
                    let _ = status.send(StatusUpdate::new("Camera: streaming", Severity::Idle));
                    debug!("camera streaming");
                }
            }
            None => {
                if streaming != Some(false) {
                    streaming = Some(false);
                    let _ = status.send(StatusUpdate::new("Camera: no frame", Severity::Warn));
                    debug!("camera produced no frame");
                }
            }
        }
    }
}
