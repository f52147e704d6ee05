//! Headless attendance kiosk daemon.
//!
//! Wires the full coordination core: serial reader thread feeding the
//! handshake machine, camera publisher and recognition poll task,
//! session coordinator, attendance database, and a status drain that
//! logs the coalesced status lines a UI would render.
//!
//! Usage: `smartatt [config.json] [roster.json]`
//!
//! `RUST_LOG` controls verbosity (e.g. `RUST_LOG=smartatt=debug`).

mod pipeline;

use anyhow::{Context, Result};
use pipeline::{FileRoster, UnconfiguredCamera, UnconfiguredScorer};
use smartatt_core::Config;
use smartatt_core::constants::OVERLAY_CAPACITY;
use smartatt_core::{Severity, StatusUpdate};
use smartatt_hardware::{DeviceHandshake, SerialLink, spawn_reader};
use smartatt_recognition::{FrameMailbox, RecognitionArbiter, run_camera_publisher};
use smartatt_session::{
    ArbiterControl, FixedShiftWindow, OutsideShiftOverlay, ResultSubmitter, SessionCoordinator,
};
use smartatt_storage::{Database, SqliteAttendanceRepository};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// How often the device is probed with `RUOK` while connected.
const PROBE_INTERVAL: Duration = Duration::from_secs(5);

/// Camera pull rate for the publisher task.
const CAMERA_PERIOD: Duration = Duration::from_millis(33);

fn load_config(path: Option<PathBuf>) -> Result<Config> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
        }
        None => Ok(Config::default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let config = load_config(args.next().map(PathBuf::from))?;
    let roster = match args.next() {
        Some(path) => FileRoster::load(&PathBuf::from(path))?,
        None => FileRoster::empty(),
    };

    info!(version = smartatt_core::VERSION, "smartatt starting");

    // Storage.
    let db = Database::connect(&config.database.url).await?;
    let sink = Arc::new(SqliteAttendanceRepository::new(db.pool().clone()));

    // Hardware: shared link, handshake machine, reader thread, resend loop.
    let link = Arc::new(SerialLink::new(config.serial.clone()));
    let (handshake, handshake_events) =
        DeviceHandshake::new(Arc::clone(&link), config.handshake.clone());
    let shutdown = Arc::new(AtomicBool::new(false));
    let reader = spawn_reader(
        Arc::clone(&link),
        Arc::clone(&handshake),
        config.serial.reconnect_delay(),
        Arc::clone(&shutdown),
    )
    .context("spawning serial reader")?;
    tokio::spawn(Arc::clone(&handshake).run_resend_loop());

    // Camera: single-slot mailbox fed by the publisher task.
    let (mailbox, frames) = FrameMailbox::new();
    let (camera_status_tx, camera_status) =
        watch::channel(StatusUpdate::new("Camera: starting", Severity::Idle));
    tokio::spawn(run_camera_publisher(
        UnconfiguredCamera,
        mailbox,
        CAMERA_PERIOD,
        camera_status_tx,
    ));

    // Recognition.
    let (arbiter, outputs) = RecognitionArbiter::new(
        Arc::new(frames),
        Arc::new(UnconfiguredScorer),
        Arc::new(UnconfiguredScorer),
        Arc::new(roster),
        config.recognition.clone(),
    );
    tokio::spawn(Arc::clone(&arbiter).run());

    // Session coordination.
    let shift = FixedShiftWindow::from_config(&config.shift)?;
    let overlay = Arc::new(OutsideShiftOverlay::new(
        config.shift.overlay_ttl(),
        OVERLAY_CAPACITY,
    ));
    let (coordinator, session_status) = SessionCoordinator::new(
        Arc::clone(&handshake) as Arc<dyn ResultSubmitter>,
        Arc::clone(&arbiter) as Arc<dyn ArbiterControl>,
        sink,
        Arc::new(shift),
        overlay,
        config.session.clone(),
    );
    tokio::spawn(coordinator.run(handshake_events, outputs.hits));

    // Device liveness probe while the port is open.
    {
        let link = Arc::clone(&link);
        let handshake = Arc::clone(&handshake);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(PROBE_INTERVAL);
            loop {
                interval.tick().await;
                if link.is_open() {
                    handshake.probe();
                }
            }
        });
    }

    // Status drains: log what a UI would render.
    spawn_status_drain("session", session_status);
    spawn_status_drain("recognition", outputs.status);
    spawn_status_drain("camera", camera_status);

    info!("kiosk running, press ctrl-c to stop");
    tokio::signal::ctrl_c().await?;

    info!("shutting down");
    shutdown.store(true, Ordering::Relaxed);
    link.close();
    let _ = reader.join();
    Ok(())
}

fn spawn_status_drain(name: &'static str, mut rx: watch::Receiver<StatusUpdate>) {
    tokio::spawn(async move {
        loop {
            let update = rx.borrow_and_update().clone();
            info!(source = name, severity = %update.severity, "{}", update.message);
            if rx.changed().await.is_err() {
                break;
            }
        }
    });
}
