//! Tokio task driving a [`ScannerSession`].
//!
//! The task is the single owner of the session. Ticks come from an interval
//! timer, UI input arrives as [`ScannerCommand`]s, render state leaves
//! through a `watch` channel and events through an unbounded `mpsc`.
//! Shutdown goes through a `watch<bool>` and is awaited.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::{VisionError, VisionResult};
use crate::gesture::TouchEvent;

use super::{ScannerEvent, ScannerSession, ScannerView};

/// Input from the UI side.
#[derive(Debug, Clone, PartialEq)]
pub enum ScannerCommand {
    Touch(TouchEvent),
    /// An external zoom control was used
    NotifyManualZoom,
    SetZoom(f64),
    SubmitDecoded(String),
    SetPanelOpen(bool),
    ToggleTorch,
    SwitchCamera,
}

/// Handle to a running scanner loop.
pub struct ScannerHandle {
    commands: mpsc::Sender<ScannerCommand>,
    view: watch::Receiver<ScannerView>,
    events: Option<mpsc::UnboundedReceiver<ScannerEvent>>,
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

pub(super) fn spawn(session: ScannerSession) -> ScannerHandle {
    let buffer = session.config().cadence.command_buffer.max(1);
    let (command_tx, command_rx) = mpsc::channel(buffer);
    let (view_tx, view_rx) = watch::channel(session.view(0));
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let task = tokio::spawn(run(session, command_rx, view_tx, event_tx, shutdown_rx));

    ScannerHandle {
        commands: command_tx,
        view: view_rx,
        events: Some(event_rx),
        shutdown: shutdown_tx,
        task: Some(task),
    }
}

impl ScannerHandle {
    /// Subscribe to render state.
    pub fn view(&self) -> watch::Receiver<ScannerView> {
        self.view.clone()
    }

    pub fn current_view(&self) -> ScannerView {
        self.view.borrow().clone()
    }

    /// The event stream. Can be taken once.
    pub fn events(&mut self) -> Option<mpsc::UnboundedReceiver<ScannerEvent>> {
        self.events.take()
    }

    pub async fn send(&self, command: ScannerCommand) -> VisionResult<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| VisionError::SessionClosed)
    }

    pub async fn touch(&self, event: TouchEvent) -> VisionResult<()> {
        self.send(ScannerCommand::Touch(event)).await
    }

    pub async fn notify_manual_zoom(&self) -> VisionResult<()> {
        self.send(ScannerCommand::NotifyManualZoom).await
    }

    pub async fn set_zoom(&self, level: f64) -> VisionResult<()> {
        self.send(ScannerCommand::SetZoom(level)).await
    }

    pub async fn submit_decoded(&self, code: impl Into<String>) -> VisionResult<()> {
        self.send(ScannerCommand::SubmitDecoded(code.into())).await
    }

    pub async fn set_panel_open(&self, open: bool) -> VisionResult<()> {
        self.send(ScannerCommand::SetPanelOpen(open)).await
    }

    pub async fn toggle_torch(&self) -> VisionResult<()> {
        self.send(ScannerCommand::ToggleTorch).await
    }

    pub async fn switch_camera(&self) -> VisionResult<()> {
        self.send(ScannerCommand::SwitchCamera).await
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop the loop and wait for it to exit. Safe to call repeatedly.
    pub async fn shutdown(&mut self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Scanner task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for ScannerHandle {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

async fn run(
    mut session: ScannerSession,
    mut commands: mpsc::Receiver<ScannerCommand>,
    view: watch::Sender<ScannerView>,
    events: mpsc::UnboundedSender<ScannerEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    let start = Instant::now();
    let now_ms = move || start.elapsed().as_millis() as u64;

    let interval_ms = session.config().cadence.frame_interval_ms.max(1);
    let mut ticker = time::interval(Duration::from_millis(interval_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let device_notify = session.device_notifier();
    let tracking = session.is_tracking_enabled();

    info!(
        tracking,
        backend = ?session.backend_kind(),
        interval_ms,
        "Scanner loop started"
    );

    loop {
        let focus_deadline = session
            .focus_deadline(now_ms())
            .map(|ms| start + Duration::from_millis(ms));

        tokio::select! {
            biased;

            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            command = commands.recv() => {
                let Some(command) = command else {
                    debug!("All scanner handles dropped");
                    break;
                };
                apply(&mut session, command, now_ms());
            }
            _ = device_notify.notified() => {
                session.poll_device_results();
            }
            _ = ticker.tick(), if tracking => {
                session.tick(now_ms());
            }
            _ = time::sleep_until(focus_deadline.unwrap_or(start)), if focus_deadline.is_some() => {}
        }

        for event in session.take_events() {
            let _ = events.send(event);
        }
        let snapshot = session.view(now_ms());
        view.send_if_modified(|current| {
            if *current == snapshot {
                return false;
            }
            *current = snapshot;
            true
        });
    }

    session.close();
    info!("Scanner loop stopped");
}

fn apply(session: &mut ScannerSession, command: ScannerCommand, now_ms: u64) {
    match command {
        ScannerCommand::Touch(event) => {
            session.handle_touch(&event, now_ms);
        }
        ScannerCommand::NotifyManualZoom => session.notify_manual_zoom(now_ms),
        ScannerCommand::SetZoom(level) => session.set_manual_zoom(level, now_ms),
        ScannerCommand::SubmitDecoded(code) => {
            session.submit_decoded(&code, now_ms);
        }
        ScannerCommand::SetPanelOpen(open) => session.set_panel_open(open),
        ScannerCommand::ToggleTorch => {
            if !session.toggle_torch() {
                debug!("Torch toggle ignored");
            }
        }
        ScannerCommand::SwitchCamera => {
            if !session.switch_camera() {
                debug!("Camera switch ignored");
            }
        }
    }
}
