//! Scanner demo binary.
//!
//! Runs the capture loop against a synthetic scene for a fixed time,
//! logging zoom changes and decodes. Halfway through a double tap is
//! injected to show the manual reset and cooldown.

mod scene;

use std::time::Duration;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use scanzoom_models::{PlatformCaps, PlatformFamily, ZoomCapabilities};
use scanzoom_vision::{ScannerConfig, ScannerEvent, ScannerSession, TouchEvent, TouchPhase, TouchPoint};

use scene::{Scene, SceneCamera, SceneSource};

/// Code the simulated decoder reports once the barcode is large enough
const DEMO_CODE: &str = "4006381333931";

/// Tracked width at which the simulated decoder succeeds
const DECODE_WIDTH_PCT: f64 = 40.0;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("scanzoom=info".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(true).with_target(true))
            .with(env_filter)
            .init();
    }

    let config = load_config()?;
    let run_for = Duration::from_secs(
        std::env::var("SCANZOOM_DEMO_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10),
    );
    let family: PlatformFamily = std::env::var("SCANZOOM_PLATFORM")
        .ok()
        .map(|s| s.parse::<PlatformFamily>())
        .transpose()?
        .unwrap_or_default();
    let platform = PlatformCaps::new(family, false, true);

    info!(?platform, seconds = run_for.as_secs(), "Starting scanzoom demo");

    let scene = Scene::new(1.0);
    let camera = SceneCamera::new(
        scene.clone(),
        ZoomCapabilities::new(1.0, 8.0, 0.1),
        Duration::from_millis(40),
    );
    let session = ScannerSession::new(
        config,
        platform,
        Box::new(SceneSource::new(scene.clone())),
        std::sync::Arc::new(camera),
        None,
    )
    .context("failed to build scanner session")?;

    let mut handle = session.spawn();

    let mut events = handle.events().context("event stream already taken")?;
    let events_task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                ScannerEvent::CodeDecoded { code } => info!(code = %code, "Decoded"),
                other => info!(?other, "Scanner event"),
            }
        }
    });

    let mut view = handle.view();
    let deadline = tokio::time::sleep(run_for);
    tokio::pin!(deadline);
    let double_tap_at = tokio::time::sleep(run_for / 2);
    tokio::pin!(double_tap_at);
    let mut tapped = false;
    let mut last_zoom = None;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
            _ = &mut deadline => break,
            _ = &mut double_tap_at, if !tapped => {
                tapped = true;
                info!("Injecting double tap");
                for (phase, t) in [(TouchPhase::Start, 0), (TouchPhase::End, 60), (TouchPhase::Start, 180)] {
                    let event = TouchEvent::new(phase, vec![TouchPoint::new(160.0, 120.0)], t);
                    if let Err(e) = handle.touch(event).await {
                        warn!("Touch rejected: {}", e);
                    }
                }
            }
            changed = view.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = view.borrow_and_update().clone();

                if snapshot.current_zoom != last_zoom {
                    info!(
                        zoom = ?snapshot.current_zoom,
                        auto = snapshot.is_auto_zooming,
                        scene_zoom = scene.zoom(),
                        "Zoom changed"
                    );
                    last_zoom = snapshot.current_zoom;
                }

                let readable = snapshot
                    .tracking_box
                    .is_some_and(|roi| roi.width_pct >= DECODE_WIDTH_PCT);
                if readable && handle.submit_decoded(DEMO_CODE).await.is_err() {
                    break;
                }
            }
        }
    }

    let last = handle.current_view();
    handle.shutdown().await;
    events_task.await.ok();
    info!(
        zoom = ?last.current_zoom,
        tracking = last.tracking_box.is_some(),
        "Demo finished"
    );
    Ok(())
}

/// Config from a JSON file named by `SCANZOOM_CONFIG`, else from the
/// environment.
fn load_config() -> anyhow::Result<ScannerConfig> {
    match std::env::var("SCANZOOM_CONFIG") {
        Ok(path) => {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config file {}", path))?;
            Ok(ScannerConfig::from_json(&json)?)
        }
        Err(_) => Ok(ScannerConfig::from_env()),
    }
}
