//! holdsense-daemon: routes phone audio to this machine while the phone is
//! held in front of the camera
//!
//! Threads:
//! - detection cycle: frames, debounce, priority resolution
//! - actuator: dedicated single-threaded context for the audio route
//! - hotkey listener (macOS): Control+Option+C / Control+Option+W
//! - command reader: line commands on stdin from the parent process
//! - status publisher: `STATUS:` lines on stdout
//!
//! Logs go to stderr; stdout carries only the status protocol.

mod actuator;
mod arbitration;
mod config;
mod control;
mod debounce;
mod events;
mod hotkey;
mod lifecycle;
mod resources;
mod runtime;
mod state;

use std::io::BufReader;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::actuator::{ActionSink, ActuatorBridge, CommandActuator, DisabledSink};
use crate::arbitration::Resolver;
use crate::config::{Config, SettingsStore};
use crate::control::{spawn_reader, Controller, StatusEmitter, StatusPublisher};
use crate::hotkey::{HotkeyError, HotkeyHandler, HotkeyListener};
use crate::lifecycle::{RunFlag, ShutdownSignal};
use crate::resources::{ProcessCaptureOpener, ResourceManager, ResourceRequests, ThresholdLoader};
use crate::runtime::{DetectionCycle, SharedContext};
use crate::state::{ModeController, StatusBoard};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "holdsense-daemon starting"
    );

    let config = Config::load()?;
    info!(settings = ?config.settings_path, "configuration loaded");

    let store = SettingsStore::new(&config.settings_path);
    let settings = store.load();

    let shutdown = ShutdownSignal::new();
    let running = RunFlag::new();

    let mode = Arc::new(ModeController::new(
        settings.detection_enabled,
        settings.keybind_enabled,
    ));
    let status = Arc::new(StatusBoard::new());

    let bridge = match (&config.actuator_command, settings.device_address()) {
        (Some(program), Some(address)) => {
            let program = program.clone();
            match ActuatorBridge::spawn(
                move |notices| CommandActuator::new(program, notices),
                Some(address.to_string()),
                Arc::clone(&status),
                config.tuning.actuator_timeout,
            ) {
                Ok(bridge) => Some(Arc::new(bridge)),
                Err(e) => {
                    error!(?e, "failed to start actuator context");
                    None
                }
            }
        }
        (None, _) => {
            info!("no route helper configured, audio control disabled");
            None
        }
        (_, None) => {
            info!("device address not configured, audio control disabled");
            None
        }
    };
    let sink: Arc<dyn ActionSink> = match &bridge {
        Some(bridge) => Arc::clone(bridge) as Arc<dyn ActionSink>,
        None => Arc::new(DisabledSink),
    };

    let resolver = Arc::new(Resolver::new(
        Arc::clone(&mode),
        Arc::clone(&status),
        sink,
        bridge.is_some(),
    ));

    let ctx = Arc::new(SharedContext {
        mode: Arc::clone(&mode),
        status: Arc::clone(&status),
        resolver,
        requests: Arc::new(ResourceRequests::new(settings.capture_index)),
        running: running.clone(),
    });

    let emitter = Arc::new(StatusEmitter::stdout());
    if let Err(e) = emitter.publish(ctx.snapshot()) {
        warn!(?e, "failed to write initial status");
    }

    let controller = Arc::new(Controller::new(
        Arc::clone(&ctx),
        store,
        Arc::clone(&emitter),
    ));

    let hotkeys = HotkeyListener::new(Arc::clone(&controller) as Arc<dyn HotkeyHandler>);
    match hotkeys.start() {
        Ok(()) => info!("hotkey listener started"),
        Err(HotkeyError::Unsupported) => info!("global hotkeys unavailable on this platform"),
        Err(e) => {
            error!(?e, "failed to start hotkey listener");
            warn!("continuing without hotkey support - check Accessibility permissions");
        }
    }

    if config.capture_command.is_none() {
        warn!("no capture helper configured, detection cannot acquire a camera");
    }
    let resources = ResourceManager::new(
        Box::new(ProcessCaptureOpener::new(config.capture_command.clone())),
        Box::new(ThresholdLoader::new(config.tuning.confidence)),
        settings.capture_index,
    );
    let cycle = DetectionCycle::new(Arc::clone(&ctx), resources, config.tuning)
        .spawn()
        .context("failed to spawn detection cycle")?;

    let publisher = StatusPublisher::spawn(
        Arc::clone(&emitter),
        Arc::clone(&mode),
        Arc::clone(&status),
        config.tuning.status_interval,
        running.clone(),
    )
    .context("failed to spawn status publisher")?;

    // Left detached: it may sit in a blocking read until stdin closes
    spawn_reader(
        BufReader::new(std::io::stdin()),
        Arc::clone(&controller),
        running.clone(),
    )
    .context("failed to spawn command reader")?;

    info!("daemon initialized");

    let signal = async {
        match shutdown.wait().await {
            Ok(()) => info!("shutdown signal received"),
            Err(e) => {
                error!(?e, "failed to install signal handlers");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = signal => {}
        _ = running.stopped() => {}
    }

    info!("shutting down...");
    running.stop();
    hotkeys.stop();

    let joined = tokio::task::spawn_blocking(move || {
        if cycle.join().is_err() {
            error!("detection cycle panicked");
        }
        publisher.join();
        if let Some(bridge) = bridge {
            bridge.shutdown();
            info!(
                state = %bridge.connection_state(),
                last_failure = ?bridge.last_failure(),
                "actuator released"
            );
        }
    })
    .await;
    if let Err(e) = joined {
        error!(?e, "shutdown task failed");
    }

    if let Err(e) = emitter.publish(ctx.snapshot()) {
        warn!(?e, "failed to write final status");
    }

    info!("holdsense-daemon stopped");

    Ok(())
}
