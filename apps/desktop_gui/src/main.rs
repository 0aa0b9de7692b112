use std::{
    path::PathBuf,
    time::{Duration, Instant},
};

mod backend_bridge;
mod controller;
mod ui;

use anyhow::anyhow;
use clap::Parser;
use client_core::{
    load_settings, ClientSettings, Dispatcher, SessionController, SessionError, SessionState,
    SurfaceState,
};
use eframe::egui;
use tokio::runtime::Runtime;
use tracing_subscriber::EnvFilter;

use crate::{
    backend_bridge::{client, runtime::build_runtime},
    ui::ControlSurfaceApp,
};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);
const SHUTDOWN_PUMP_INTERVAL: Duration = Duration::from_millis(20);
const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Parser, Debug)]
#[command(about = "Desktop control surface for a chat bot")]
struct Args {
    /// TOML settings file; missing files fall back to defaults.
    #[arg(long, default_value = "bot_client.toml")]
    config: PathBuf,
    /// Use the in-process loopback client instead of the gateway.
    #[arg(long)]
    demo: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();

    let settings = load_settings(Some(&args.config))?;
    let runtime = build_runtime()?;
    let factory = client::client_factory(&settings, args.demo)?;

    // The main thread runs the event loop, so it is the affinity thread.
    let dispatcher = Dispatcher::new(SurfaceState::new(settings.window_title.clone()));
    let controller = SessionController::new(
        dispatcher,
        runtime.handle().clone(),
        &settings,
        factory,
        client::log_sink(&settings),
    );

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(settings.window_title.as_str())
            .with_inner_size([1100.0, 720.0])
            .with_min_inner_size([760.0, 480.0]),
        ..Default::default()
    };
    let app_controller = controller.clone();
    let result = eframe::run_native(
        &settings.window_title,
        options,
        Box::new(move |cc| Ok(Box::new(ControlSurfaceApp::new(cc, app_controller)))),
    );

    shutdown(&controller, &settings, runtime);
    result.map_err(|err| anyhow!("desktop window failed: {err}"))
}

/// Stops a running session, keeps pumping so the worker can finish its
/// teardown, then releases the dispatcher and the runtime.
fn shutdown(controller: &SessionController, settings: &ClientSettings, runtime: Runtime) {
    match controller.stop() {
        Ok(()) => tracing::info!("stopping session before exit"),
        Err(SessionError::NotActive(_)) => {}
        Err(err) => tracing::warn!("failed to stop session on exit: {err}"),
    }

    let deadline = Instant::now() + settings.disconnect_timeout() + SHUTDOWN_GRACE;
    let dispatcher = controller.dispatcher();
    loop {
        let idle = matches!(controller.state(), Ok(SessionState::Idle))
            && !controller.has_worker().unwrap_or(false);
        if idle || Instant::now() >= deadline {
            if !idle {
                tracing::warn!("session did not finish before exit");
            }
            break;
        }
        if let Err(err) = dispatcher.pump_timeout(SHUTDOWN_PUMP_INTERVAL) {
            tracing::warn!("dispatcher pump failed during shutdown: {err}");
            break;
        }
    }

    if let Err(err) = dispatcher.shutdown() {
        tracing::warn!("dispatcher shutdown failed: {err}");
    }
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);
}
