//! psmoveinput daemon entry point
//!
//! Loads the configuration (first argument, or `/etc/psmoveinput.toml`),
//! creates the virtual input device and runs the controller fleet until
//! SIGINT/SIGTERM.

use anyhow::{anyhow, Context};
use log::{error, info};
use psmove_input::backend::create_event_device;
use psmove_input::mapping::config::DEFAULT_CONFIG_PATH;
use psmove_input::{
    Config, ControllerFleet, ControllerSlot, FleetHandle, HidControllerApi, InputSink, InputTranslator,
};
use std::sync::Arc;
use std::thread;
use tokio::sync::oneshot;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path))?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.settings.log_level.as_str()),
    )
    .init();
    info!("✓ Loaded configuration from {}", config_path);

    let first = config.key_map(ControllerSlot::First)?;
    let second = config.key_map(ControllerSlot::Second)?;
    let device = create_event_device(&config.settings.device_name, &config.output_keys()?)
        .context("Failed to create virtual input device")?;

    let (disconnect_tx, disconnect_rx) = crossbeam_channel::unbounded();
    let translator = InputTranslator::new(device, first, second, config.translator_settings())
        .with_disconnect_sender(disconnect_tx);
    let sink: Arc<dyn InputSink> = Arc::new(translator);

    let handle = FleetHandle::new();
    let fleet_handle = handle.clone();
    let fleet_settings = config.fleet_settings();
    let (done_tx, mut done_rx) = oneshot::channel::<Result<(), String>>();

    // hidapi is created on the fleet thread and never leaves it
    let fleet_thread = thread::Builder::new()
        .name("fleet".to_string())
        .spawn(move || {
            let result = HidControllerApi::new().map(|api| {
                let mut fleet = ControllerFleet::new(api, sink, disconnect_rx, fleet_settings, fleet_handle);
                fleet.run();
            });
            let _ = done_tx.send(result.map_err(|e| e.to_string()));
        })?;

    info!("✓ psmoveinput running, waiting for controllers");

    tokio::select! {
        signal = shutdown_signal() => {
            signal.context("Failed to listen for shutdown signals")?;
            info!("Shutdown signal received");
        }
        result = &mut done_rx => {
            // The fleet only returns on its own when it could not start
            let result = result.map_err(|_| anyhow!("fleet thread exited unexpectedly"))?;
            if let Err(e) = result {
                error!("Controller fleet failed: {}", e);
                return Err(anyhow!(e));
            }
        }
    }

    handle.stop();
    tokio::task::spawn_blocking(move || fleet_thread.join())
        .await?
        .map_err(|_| anyhow!("fleet thread panicked"))?;

    info!("psmoveinput stopped");
    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
