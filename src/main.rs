// Unattended photo booth: Canon SELPHY printing via CUPS, gphoto2 camera.

use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{error, info, warn};

use selphy_booth::camera;
use selphy_booth::input::{ChannelInput, Signal};
use selphy_booth::render::FontRenderer;
use selphy_booth::spooler;
use selphy_booth::terminal::RawModeGuard;
use selphy_booth::{AppError, BoothController, Config};

/// Turns Ctrl-C and SIGTERM into a quit request so the booth still runs its
/// cleanup path.
async fn forward_shutdown_signal(quit: UnboundedSender<Signal>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
    let _ = quit.send(Signal::Quit);
}

fn to_io_error(context: &str, e: AppError) -> std::io::Error {
    error!(error_type = e.error_type(), "{}: {}", context, e);
    std::io::Error::new(std::io::ErrorKind::Other, format!("{}: {}", context, e))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> std::io::Result<()> {
    // Initialize tracing/logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Starting photo booth");

    let config = Config::from_env()
        .map_err(|e| to_io_error("Failed to load configuration", e.into()))?;
    info!(
        printer = %config.printer.name,
        capture_dir = %config.storage.capture_dir.display(),
        print_dir = %config.storage.print_dir.display(),
        "Configuration loaded"
    );

    let input = ChannelInput::new();
    // Dropped after the booth stops, which restores the terminal
    let _raw_mode = match RawModeGuard::enter() {
        Ok(guard) => {
            input.spawn_key_reader();
            Some(guard)
        }
        Err(e) => {
            warn!("No interactive terminal, keyboard disabled: {}", e);
            None
        }
    };
    tokio::spawn(forward_shutdown_signal(input.sender()));

    let device = camera::new_device(&config.camera, config.storage.capture_dir.clone());
    let spooler = spooler::new_spooler(&config.printer.name, config.printer.use_mock);
    let renderer = Arc::new(FontRenderer::new(&config.storage.font_path()));
    info!("Using {} spooler", spooler.type_name());

    let mut booth = BoothController::new(&config, device, Box::new(input), spooler, renderer);
    booth
        .run()
        .await
        .map_err(|e| to_io_error("Booth stopped on error", e))?;

    info!("Photo booth closed");
    Ok(())
}
