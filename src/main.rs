//! BGTank - Batch Background Removal Tool
//!
//! Main entry point for the GUI application.
//!
//! # Overview
//!
//! This binary crate provides the Slint GUI frontend for BGTank. It initializes:
//! - Logging infrastructure (file rotation + console output)
//! - Tokio async runtime (worker threads for model inference and downloads)
//! - State management ([`StateManager`])
//! - Configuration loading ([`ConfigManager`])
//! - GUI controller ([`GuiController`] - bridges the Slint window with business logic)
//!
//! The application uses a hybrid threading model:
//! - **Main thread**: Runs the Slint event loop, the event pump timer, and
//!   all UI mutations
//! - **Tokio blocking pool**: Runs the per-job worker task and the model
//!   install task, which report back through a single event queue
//!
//! # Execution Flow
//!
//! 1. Load configuration from BGTank Data/
//!    - BGTank Main.yaml → model catalog (built-in defaults if missing)
//!    - BGTank Config.yaml → user settings (suffix, output folder, model)
//! 2. Initialize logging → logs/bgtank.<date>
//! 3. Create tokio runtime
//! 4. Create StateManager and seed it from the user config
//! 5. Create GuiController (wires the window to state and the runtime)
//! 6. Run the Slint event loop (blocks until window closed)
//! 7. Shutdown the tokio runtime with a timeout
//!
//! # Platform
//!
//! Cross-platform via Slint and tokio; the "open output folder" action
//! shells out to explorer/open/xdg-open per platform.

use anyhow::Result;
use bgtank::ui::GuiController;
use bgtank::{APP_NAME, ConfigManager, StateManager, VERSION};
use camino::Utf8PathBuf;
use std::sync::Arc;

/// Main entry point for the BGTank GUI application
///
/// # Errors
///
/// This function can fail if:
/// - A configuration file exists but is invalid YAML
/// - Logging initialization fails (disk space, permissions)
/// - Tokio runtime creation fails (system resources)
/// - Slint UI initialization fails (graphics drivers, display)
fn main() -> Result<()> {
    // Load configuration first so the debug flag can steer log verbosity
    let config_manager = ConfigManager::new("BGTank Data")?;
    let main_config = config_manager.load_main_config()?;
    let user_config = config_manager.load_user_config()?;

    // Setup logging with both file and console output. The guard must
    // stay alive for the file writer to keep flushing.
    let _log_guard =
        bgtank::logging::setup_logging("logs", "bgtank", user_config.settings.debug_mode, true)?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);
    tracing::info!(
        "Loaded configuration - {} models in catalog",
        main_config.bgtank_data.models.len()
    );

    // Create tokio runtime for background work (model inference runs on
    // the blocking pool; two workers are plenty for one job at a time)
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(2)
        .thread_name("bgtank-worker")
        .build()?;

    tracing::info!("Tokio runtime initialized");

    // Create state manager and seed it from the user configuration
    let state_manager = Arc::new(StateManager::new());
    state_manager.load_from_user_config(&user_config);

    let models_dir = Utf8PathBuf::from(&user_config.settings.models_folder);

    // Create GUI controller
    // This wires up the Slint window with state management and the runtime
    let gui_controller = GuiController::new(
        state_manager.clone(),
        Arc::new(main_config),
        models_dir,
        runtime.handle().clone(),
    )?;

    tracing::info!("GUI controller initialized, launching window");

    // Run the GUI (blocks until the window is closed). Background tasks
    // keep running on the tokio runtime in the meantime.
    let result = gui_controller.run();

    tracing::info!("GUI closed, shutting down");

    if state_manager.read(|s| s.is_processing) {
        // No cancellation mechanism: a job in flight simply loses its
        // consumer. Give the worker a moment to finish the current file
        // before tearing the runtime down.
        tracing::warn!("Window closed while a job was running");
    }

    // Shutdown the tokio runtime gracefully
    runtime.shutdown_timeout(std::time::Duration::from_secs(5));

    tracing::info!("Application shutdown complete");

    result.map_err(|e| {
        tracing::error!("GUI error: {}", e);
        anyhow::anyhow!("GUI error: {}", e)
    })
}
