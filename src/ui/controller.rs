// GUI Controller - Bridges the Slint window with state and services
//
// This module contains the GuiController which coordinates between:
// - Slint UI (MainWindow)
// - StateManager (application state)
// - removal/model services (business logic)
// - EventPump (worker event consumption)
//
// It handles:
// - Setting up UI callbacks
// - Precondition checks before a job starts
// - File browser dialogs
// - Spawning the worker and install tasks

use crate::models::{Job, MainConfig, WorkerEvent};
use crate::services::{IMAGE_EXTENSIONS, SessionSlot, model, removal};
use crate::state::StateManager;
use crate::ui::pump::{EventPump, PumpContext};
use crate::ui::status::StatusSink;
use crate::ui::MainWindow;
use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use slint::{ComponentHandle, ModelRc, SharedString, VecModel};
use std::fs;
use std::process::Command;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

/// Default output filename suffix, restored when the user clears the field.
const DEFAULT_SUFFIX: &str = "_no_bg";

/// GUI Controller that wires up the Slint window with state and services
///
/// This is the orchestrator: the only component that starts a job. It
/// owns the event channel's sender side (cloned into each spawned task)
/// and the [`EventPump`] that consumes the receiver side on the UI
/// thread.
///
/// # Example
/// ```ignore
/// let state_manager = Arc::new(StateManager::new());
/// let main_config = Arc::new(config_manager.load_main_config()?);
/// let runtime = tokio::runtime::Runtime::new()?;
///
/// let controller = GuiController::new(
///     state_manager,
///     main_config,
///     Utf8PathBuf::from("models"),
///     runtime.handle().clone(),
/// )?;
/// controller.run()?; // Blocks until the window is closed
/// ```
pub struct GuiController {
    /// The Slint UI window
    ui: MainWindow,
}

impl GuiController {
    /// Create a new GUI controller
    ///
    /// # Arguments
    /// * `state_manager` - Shared application state manager
    /// * `main_config` - Model catalog
    /// * `models_dir` - Directory model weights are cached in
    /// * `tokio_handle` - Handle for spawning blocking background tasks
    pub fn new(
        state_manager: Arc<StateManager>,
        main_config: Arc<MainConfig>,
        models_dir: Utf8PathBuf,
        tokio_handle: tokio::runtime::Handle,
    ) -> Result<Self> {
        let ui = MainWindow::new().context("Failed to create Slint UI")?;

        let sink = StatusSink::new(&ui);
        let slot = SessionSlot::new();
        let (events_tx, events_rx) = tokio::sync::mpsc::unbounded_channel();
        let pump = Rc::new(EventPump::new(events_rx));

        let ctx = PumpContext {
            ui: ui.as_weak(),
            state: Arc::clone(&state_manager),
            sink: sink.clone(),
            slot: slot.clone(),
            main_config: Arc::clone(&main_config),
            models_dir: models_dir.clone(),
        };

        Self::sync_ui_with_state(&ui, &state_manager, &main_config);
        Self::setup_callbacks(
            &ui,
            &state_manager,
            &main_config,
            &models_dir,
            &slot,
            &tokio_handle,
            &events_tx,
            &pump,
            &ctx,
            &sink,
        );

        // Lazy startup model check: load a cached model, or surface the
        // download affordance without fetching anything unprompted.
        Self::check_model(
            &ui,
            &state_manager,
            &main_config,
            &models_dir,
            &slot,
            &tokio_handle,
            &events_tx,
            &pump,
            &ctx,
            &sink,
        );

        tracing::info!("GUI controller initialized");

        Ok(Self { ui })
    }

    /// Run the GUI (blocks until the window is closed)
    pub fn run(self) -> Result<(), slint::PlatformError> {
        tracing::info!("Starting GUI event loop");
        self.ui.run()
    }

    /// Initialize window properties from the current state
    fn sync_ui_with_state(ui: &MainWindow, state_manager: &StateManager, main_config: &MainConfig) {
        let state = state_manager.snapshot();

        ui.set_output_dir_text(
            state
                .output_dir
                .as_ref()
                .map(|p| p.as_str().to_string())
                .unwrap_or_default()
                .into(),
        );
        ui.set_suffix_text(state.suffix.clone().into());

        let names: Vec<SharedString> = main_config
            .model_names()
            .into_iter()
            .map(SharedString::from)
            .collect();
        ui.set_model_names(ModelRc::from(Rc::new(VecModel::from(names))));
        ui.set_selected_model(state.selected_model.clone().into());

        ui.set_is_processing(state.is_processing);
        ui.set_files_selected(state.selected_files.len() as i32);
        ui.set_progress_current(state.processed_count as i32);
        ui.set_progress_total(state.total_files as i32);
        ui.set_model_ready(state.is_model_ready);

        tracing::debug!("UI synchronized with initial state");
    }

    /// Set up Slint UI callbacks
    #[allow(clippy::too_many_arguments)]
    fn setup_callbacks(
        ui: &MainWindow,
        state_manager: &Arc<StateManager>,
        main_config: &Arc<MainConfig>,
        models_dir: &Utf8PathBuf,
        slot: &SessionSlot,
        tokio_handle: &tokio::runtime::Handle,
        events_tx: &UnboundedSender<WorkerEvent>,
        pump: &Rc<EventPump>,
        ctx: &PumpContext,
        sink: &Rc<StatusSink>,
    ) {
        let state = state_manager.clone();
        let sink_clone = sink.clone();
        let ui_weak = ui.as_weak();

        // Select images
        ui.on_select_images(move || {
            tracing::debug!("Select images clicked");

            let Some(paths) = Self::show_image_picker() else {
                sink_clone.info("No images selected.");
                return;
            };

            let count = paths.len();
            sink_clone.success(format!("{count} images selected"));

            // Show file names, but don't flood the log for big batches
            if count <= 10 {
                for path in &paths {
                    sink_clone.info(format!(
                        "- {}",
                        path.file_name().unwrap_or(path.as_str())
                    ));
                }
            } else {
                let first: Vec<&str> = paths
                    .iter()
                    .take(3)
                    .map(|p| p.file_name().unwrap_or(p.as_str()))
                    .collect();
                sink_clone.info(format!("First few files: {}...", first.join(", ")));
            }

            state.set_selected_files(paths);

            if let Some(ui) = ui_weak.upgrade() {
                ui.set_files_selected(count as i32);
                ui.set_counter_text(format!("{count} images selected").into());
            }
        });

        let state = state_manager.clone();
        let sink_clone = sink.clone();
        let ui_weak = ui.as_weak();

        // Browse output directory
        ui.on_browse_output(move || {
            tracing::debug!("Browse output clicked");

            if let Some(dir) = Self::show_folder_picker("Select output folder") {
                sink_clone.info(format!("Output directory set to: {dir}"));
                if let Some(ui) = ui_weak.upgrade() {
                    ui.set_output_dir_text(dir.as_str().into());
                }
                state.set_output_dir(Some(dir));
            }
        });

        let state = state_manager.clone();
        let sink_clone = sink.clone();
        let ui_weak = ui.as_weak();

        // Save settings: validate the suffix and output directory fields
        ui.on_save_settings(move || {
            let Some(ui) = ui_weak.upgrade() else { return };

            let suffix_text = ui.get_suffix_text().to_string();
            match validate_suffix(&suffix_text) {
                SuffixValidation::Valid(suffix) => {
                    sink_clone.success(format!("File suffix set to: '{suffix}'"));
                    state.set_suffix(suffix);
                }
                SuffixValidation::Defaulted => {
                    sink_clone.info(format!("File suffix reset to default: '{DEFAULT_SUFFIX}'"));
                    ui.set_suffix_text(DEFAULT_SUFFIX.into());
                    state.set_suffix(DEFAULT_SUFFIX.to_string());
                }
                SuffixValidation::Invalid => {
                    sink_clone.error(format!("Invalid suffix: '{suffix_text}'"));
                    let previous = state.read(|s| s.suffix.clone());
                    ui.set_suffix_text(previous.into());
                    return;
                }
            }

            let dir_text = ui.get_output_dir_text().to_string();
            let previous = state.read(|s| s.output_dir.clone());
            if !dir_text.is_empty() && previous.as_ref().map(|p| p.as_str()) != Some(&dir_text) {
                let dir = Utf8PathBuf::from(&dir_text);
                if dir.exists() || fs::create_dir_all(&dir).is_ok() {
                    sink_clone.success(format!("Output directory set to: {dir}"));
                    state.set_output_dir(Some(dir));
                } else {
                    sink_clone.error(format!("Invalid output directory: {dir_text}"));
                    // Reset to previous
                    ui.set_output_dir_text(
                        previous.map(|p| p.to_string()).unwrap_or_default().into(),
                    );
                }
            }
        });

        let state = state_manager.clone();
        let slot_clone = slot.clone();
        let ui_weak = ui.as_weak();
        let pump_clone = pump.clone();
        let ctx_clone = ctx.clone();
        let sink_clone = sink.clone();
        let tx = events_tx.clone();
        let handle = tokio_handle.clone();

        // Start processing - the orchestrator
        ui.on_start_processing(move || {
            let Some(ui) = ui_weak.upgrade() else { return };
            Self::start_processing(
                &ui,
                &state,
                &slot_clone,
                &handle,
                &tx,
                &pump_clone,
                &ctx_clone,
                &sink_clone,
            );
        });

        let state = state_manager.clone();
        let sink_clone = sink.clone();
        let ui_weak = ui.as_weak();

        // Open output folder
        ui.on_open_output_folder(move || {
            let dir_text = ui_weak
                .upgrade()
                .map(|ui| ui.get_output_dir_text().to_string())
                .unwrap_or_default();

            let dir = if dir_text.is_empty() {
                state.read(|s| s.output_dir.clone())
            } else {
                Some(Utf8PathBuf::from(dir_text))
            };

            let Some(dir) = dir else {
                sink_clone.error("No output directory set");
                return;
            };

            if !dir.exists() {
                if let Err(e) = fs::create_dir_all(&dir) {
                    sink_clone.error(format!("Failed to create directory: {e}"));
                    return;
                }
            }

            match Self::open_folder(&dir) {
                Ok(()) => sink_clone.info(format!("Opened output folder: {dir}")),
                Err(e) => sink_clone.error(format!("Failed to open output folder: {e}")),
            }
        });

        let state = state_manager.clone();
        let main_config_clone = main_config.clone();
        let models_dir_clone = models_dir.clone();
        let slot_clone = slot.clone();
        let handle = tokio_handle.clone();
        let tx = events_tx.clone();
        let pump_clone = pump.clone();
        let ctx_clone = ctx.clone();
        let sink_clone = sink.clone();
        let ui_weak = ui.as_weak();

        // Download/install the selected model
        ui.on_install_model(move || {
            let Some(ui) = ui_weak.upgrade() else { return };
            Self::spawn_model_setup(
                &ui,
                &state,
                &main_config_clone,
                &models_dir_clone,
                &slot_clone,
                &handle,
                &tx,
                &pump_clone,
                &ctx_clone,
                &sink_clone,
            );
        });

        let state = state_manager.clone();
        let main_config_clone = main_config.clone();
        let models_dir_clone = models_dir.clone();
        let slot_clone = slot.clone();
        let handle = tokio_handle.clone();
        let tx = events_tx.clone();
        let pump_clone = pump.clone();
        let ctx_clone = ctx.clone();
        let sink_clone = sink.clone();
        let ui_weak = ui.as_weak();

        // Model switched: invalidate the session and re-check
        ui.on_model_changed(move |name| {
            let name = name.to_string();
            tracing::info!("Model switched to '{}'", name);

            state.set_selected_model(name.clone());
            slot_clone.clear();
            sink_clone.info(format!("Model changed to '{name}'."));

            let Some(ui) = ui_weak.upgrade() else { return };
            ui.set_model_ready(false);

            Self::check_model(
                &ui,
                &state,
                &main_config_clone,
                &models_dir_clone,
                &slot_clone,
                &handle,
                &tx,
                &pump_clone,
                &ctx_clone,
                &sink_clone,
            );
        });

        let ui_weak = ui.as_weak();

        // Error dialog dismissed
        ui.on_error_dialog_dismissed(move || {
            if let Some(ui) = ui_weak.upgrade() {
                ui.set_show_error_dialog(false);
            }
        });

        let state = state_manager.clone();
        let sink_clone = sink.clone();
        let ui_weak = ui.as_weak();

        // Completion prompt: open the output folder
        ui.on_completion_confirmed(move || {
            let Some(ui) = ui_weak.upgrade() else { return };
            ui.set_show_completion_dialog(false);

            if let Some(dir) = state.read(|s| s.output_dir.clone()) {
                match Self::open_folder(&dir) {
                    Ok(()) => sink_clone.info(format!("Opened output folder: {dir}")),
                    Err(e) => sink_clone.error(format!("Failed to open output folder: {e}")),
                }
            }
        });

        let ui_weak = ui.as_weak();

        // Completion prompt dismissed
        ui.on_completion_dismissed(move || {
            if let Some(ui) = ui_weak.upgrade() {
                ui.set_show_completion_dialog(false);
            }
        });

        tracing::debug!("UI callbacks configured");
    }

    // ===== Job Orchestration =====

    /// Validate preconditions and start the worker task.
    ///
    /// Checks, in order: inputs selected, output directory set (prompting
    /// once if not), directory exists or can be created, model session
    /// loaded. Any failure aborts before a worker is spawned.
    #[allow(clippy::too_many_arguments)]
    fn start_processing(
        ui: &MainWindow,
        state: &Arc<StateManager>,
        slot: &SessionSlot,
        tokio_handle: &tokio::runtime::Handle,
        events_tx: &UnboundedSender<WorkerEvent>,
        pump: &Rc<EventPump>,
        ctx: &PumpContext,
        sink: &Rc<StatusSink>,
    ) {
        tracing::info!("Process images requested");

        let snapshot = state.snapshot();

        // 1. Inputs selected
        if snapshot.selected_files.is_empty() {
            show_error_dialog(ui, "Warning", "Please select images first!", "");
            return;
        }

        // 2. Output directory set; prompt once if not
        let dir_text = ui.get_output_dir_text().to_string();
        let output_dir = if !dir_text.is_empty() {
            Utf8PathBuf::from(dir_text)
        } else {
            match Self::show_folder_picker("Select output folder") {
                Some(dir) => {
                    ui.set_output_dir_text(dir.as_str().into());
                    dir
                }
                None => {
                    sink.info("No output directory selected. Process canceled.");
                    return;
                }
            }
        };
        state.set_output_dir(Some(output_dir.clone()));

        // 3. Directory exists or can be created
        if !output_dir.exists() {
            match fs::create_dir_all(&output_dir) {
                Ok(()) => sink.info(format!("Created output directory: {output_dir}")),
                Err(e) => {
                    show_error_dialog(
                        ui,
                        "Error",
                        "Could not create output directory:",
                        e.to_string(),
                    );
                    return;
                }
            }
        }

        // 4. Model session loaded
        let Some(remover) = slot.get() else {
            sink.error("Model is not loaded. Please download or re-install it.");
            ui.set_install_needed(true);
            ui.set_model_ready(false);
            return;
        };

        let job = Job {
            inputs: snapshot.selected_files.clone(),
            output_dir: output_dir.clone(),
            suffix: snapshot.suffix.clone(),
            model: snapshot.selected_model.clone(),
        };
        let total = job.total();

        // Reset progress state and disable controls for the duration
        state.start_job(total);
        ui.set_is_processing(true);
        ui.set_progress_current(0);
        ui.set_progress_total(total as i32);
        ui.set_progress_percent("0%".into());
        ui.set_counter_text(format!("Processing: 0/{total}").into());
        ui.set_time_text("".into());

        sink.success(format!("Starting background removal for {total} images..."));
        sink.info(format!("Output directory: {output_dir}"));

        let tx = events_tx.clone();
        tokio_handle.spawn_blocking(move || removal::run_job(job, remover, tx));

        pump.start(ctx.clone());
    }

    // ===== Model Setup =====

    /// Startup/model-switch check: load a cached model in the background,
    /// or surface the download affordance without touching the network.
    #[allow(clippy::too_many_arguments)]
    fn check_model(
        ui: &MainWindow,
        state: &Arc<StateManager>,
        main_config: &Arc<MainConfig>,
        models_dir: &Utf8PathBuf,
        slot: &SessionSlot,
        tokio_handle: &tokio::runtime::Handle,
        events_tx: &UnboundedSender<WorkerEvent>,
        pump: &Rc<EventPump>,
        ctx: &PumpContext,
        sink: &Rc<StatusSink>,
    ) {
        let name = state.read(|s| s.selected_model.clone());

        let Some(entry) = main_config.model(&name) else {
            sink.error(format!("Unknown model '{name}' - check BGTank Main.yaml."));
            ui.set_model_ready(false);
            ui.set_install_needed(false);
            return;
        };

        if model::is_cached(models_dir, entry) {
            Self::spawn_model_setup(
                ui,
                state,
                main_config,
                models_dir,
                slot,
                tokio_handle,
                events_tx,
                pump,
                ctx,
                sink,
            );
        } else {
            sink.error(format!("Model '{name}' not found. Download required."));
            ui.set_model_ready(false);
            ui.set_install_needed(true);
        }
    }

    /// Spawn the install task for the currently selected model.
    #[allow(clippy::too_many_arguments)]
    fn spawn_model_setup(
        ui: &MainWindow,
        state: &Arc<StateManager>,
        main_config: &Arc<MainConfig>,
        models_dir: &Utf8PathBuf,
        slot: &SessionSlot,
        tokio_handle: &tokio::runtime::Handle,
        events_tx: &UnboundedSender<WorkerEvent>,
        pump: &Rc<EventPump>,
        ctx: &PumpContext,
        sink: &Rc<StatusSink>,
    ) {
        let name = state.read(|s| s.selected_model.clone());

        let Some(entry) = main_config.model(&name) else {
            sink.error(format!("Unknown model '{name}' - check BGTank Main.yaml."));
            return;
        };

        state.begin_install();
        ui.set_is_installing(true);
        sink.info(format!("Preparing model '{name}'..."));

        let entry = entry.clone();
        let models_dir = models_dir.clone();
        let slot = slot.clone();
        let tx = events_tx.clone();
        tokio_handle
            .spawn_blocking(move || model::run_install(name, entry, models_dir, slot, tx));

        pump.start(ctx.clone());
    }

    // ===== Native dialogs and shell =====

    /// Show a native multi-file picker limited to supported image types.
    ///
    /// # Returns
    /// The selected files, or None if cancelled or none were valid UTF-8
    fn show_image_picker() -> Option<Vec<Utf8PathBuf>> {
        use rfd::FileDialog;

        let paths = FileDialog::new()
            .set_title("Select Images")
            .add_filter("Image files", IMAGE_EXTENSIONS)
            .pick_files()?;

        let paths: Vec<Utf8PathBuf> = paths
            .into_iter()
            .filter_map(|path| {
                Utf8PathBuf::try_from(path)
                    .map_err(|e| {
                        tracing::error!("Failed to convert path to UTF-8: {}", e);
                        e
                    })
                    .ok()
            })
            .collect();

        if paths.is_empty() { None } else { Some(paths) }
    }

    /// Show a native folder picker.
    fn show_folder_picker(title: &str) -> Option<Utf8PathBuf> {
        use rfd::FileDialog;

        FileDialog::new()
            .set_title(title)
            .pick_folder()
            .and_then(|path| {
                Utf8PathBuf::try_from(path)
                    .map_err(|e| {
                        tracing::error!("Failed to convert path to UTF-8: {}", e);
                        e
                    })
                    .ok()
            })
    }

    /// Open a directory in the platform file manager.
    fn open_folder(dir: &Utf8PathBuf) -> Result<()> {
        let mut cmd = if cfg!(target_os = "windows") {
            let mut c = Command::new("explorer");
            c.arg(dir.as_str());
            c
        } else if cfg!(target_os = "macos") {
            let mut c = Command::new("open");
            c.arg(dir.as_str());
            c
        } else {
            let mut c = Command::new("xdg-open");
            c.arg(dir.as_str());
            c
        };

        cmd.spawn()
            .with_context(|| format!("Failed to open {dir}"))?;
        Ok(())
    }
}

/// Show the in-window error dialog.
///
/// Used both by the controller's precondition checks and by the event
/// pump's fatal-error handling.
pub fn show_error_dialog(
    ui: &MainWindow,
    title: impl Into<SharedString>,
    message: impl Into<SharedString>,
    details: impl Into<SharedString>,
) {
    ui.set_error_title(title.into());
    ui.set_error_message(message.into());
    ui.set_error_details(details.into());
    ui.set_show_error_dialog(true);
}

enum SuffixValidation {
    Valid(String),
    Defaulted,
    Invalid,
}

/// Check a user-entered suffix: empty falls back to the default, and
/// anything that could escape the output directory or break a file name
/// is rejected.
fn validate_suffix(suffix: &str) -> SuffixValidation {
    if suffix.is_empty() {
        return SuffixValidation::Defaulted;
    }

    // Conservative: letters, digits, space, dot, dash, underscore
    static PATTERN: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        regex::Regex::new(r"^[A-Za-z0-9 ._\-]+$").expect("Invalid suffix regex")
    });

    if pattern.is_match(suffix) {
        SuffixValidation::Valid(suffix.to_string())
    } else {
        SuffixValidation::Invalid
    }
}

/// Format an estimated remaining duration the way the counter row shows
/// it: seconds under a minute, minutes+seconds under an hour, else
/// hours+minutes.
pub fn format_remaining(remaining: Duration) -> String {
    let secs = remaining.as_secs();
    if secs < 60 {
        format!("~{secs}s remaining")
    } else if secs < 3600 {
        format!("~{}m {}s remaining", secs / 60, secs % 60)
    } else {
        format!("~{}h {}m remaining", secs / 3600, (secs % 3600) / 60)
    }
}

/// Format the total wall-clock time for the completion line.
pub fn format_total_time(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let (minutes, seconds) = (secs / 60, secs % 60);
    if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}
