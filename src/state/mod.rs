// State management module
//
// This module provides the StateManager which wraps AppState with thread-safe
// access using Arc<RwLock<T>>.

use crate::models::{AppState, UserConfig};
use camino::Utf8PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Instant;

/// Thread-safe wrapper around [`AppState`].
///
/// All state access goes through this type:
/// - [`read()`](Self::read) for reads through a closure
/// - [`update()`](Self::update) for mutations
/// - [`snapshot()`](Self::snapshot) when a detached copy is needed
///
/// There is deliberately no change-notification channel here: every UI
/// update during a job flows through the event pump, which is the single
/// consumer of worker events and the single writer of UI properties.
///
/// # Related Types
///
/// - [`crate::models::AppState`]: The underlying state structure
/// - [`crate::ui::pump::EventPump`]: Applies worker events to this state
/// - [`crate::ui::controller::GuiController`]: Orchestrates jobs against it
pub struct StateManager {
    state: Arc<RwLock<AppState>>,
}

impl StateManager {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(AppState::default())),
        }
    }

    /// Get a detached copy of the current state
    pub fn snapshot(&self) -> AppState {
        self.state.read().unwrap().clone()
    }

    /// Execute a function with read access to the state
    ///
    /// # Example
    /// ```ignore
    /// let busy = state_manager.read(|state| state.is_processing);
    /// ```
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&AppState) -> R,
    {
        let state = self.state.read().unwrap();
        f(&state)
    }

    /// Execute a function with write access to the state
    pub fn update<F, R>(&self, update_fn: F) -> R
    where
        F: FnOnce(&mut AppState) -> R,
    {
        let mut state = self.state.write().unwrap();
        update_fn(&mut state)
    }

    // Convenience methods for common state updates

    /// Replace the selected input files
    pub fn set_selected_files(&self, files: Vec<Utf8PathBuf>) {
        self.update(|state| state.selected_files = files);
    }

    /// Set or clear the output directory
    pub fn set_output_dir(&self, dir: Option<Utf8PathBuf>) {
        self.update(|state| state.output_dir = dir);
    }

    /// Set the output filename suffix
    pub fn set_suffix(&self, suffix: String) {
        self.update(|state| state.suffix = suffix);
    }

    /// Switch the selected model and drop readiness until it reloads
    pub fn set_selected_model(&self, model: String) {
        self.update(|state| {
            state.selected_model = model;
            state.is_model_ready = false;
        });
    }

    /// Mark a job of `total` files as started, resetting progress
    pub fn start_job(&self, total: usize) {
        self.update(|state| state.begin_job(total, Instant::now()));
    }

    /// Mark the active job as over (completed or fatally failed)
    pub fn finish_job(&self) {
        self.update(|state| state.finish_job());
    }

    /// Mark the model install/load task as running
    pub fn begin_install(&self) {
        self.update(|state| state.is_installing = true);
    }

    /// Mark the install task as finished, recording readiness
    pub fn finish_install(&self, ready: bool) {
        self.update(|state| {
            state.is_installing = false;
            state.is_model_ready = ready;
        });
    }

    /// Record a Progress(n) event; n is the 1-based loop index
    pub fn record_progress(&self, n: usize) {
        self.update(|state| state.processed_count = n);
    }

    /// Tally a Success event
    pub fn record_success(&self) {
        self.update(|state| state.success_count += 1);
    }

    /// Tally an Error event
    pub fn record_error(&self) {
        self.update(|state| state.error_count += 1);
    }

    /// Populate state from the user configuration file.
    ///
    /// Only non-empty fields override the built-in defaults.
    pub fn load_from_user_config(&self, user_config: &UserConfig) {
        self.update(|state| {
            let settings = &user_config.settings;

            if !settings.output_folder.is_empty() {
                state.output_dir = Some(Utf8PathBuf::from(&settings.output_folder));
            }
            if !settings.file_suffix.is_empty() {
                state.suffix = settings.file_suffix.clone();
            }
            if !settings.default_model.is_empty() {
                state.selected_model = settings.default_model.clone();
            }

            tracing::info!(
                "Loaded user config: output_dir={:?}, suffix={}, model={}",
                state.output_dir,
                state.suffix,
                state.selected_model
            );
        });
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

// Make StateManager cloneable for sharing across closures and threads
impl Clone for StateManager {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BgTankSettings;

    #[test]
    fn test_new_state_manager() {
        let manager = StateManager::new();
        let state = manager.snapshot();

        assert!(!state.is_processing);
        assert!(!state.is_model_ready);
        assert_eq!(state.processed_count, 0);
    }

    #[test]
    fn test_start_job_resets_progress() {
        let manager = StateManager::new();
        manager.record_progress(5);
        manager.record_success();

        manager.start_job(3);

        let state = manager.snapshot();
        assert!(state.is_processing);
        assert_eq!(state.total_files, 3);
        assert_eq!(state.processed_count, 0);
        assert_eq!(state.success_count, 0);
    }

    #[test]
    fn test_progress_and_tallies() {
        let manager = StateManager::new();
        manager.start_job(2);

        manager.record_progress(1);
        manager.record_success();
        manager.record_error();

        let state = manager.snapshot();
        assert_eq!(state.processed_count, 1);
        assert_eq!(state.success_count, 1);
        assert_eq!(state.error_count, 1);
    }

    #[test]
    fn test_model_switch_drops_readiness() {
        let manager = StateManager::new();
        manager.finish_install(true);
        assert!(manager.read(|s| s.is_model_ready));

        manager.set_selected_model("u2netp".to_string());

        let state = manager.snapshot();
        assert_eq!(state.selected_model, "u2netp");
        assert!(!state.is_model_ready);
    }

    #[test]
    fn test_load_from_user_config() {
        let manager = StateManager::new();
        let config = UserConfig {
            settings: BgTankSettings {
                output_folder: "/tmp/out".to_string(),
                file_suffix: "_cut".to_string(),
                default_model: "silueta".to_string(),
                ..BgTankSettings::default()
            },
        };

        manager.load_from_user_config(&config);

        let state = manager.snapshot();
        assert_eq!(state.output_dir, Some(Utf8PathBuf::from("/tmp/out")));
        assert_eq!(state.suffix, "_cut");
        assert_eq!(state.selected_model, "silueta");
    }

    #[test]
    fn test_empty_config_keeps_defaults() {
        let manager = StateManager::new();
        let mut config = UserConfig::default();
        config.settings.output_folder = String::new();

        manager.load_from_user_config(&config);

        let state = manager.snapshot();
        assert_eq!(state.output_dir, None);
        assert_eq!(state.suffix, "_no_bg");
    }

    #[test]
    fn test_clone_shares_state() {
        let manager1 = StateManager::new();
        let manager2 = manager1.clone();

        manager1.record_progress(10);

        assert_eq!(manager2.read(|s| s.processed_count), 10);
    }
}
