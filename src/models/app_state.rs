use camino::Utf8PathBuf;
use std::time::{Duration, Instant};

/// Single source of truth for all application state.
///
/// Holds the user's selections, the runtime flags that gate the controls,
/// and the progress bookkeeping for the active job.
///
/// # Thread Safety
///
/// `AppState` is wrapped in `Arc<RwLock<AppState>>` by
/// [`crate::state::StateManager`]. Only the UI thread mutates it - the
/// worker task never touches state directly, it posts
/// [`WorkerEvent`](crate::models::WorkerEvent)s that the event pump turns
/// into state updates. At most one job is active at a time; the controller
/// enforces this by disabling the job-starting controls while
/// `is_processing` or `is_installing` is set.
///
/// # Related Types
///
/// - [`crate::state::StateManager`]: Thread-safe wrapper
/// - [`crate::models::Job`]: Immutable snapshot handed to the worker
/// - [`crate::ui::pump::EventPump`]: The only mutator during a job
#[derive(Clone, Debug)]
pub struct AppState {
    // User selections
    pub selected_files: Vec<Utf8PathBuf>,
    pub output_dir: Option<Utf8PathBuf>,
    pub suffix: String,
    pub selected_model: String,

    // Runtime state
    pub is_processing: bool,
    pub is_installing: bool,
    pub is_model_ready: bool,

    // Progress state for the active job
    pub processed_count: usize,
    pub total_files: usize,
    pub start_time: Option<Instant>,

    // Results
    pub success_count: usize,
    pub error_count: usize,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            selected_files: Vec::new(),
            output_dir: None,
            suffix: "_no_bg".to_string(),
            selected_model: "u2net".to_string(),

            is_processing: false,
            is_installing: false,
            is_model_ready: false,

            processed_count: 0,
            total_files: 0,
            start_time: None,

            success_count: 0,
            error_count: 0,
        }
    }
}

impl AppState {
    /// Check whether a job could start right now.
    ///
    /// The controller still walks the full precondition chain (with
    /// prompts and dialogs) before spawning a worker; this is the quick
    /// gate for control enabling.
    pub fn can_start(&self) -> bool {
        !self.selected_files.is_empty()
            && self.is_model_ready
            && !self.is_processing
            && !self.is_installing
    }

    /// Progress percentage, floored, 0 when no job is sized yet.
    pub fn percent_complete(&self) -> u32 {
        if self.total_files == 0 {
            return 0;
        }
        (100 * self.processed_count / self.total_files) as u32
    }

    /// Wall-clock time since the job started.
    pub fn elapsed(&self, now: Instant) -> Option<Duration> {
        self.start_time.map(|start| now.duration_since(start))
    }

    /// Estimated remaining time: elapsed / processed * remaining.
    ///
    /// None until at least one file has been attempted, since there is no
    /// rate to extrapolate from.
    pub fn estimated_remaining(&self, now: Instant) -> Option<Duration> {
        let elapsed = self.elapsed(now)?;
        if self.processed_count == 0 || self.total_files <= self.processed_count {
            return None;
        }
        let per_file = elapsed.as_secs_f64() / self.processed_count as f64;
        let remaining = self.total_files - self.processed_count;
        Some(Duration::from_secs_f64(per_file * remaining as f64))
    }

    /// Reset progress bookkeeping for a new job of `total` files.
    pub fn begin_job(&mut self, total: usize, now: Instant) {
        self.is_processing = true;
        self.processed_count = 0;
        self.total_files = total;
        self.success_count = 0;
        self.error_count = 0;
        self.start_time = Some(now);
    }

    /// Clear the active-job flag; progress values stay visible until the
    /// next job resets them, like the original tool.
    pub fn finish_job(&mut self) {
        self.is_processing = false;
        self.start_time = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state() {
        let state = AppState::default();
        assert_eq!(state.suffix, "_no_bg");
        assert_eq!(state.selected_model, "u2net");
        assert!(!state.is_processing);
        assert!(!state.can_start());
    }

    #[test]
    fn test_can_start_requires_files_and_model() {
        let mut state = AppState::default();
        state.selected_files.push(Utf8PathBuf::from("a.png"));
        assert!(!state.can_start());

        state.is_model_ready = true;
        assert!(state.can_start());

        state.is_processing = true;
        assert!(!state.can_start());

        state.is_processing = false;
        state.is_installing = true;
        assert!(!state.can_start());
    }

    #[test]
    fn test_percent_complete() {
        let mut state = AppState::default();
        assert_eq!(state.percent_complete(), 0);

        state.total_files = 3;
        state.processed_count = 1;
        assert_eq!(state.percent_complete(), 33);

        state.processed_count = 3;
        assert_eq!(state.percent_complete(), 100);
    }

    #[test]
    fn test_begin_job_resets_progress() {
        let mut state = AppState::default();
        state.processed_count = 7;
        state.success_count = 6;
        state.error_count = 1;

        state.begin_job(10, Instant::now());

        assert!(state.is_processing);
        assert_eq!(state.processed_count, 0);
        assert_eq!(state.total_files, 10);
        assert_eq!(state.success_count, 0);
        assert_eq!(state.error_count, 0);
        assert!(state.start_time.is_some());
    }

    #[test]
    fn test_estimated_remaining_needs_progress() {
        let mut state = AppState::default();
        let start = Instant::now();
        state.begin_job(4, start);

        let later = start + Duration::from_secs(10);
        assert_eq!(state.estimated_remaining(later), None);

        state.processed_count = 2;
        let remaining = state.estimated_remaining(later).unwrap();
        // 10s for 2 files -> 5s per file -> 10s for the remaining 2
        assert_eq!(remaining.as_secs(), 10);

        state.processed_count = 4;
        assert_eq!(state.estimated_remaining(later), None);
    }

    #[test]
    fn test_finish_job_clears_flags() {
        let mut state = AppState::default();
        state.begin_job(2, Instant::now());
        state.processed_count = 2;

        state.finish_job();

        assert!(!state.is_processing);
        assert!(state.start_time.is_none());
        // Progress stays visible until the next job
        assert_eq!(state.processed_count, 2);
    }
}
