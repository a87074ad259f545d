use camino::Utf8PathBuf;

/// One batch background-removal request.
///
/// Built by the controller after all preconditions pass and handed to the
/// worker task by value. Immutable from that point on: edits the user
/// makes in the window while a job runs only affect the next job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Job {
    /// Input files, processed in order
    pub inputs: Vec<Utf8PathBuf>,

    /// Directory all outputs are written into; exists before the worker starts
    pub output_dir: Utf8PathBuf,

    /// Appended to each input's stem; outputs are always `<stem><suffix>.png`
    pub suffix: String,

    /// Name of the model the session was built from, for logging
    pub model: String,
}

impl Job {
    pub fn total(&self) -> usize {
        self.inputs.len()
    }
}

/// Per-file outcomes collected by the worker loop.
///
/// Events are the user-facing view of a job; the report is the
/// programmatic one, used for logging and by the integration tests.
#[derive(Clone, Debug, Default)]
pub struct JobReport {
    /// Output paths written, in completion order
    pub succeeded: Vec<Utf8PathBuf>,

    /// (input base name, error text) for every failed file
    pub failed: Vec<(String, String)>,
}

impl JobReport {
    pub fn attempted(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}
