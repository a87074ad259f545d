use crate::models::{Job, JobReport, WorkerEvent};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

/// File extensions accepted by the image picker.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "webp"];

/// Errors that can occur while processing a single file.
///
/// Every variant is a per-file failure: the worker reports it as an
/// `Error` event and moves on to the next input.
#[derive(Error, Debug)]
pub enum RemovalError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("image decode failed: {0}")]
    Decode(String),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("image encode failed: {0}")]
    Encode(String),
}

/// The seam between the worker loop and the model runtime.
///
/// Bytes of any supported image format in, PNG bytes with a transparent
/// background out. [`crate::services::engine::OnnxEngine`] is the real
/// implementation; tests drive the worker with a fake.
pub trait BackgroundRemover: Send + Sync {
    fn remove(&self, input: &[u8]) -> Result<Vec<u8>, RemovalError>;
}

/// Derive the output file name for an input path: `<stem><suffix>.png`.
///
/// The output is always PNG regardless of the input format, since the
/// removed background needs an alpha channel.
pub fn output_file_name(input: &Utf8Path, suffix: &str) -> String {
    let stem = input.file_stem().unwrap_or("output");
    format!("{stem}{suffix}.png")
}

/// Run one batch job to completion on the current thread.
///
/// This is the worker task: the controller spawns it on the blocking
/// pool, and it communicates exclusively through `events` - it never
/// touches UI state. Per-file failures are reported and skipped; the
/// sequence always ends with exactly one `Completed` event unless the
/// loop itself dies (a panic out of the model runtime), which produces a
/// single `FatalError` instead and nothing after it.
pub fn run_job(job: Job, remover: std::sync::Arc<dyn BackgroundRemover>, events: UnboundedSender<WorkerEvent>) {
    tracing::info!(
        "Worker started: {} files, model={}, output={}",
        job.total(),
        job.model,
        job.output_dir
    );

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        process_files(&job, remover.as_ref(), &events)
    }));

    match result {
        Ok(report) => {
            tracing::info!(
                "Worker finished: {} succeeded, {} failed",
                report.succeeded.len(),
                report.failed.len()
            );
            // Ignore send errors - the UI may already be gone
            let _ = events.send(WorkerEvent::Completed);
        }
        Err(payload) => {
            let message = panic_message(payload);
            tracing::error!("Worker loop died: {}", message);
            let _ = events.send(WorkerEvent::FatalError(message));
        }
    }
}

/// The per-file loop, separated from [`run_job`] so tests can call it
/// directly and inspect the report.
pub fn process_files(
    job: &Job,
    remover: &dyn BackgroundRemover,
    events: &UnboundedSender<WorkerEvent>,
) -> JobReport {
    let mut report = JobReport::default();

    for (index, input) in job.inputs.iter().enumerate() {
        let name = base_name(input);
        let _ = events.send(WorkerEvent::Status(format!("Processing: {name}")));

        match process_one(input, job, remover) {
            Ok(output_path) => {
                let _ = events.send(WorkerEvent::Success(format!(
                    "Completed: {name} -> {}",
                    base_name(&output_path)
                )));
                // 1-based loop index: counts attempts, not successes
                let _ = events.send(WorkerEvent::Progress(index + 1));
                let _ = events.send(WorkerEvent::TimeUpdate);
                report.succeeded.push(output_path);
            }
            Err(e) => {
                tracing::warn!("Failed to process {}: {}", input, e);
                let _ = events.send(WorkerEvent::Error(format!("Error ({name}): {e}")));
                report.failed.push((name.to_string(), e.to_string()));
            }
        }
    }

    report
}

/// Process a single input file: read, remove background, write the PNG.
fn process_one(
    input: &Utf8Path,
    job: &Job,
    remover: &dyn BackgroundRemover,
) -> Result<Utf8PathBuf, RemovalError> {
    let input_data = fs::read(input).map_err(|source| RemovalError::Read {
        path: input.to_path_buf(),
        source,
    })?;

    let output_data = remover.remove(&input_data)?;

    let output_path = job.output_dir.join(output_file_name(input, &job.suffix));
    fs::write(&output_path, output_data).map_err(|source| RemovalError::Write {
        path: output_path.clone(),
        source,
    })?;

    Ok(output_path)
}

fn base_name(path: &Utf8Path) -> &str {
    path.file_name().unwrap_or(path.as_str())
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic in worker loop".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_output_file_name_basic() {
        assert_eq!(
            output_file_name(Utf8Path::new("/in/photo.jpg"), "_no_bg"),
            "photo_no_bg.png"
        );
    }

    #[test]
    fn test_output_file_name_already_png() {
        assert_eq!(
            output_file_name(Utf8Path::new("cat.png"), "_no_bg"),
            "cat_no_bg.png"
        );
    }

    #[test]
    fn test_output_file_name_empty_suffix() {
        assert_eq!(output_file_name(Utf8Path::new("a/b/c.webp"), ""), "c.png");
    }

    #[test]
    fn test_output_file_name_dotted_stem() {
        // file_stem only strips the final extension
        assert_eq!(
            output_file_name(Utf8Path::new("archive.tar.png"), "_x"),
            "archive.tar_x.png"
        );
    }

    proptest! {
        #[test]
        fn prop_output_name_shape(
            stem in "[a-zA-Z0-9 _-]{1,20}",
            ext in prop::sample::select(IMAGE_EXTENSIONS.to_vec()),
            suffix in "[a-zA-Z0-9_-]{0,10}",
        ) {
            let input = Utf8PathBuf::from(format!("{stem}.{ext}"));
            let name = output_file_name(&input, &suffix);
            prop_assert!(name.ends_with(".png"));
            prop_assert!(name.starts_with(stem.as_str()));
            prop_assert_eq!(name, format!("{stem}{suffix}.png"));
        }
    }
}
