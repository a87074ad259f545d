//! Integration tests for the worker task
//!
//! These tests drive the full per-file loop with a fake remover and
//! verify the event stream and filesystem effects:
//! - Event counts: Success + Error == inputs, exactly one Completed
//! - Progress semantics (1-based loop index, attempts not successes)
//! - Output naming: `<stem><suffix>.png`
//! - No abort on per-file failure; FatalError on a runtime panic

use bgtank::models::{Job, WorkerEvent};
use bgtank::services::removal::{self, BackgroundRemover, RemovalError};
use camino::Utf8PathBuf;
use std::collections::HashSet;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

/// Remover that succeeds with fixed output bytes, except for inputs
/// whose contents appear in `fail_on`.
struct FakeRemover {
    fail_on: HashSet<Vec<u8>>,
}

impl FakeRemover {
    fn new() -> Self {
        Self {
            fail_on: HashSet::new(),
        }
    }

    fn failing_on(contents: &[&str]) -> Self {
        Self {
            fail_on: contents.iter().map(|c| c.as_bytes().to_vec()).collect(),
        }
    }
}

impl BackgroundRemover for FakeRemover {
    fn remove(&self, input: &[u8]) -> Result<Vec<u8>, RemovalError> {
        if self.fail_on.contains(input) {
            Err(RemovalError::Decode("not a supported image".to_string()))
        } else {
            Ok(b"PNG-OUT".to_vec())
        }
    }
}

/// Remover that panics, standing in for a crashing model runtime.
struct PanickingRemover;

impl BackgroundRemover for PanickingRemover {
    fn remove(&self, _input: &[u8]) -> Result<Vec<u8>, RemovalError> {
        panic!("runtime exploded");
    }
}

fn utf8(path: std::path::PathBuf) -> Utf8PathBuf {
    Utf8PathBuf::try_from(path).unwrap()
}

/// Write input fixtures and build a job over them.
fn make_job(input_dir: &TempDir, output_dir: &TempDir, names: &[&str], suffix: &str) -> Job {
    let mut inputs = Vec::new();
    for name in names {
        let path = utf8(input_dir.path().join(name));
        fs::write(&path, format!("data-{name}")).unwrap();
        inputs.push(path);
    }
    Job {
        inputs,
        output_dir: utf8(output_dir.path().to_path_buf()),
        suffix: suffix.to_string(),
        model: "u2net".to_string(),
    }
}

fn run_and_collect(job: Job, remover: Arc<dyn BackgroundRemover>) -> Vec<WorkerEvent> {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    removal::run_job(job, remover, tx);

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn progress_values(events: &[WorkerEvent]) -> Vec<usize> {
    events
        .iter()
        .filter_map(|e| match e {
            WorkerEvent::Progress(n) => Some(*n),
            _ => None,
        })
        .collect()
}

fn count_of(events: &[WorkerEvent], pred: impl Fn(&WorkerEvent) -> bool) -> usize {
    events.iter().filter(|e| pred(e)).count()
}

#[test]
fn test_three_valid_images_full_success() {
    let input_dir = TempDir::new().unwrap();
    let output_dir = TempDir::new().unwrap();
    let job = make_job(&input_dir, &output_dir, &["a.png", "b.jpg", "c.webp"], "_no_bg");

    let events = run_and_collect(job, Arc::new(FakeRemover::new()));

    assert_eq!(count_of(&events, |e| matches!(e, WorkerEvent::Success(_))), 3);
    assert_eq!(count_of(&events, |e| matches!(e, WorkerEvent::Error(_))), 0);
    assert_eq!(count_of(&events, |e| matches!(e, WorkerEvent::Completed)), 1);
    assert_eq!(progress_values(&events), vec![1, 2, 3]);

    // Exactly one Completed, and it is the final event
    assert_eq!(events.last(), Some(&WorkerEvent::Completed));

    // Output files exist with the expected names
    for name in ["a_no_bg.png", "b_no_bg.png", "c_no_bg.png"] {
        let path = output_dir.path().join(name);
        assert!(path.exists(), "missing output {name}");
        assert_eq!(fs::read(path).unwrap(), b"PNG-OUT");
    }
}

#[test]
fn test_one_failure_among_three_does_not_abort() {
    let input_dir = TempDir::new().unwrap();
    let output_dir = TempDir::new().unwrap();
    let job = make_job(&input_dir, &output_dir, &["a.png", "b.jpg", "c.webp"], "_no_bg");

    // The middle file's contents trigger a decode failure
    let remover = FakeRemover::failing_on(&["data-b.jpg"]);
    let events = run_and_collect(job, Arc::new(remover));

    assert_eq!(count_of(&events, |e| matches!(e, WorkerEvent::Success(_))), 2);
    assert_eq!(count_of(&events, |e| matches!(e, WorkerEvent::Error(_))), 1);
    assert_eq!(count_of(&events, |e| matches!(e, WorkerEvent::Completed)), 1);

    // Success + Error == number of inputs
    assert_eq!(
        count_of(&events, |e| matches!(
            e,
            WorkerEvent::Success(_) | WorkerEvent::Error(_)
        )),
        3
    );

    // Progress carries the loop index, so it reaches 3 even though only
    // two files succeeded
    assert_eq!(progress_values(&events), vec![1, 3]);

    // The failed file produced no output
    assert!(output_dir.path().join("a_no_bg.png").exists());
    assert!(!output_dir.path().join("b_no_bg.png").exists());
    assert!(output_dir.path().join("c_no_bg.png").exists());

    // The error line names the offending file
    let error_text = events
        .iter()
        .find_map(|e| match e {
            WorkerEvent::Error(text) => Some(text.clone()),
            _ => None,
        })
        .unwrap();
    assert!(error_text.contains("b.jpg"));
}

#[test]
fn test_unreadable_input_is_a_per_file_error() {
    let input_dir = TempDir::new().unwrap();
    let output_dir = TempDir::new().unwrap();
    let mut job = make_job(&input_dir, &output_dir, &["a.png"], "_no_bg");

    // Add a path that does not exist
    job.inputs.push(utf8(input_dir.path().join("missing.jpg")));

    let events = run_and_collect(job, Arc::new(FakeRemover::new()));

    assert_eq!(count_of(&events, |e| matches!(e, WorkerEvent::Success(_))), 1);
    assert_eq!(count_of(&events, |e| matches!(e, WorkerEvent::Error(_))), 1);
    assert_eq!(events.last(), Some(&WorkerEvent::Completed));
}

#[test]
fn test_progress_is_monotonically_non_decreasing() {
    let input_dir = TempDir::new().unwrap();
    let output_dir = TempDir::new().unwrap();
    let job = make_job(
        &input_dir,
        &output_dir,
        &["a.png", "b.png", "c.png", "d.png", "e.png"],
        "_x",
    );

    let remover = FakeRemover::failing_on(&["data-b.png", "data-d.png"]);
    let events = run_and_collect(job, Arc::new(remover));

    let progress = progress_values(&events);
    assert!(progress.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(progress, vec![1, 3, 5]);
}

#[test]
fn test_status_line_precedes_each_file() {
    let input_dir = TempDir::new().unwrap();
    let output_dir = TempDir::new().unwrap();
    let job = make_job(&input_dir, &output_dir, &["a.png", "b.png"], "_no_bg");

    let events = run_and_collect(job, Arc::new(FakeRemover::new()));

    let statuses: Vec<&String> = events
        .iter()
        .filter_map(|e| match e {
            WorkerEvent::Status(text) => Some(text),
            _ => None,
        })
        .collect();
    assert_eq!(statuses.len(), 2);
    assert!(statuses[0].contains("a.png"));
    assert!(statuses[1].contains("b.png"));
}

#[test]
fn test_suffix_change_affects_only_new_outputs() {
    let input_dir = TempDir::new().unwrap();
    let output_dir = TempDir::new().unwrap();

    let job1 = make_job(&input_dir, &output_dir, &["a.png"], "_no_bg");
    run_and_collect(job1, Arc::new(FakeRemover::new()));
    assert!(output_dir.path().join("a_no_bg.png").exists());

    let job2 = Job {
        inputs: vec![utf8(input_dir.path().join("a.png"))],
        output_dir: utf8(output_dir.path().to_path_buf()),
        suffix: "_cut".to_string(),
        model: "u2net".to_string(),
    };
    run_and_collect(job2, Arc::new(FakeRemover::new()));

    // Both outputs exist; the first run's file is untouched
    assert!(output_dir.path().join("a_no_bg.png").exists());
    assert!(output_dir.path().join("a_cut.png").exists());
}

#[test]
fn test_empty_input_list_completes_immediately() {
    let output_dir = TempDir::new().unwrap();
    let job = Job {
        inputs: Vec::new(),
        output_dir: utf8(output_dir.path().to_path_buf()),
        suffix: "_no_bg".to_string(),
        model: "u2net".to_string(),
    };

    let events = run_and_collect(job, Arc::new(FakeRemover::new()));
    assert_eq!(events, vec![WorkerEvent::Completed]);
}

#[test]
fn test_runtime_panic_is_a_fatal_error() {
    let input_dir = TempDir::new().unwrap();
    let output_dir = TempDir::new().unwrap();
    let job = make_job(&input_dir, &output_dir, &["a.png", "b.png"], "_no_bg");

    let events = run_and_collect(job, Arc::new(PanickingRemover));

    // The loop dies on the first file: one FatalError, no Completed
    assert_eq!(count_of(&events, |e| matches!(e, WorkerEvent::Completed)), 0);
    let fatal: Vec<&WorkerEvent> = events
        .iter()
        .filter(|e| matches!(e, WorkerEvent::FatalError(_)))
        .collect();
    assert_eq!(fatal.len(), 1);
    match fatal[0] {
        WorkerEvent::FatalError(message) => assert!(message.contains("runtime exploded")),
        _ => unreachable!(),
    }
    assert_eq!(events.last(), Some(&WorkerEvent::FatalError("runtime exploded".to_string())));
}

#[test]
fn test_success_event_names_input_and_output() {
    let input_dir = TempDir::new().unwrap();
    let output_dir = TempDir::new().unwrap();
    let job = make_job(&input_dir, &output_dir, &["photo.jpeg"], "_no_bg");

    let events = run_and_collect(job, Arc::new(FakeRemover::new()));

    let success = events
        .iter()
        .find_map(|e| match e {
            WorkerEvent::Success(text) => Some(text.clone()),
            _ => None,
        })
        .unwrap();
    assert!(success.contains("photo.jpeg"));
    assert!(success.contains("photo_no_bg.png"));
}

#[test]
fn test_report_collects_outcomes() {
    let input_dir = TempDir::new().unwrap();
    let output_dir = TempDir::new().unwrap();
    let job = make_job(&input_dir, &output_dir, &["a.png", "b.png", "c.png"], "_no_bg");

    let remover = FakeRemover::failing_on(&["data-c.png"]);
    let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
    let report = removal::process_files(&job, &remover, &tx);

    assert_eq!(report.succeeded.len(), 2);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.attempted(), 3);
    assert_eq!(report.failed[0].0, "c.png");
}
