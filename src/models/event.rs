use std::time::Duration;

/// Period of the UI event pump.
///
/// The value is a responsiveness/overhead trade-off, not a correctness
/// parameter: the pump drains the whole queue on every tick, so a slower
/// tick only delays display, never drops events.
///
/// # See Also
///
/// - [`crate::ui::pump::EventPump`] - The consumer driven at this interval
pub const EVENT_PUMP_INTERVAL: Duration = Duration::from_millis(100);

/// Events posted by background tasks and consumed by the event pump.
///
/// Produced only by the worker task ([`crate::services::removal::run_job`])
/// and the model install task ([`crate::services::model::run_install`]);
/// consumed only by [`crate::ui::pump::EventPump`] on the UI thread. The
/// channel guarantees FIFO delivery and nothing more.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkerEvent {
    /// Neutral progress line for the status log
    Status(String),

    /// A file finished successfully
    Success(String),

    /// A single file failed; the job continues
    Error(String),

    /// 1-based count of loop iterations completed so far.
    /// Counts attempts, not successes, matching the original tool's
    /// user-visible progress semantics.
    Progress(usize),

    /// Ask the UI to recompute the estimated remaining time
    TimeUpdate,

    /// The whole input sequence was attempted; exactly one per job
    Completed,

    /// The worker loop itself died; the job is over immediately
    FatalError(String),

    /// The model file is present and the session loaded
    InstallSuccess,

    /// Model download or session load failed
    InstallError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_compare_by_payload() {
        assert_eq!(
            WorkerEvent::Status("Processing: a.png".into()),
            WorkerEvent::Status("Processing: a.png".into())
        );
        assert_ne!(WorkerEvent::Progress(1), WorkerEvent::Progress(2));
        assert_ne!(WorkerEvent::Completed, WorkerEvent::InstallSuccess);
    }
}
