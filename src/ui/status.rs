// Status sink - the timestamped, color-categorized status log.
//
// Appends lines to the window's status log model. Holds an Rc and is
// therefore deliberately not Send: it can only be used from the UI
// thread. Background tasks that want a line in the log post a
// WorkerEvent and let the event pump call into this type.

use crate::ui::{MainWindow, StatusEntry};
use slint::{Model, ModelRc, VecModel};
use std::rc::Rc;

/// Visual category of a status line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusKind {
    Info,
    Success,
    Error,
}

impl StatusKind {
    fn as_str(self) -> &'static str {
        match self {
            StatusKind::Info => "info",
            StatusKind::Success => "success",
            StatusKind::Error => "error",
        }
    }
}

/// Appends timestamped lines to the status log shown in the window.
pub struct StatusSink {
    entries: Rc<VecModel<StatusEntry>>,
}

impl StatusSink {
    /// Create the sink and wire its model into the window.
    pub fn new(ui: &MainWindow) -> Rc<Self> {
        let entries: Rc<VecModel<StatusEntry>> = Rc::new(VecModel::default());
        ui.set_status_log(ModelRc::from(entries.clone()));
        Rc::new(Self { entries })
    }

    pub fn info(&self, message: impl Into<String>) {
        self.append(StatusKind::Info, message.into());
    }

    pub fn success(&self, message: impl Into<String>) {
        self.append(StatusKind::Success, message.into());
    }

    pub fn error(&self, message: impl Into<String>) {
        self.append(StatusKind::Error, message.into());
    }

    fn append(&self, kind: StatusKind, message: String) {
        let timestamp = chrono::Local::now().format("%H:%M:%S").to_string();
        tracing::debug!("status[{}]: {}", kind.as_str(), message);
        self.entries.push(StatusEntry {
            timestamp: timestamp.into(),
            message: message.into(),
            kind: kind.as_str().into(),
        });
    }

    /// Number of lines currently in the log
    pub fn len(&self) -> usize {
        self.entries.row_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
