// Event pump - the sole consumer of the worker event queue.
//
// A fixed-period slint::Timer on the UI thread. Each tick drains every
// queued event non-blockingly, dispatches it into UI state, and then
// stops the timer if neither a job nor an install task is active. The
// pump is the only place worker events become UI mutations, which keeps
// every Slint property write on the UI thread by construction.

use crate::models::{EVENT_PUMP_INTERVAL, MainConfig, WorkerEvent};
use crate::services::SessionSlot;
use crate::state::StateManager;
use crate::ui::status::StatusSink;
use crate::ui::{MainWindow, controller};
use slint::{Timer, TimerMode, Weak};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::error::TryRecvError;

/// Everything the dispatch step needs besides the event itself.
///
/// Cloned into the timer closure each time the pump is (re)started.
#[derive(Clone)]
pub struct PumpContext {
    pub ui: Weak<MainWindow>,
    pub state: Arc<StateManager>,
    pub sink: Rc<StatusSink>,
    pub slot: SessionSlot,
    pub main_config: Arc<MainConfig>,
    pub models_dir: camino::Utf8PathBuf,
}

/// Periodic consumer that drains worker-produced events into UI state.
pub struct EventPump {
    timer: Rc<Timer>,
    rx: Rc<RefCell<UnboundedReceiver<WorkerEvent>>>,
}

impl EventPump {
    pub fn new(rx: UnboundedReceiver<WorkerEvent>) -> Self {
        Self {
            timer: Rc::new(Timer::default()),
            rx: Rc::new(RefCell::new(rx)),
        }
    }

    /// Start (or restart) ticking. Idempotent: restarting an already
    /// running pump just resets its phase, no events are lost.
    pub fn start(&self, ctx: PumpContext) {
        let rx = self.rx.clone();
        let timer = self.timer.clone();

        self.timer.start(TimerMode::Repeated, EVENT_PUMP_INTERVAL, move || {
            let Some(ui) = ctx.ui.upgrade() else {
                // Window is gone; nothing left to update
                timer.stop();
                return;
            };

            loop {
                let event = rx.borrow_mut().try_recv();
                match event {
                    Ok(event) => dispatch(event, &ui, &ctx),
                    Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
                }
            }

            // Keep rescheduling only while a task is active; a new job
            // restarts the pump.
            let active = ctx.state.read(|s| s.is_processing || s.is_installing);
            if !active {
                timer.stop();
            }
        });
    }
}

/// Apply one event to state and window.
fn dispatch(event: WorkerEvent, ui: &MainWindow, ctx: &PumpContext) {
    match event {
        WorkerEvent::Status(message) => {
            ctx.sink.info(message);
        }

        WorkerEvent::Success(message) => {
            ctx.state.record_success();
            ctx.sink.success(message);
        }

        WorkerEvent::Error(message) => {
            ctx.state.record_error();
            ctx.sink.error(message);
        }

        WorkerEvent::Progress(n) => {
            ctx.state.record_progress(n);
            let (percent, total) = ctx.state.read(|s| (s.percent_complete(), s.total_files));
            ui.set_progress_current(n as i32);
            ui.set_progress_total(total as i32);
            ui.set_progress_percent(format!("{percent}%").into());
            ui.set_counter_text(format!("Processing: {n}/{total}").into());
        }

        WorkerEvent::TimeUpdate => {
            if let Some(remaining) = ctx.state.read(|s| s.estimated_remaining(Instant::now())) {
                ui.set_time_text(controller::format_remaining(remaining).into());
            }
        }

        WorkerEvent::Completed => {
            let elapsed = ctx.state.read(|s| s.elapsed(Instant::now()));
            let (output_dir, failed) = ctx
                .state
                .read(|s| (s.output_dir.clone(), s.error_count));

            if let Some(elapsed) = elapsed {
                ctx.sink.success(format!(
                    "All tasks completed in {}!",
                    controller::format_total_time(elapsed)
                ));
            }
            if failed > 0 {
                ctx.sink.error(format!("{failed} file(s) failed; see the log above."));
            }

            ctx.state.finish_job();
            ui.set_is_processing(false);
            ui.set_counter_text("Ready".into());
            ui.set_time_text("".into());
            ctx.sink.info("Process completed.");

            let dir_text = output_dir.map(|d| d.to_string()).unwrap_or_default();
            ui.set_completion_message(
                format!(
                    "All processing completed.\nOutput saved to: {dir_text}\n\nWould you like to open the output folder?"
                )
                .into(),
            );
            ui.set_show_completion_dialog(true);
        }

        WorkerEvent::FatalError(message) => {
            ctx.sink.error(format!("Critical error: {message}"));
            ctx.state.finish_job();
            ui.set_is_processing(false);
            ui.set_counter_text("Ready".into());
            ui.set_time_text("".into());

            controller::show_error_dialog(
                ui,
                "Critical Error",
                "A critical error occurred during processing.",
                message,
            );
        }

        WorkerEvent::InstallSuccess => {
            // Re-run the readiness check rather than trusting the event:
            // the slot is the source of truth for a usable session.
            let ready = ctx.slot.is_ready();
            ctx.state.finish_install(ready);
            ui.set_is_installing(false);
            ui.set_model_ready(ready);
            ui.set_install_needed(!ready);

            if ready {
                let model = ctx.state.read(|s| s.selected_model.clone());
                ctx.sink
                    .success(format!("Model '{model}' loaded. Ready to process images."));
            } else {
                ctx.sink.error("Model reported ready but no session is loaded.");
            }
        }

        WorkerEvent::InstallError(message) => {
            ctx.state.finish_install(false);
            ui.set_is_installing(false);
            ui.set_model_ready(false);
            ui.set_install_needed(true);

            ctx.sink.error(format!("Model setup failed: {message}"));

            // Manual fallback instructions
            let model = ctx.state.read(|s| s.selected_model.clone());
            if let Some(entry) = ctx.main_config.model(&model) {
                ctx.sink.error("For manual installation, download the model yourself:");
                ctx.sink.error(format!(
                    "  {}  ->  {}",
                    entry.url,
                    crate::services::model::model_path(&ctx.models_dir, entry)
                ));
            }
        }
    }
}
