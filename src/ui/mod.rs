// UI module - window, controller, event pump and status log
//
// This module contains:
// - The generated Slint window types (MainWindow, StatusEntry)
// - GuiController: wires the window to state and services
// - EventPump: drains worker events into UI state on a timer
// - StatusSink: the timestamped status log

// Include the generated Slint code; MainWindow and StatusEntry become
// items of this module.
slint::include_modules!();

pub mod controller;
pub mod pump;
pub mod status;

pub use controller::GuiController;
pub use pump::EventPump;
pub use status::StatusSink;
