//! Services module - Business logic for batch background removal.
//!
//! The services are **framework-agnostic**: no Slint, no GUI code, no
//! dependency on the UI layer. They communicate with the rest of the app
//! through plain data ([`crate::models::Job`]) and the worker event queue.
//!
//! # Components
//!
//! - [`removal`]: The worker task. Walks a [`Job`](crate::models::Job)'s
//!   inputs in order, catches per-file failures, writes `<stem><suffix>.png`
//!   outputs and posts [`WorkerEvent`](crate::models::WorkerEvent)s. Also
//!   defines [`BackgroundRemover`], the trait seam between the loop and the
//!   model runtime (tests drive the loop with a fake implementation).
//!
//! - [`engine`]: The ONNX adapter behind [`BackgroundRemover`]. Decodes
//!   image bytes, normalizes into the model's tensor layout, runs the
//!   session, and composites the saliency output back onto the original
//!   as an alpha channel.
//!
//! - [`model`]: Model weight management - catalog paths, cached-file
//!   checks, HTTPS download, and the install task that loads a session
//!   into the shared [`SessionSlot`].
//!
//! # Error Handling
//!
//! Per-file failures are values ([`RemovalError`]), not control flow: the
//! worker converts each to an `Error` event and keeps going. Only a panic
//! out of the runtime aborts a job, surfaced as a single `FatalError`.

pub mod engine;
pub mod model;
pub mod removal;

pub use engine::OnnxEngine;
pub use model::SessionSlot;
pub use removal::{BackgroundRemover, IMAGE_EXTENSIONS, RemovalError};
