//! Data models for the BGTank application.
//!
//! This module contains all the core data structures used throughout the application:
//! - [`AppState`]: The central state container holding selections, runtime flags and progress
//! - [`Job`]: The immutable batch request handed to the worker task
//! - [`WorkerEvent`]: The queue payload flowing from background tasks to the event pump
//! - [`MainConfig`]: The model catalog loaded from `BGTank Main.yaml`
//! - [`UserConfig`]: User preferences loaded from `BGTank Config.yaml`
//!
//! # Architecture Note
//!
//! The models are designed to be:
//! - **Serializable**: Config structs derive `Serialize`/`Deserialize` for YAML loading
//! - **Cloneable**: AppState is wrapped in `Arc<RwLock<>>` by [`StateManager`](crate::state::StateManager)
//! - **One-way**: Workers never mutate state; they emit [`WorkerEvent`]s the pump applies

pub mod app_state;
pub mod config;
pub mod event;
pub mod job;

pub use app_state::AppState;
pub use config::{BgTankSettings, MainConfig, ModelEntry, UserConfig};
pub use event::{EVENT_PUMP_INTERVAL, WorkerEvent};
pub use job::{Job, JobReport};
