//! Engine context and the task queues it drives.
//!
//! The [`Engine`] is created explicitly and passed around; there is no global
//! instance. It owns the window, the renderer, the main and update task
//! queues, the event dispatcher and the exit signal.

mod engine;
mod scheduler;

pub use engine::{Engine, EngineConfig, HeadlessProbes};
pub use scheduler::{ExitSignal, Task, TaskQueue};
