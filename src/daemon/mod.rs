//! Daemon subsystem: the watch loop, the background runner that carries it,
//! and signal handling.

pub mod runner;
#[cfg(feature = "daemon")]
pub mod signals;
pub mod watcher;

pub use runner::{RunnerOptions, WatchHandle, spawn_watcher};
pub use watcher::{WatchPhase, Watcher};
