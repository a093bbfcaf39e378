//! Persistence of the last known snapshot across restarts.

pub mod store;

pub use store::{LoadedState, StateStore};
