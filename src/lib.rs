//! unitwatch: watches systemd units and reports units that appear, disappear,
//! or change state, surviving restarts through a compressed state file.
//!
//! The core is [`daemon::Watcher`]: it lists units through a
//! [`units::UnitSource`], diffs the listing against the held
//! [`units::Snapshot`], persists through [`state::StateStore`], and yields
//! [`units::Transition`] batches.

pub mod core;
pub mod daemon;
pub mod logger;
pub mod notify;
pub mod state;
pub mod units;

#[cfg(feature = "cli")]
pub mod cli_app;

pub use crate::core::errors::{Result, UwError};
