//! Core plumbing shared by every subsystem: error codes and configuration.

pub mod config;
pub mod errors;
