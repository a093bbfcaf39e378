//! SIGINT/SIGTERM handling: flips a shared flag the watcher thread checks
//! between cycles.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use signal_hook::consts::{SIGINT, SIGTERM};

use crate::core::errors::{Result, UwError};

/// Register SIGINT and SIGTERM to set the returned flag.
pub fn install_shutdown_flag() -> Result<Arc<AtomicBool>> {
    let flag = Arc::new(AtomicBool::new(false));
    for signal in [SIGINT, SIGTERM] {
        signal_hook::flag::register(signal, Arc::clone(&flag)).map_err(|err| {
            UwError::Runtime {
                details: format!("failed to register handler for signal {signal}: {err}"),
            }
        })?;
    }
    Ok(flag)
}
