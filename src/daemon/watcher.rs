//! The watch loop: list units, diff against the held snapshot, persist,
//! hand back the transitions.
//!
//! **Invariant:** after every successful cycle that changed anything, the
//! in-memory snapshot and the state file are identical. Any listing or
//! persistence failure moves the watcher to [`WatchPhase::Failed`]; it never
//! resumes, a new watcher has to be opened (which reloads the state file).

use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::core::config::{WatchConfig, check_interval};
use crate::core::errors::{Result, UwError};
use crate::logger::{ActivityLogger, WatchNotice};
use crate::state::StateStore;
use crate::units::diff::{DiffOutcome, diff};
use crate::units::model::{Snapshot, Transition};
use crate::units::source::UnitSource;

/// Lifecycle of a [`Watcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchPhase {
    /// Opened, no cycle run yet.
    Uninitialized,
    /// Running the one silent cycle after a missing state file.
    Bootstrapping,
    /// At least one cycle completed.
    Steady,
    /// A cycle failed. Terminal.
    Failed,
}

/// Owns the snapshot and drives poll -> diff -> persist cycles.
///
/// Also an [`Iterator`] of transition batches: one batch per cycle, with a
/// pause of `interval` before every cycle but the first. The iterator ends
/// after yielding the first error.
pub struct Watcher<S: UnitSource> {
    source: S,
    store: StateStore,
    snapshot: Snapshot,
    interval: Duration,
    logger: Option<Box<dyn ActivityLogger>>,
    bootstrap_pending: bool,
    phase: WatchPhase,
    cycles: u64,
    closed: bool,
}

impl<S: UnitSource> Watcher<S> {
    /// Load the state file and prepare the first cycle.
    ///
    /// `logger: None` disables activity logging. `interval` is checked with
    /// [`check_interval`].
    pub fn open(
        source: S,
        store: StateStore,
        interval: Duration,
        mut logger: Option<Box<dyn ActivityLogger>>,
    ) -> Result<Self> {
        check_interval(interval)?;
        let loaded = store.load()?;
        if loaded.bootstrap {
            if let Some(logger) = logger.as_mut() {
                logger.notice(WatchNotice::BootstrapEnabled);
            }
        }
        debug!(
            path = %store.path().display(),
            units = loaded.snapshot.len(),
            bootstrap = loaded.bootstrap,
            "watcher opened"
        );
        Ok(Self {
            source,
            store,
            snapshot: loaded.snapshot,
            interval,
            logger,
            bootstrap_pending: loaded.bootstrap,
            phase: WatchPhase::Uninitialized,
            cycles: 0,
            closed: false,
        })
    }

    pub fn from_config(
        source: S,
        config: &WatchConfig,
        logger: Option<Box<dyn ActivityLogger>>,
    ) -> Result<Self> {
        config.validate()?;
        Self::open(
            source,
            StateStore::new(&config.state_file),
            config.interval,
            logger,
        )
    }

    #[must_use]
    pub fn phase(&self) -> WatchPhase {
        self.phase
    }

    #[must_use]
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// The listing source, e.g. to inspect a scripted one after a run.
    #[must_use]
    pub fn source(&self) -> &S {
        &self.source
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Completed cycles.
    #[must_use]
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Run one cycle now, without the inter-cycle pause.
    pub fn poll_once(&mut self) -> Result<Vec<Transition>> {
        if self.phase == WatchPhase::Failed {
            return Err(UwError::Runtime {
                details: "watcher failed earlier; open a new one".to_string(),
            });
        }
        match self.cycle() {
            Ok(batch) => Ok(batch),
            Err(err) => {
                warn!(code = err.code(), error = %err, "watch cycle failed");
                self.phase = WatchPhase::Failed;
                self.close();
                Err(err)
            }
        }
    }

    fn cycle(&mut self) -> Result<Vec<Transition>> {
        let suppress = self.bootstrap_pending;
        if suppress {
            self.phase = WatchPhase::Bootstrapping;
        }

        let listing = self.source.list_units()?;
        let DiffOutcome { next, transitions } = diff(&self.snapshot, listing);
        self.snapshot = next;

        // A silent bootstrap still writes, so the next start is not a
        // bootstrap again even when nothing was listed.
        if suppress || !transitions.is_empty() {
            self.store.store(&self.snapshot)?;
        }

        self.bootstrap_pending = false;
        self.phase = WatchPhase::Steady;
        self.cycles += 1;

        if suppress {
            if let Some(logger) = self.logger.as_mut() {
                logger.notice(WatchNotice::BootstrapCompleted {
                    units: self.snapshot.len(),
                });
            }
            return Ok(Vec::new());
        }

        if let Some(logger) = self.logger.as_mut() {
            for transition in &transitions {
                logger.transition(transition);
            }
        }
        Ok(transitions)
    }

    /// Release the upstream connection. Idempotent; also runs on drop.
    pub fn close(&mut self) {
        if !self.closed {
            self.source.close();
            self.closed = true;
        }
    }
}

impl<S: UnitSource> Iterator for Watcher<S> {
    type Item = Result<Vec<Transition>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.phase == WatchPhase::Failed {
            return None;
        }
        if self.cycles > 0 {
            thread::sleep(self.interval);
        }
        Some(self.poll_once())
    }
}

impl<S: UnitSource> Drop for Watcher<S> {
    fn drop(&mut self) {
        self.close();
    }
}
