//! Scripted unit source: replays recorded listings instead of asking the
//! service manager. Drives `--replay` dry runs and the watcher tests.

use std::collections::VecDeque;
use std::path::Path;

use crate::core::errors::{Result, UwError};
use crate::units::model::UnitRecord;
use crate::units::source::UnitSource;

/// One scripted step: a listing, or an upstream failure.
#[derive(Debug, Clone)]
pub enum ReplayStep {
    Listing(Vec<UnitRecord>),
    Fail(String),
}

/// Replays steps in order; once exhausted, repeats the last listing.
#[derive(Debug, Default)]
pub struct ReplaySource {
    steps: VecDeque<ReplayStep>,
    last: Vec<UnitRecord>,
    calls: usize,
    closed: bool,
}

impl ReplaySource {
    #[must_use]
    pub fn new(listings: impl IntoIterator<Item = Vec<UnitRecord>>) -> Self {
        Self::from_steps(listings.into_iter().map(ReplayStep::Listing))
    }

    #[must_use]
    pub fn from_steps(steps: impl IntoIterator<Item = ReplayStep>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Load a JSON array of listings (each an array of unit records).
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read(path).map_err(|source| UwError::io(path, source))?;
        let listings: Vec<Vec<UnitRecord>> = serde_json::from_slice(&raw)?;
        Ok(Self::new(listings))
    }

    /// Number of `list_units` calls served so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls
    }

    /// Whether [`UnitSource::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl UnitSource for ReplaySource {
    fn list_units(&mut self) -> Result<Vec<UnitRecord>> {
        if self.closed {
            return Err(UwError::connection("replay source closed"));
        }
        self.calls += 1;
        match self.steps.pop_front() {
            Some(ReplayStep::Listing(units)) => {
                self.last.clone_from(&units);
                Ok(units)
            }
            Some(ReplayStep::Fail(details)) => Err(UwError::Connection { details }),
            None => Ok(self.last.clone()),
        }
    }

    fn close(&mut self) {
        self.closed = true;
    }
}
