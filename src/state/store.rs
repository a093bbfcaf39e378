//! Durable snapshot persistence: gzip-compressed JSON, replaced atomically.
//!
//! File states at load time:
//! - absent: first run, bootstrap mode.
//! - zero length: explicitly reset, empty snapshot without bootstrap.
//! - anything else: must decode, or loading fails with `StateCorrupt`.
//!
//! The path itself is inspected without following symlinks: a dangling link
//! is unreadable, never a first run. Stores replace a link with a regular
//! file.

use std::fs;
use std::io::{self, ErrorKind, Write as _};
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::core::errors::{Result, UwError};
use crate::units::model::Snapshot;

/// Outcome of [`StateStore::load`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadedState {
    pub snapshot: Snapshot,
    /// No state file existed: suppress the first cycle's transitions.
    pub bootstrap: bool,
}

/// Mode of a freshly written state file.
pub const STATE_FILE_MODE: u32 = 0o644;

/// Reads and writes the snapshot at one fixed path.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<LoadedState> {
        let meta = match fs::symlink_metadata(&self.path) {
            Ok(meta) => meta,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Ok(LoadedState {
                    snapshot: Snapshot::new(),
                    bootstrap: true,
                });
            }
            Err(source) => return Err(self.unreadable(source)),
        };
        if meta.is_dir() {
            return Err(self.unreadable(io::Error::other("state path is a directory")));
        }
        if meta.len() == 0 {
            return Ok(LoadedState::default());
        }

        let bytes = fs::read(&self.path).map_err(|source| self.unreadable(source))?;
        if bytes.is_empty() {
            return Ok(LoadedState::default());
        }
        let snapshot = decode(&bytes).map_err(|details| UwError::StateCorrupt {
            path: self.path.clone(),
            details,
        })?;
        debug!(path = %self.path.display(), units = snapshot.len(), "loaded state");
        Ok(LoadedState {
            snapshot,
            bootstrap: false,
        })
    }

    /// Replace the state file with `snapshot`.
    ///
    /// Writes a sibling temp file and renames it over the target, so a crash
    /// leaves either the old or the new snapshot on disk.
    pub fn store(&self, snapshot: &Snapshot) -> Result<()> {
        self.write(snapshot)
            .map_err(|source| UwError::StateWriteFailed {
                path: self.path.clone(),
                source,
            })?;
        debug!(path = %self.path.display(), units = snapshot.len(), "stored state");
        Ok(())
    }

    fn write(&self, snapshot: &Snapshot) -> io::Result<()> {
        let bytes = encode(snapshot)?;
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(&bytes)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tmp.as_file()
                .set_permissions(fs::Permissions::from_mode(STATE_FILE_MODE))?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|err| err.error)?;
        Ok(())
    }

    fn unreadable(&self, source: io::Error) -> UwError {
        UwError::StateUnreadable {
            path: self.path.clone(),
            source,
        }
    }
}

fn encode(snapshot: &Snapshot) -> io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    serde_json::to_writer(&mut encoder, snapshot).map_err(io::Error::other)?;
    encoder.finish()
}

fn decode(bytes: &[u8]) -> std::result::Result<Snapshot, String> {
    serde_json::from_reader(GzDecoder::new(bytes)).map_err(|err| err.to_string())
}
