//! Append-only JSON Lines activity log.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write as _};
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use super::{ActivityLogger, WatchNotice};
use crate::core::errors::{Result, UwError};
use crate::units::model::{Transition, TransitionKind, UnitRecord};

#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum Entry<'a> {
    Transition {
        ts: String,
        kind: TransitionKind,
        unit: &'a UnitRecord,
    },
    Notice {
        ts: String,
        message: String,
    },
}

/// Writes one JSON object per line. Write failures are reported through
/// `tracing` and otherwise ignored: the activity log never stops the watcher.
#[derive(Debug)]
pub struct JsonlLogger {
    path: PathBuf,
    out: BufWriter<File>,
}

impl JsonlLogger {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| UwError::io(path, source))?;
        Ok(Self {
            path: path.to_path_buf(),
            out: BufWriter::new(file),
        })
    }

    fn append(&mut self, entry: &Entry<'_>) {
        let written = serde_json::to_writer(&mut self.out, entry)
            .map_err(std::io::Error::other)
            .and_then(|()| self.out.write_all(b"\n"))
            .and_then(|()| self.out.flush());
        if let Err(err) = written {
            tracing::warn!(path = %self.path.display(), error = %err, "activity log write failed");
        }
    }
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl ActivityLogger for JsonlLogger {
    fn transition(&mut self, transition: &Transition) {
        self.append(&Entry::Transition {
            ts: now(),
            kind: transition.kind,
            unit: &transition.unit,
        });
    }

    fn notice(&mut self, notice: WatchNotice) {
        self.append(&Entry::Notice {
            ts: now(),
            message: notice.message(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::model::fixtures::unit;

    #[test]
    fn appends_one_object_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("activity.jsonl");
        {
            let mut logger = JsonlLogger::open(&path).unwrap();
            logger.notice(WatchNotice::BootstrapEnabled);
            logger.transition(&Transition::new(
                TransitionKind::Changed,
                unit("nginx.service", "failed", "loaded", "failed"),
            ));
        }
        // Reopening appends rather than truncating.
        JsonlLogger::open(&path)
            .unwrap()
            .notice(WatchNotice::BootstrapCompleted { units: 1 });

        let raw = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = raw
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["event"], "notice");
        assert_eq!(lines[1]["event"], "transition");
        assert_eq!(lines[1]["kind"], "changed");
        assert_eq!(lines[1]["unit"]["name"], "nginx.service");
        assert_eq!(lines[1]["unit"]["active_state"], "failed");
        assert!(lines[2]["ts"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn open_fails_for_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = JsonlLogger::open(dir.path().join("nope").join("a.jsonl")).unwrap_err();
        assert_eq!(err.code(), "UW-3002");
    }
}
