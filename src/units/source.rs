//! Upstream listing capability and its systemctl-backed implementation.

use std::ffi::OsString;
use std::fmt::Write as _;
use std::process::Command;

use serde::Deserialize;
use tracing::debug;

use crate::core::errors::{Result, UwError};
use crate::units::model::UnitRecord;

/// Object path prefix systemd uses for units on the bus.
pub const UNIT_PATH_PREFIX: &str = "/org/freedesktop/systemd1/unit/";

/// Narrow seam to the service manager: the watcher only lists and closes.
pub trait UnitSource {
    /// Current listing of every unit the manager knows about.
    fn list_units(&mut self) -> Result<Vec<UnitRecord>>;

    /// Release the underlying connection. Idempotent.
    fn close(&mut self);
}

impl<S: UnitSource + ?Sized> UnitSource for Box<S> {
    fn list_units(&mut self) -> Result<Vec<UnitRecord>> {
        (**self).list_units()
    }

    fn close(&mut self) {
        (**self).close();
    }
}

/// Lists units by running `systemctl list-units`.
#[derive(Debug, Clone)]
pub struct SystemctlSource {
    program: OsString,
    extra_args: Vec<OsString>,
    closed: bool,
}

impl Default for SystemctlSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemctlSource {
    /// System manager via `systemctl` from `PATH`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            program: OsString::from("systemctl"),
            extra_args: Vec::new(),
            closed: false,
        }
    }

    /// Per-user manager (`systemctl --user`).
    #[must_use]
    pub fn user() -> Self {
        let mut source = Self::new();
        source.extra_args.push(OsString::from("--user"));
        source
    }

    /// Use a different executable, e.g. a wrapper script.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<OsString>) -> Self {
        self.program = program.into();
        self
    }
}

impl UnitSource for SystemctlSource {
    fn list_units(&mut self) -> Result<Vec<UnitRecord>> {
        if self.closed {
            return Err(UwError::connection("source already closed"));
        }
        let output = Command::new(&self.program)
            .args(&self.extra_args)
            .args(["list-units", "--all", "--output=json", "--no-pager", "--full"])
            .env("LC_ALL", "C")
            .output()
            .map_err(|err| {
                UwError::connection(format!(
                    "failed to spawn {}: {err}",
                    self.program.to_string_lossy()
                ))
            })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(UwError::connection(format!(
                "{} list-units exited with {}: {}",
                self.program.to_string_lossy(),
                output.status,
                stderr.trim()
            )));
        }
        let units = parse_list_units(&output.stdout)?;
        debug!(count = units.len(), "listed units");
        Ok(units)
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

/// One row of `systemctl list-units --output=json`.
///
/// systemd only emits the `job` column while some unit has a pending job,
/// and leaves the cell empty or null for units without one.
#[derive(Debug, Deserialize)]
struct ListedUnit {
    unit: String,
    #[serde(default)]
    load: String,
    #[serde(default)]
    active: String,
    #[serde(default)]
    sub: String,
    #[serde(default)]
    job: Option<String>,
    #[serde(default)]
    description: String,
}

impl From<ListedUnit> for UnitRecord {
    fn from(row: ListedUnit) -> Self {
        let path = unit_object_path(&row.unit);
        Self {
            job_type: row.job.unwrap_or_default(),
            name: row.unit,
            description: row.description,
            load_state: row.load,
            active_state: row.active,
            sub_state: row.sub,
            path,
            ..Self::default()
        }
    }
}

/// Parse the JSON array printed by `systemctl list-units --output=json`.
///
/// Column cells are addressed by name, so the optional JOB column can never
/// shift the description.
pub fn parse_list_units(raw: &[u8]) -> Result<Vec<UnitRecord>> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    let rows: Vec<ListedUnit> = serde_json::from_slice(raw)
        .map_err(|err| UwError::connection(format!("unparsable list-units output: {err}")))?;
    Ok(rows.into_iter().map(UnitRecord::from).collect())
}

/// Bus object path of a unit: systemd's label escaping applied to the name.
///
/// ASCII letters pass through, digits pass through except in first
/// position, everything else becomes `_xx` (lowercase hex byte).
#[must_use]
pub fn unit_object_path(name: &str) -> String {
    let mut path = String::with_capacity(UNIT_PATH_PREFIX.len() + name.len() * 2);
    path.push_str(UNIT_PATH_PREFIX);
    if name.is_empty() {
        path.push('_');
        return path;
    }
    for (idx, byte) in name.bytes().enumerate() {
        if byte.is_ascii_alphabetic() || (idx > 0 && byte.is_ascii_digit()) {
            path.push(char::from(byte));
        } else {
            let _ = write!(path, "_{byte:02x}");
        }
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_path_escapes_like_systemd() {
        assert_eq!(
            unit_object_path("sshd.service"),
            "/org/freedesktop/systemd1/unit/sshd_2eservice"
        );
        assert_eq!(
            unit_object_path("dev-sda1.device"),
            "/org/freedesktop/systemd1/unit/dev_2dsda1_2edevice"
        );
        assert_eq!(
            unit_object_path("1password.service"),
            "/org/freedesktop/systemd1/unit/_31password_2eservice"
        );
        assert_eq!(unit_object_path(""), "/org/freedesktop/systemd1/unit/_");
    }

    #[test]
    fn parses_json_rows_with_spaced_descriptions() {
        let raw = br#"[
{"unit":"cron.service","load":"loaded","active":"active","sub":"running","description":"Regular background program processing daemon"},
{"unit":"nginx.service","load":"loaded","active":"failed","sub":"failed","description":"A high performance web server"},
{"unit":"systemd-tmpfiles-clean.timer","load":"loaded","active":"active","sub":"waiting","description":"Daily Cleanup of Temporary Directories"}
]"#;
        let units = parse_list_units(raw).unwrap();
        assert_eq!(units.len(), 3);
        assert_eq!(units[0].name, "cron.service");
        assert_eq!(
            units[0].description,
            "Regular background program processing daemon"
        );
        assert_eq!(units[1].name, "nginx.service");
        assert_eq!(units[1].active_state, "failed");
        assert_eq!(units[1].sub_state, "failed");
        assert!(units[1].job_type.is_empty());
        assert_eq!(units[2].sub_state, "waiting");
        assert_eq!(units[2].path, unit_object_path("systemd-tmpfiles-clean.timer"));
    }

    #[test]
    fn pending_job_fills_job_type_and_keeps_description() {
        let raw = br#"[
{"unit":"nginx.service","load":"loaded","active":"activating","sub":"start-pre","job":"start","description":"A high performance web server"},
{"unit":"cron.service","load":"loaded","active":"active","sub":"running","job":null,"description":"Regular background program processing daemon"},
{"unit":"ssh.service","load":"loaded","active":"active","sub":"running","job":"","description":"OpenBSD Secure Shell server"}
]"#;
        let units = parse_list_units(raw).unwrap();
        assert_eq!(units[0].description, "A high performance web server");
        assert_eq!(units[0].job_type, "start");
        assert_eq!(units[0].sub_state, "start-pre");
        assert!(units[1].job_type.is_empty());
        assert_eq!(units[2].job_type, "");
        assert_eq!(units[2].description, "OpenBSD Secure Shell server");
    }

    #[test]
    fn job_completion_keeps_key_and_description() {
        let pending = br#"[{"unit":"nginx.service","load":"loaded","active":"activating","sub":"start-pre","job":"start","description":"A high performance web server"}]"#;
        let done = br#"[{"unit":"nginx.service","load":"loaded","active":"active","sub":"running","description":"A high performance web server"}]"#;
        let before = parse_list_units(pending).unwrap().remove(0);
        let after = parse_list_units(done).unwrap().remove(0);
        assert_eq!(before.description, after.description);
        assert_eq!(before.key(), after.key());
        assert_ne!(before.job_type, after.job_type);
    }

    #[test]
    fn empty_output_is_an_empty_listing() {
        assert!(parse_list_units(b"").unwrap().is_empty());
        assert!(parse_list_units(b"[]\n").unwrap().is_empty());
    }

    #[test]
    fn malformed_output_is_connection_error() {
        let err = parse_list_units(b"broken.service loaded\n").unwrap_err();
        assert_eq!(err.code(), "UW-2001");
        let err = parse_list_units(br#"[{"load":"loaded"}]"#).unwrap_err();
        assert_eq!(err.code(), "UW-2001");
    }

    #[test]
    fn missing_binary_is_connection_error() {
        let mut source = SystemctlSource::new().with_program("/nonexistent/systemctl");
        let err = source.list_units().unwrap_err();
        assert_eq!(err.code(), "UW-2001");
    }

    #[test]
    fn closed_source_refuses_to_list() {
        let mut source = SystemctlSource::new();
        source.close();
        source.close();
        assert!(source.list_units().is_err());
    }
}
