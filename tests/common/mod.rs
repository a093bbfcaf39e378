//! Shared harness for binary-level tests: runs `unitwatch` and keeps a log
//! of each case under the target directory.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

pub struct CliResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub log_path: PathBuf,
}

fn log_dir() -> PathBuf {
    let dir = Path::new(env!("CARGO_TARGET_TMPDIR")).join("cli-cases");
    fs::create_dir_all(&dir).expect("create cli log dir");
    dir
}

pub fn run_cli_case(case: &str, args: &[&str]) -> CliResult {
    let output = Command::new(env!("CARGO_BIN_EXE_unitwatch"))
        .args(args)
        .env("RUST_LOG", "info")
        .output()
        .expect("spawn unitwatch");
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    let log_path = log_dir().join(format!("{case}.log"));
    fs::write(
        &log_path,
        format!(
            "args: {args:?}\nstatus: {}\n--- stdout ---\n{stdout}\n--- stderr ---\n{stderr}\n",
            output.status
        ),
    )
    .expect("write cli log");
    CliResult {
        status: output.status,
        stdout,
        stderr,
        log_path,
    }
}

/// Write a replay file of listings; each listing is `(name, active, sub)`.
pub fn write_replay(path: &Path, listings: &[&[(&str, &str, &str)]]) {
    let json: Vec<Vec<serde_json::Value>> = listings
        .iter()
        .map(|listing| {
            listing
                .iter()
                .map(|(name, active, sub)| {
                    serde_json::json!({
                        "name": name,
                        "path": format!("/org/freedesktop/systemd1/unit/{name}"),
                        "load_state": "loaded",
                        "active_state": active,
                        "sub_state": sub,
                    })
                })
                .collect()
        })
        .collect();
    fs::write(path, serde_json::to_vec_pretty(&json).unwrap()).expect("write replay file");
}
