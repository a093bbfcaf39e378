//! Prints transitions to a terminal or pipe.

use std::io::{self, Write};

use serde::Serialize;

use super::{Notifier, render};
use crate::core::errors::{Result, UwError};
use crate::units::model::{Transition, TransitionKind, UnitRecord};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// `render()` lines.
    #[default]
    Human,
    /// One JSON object per transition.
    Json,
}

#[derive(Serialize)]
struct JsonLine<'a> {
    kind: TransitionKind,
    unit: &'a UnitRecord,
    message: String,
}

/// Writes each transition as one line. Defaults to stdout.
pub struct StdoutNotifier<W: Write = io::Stdout> {
    out: W,
    format: OutputFormat,
    color: bool,
}

impl StdoutNotifier {
    #[must_use]
    pub fn new(format: OutputFormat, color: bool) -> Self {
        Self::with_writer(io::stdout(), format, color)
    }
}

impl<W: Write> StdoutNotifier<W> {
    #[must_use]
    pub fn with_writer(out: W, format: OutputFormat, color: bool) -> Self {
        Self { out, format, color }
    }

    #[must_use]
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Notifier for StdoutNotifier<W> {
    fn post(&mut self, transition: &Transition) -> Result<()> {
        let line = match self.format {
            OutputFormat::Human if self.color => paint(transition),
            OutputFormat::Human => render(transition),
            OutputFormat::Json => serde_json::to_string(&JsonLine {
                kind: transition.kind,
                unit: &transition.unit,
                message: render(transition),
            })?,
        };
        writeln!(self.out, "{line}")
            .and_then(|()| self.out.flush())
            .map_err(|err| UwError::Delivery {
                channel: "stdout",
                details: err.to_string(),
            })
    }
}

#[cfg(feature = "cli")]
fn paint(transition: &Transition) -> String {
    use colored::Colorize;

    let line = render(transition);
    let tag = format!("[{}]", transition.kind);
    let painted = match transition.kind {
        TransitionKind::Added => tag.green(),
        TransitionKind::Changed if transition.unit.active_state == "failed" => tag.red().bold(),
        TransitionKind::Changed => tag.yellow(),
        TransitionKind::Removed => tag.dimmed(),
    };
    line.replacen(&tag, &painted.to_string(), 1)
}

#[cfg(not(feature = "cli"))]
fn paint(transition: &Transition) -> String {
    render(transition)
}
