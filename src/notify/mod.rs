//! Outbound notification channel. The watcher never calls this; the host
//! process posts one message per transition it receives.

#[cfg(feature = "slack")]
pub mod slack;
pub mod stdout;

use std::fmt::Write as _;

use crate::core::errors::Result;
use crate::units::model::{Transition, TransitionKind};

#[cfg(feature = "slack")]
pub use slack::SlackNotifier;
pub use stdout::{OutputFormat, StdoutNotifier};

/// Delivers rendered transitions to humans.
pub trait Notifier {
    /// Post one message. Failures are `UwError::Delivery`.
    fn post(&mut self, transition: &Transition) -> Result<()>;
}

/// Human-readable one-liner for a transition. Stable for a given input.
///
/// ```
/// use unitwatch::notify::render;
/// use unitwatch::units::{Transition, TransitionKind, UnitRecord};
///
/// let unit = UnitRecord {
///     name: "cron.service".into(),
///     load_state: "loaded".into(),
///     active_state: "active".into(),
///     sub_state: "running".into(),
///     ..UnitRecord::default()
/// };
/// let line = render(&Transition::new(TransitionKind::Added, unit));
/// assert_eq!(line, "[added] cron.service active=active load=loaded sub=running");
/// ```
#[must_use]
pub fn render(transition: &Transition) -> String {
    let unit = &transition.unit;
    let status = format!(
        "active={} load={} sub={}",
        unit.active_state, unit.load_state, unit.sub_state
    );
    let mut line = match transition.kind {
        TransitionKind::Removed => {
            format!("[{}] {} (last seen {status})", transition.kind, unit.name)
        }
        TransitionKind::Added | TransitionKind::Changed => {
            format!("[{}] {} {status}", transition.kind, unit.name)
        }
    };
    if !unit.job_type.is_empty() {
        let _ = write!(line, " job={}", unit.job_type);
    }
    line
}
