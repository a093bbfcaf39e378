//! Activity logging for watcher events: a seam injected into the watcher,
//! with a `tracing` sink and an append-only JSONL sink.

pub mod jsonl;

use crate::units::model::Transition;

pub use jsonl::JsonlLogger;

/// Something the watcher reports besides transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchNotice {
    /// No state file was found; the first cycle will be silent.
    BootstrapEnabled,
    /// The first cycle recorded this many units without reporting them.
    BootstrapCompleted { units: usize },
}

impl WatchNotice {
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::BootstrapEnabled => "state file doesn't exist, enable bootstrap mode".to_string(),
            Self::BootstrapCompleted { units } => {
                format!("bootstrap complete, recorded {units} units")
            }
        }
    }
}

/// Receives every transition the watcher emits, after it is persisted.
pub trait ActivityLogger: Send {
    fn transition(&mut self, transition: &Transition);

    fn notice(&mut self, notice: WatchNotice);
}

/// Logs through `tracing` under the `unitwatch::activity` target.
#[derive(Debug, Default)]
pub struct TracingLogger;

impl ActivityLogger for TracingLogger {
    fn transition(&mut self, transition: &Transition) {
        tracing::info!(
            target: "unitwatch::activity",
            kind = %transition.kind,
            unit = %transition.unit.name,
            "{transition}"
        );
    }

    fn notice(&mut self, notice: WatchNotice) {
        tracing::info!(target: "unitwatch::activity", "{}", notice.message());
    }
}

/// Fans out to several loggers in order.
#[derive(Default)]
pub struct TeeLogger {
    sinks: Vec<Box<dyn ActivityLogger>>,
}

impl TeeLogger {
    #[must_use]
    pub fn new(sinks: Vec<Box<dyn ActivityLogger>>) -> Self {
        Self { sinks }
    }
}

impl ActivityLogger for TeeLogger {
    fn transition(&mut self, transition: &Transition) {
        for sink in &mut self.sinks {
            sink.transition(transition);
        }
    }

    fn notice(&mut self, notice: WatchNotice) {
        for sink in &mut self.sinks {
            sink.notice(notice);
        }
    }
}


#[cfg(test)]
mod tests {
    use super::recording::RecordingLogger;
    use super::*;
    use crate::units::model::TransitionKind;
    use crate::units::model::fixtures::unit;

    #[test]
    fn tee_forwards_to_every_sink() {
        let first = RecordingLogger::default();
        let second = RecordingLogger::default();
        let mut tee = TeeLogger::new(vec![Box::new(first.clone()), Box::new(second.clone())]);
        tee.notice(WatchNotice::BootstrapEnabled);
        tee.transition(&Transition::new(
            TransitionKind::Removed,
            unit("old.timer", "inactive", "loaded", "dead"),
        ));
        let expected = [
            "state file doesn't exist, enable bootstrap mode".to_string(),
            "old.timer deleted".to_string(),
        ];
        assert_eq!(first.lines(), expected);
        assert_eq!(second.lines(), expected);
    }

    #[test]
    fn tracing_logger_accepts_events_without_subscriber() {
        let mut logger = TracingLogger;
        logger.notice(WatchNotice::BootstrapCompleted { units: 3 });
        logger.transition(&Transition::new(
            TransitionKind::Added,
            unit("a.service", "active", "loaded", "running"),
        ));
    }
}
