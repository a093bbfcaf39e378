//! Runs a [`Watcher`] on its own thread and delivers batches through a
//! bounded single-producer queue.
//!
//! The watcher thread owns the snapshot exclusively. Consumers only ever see
//! owned transition batches.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, bounded};
use tracing::{debug, info};

use crate::core::errors::{Result, UwError};
use crate::daemon::watcher::Watcher;
use crate::units::model::Transition;
use crate::units::source::UnitSource;

/// Longest stretch the watcher thread sleeps without checking for shutdown.
const SHUTDOWN_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy)]
pub struct RunnerOptions {
    /// Batches buffered before the watcher blocks on a slow consumer.
    pub queue_capacity: usize,
    /// Stop after this many cycles. `None` runs until shutdown or failure.
    pub max_cycles: Option<u64>,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            queue_capacity: 16,
            max_cycles: None,
        }
    }
}

/// Consumer side of a running watcher.
pub struct WatchHandle {
    batches: Receiver<Result<Vec<Transition>>>,
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl WatchHandle {
    /// Batches in cycle order. Ends when the watcher thread stops; an `Err`
    /// item is always the last one.
    pub fn batches(&self) -> impl Iterator<Item = Result<Vec<Transition>>> + '_ {
        self.batches.iter()
    }

    /// Ask the watcher thread to stop at the next cycle boundary.
    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Wait for the watcher thread to exit.
    pub fn join(mut self) -> Result<()> {
        self.join_inner()
    }

    fn join_inner(&mut self) -> Result<()> {
        match self.thread.take() {
            Some(handle) => handle.join().map_err(|_| UwError::Runtime {
                details: "watcher thread panicked".to_string(),
            }),
            None => Ok(()),
        }
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.request_shutdown();
        // Unblock a watcher stuck on a full queue before joining.
        while self.batches.try_recv().is_ok() {}
        let _ = self.join_inner();
    }
}

/// Move `watcher` onto a dedicated thread.
///
/// `shutdown` is checked between cycles and during the pause; a cycle that
/// has started always runs to completion.
pub fn spawn_watcher<S>(
    mut watcher: Watcher<S>,
    shutdown: Arc<AtomicBool>,
    options: RunnerOptions,
) -> Result<WatchHandle>
where
    S: UnitSource + Send + 'static,
{
    let (tx, rx) = bounded(options.queue_capacity.max(1));
    let stop = Arc::clone(&shutdown);
    let thread = thread::Builder::new()
        .name("unitwatch-watcher".to_string())
        .spawn(move || {
            let interval = watcher.interval();
            loop {
                if stop.load(Ordering::SeqCst) {
                    info!("shutdown requested, stopping watcher");
                    break;
                }
                if options
                    .max_cycles
                    .is_some_and(|max| watcher.cycles() >= max)
                {
                    debug!(cycles = watcher.cycles(), "cycle limit reached");
                    break;
                }
                let batch = watcher.poll_once();
                let failed = batch.is_err();
                if tx.send(batch).is_err() {
                    debug!("consumer went away, stopping watcher");
                    break;
                }
                if failed {
                    break;
                }
                pause(interval, &stop);
            }
            watcher.close();
        })
        .map_err(|err| UwError::Runtime {
            details: format!("failed to spawn watcher thread: {err}"),
        })?;

    Ok(WatchHandle {
        batches: rx,
        shutdown,
        thread: Some(thread),
    })
}

/// Sleep for `interval` in slices, returning early once `stop` is set.
///
/// An interval past the clock's range waits for `stop` alone.
fn pause(interval: Duration, stop: &AtomicBool) {
    let deadline = Instant::now().checked_add(interval);
    loop {
        if stop.load(Ordering::SeqCst) {
            return;
        }
        let remaining = deadline.map_or(SHUTDOWN_POLL, |deadline| {
            deadline.saturating_duration_since(Instant::now())
        });
        if remaining.is_zero() {
            return;
        }
        thread::sleep(remaining.min(SHUTDOWN_POLL));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StateStore;
    use crate::units::model::TransitionKind;
    use crate::units::model::fixtures::unit;
    use crate::units::replay::{ReplaySource, ReplayStep};

    fn open(dir: &tempfile::TempDir, source: ReplaySource, interval: Duration) -> Watcher<ReplaySource> {
        let path = dir.path().join("systemd.state");
        std::fs::write(&path, b"").unwrap();
        Watcher::open(source, StateStore::new(path), interval, None).unwrap()
    }

    #[test]
    fn delivers_batches_in_cycle_order() {
        let dir = tempfile::tempdir().unwrap();
        let source = ReplaySource::new([
            vec![unit("a", "active", "loaded", "running")],
            vec![],
        ]);
        let watcher = open(&dir, source, Duration::from_millis(1));
        let handle = spawn_watcher(
            watcher,
            Arc::new(AtomicBool::new(false)),
            RunnerOptions {
                max_cycles: Some(3),
                ..RunnerOptions::default()
            },
        )
        .unwrap();

        let kinds: Vec<Vec<TransitionKind>> = handle
            .batches()
            .map(|batch| batch.unwrap().into_iter().map(|t| t.kind).collect())
            .collect();
        assert_eq!(
            kinds,
            [
                vec![TransitionKind::Added],
                vec![TransitionKind::Removed],
                vec![]
            ]
        );
        handle.join().unwrap();
    }

    #[test]
    fn error_ends_the_queue() {
        let dir = tempfile::tempdir().unwrap();
        let source = ReplaySource::from_steps([
            ReplayStep::Listing(vec![]),
            ReplayStep::Fail("bus closed".to_string()),
        ]);
        let watcher = open(&dir, source, Duration::from_millis(1));
        let handle =
            spawn_watcher(watcher, Arc::new(AtomicBool::new(false)), RunnerOptions::default())
                .unwrap();

        let results: Vec<_> = handle.batches().collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert_eq!(results[1].as_ref().unwrap_err().code(), "UW-2001");
        handle.join().unwrap();
    }

    #[test]
    fn shutdown_interrupts_the_pause() {
        let dir = tempfile::tempdir().unwrap();
        let watcher = open(&dir, ReplaySource::new([vec![]]), Duration::from_secs(3600));
        let handle =
            spawn_watcher(watcher, Arc::new(AtomicBool::new(false)), RunnerOptions::default())
                .unwrap();

        let first = handle.batches().next().unwrap().unwrap();
        assert!(first.is_empty());
        let started = Instant::now();
        handle.request_shutdown();
        assert!(handle.batches().next().is_none());
        handle.join().unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn pause_survives_intervals_past_the_clock_range() {
        let stop = AtomicBool::new(true);
        pause(Duration::MAX, &stop);

        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let setter = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            flag.store(true, Ordering::SeqCst);
        });
        let started = Instant::now();
        pause(Duration::from_secs(u64::MAX), &stop);
        setter.join().unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
