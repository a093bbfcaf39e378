//! Snapshot differ: previous snapshot + fresh listing -> next snapshot and
//! transitions. Pure; no I/O.

use std::collections::HashSet;

use crate::units::model::{Snapshot, Transition, TransitionKind, UnitRecord};

/// Result of one diff pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffOutcome {
    pub next: Snapshot,
    /// Additions and changes in listing order, then removals in key order.
    pub transitions: Vec<Transition>,
}

impl DiffOutcome {
    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        self.transitions.is_empty()
    }
}

/// Compute the delta between `previous` and `current` in linear time.
///
/// If the listing repeats a key, the first occurrence wins and later ones
/// are ignored.
#[must_use]
pub fn diff(previous: &Snapshot, current: Vec<UnitRecord>) -> DiffOutcome {
    let mut seen = HashSet::with_capacity(current.len());
    let mut next = Snapshot::new();
    let mut transitions = Vec::new();

    for unit in current {
        if !seen.insert(unit.key().to_string()) {
            continue;
        }
        match previous.get(unit.key()) {
            None => transitions.push(Transition::new(TransitionKind::Added, unit.clone())),
            Some(known) if *known != unit => {
                transitions.push(Transition::new(TransitionKind::Changed, unit.clone()));
            }
            Some(_) => {}
        }
        next.insert(unit);
    }

    transitions.extend(
        previous
            .iter()
            .filter(|known| !seen.contains(known.key()))
            .map(|known| Transition::new(TransitionKind::Removed, known.clone())),
    );

    DiffOutcome { next, transitions }
}
