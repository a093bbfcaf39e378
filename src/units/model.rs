//! Unit status records, the keyed snapshot, and emitted transitions.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// One unit as reported by the service manager.
///
/// Compared field by field: any difference in any field is a change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitRecord {
    /// Primary unit name, e.g. `sshd.service`.
    pub name: String,
    pub description: String,
    /// `loaded`, `not-found`, `masked`, ...
    pub load_state: String,
    /// `active`, `inactive`, `activating`, `deactivating`, `failed`.
    pub active_state: String,
    /// Unit-type specific state, e.g. `running`, `exited`, `dead`.
    pub sub_state: String,
    /// Unit this one follows in state, empty if none.
    pub followed: String,
    /// Bus object path; the stable key of the unit.
    pub path: String,
    /// Queued job id, 0 if none.
    pub job_id: u32,
    pub job_type: String,
    pub job_path: String,
}

impl UnitRecord {
    /// Key the snapshot is indexed by.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.path
    }
}

/// Last known state of every unit, keyed by [`UnitRecord::key`].
///
/// Ordered so removals and serialization are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    units: BTreeMap<String, UnitRecord>,
}

impl Snapshot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&UnitRecord> {
        self.units.get(key)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.units.contains_key(key)
    }

    /// Insert or replace a record wholesale. Returns the replaced record.
    pub fn insert(&mut self, unit: UnitRecord) -> Option<UnitRecord> {
        self.units.insert(unit.key().to_string(), unit)
    }

    /// Records in key order.
    pub fn iter(&self) -> impl Iterator<Item = &UnitRecord> {
        self.units.values()
    }
}

impl FromIterator<UnitRecord> for Snapshot {
    fn from_iter<I: IntoIterator<Item = UnitRecord>>(iter: I) -> Self {
        let mut snapshot = Self::new();
        for unit in iter {
            snapshot.insert(unit);
        }
        snapshot
    }
}

/// What happened to a unit between two polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionKind {
    Added,
    Changed,
    Removed,
}

impl TransitionKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Changed => "changed",
            Self::Removed => "removed",
        }
    }
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A detected change. For `Removed`, `unit` is the last known record.
///
/// Transient: only the resulting [`Snapshot`] is ever persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub kind: TransitionKind,
    pub unit: UnitRecord,
}

impl Transition {
    #[must_use]
    pub const fn new(kind: TransitionKind, unit: UnitRecord) -> Self {
        Self { kind, unit }
    }
}

/// Activity-log line: `<name> active=<a> load=<l> sub=<s>`, or
/// `<name> deleted` for removals.
impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TransitionKind::Removed => write!(f, "{} deleted", self.unit.name),
            TransitionKind::Added | TransitionKind::Changed => write!(
                f,
                "{} active={} load={} sub={}",
                self.unit.name, self.unit.active_state, self.unit.load_state, self.unit.sub_state
            ),
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::UnitRecord;

    /// Minimal record keyed by a synthetic bus path.
    pub fn unit(name: &str, active: &str, load: &str, sub: &str) -> UnitRecord {
        UnitRecord {
            name: name.to_string(),
            description: format!("{name} unit"),
            load_state: load.to_string(),
            active_state: active.to_string(),
            sub_state: sub.to_string(),
            path: format!("/org/freedesktop/systemd1/unit/{name}"),
            ..UnitRecord::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::unit;
    use super::*;

    #[test]
    fn records_differ_on_any_field() {
        let a = unit("a", "active", "loaded", "running");
        let mut b = a.clone();
        assert_eq!(a, b);
        b.job_id = 7;
        assert_ne!(a, b);
    }

    #[test]
    fn snapshot_iterates_in_key_order() {
        let snapshot: Snapshot = [
            unit("zeta", "active", "loaded", "running"),
            unit("alpha", "active", "loaded", "running"),
        ]
        .into_iter()
        .collect();
        let names: Vec<_> = snapshot.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, ["alpha", "zeta"]);
    }

    #[test]
    fn transitions_render_like_activity_log() {
        let added = Transition::new(
            TransitionKind::Added,
            unit("sshd.service", "active", "loaded", "running"),
        );
        assert_eq!(
            added.to_string(),
            "sshd.service active=active load=loaded sub=running"
        );
        let removed = Transition::new(TransitionKind::Removed, added.unit.clone());
        assert_eq!(removed.to_string(), "sshd.service deleted");
    }

    #[test]
    fn transition_kind_serializes_lowercase() {
        let json = serde_json::to_string(&TransitionKind::Changed).unwrap();
        assert_eq!(json, "\"changed\"");
    }
}
