//! Unit model, snapshot differ, and the sources that list units.

pub mod diff;
pub mod model;
pub mod replay;
pub mod source;

pub use diff::{DiffOutcome, diff};
pub use model::{Snapshot, Transition, TransitionKind, UnitRecord};
pub use source::{SystemctlSource, UnitSource};
