//! Labels: the short handle an entity is known by in the trap file.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An opaque, per-output-unit handle for an entity.
///
/// Labels are allocated from a counter owned by one extraction context and are
/// rendered as `#n`. They are only meaningful inside the trap file they were
/// defined in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Label(u32);

impl Label {
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
