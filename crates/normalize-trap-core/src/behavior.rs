use serde::{Deserialize, Serialize};

/// How an entity's population interacts with the trap stack (`.push`/`.pop`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrapStackBehavior {
    /// Must not be populated inside a duplication guard.
    NoScope,
    /// Establishes its own duplication guard around its population.
    PushesScope,
    /// Must be populated inside a duplication guard.
    NeedsScope,
    /// Can be populated inside or outside a duplication guard.
    OptionalScope,
}

impl TrapStackBehavior {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrapStackBehavior::NoScope => "no_scope",
            TrapStackBehavior::PushesScope => "pushes_scope",
            TrapStackBehavior::NeedsScope => "needs_scope",
            TrapStackBehavior::OptionalScope => "optional_scope",
        }
    }
}
