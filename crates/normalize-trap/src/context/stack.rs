//! Recursion depth and trap stack bookkeeping.

use super::Context;
use crate::error::{ExtractionError, Result};
use normalize_trap_core::Key;

impl<'a> Context<'a> {
    /// Run `f` one level deeper in entity creation.
    ///
    /// Exceeding the configured depth means pathological input (unbounded
    /// generic nesting, say) and fails with a fatal error. The level is released
    /// on every exit path.
    pub(crate) fn with_stack_guard<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        if self.depth >= self.max_depth {
            return Err(ExtractionError::RecursionLimit {
                max: self.max_depth,
            });
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    /// Current entity creation depth.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Run `action` inside a duplication guard keyed by `key`.
    ///
    /// Emits `.push key` before and `.pop` after the action, including when the
    /// action fails. In assembly scope the action runs without a guard; guarded
    /// assembly traps lose method bodies depending on trap import order.
    pub fn with_duplication_guard<T>(
        &mut self,
        key: Key,
        action: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        if self.scope.is_assembly() {
            return action(self);
        }

        self.writer.push(&key)?;
        self.tag_stack.push(key);
        let result = action(self);
        let popped = self.writer.pop();
        self.tag_stack.pop();

        let value = result?;
        popped?;
        Ok(value)
    }

    /// The innermost active duplication guard.
    pub fn current_guard(&self) -> Option<&Key> {
        self.tag_stack.last()
    }

    pub fn in_guard(&self) -> bool {
        !self.tag_stack.is_empty()
    }
}
