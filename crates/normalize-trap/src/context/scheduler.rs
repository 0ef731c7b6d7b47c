//! Population scheduling.
//!
//! Populating an entity usually creates more entities, which populate in turn.
//! Doing all of that on the call stack would recurse as deep as the program
//! graph, so some populations are deferred to a FIFO queue that
//! [`Context::populate_all`] drains. Which ones is decided by [`plan`], from the
//! entity's [`TrapStackBehavior`] and whether a duplication guard is active.

use super::{Cached, CachedEntity, Context};
use crate::entities::Location;
use crate::error::Result;
use normalize_trap_core::{Key, Message, SymbolId, TrapStackBehavior};

pub(crate) type Action<'a> = Box<dyn FnOnce(&mut Context<'a>) -> Result<()> + 'a>;

/// Queued work, with the guard that was active when it was queued.
pub(crate) struct Deferred<'a> {
    pub(crate) guard: Option<Key>,
    pub(crate) symbol: Option<SymbolId>,
    pub(crate) action: Action<'a>,
}

/// How one population should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopulationPlan {
    /// Run under a new duplication guard keyed by the entity.
    pub duplication_guard: bool,
    /// Queue instead of running inline.
    pub deferred: bool,
    /// The entity requires a guard but none is active.
    pub missing_guard: bool,
}

/// Decide how to populate an entity with `behavior` when `guard_active` says
/// whether the tag stack is non-empty.
pub fn plan(behavior: TrapStackBehavior, guard_active: bool) -> PopulationPlan {
    let (duplication_guard, deferred, missing_guard) = match behavior {
        TrapStackBehavior::NeedsScope => (false, false, !guard_active),
        TrapStackBehavior::NoScope => (false, guard_active, false),
        TrapStackBehavior::OptionalScope => (false, false, false),
        TrapStackBehavior::PushesScope => (true, guard_active, false),
    };
    PopulationPlan {
        duplication_guard,
        deferred,
        missing_guard,
    }
}

impl<'a> Context<'a> {
    /// Populate `entity` now or later, as its trap stack behavior requires.
    ///
    /// Only fatal errors are returned; anything else is reported and attributed
    /// to `symbol`.
    pub(crate) fn populate<E: CachedEntity>(
        &mut self,
        symbol: Option<SymbolId>,
        entity: Cached<E>,
    ) -> Result<()> {
        let schedule = plan(entity.trap_stack_behavior(), self.in_guard());
        if schedule.missing_guard {
            let mut message = Message::error("Tag stack unexpectedly empty");
            if let Some(symbol) = symbol {
                message = message.with_symbol(
                    self.model.display_name(symbol),
                    self.model.describe_locations(symbol),
                );
            }
            self.message(message);
        }

        let action: Action<'a> = if schedule.duplication_guard {
            Box::new(move |cx: &mut Context<'a>| {
                let location = Location::create(cx, entity.reporting_location())?;
                let key = Key::new().label(entity.label()).label(location.label());
                cx.with_duplication_guard(key, |cx| cx.populate_now(symbol, &entity))
            })
        } else {
            Box::new(move |cx: &mut Context<'a>| cx.populate_now(symbol, &entity))
        };

        if schedule.deferred {
            self.stats.deferred += 1;
            self.queue.push_back(Deferred {
                guard: None,
                symbol,
                action,
            });
            Ok(())
        } else {
            let result = action(self);
            self.recover(result, None, symbol)
        }
    }

    fn populate_now<E: CachedEntity>(
        &mut self,
        symbol: Option<SymbolId>,
        entity: &Cached<E>,
    ) -> Result<()> {
        self.stats.populated += 1;
        let result = entity.entity().populate(self, entity.label());
        self.recover(result, None, symbol)
    }

    /// Queue `action` to run after the current work.
    ///
    /// If a duplication guard is active, the action runs under the same guard
    /// when it is eventually dequeued.
    pub fn populate_later(&mut self, action: impl FnOnce(&mut Context<'a>) -> Result<()> + 'a) {
        self.stats.deferred += 1;
        self.queue.push_back(Deferred {
            guard: self.current_guard().cloned(),
            symbol: None,
            action: Box::new(action),
        });
    }

    /// Run queued work until nothing is left.
    ///
    /// A recoverable failure in one action is reported and the loop moves on.
    /// A fatal failure stops the loop and is returned.
    pub fn populate_all(&mut self) -> Result<()> {
        while let Some(Deferred {
            guard,
            symbol,
            action,
        }) = self.queue.pop_front()
        {
            let result = match guard {
                Some(key) => self.with_duplication_guard(key, action),
                None => action(self),
            };
            self.recover(result, None, symbol)?;
        }
        Ok(())
    }

    /// Number of queued actions.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}
