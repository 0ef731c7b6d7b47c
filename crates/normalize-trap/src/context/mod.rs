//! The extraction context: all state for one output unit.
//!
//! There is one `Context` per trap file. It owns the label counter, the two
//! entity caches, the population queue and the tag stack, and it is confined to
//! a single thread (entities are shared through `Rc`, so `Context` is `!Send`).
//!
//! Entities are created through one of two caches:
//! - [`Context::get_or_create_by_identity`] for entities identified by a
//!   frontend object (a symbol, a tree, a node)
//! - [`Context::get_or_create_by_value`] for entities without a stable object,
//!   identified by their rendered [`Key`]
//!
//! A new entity gets a label, a define-label record, and (if it needs one) a
//! population scheduled according to its [`TrapStackBehavior`].

mod scheduler;
mod stack;

pub use scheduler::{PopulationPlan, plan};

use crate::error::{ExtractionError, Result};
use crate::extractor::Extractor;
use crate::model::{SemanticModel, SymbolLocation};
use crate::scope::ExtractionScope;
use crate::writer::{TrapOutput, TrapWriter, Tuple};
use normalize_trap_core::{
    Key, Label, Message, NodeId, SourceObject, SymbolId, TrapStackBehavior,
};
use scheduler::Deferred;
use std::any::{Any, TypeId};
use std::collections::{HashMap, HashSet, VecDeque};
use std::ops::Deref;
use std::rc::Rc;

/// An entity whose facts are emitted at most once per output unit.
///
/// Construction (the factory passed to the context) must be cheap and must not
/// emit anything; all facts are emitted from [`CachedEntity::populate`].
pub trait CachedEntity: 'static {
    /// The identity key. Must be deterministic given the entity's fields, and
    /// may only refer to other entities through their labels.
    fn id(&self) -> Key;

    /// Emit this entity's facts. Called at most once, with the entity's label.
    fn populate(&self, cx: &mut Context<'_>, label: Label) -> Result<()>;

    fn needs_population(&self) -> bool {
        true
    }

    fn trap_stack_behavior(&self) -> TrapStackBehavior;

    /// Location used in the duplication guard key. `None` means generated.
    fn reporting_location(&self) -> Option<SymbolLocation> {
        None
    }

    /// Frontend symbol this entity was created from, for diagnostics.
    fn symbol(&self) -> Option<SymbolId> {
        None
    }
}

/// A cached entity together with its label.
pub struct Cached<E> {
    label: Label,
    entity: Rc<E>,
}

impl<E> Cached<E> {
    pub fn label(&self) -> Label {
        self.label
    }

    pub fn entity(&self) -> &Rc<E> {
        &self.entity
    }
}

impl<E> Clone for Cached<E> {
    fn clone(&self) -> Self {
        Self {
            label: self.label,
            entity: Rc::clone(&self.entity),
        }
    }
}

impl<E> Deref for Cached<E> {
    type Target = E;

    fn deref(&self) -> &E {
        &self.entity
    }
}

impl<E> std::fmt::Debug for Cached<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cached").field("label", &self.label).finish()
    }
}

/// Counters describing a finished unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContextStats {
    pub labels: u32,
    pub populated: usize,
    pub deferred: usize,
    pub records: usize,
}

/// Per-output-unit extraction state.
pub struct Context<'a> {
    extractor: &'a Extractor,
    model: &'a SemanticModel,
    scope: ExtractionScope,
    writer: TrapWriter,
    next_id: u32,
    /// Reference cache: (entity type, source object) -> `Cached<E>`
    object_cache: HashMap<(TypeId, SourceObject), Box<dyn Any>>,
    /// Structural cache: rendered key -> label
    value_cache: HashMap<String, Label>,
    /// Every defined key, for label collision checks
    key_labels: HashMap<String, Label>,
    extracted_generics: HashSet<Label>,
    queue: VecDeque<Deferred<'a>>,
    tag_stack: Vec<Key>,
    depth: usize,
    max_depth: usize,
    stats: ContextStats,
}

impl<'a> Context<'a> {
    pub fn new(
        extractor: &'a Extractor,
        model: &'a SemanticModel,
        scope: ExtractionScope,
        writer: TrapWriter,
    ) -> Self {
        Self {
            extractor,
            model,
            scope,
            writer,
            next_id: 1,
            object_cache: HashMap::new(),
            value_cache: HashMap::new(),
            key_labels: HashMap::new(),
            extracted_generics: HashSet::new(),
            queue: VecDeque::new(),
            tag_stack: Vec::new(),
            depth: 0,
            max_depth: extractor.config().max_recursion_depth,
            stats: ContextStats::default(),
        }
    }

    pub fn extractor(&self) -> &'a Extractor {
        self.extractor
    }

    pub fn model(&self) -> &'a SemanticModel {
        self.model
    }

    pub fn scope(&self) -> &ExtractionScope {
        &self.scope
    }

    // =========================================================================
    // Labels
    // =========================================================================

    fn new_label(&mut self) -> Label {
        let label = Label::new(self.next_id);
        self.next_id += 1;
        self.stats.labels += 1;
        label
    }

    /// Allocate a label that is never shared with another entity (`#n=*`).
    pub fn fresh_label(&mut self) -> Result<Label> {
        let label = self.new_label();
        self.writer.fresh_label(label)?;
        Ok(label)
    }

    /// Allocate and define a label for an uncached entity.
    pub fn define_label(&mut self, key: &Key) -> Result<Label> {
        let label = self.new_label();
        self.writer.define_label(label, key)?;
        Ok(label)
    }

    fn register_key(&mut self, rendered: String, label: Label) {
        if !self.extractor.config().check_label_collisions {
            return;
        }
        if self.key_labels.contains_key(&rendered) {
            self.message(Message::warning(format!("Label collision for {}", rendered)));
        } else {
            self.key_labels.insert(rendered, label);
        }
    }

    // =========================================================================
    // Entity caches
    // =========================================================================

    /// Get the entity created from `source`, or create it with `factory`.
    ///
    /// One label and one population per (entity type, source object) for the
    /// lifetime of the context. The factory runs again only if it re-enters
    /// creation of its own object, and then its result is dropped.
    pub fn get_or_create_by_identity<E: CachedEntity>(
        &mut self,
        source: impl Into<SourceObject>,
        factory: impl FnOnce(&mut Self) -> Result<E>,
    ) -> Result<Cached<E>> {
        let cache_key = (TypeId::of::<E>(), source.into());
        if let Some(cached) = self
            .object_cache
            .get(&cache_key)
            .and_then(|c| c.downcast_ref::<Cached<E>>())
        {
            return Ok(cached.clone());
        }

        self.with_stack_guard(|cx| {
            let entity = Rc::new(factory(cx)?);
            // The factory may have reached this object again through an inline
            // population; the entity created there wins.
            if let Some(existing) = cx
                .object_cache
                .get(&cache_key)
                .and_then(|c| c.downcast_ref::<Cached<E>>())
            {
                return Ok(existing.clone());
            }
            let cached = Cached {
                label: cx.new_label(),
                entity,
            };
            cx.object_cache.insert(cache_key, Box::new(cached.clone()));

            let key = cached.id();
            cx.register_key(key.render(), cached.label);
            cx.writer.define_label(cached.label, &key)?;

            if cached.needs_population() {
                cx.populate(cached.symbol(), cached.clone())?;
            }
            Ok(cached)
        })
    }

    /// Create an entity from `init` and deduplicate it by its rendered key.
    ///
    /// `init` may be an absent value (`None`); the entity's key decides identity.
    /// The returned entity is the one just built, carrying the label of the
    /// first entity that rendered the same key.
    pub fn get_or_create_by_value<E: CachedEntity, I>(
        &mut self,
        init: I,
        factory: impl FnOnce(&mut Self, I) -> Result<E>,
    ) -> Result<Cached<E>> {
        self.with_stack_guard(|cx| {
            let entity = Rc::new(factory(cx, init)?);
            let key = entity.id();
            let rendered = key.render();
            if let Some(&label) = cx.value_cache.get(&rendered) {
                return Ok(Cached { label, entity });
            }

            let cached = Cached {
                label: cx.new_label(),
                entity,
            };
            cx.value_cache.insert(rendered.clone(), cached.label);
            cx.register_key(rendered, cached.label);
            cx.writer.define_label(cached.label, &key)?;

            if cached.needs_population() {
                cx.populate(cached.symbol(), cached.clone())?;
            }
            Ok(cached)
        })
    }

    /// Dispatch on the source object: present objects use the reference cache,
    /// an absent one the structural cache.
    pub fn create_entity<E: CachedEntity>(
        &mut self,
        source: Option<SourceObject>,
        factory: impl FnOnce(&mut Self) -> Result<E>,
    ) -> Result<Cached<E>> {
        match source {
            Some(source) => self.get_or_create_by_identity(source, factory),
            None => self.get_or_create_by_value((), |cx, ()| factory(cx)),
        }
    }

    /// Whether generic contents of `label` should be extracted now.
    ///
    /// Only the first call for a label returns true. Generics cannot be extracted
    /// top-down, so whoever reaches them first extracts them.
    pub fn extract_generics(&mut self, label: Label) -> bool {
        self.extracted_generics.insert(label)
    }

    // =========================================================================
    // Scope
    // =========================================================================

    /// Whether `symbol` is defined by this unit: either the scope contains it, or
    /// it is a constructed generic (which has no owning unit).
    pub fn defines(&self, symbol: SymbolId) -> Result<bool> {
        let data = self.model.symbol(symbol)?;
        let constructed = data.original_definition.is_some_and(|orig| orig != symbol);
        Ok(constructed || self.scope.in_scope(data))
    }

    pub fn defines_file(&self, path: &str) -> bool {
        self.scope.in_file_scope(path)
    }

    // =========================================================================
    // Output
    // =========================================================================

    pub fn emit(&mut self, tuple: Tuple) -> Result<()> {
        Ok(self.writer.tuple(tuple)?)
    }

    pub fn stats(&self) -> ContextStats {
        ContextStats {
            records: self.writer.records(),
            ..self.stats
        }
    }

    /// Finish the trap output. Pending deferred work is discarded; call
    /// [`Context::populate_all`] first.
    pub fn finish(self) -> Result<TrapOutput> {
        if !self.queue.is_empty() {
            tracing::debug!(pending = self.queue.len(), "discarding deferred population");
        }
        Ok(self.writer.finish()?)
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    pub fn message(&self, message: Message) {
        self.extractor.message(message);
    }

    /// Signal an error in the program model. Ignored for standalone extraction,
    /// where the model is known to be incomplete.
    pub fn model_error(&self, symbol: Option<SymbolId>, message: impl Into<String>) -> Result<()> {
        if self.extractor.standalone() {
            return Ok(());
        }
        Err(ExtractionError::Internal {
            message: message.into(),
            symbol,
            node: None,
        })
    }

    /// Run `f`, reporting a recoverable failure instead of returning it.
    ///
    /// Fatal errors still propagate so the unit can be aborted.
    pub fn try_extract(
        &mut self,
        node: Option<NodeId>,
        symbol: Option<SymbolId>,
        f: impl FnOnce(&mut Self) -> Result<()>,
    ) -> Result<()> {
        let result = f(self);
        self.recover(result, node, symbol)
    }

    fn recover(
        &self,
        result: Result<()>,
        node: Option<NodeId>,
        symbol: Option<SymbolId>,
    ) -> Result<()> {
        match result {
            Err(e) if !e.is_fatal() => {
                self.report_error(&e, node, symbol);
                Ok(())
            }
            other => other,
        }
    }

    /// Report `error`, attributed to `symbol` and `node` when given, else to
    /// whatever the error itself names.
    pub fn report_error(
        &self,
        error: &ExtractionError,
        node: Option<NodeId>,
        symbol: Option<SymbolId>,
    ) {
        let mut message = match error {
            ExtractionError::Internal { message, .. } => Message::error(message.clone()),
            other => Message::error("Uncaught exception").with_cause(other.to_string()),
        };
        if let Some(node) = node.or(error.node()) {
            message = message.with_node(node.to_string());
        }
        if let Some(symbol) = symbol.or(error.symbol()) {
            message = message.with_symbol(
                self.model.display_name(symbol),
                self.model.describe_locations(symbol),
            );
        }
        self.message(message);
    }
}
