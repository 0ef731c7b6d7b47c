use crate::context::{Cached, CachedEntity, Context};
use crate::error::Result;
use crate::writer::Tuple;
use normalize_trap_core::{Key, Label, SymbolId, TrapStackBehavior};

/// A namespace, identified by its qualified name. The global namespace has no
/// parent and a fixed key.
pub struct Namespace {
    symbol: SymbolId,
    name: String,
    parent: Option<Label>,
}

impl Namespace {
    pub fn create(cx: &mut Context<'_>, symbol: SymbolId) -> Result<Cached<Namespace>> {
        cx.get_or_create_by_value(symbol, |cx, symbol| {
            let data = cx.model().symbol(symbol)?;
            let parent = match data.containing_namespace {
                Some(parent) => Some(Namespace::create(cx, parent)?.label()),
                None => None,
            };
            Ok(Namespace {
                symbol,
                name: data.name.clone(),
                parent,
            })
        })
    }

    pub fn is_global(&self) -> bool {
        self.parent.is_none() && self.name.is_empty()
    }
}

impl CachedEntity for Namespace {
    fn id(&self) -> Key {
        match self.parent {
            Some(parent) => Key::new()
                .label(parent)
                .text(".")
                .text(&self.name)
                .text(";namespace"),
            None if self.is_global() => Key::literal(";namespace"),
            None => Key::new().text(&self.name).text(";namespace"),
        }
    }

    fn populate(&self, cx: &mut Context<'_>, label: Label) -> Result<()> {
        cx.emit(Tuple::new("namespaces").label(label).str(&self.name))?;
        if let Some(parent) = self.parent {
            cx.emit(Tuple::new("parent_namespace").label(label).label(parent))?;
        }
        Ok(())
    }

    fn trap_stack_behavior(&self) -> TrapStackBehavior {
        TrapStackBehavior::NoScope
    }

    fn symbol(&self) -> Option<SymbolId> {
        Some(self.symbol)
    }
}
