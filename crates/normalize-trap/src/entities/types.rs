//! Named and pointer types.

use super::{Location, Method, Namespace};
use crate::context::{Cached, CachedEntity, Context};
use crate::error::{ExtractionError, Result};
use crate::model::{SymbolKind, SymbolLocation};
use crate::writer::Tuple;
use normalize_trap_core::{Key, Label, SymbolId, TrapStackBehavior};

/// Create the entity for any type symbol and return its label.
pub fn create_type(cx: &mut Context<'_>, symbol: SymbolId) -> Result<Label> {
    let data = cx.model().symbol(symbol)?;
    match data.kind {
        SymbolKind::Pointer => Ok(PointerType::create(cx, symbol)?.label()),
        kind if kind.is_type() => Ok(NamedType::create(cx, symbol)?.label()),
        kind => Err(ExtractionError::internal_at(
            symbol,
            format!("Expected a type but found a {}", kind.as_str()),
        )),
    }
}

/// Emit the type arguments of a constructed generic, once per label.
///
/// Whoever reaches a constructed type first does this: the type itself when it
/// is populated, or a member of it.
pub fn extract_type_arguments(cx: &mut Context<'_>, symbol: SymbolId, label: Label) -> Result<()> {
    let data = cx.model().symbol(symbol)?;
    let constructed = data.original_definition.is_some_and(|orig| orig != symbol);
    if !constructed || !cx.extract_generics(label) {
        return Ok(());
    }
    for (index, &argument) in data.type_arguments.iter().enumerate() {
        let argument = create_type(cx, argument)?;
        cx.emit(
            Tuple::new("type_arguments")
                .label(argument)
                .int(index as i64)
                .label(label),
        )?;
    }
    Ok(())
}

fn create_member(cx: &mut Context<'_>, member: SymbolId) -> Result<()> {
    let kind = cx.model().symbol(member)?.kind;
    if kind.is_type() {
        create_type(cx, member)?;
    } else if kind.is_method() {
        Method::create(cx, member)?;
    } else {
        cx.model_error(Some(member), format!("Unhandled {} member", kind.as_str()))?;
    }
    Ok(())
}

// =============================================================================
// Named types
// =============================================================================

/// A class, struct, interface, enum or delegate, or a constructed generic of
/// one. Unresolved types are named types of kind `error`.
pub struct NamedType {
    symbol: SymbolId,
    kind: SymbolKind,
    name: String,
    namespace: Option<Label>,
    container: Option<Label>,
    original: Option<Label>,
    type_arguments: Vec<Label>,
    location: Option<SymbolLocation>,
}

impl NamedType {
    pub fn create(cx: &mut Context<'_>, symbol: SymbolId) -> Result<Cached<NamedType>> {
        cx.get_or_create_by_identity(symbol, |cx| {
            let data = cx.model().symbol(symbol)?;
            let container = match data.containing_type {
                Some(container) => Some(create_type(cx, container)?),
                None => None,
            };
            let namespace = match data.containing_namespace {
                Some(ns) if container.is_none() => Some(Namespace::create(cx, ns)?.label()),
                _ => None,
            };
            let original = match data.original_definition {
                Some(orig) if orig != symbol => Some(create_type(cx, orig)?),
                _ => None,
            };
            let mut type_arguments = Vec::new();
            if original.is_some() {
                for &argument in &data.type_arguments {
                    type_arguments.push(create_type(cx, argument)?);
                }
            }
            Ok(NamedType {
                symbol,
                kind: data.kind,
                name: data.name.clone(),
                namespace,
                container,
                original,
                type_arguments,
                location: data.locations.first().copied(),
            })
        })
    }

    pub fn is_constructed(&self) -> bool {
        self.original.is_some()
    }
}

impl CachedEntity for NamedType {
    fn id(&self) -> Key {
        if let Some(original) = self.original {
            return Key::new()
                .label(original)
                .text("<")
                .join(self.type_arguments.iter().copied(), ",", Key::label)
                .text(">;type");
        }
        let key = match self.container.or(self.namespace) {
            Some(parent) => Key::new().label(parent).text("."),
            None => Key::new(),
        };
        key.text(&self.name).text(";type")
    }

    fn populate(&self, cx: &mut Context<'_>, label: Label) -> Result<()> {
        let kind = self.kind.type_kind().unwrap_or_default();
        cx.emit(Tuple::new("types").label(label).int(kind).str(&self.name))?;
        if let Some(namespace) = self.namespace {
            cx.emit(Tuple::new("parent_namespace").label(label).label(namespace))?;
        }
        if let Some(container) = self.container {
            cx.emit(Tuple::new("nested_types").label(label).label(container))?;
        }

        if self.kind == SymbolKind::Error {
            cx.extractor().missing_type(cx.model().display_name(self.symbol));
            return Ok(());
        }
        if let Some(original) = self.original {
            cx.emit(Tuple::new("constructed_from").label(label).label(original))?;
            return extract_type_arguments(cx, self.symbol, label);
        }
        if !cx.defines(self.symbol)? {
            return Ok(());
        }

        let data = cx.model().symbol(self.symbol)?;
        for &location in &data.locations {
            let location = Location::create(cx, Some(location))?;
            cx.emit(
                Tuple::new("type_location")
                    .label(label)
                    .label(location.label()),
            )?;
        }
        for &member in &data.members {
            cx.try_extract(None, Some(member), |cx| create_member(cx, member))?;
        }
        Ok(())
    }

    fn trap_stack_behavior(&self) -> TrapStackBehavior {
        TrapStackBehavior::PushesScope
    }

    fn reporting_location(&self) -> Option<SymbolLocation> {
        self.location
    }

    fn symbol(&self) -> Option<SymbolId> {
        Some(self.symbol)
    }
}

// =============================================================================
// Pointer types
// =============================================================================

pub struct PointerType {
    symbol: SymbolId,
    pointee: Label,
}

impl PointerType {
    pub fn create(cx: &mut Context<'_>, symbol: SymbolId) -> Result<Cached<PointerType>> {
        cx.get_or_create_by_identity(symbol, |cx| {
            let Some(pointee) = cx.model().symbol(symbol)?.pointed_at else {
                return Err(ExtractionError::internal_at(symbol, "Pointer type without pointee"));
            };
            Ok(PointerType {
                symbol,
                pointee: create_type(cx, pointee)?,
            })
        })
    }
}

impl CachedEntity for PointerType {
    fn id(&self) -> Key {
        Key::new().label(self.pointee).text("*;type")
    }

    fn populate(&self, cx: &mut Context<'_>, label: Label) -> Result<()> {
        let kind = SymbolKind::Pointer.type_kind().unwrap_or_default();
        let name = cx.model().display_name(self.symbol);
        cx.emit(Tuple::new("types").label(label).int(kind).str(name))?;
        cx.emit(
            Tuple::new("pointer_referent_type")
                .label(label)
                .label(self.pointee),
        )
    }

    fn trap_stack_behavior(&self) -> TrapStackBehavior {
        TrapStackBehavior::OptionalScope
    }

    fn symbol(&self) -> Option<SymbolId> {
        Some(self.symbol)
    }
}
