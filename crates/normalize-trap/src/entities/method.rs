use super::{Location, create_type, extract_type_arguments};
use crate::context::{Cached, CachedEntity, Context};
use crate::error::{ExtractionError, Result};
use crate::model::{SymbolKind, SymbolLocation};
use crate::writer::Tuple;
use normalize_trap_core::{Key, Label, SymbolId, TrapStackBehavior};

/// A method, constructor or accessor. Identified by its declaring type, name
/// and parameter types.
pub struct Method {
    symbol: SymbolId,
    kind: SymbolKind,
    name: String,
    declaring_symbol: SymbolId,
    declaring: Label,
    return_type: Option<Label>,
    parameters: Vec<Label>,
    location: Option<SymbolLocation>,
}

impl Method {
    pub fn create(cx: &mut Context<'_>, symbol: SymbolId) -> Result<Cached<Method>> {
        cx.get_or_create_by_identity(symbol, |cx| {
            let data = cx.model().symbol(symbol)?;
            let Some(declaring_symbol) = data.containing_type else {
                return Err(ExtractionError::internal_at(symbol, "Method without a containing type"));
            };
            let declaring = create_type(cx, declaring_symbol)?;
            let return_type = match data.return_type {
                Some(ty) => Some(create_type(cx, ty)?),
                None => None,
            };
            let mut parameters = Vec::with_capacity(data.parameters.len());
            for parameter in &data.parameters {
                parameters.push(create_type(cx, parameter.ty)?);
            }
            Ok(Method {
                symbol,
                kind: data.kind,
                name: data.name.clone(),
                declaring_symbol,
                declaring,
                return_type,
                parameters,
                location: data.locations.first().copied(),
            })
        })
    }
}

impl CachedEntity for Method {
    fn id(&self) -> Key {
        Key::new()
            .label(self.declaring)
            .text(".")
            .text(&self.name)
            .text("(")
            .join(self.parameters.iter().copied(), ",", Key::label)
            .text(");method")
    }

    fn populate(&self, cx: &mut Context<'_>, label: Label) -> Result<()> {
        cx.emit(
            Tuple::new("methods")
                .label(label)
                .str(&self.name)
                .label(self.declaring),
        )?;
        if let Some(return_type) = self.return_type {
            cx.emit(Tuple::new("returns").label(label).label(return_type))?;
        }

        let data = cx.model().symbol(self.symbol)?;
        for (index, (parameter, &ty)) in data.parameters.iter().zip(&self.parameters).enumerate() {
            let param = cx.fresh_label()?;
            cx.emit(
                Tuple::new("params")
                    .label(param)
                    .str(&parameter.name)
                    .label(ty)
                    .int(index as i64)
                    .label(label),
            )?;
        }

        extract_type_arguments(cx, self.declaring_symbol, self.declaring)?;

        if self.kind == SymbolKind::Accessor {
            let Some(owner) = data.associated_symbol else {
                return cx.model_error(Some(self.symbol), "Unhandled accessor associated symbol");
            };
            let owner = cx.model().display_name(owner);
            cx.emit(Tuple::new("accessors").label(label).str(owner))?;
        }

        if cx.defines(self.symbol)? {
            for &location in &data.locations {
                let location = Location::create(cx, Some(location))?;
                cx.emit(
                    Tuple::new("method_location")
                        .label(label)
                        .label(location.label()),
                )?;
            }
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
