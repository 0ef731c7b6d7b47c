use super::{File, create_type};
use crate::context::{Cached, CachedEntity, Context};
use crate::error::Result;
use crate::scope::ExtractionScope;
use crate::writer::Tuple;
use normalize_trap_core::{Key, Label, TrapStackBehavior};

/// A compiled assembly.
///
/// Populating the assembly of an assembly-scoped unit extracts every top-level
/// type it owns; in any other unit it is just a reference.
pub struct Assembly {
    name: String,
    path: String,
    file: Label,
}

impl Assembly {
    pub fn create(cx: &mut Context<'_>, name: &str) -> Result<Cached<Assembly>> {
        cx.get_or_create_by_value(name, |cx, name| {
            let path = cx
                .extractor()
                .assembly_file(name)
                .or_else(|| cx.model().assembly(name).map(|a| a.path.clone()))
                .unwrap_or_default()
                .replace('\\', "/");
            let file = File::create(cx, &path)?;
            Ok(Assembly {
                name: name.to_string(),
                path,
                file: file.label(),
            })
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl CachedEntity for Assembly {
    fn id(&self) -> Key {
        Key::new()
            .text(&self.name)
            .text("#file:///")
            .text(self.path.trim_start_matches('/'))
            .text(";assembly")
    }

    fn populate(&self, cx: &mut Context<'_>, label: Label) -> Result<()> {
        cx.emit(
            Tuple::new("assemblies")
                .label(label)
                .label(self.file)
                .str(&self.name),
        )?;

        let owned = matches!(cx.scope(), ExtractionScope::Assembly(scope) if scope.assembly == self.name);
        if !owned {
            return Ok(());
        }
        let model = cx.model();
        for id in model.assembly_symbols(&self.name) {
            let symbol = model.symbol(id)?;
            let top_level = symbol.kind.is_type()
                && symbol.containing_type.is_none()
                && symbol.original_definition.is_none_or(|orig| orig == id);
            if top_level {
                cx.try_extract(None, Some(id), |cx| create_type(cx, id).map(drop))?;
            }
        }
        Ok(())
    }

    fn trap_stack_behavior(&self) -> TrapStackBehavior {
        TrapStackBehavior::NoScope
    }
}
