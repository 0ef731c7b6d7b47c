use super::File;
use crate::context::Context;
use crate::error::Result;
use crate::writer::Tuple;
use normalize_trap_core::Label;

/// The compilation that produced the model. Never shared between units, so it
/// gets a fresh label instead of a key.
pub struct Compilation {
    label: Label,
}

impl Compilation {
    pub fn extract(cx: &mut Context<'_>) -> Result<Compilation> {
        let info = &cx.model().compilation;
        let label = cx.fresh_label()?;
        cx.emit(Tuple::new("compilations").label(label).str(&info.cwd))?;

        for (index, arg) in info.args.iter().enumerate() {
            cx.emit(
                Tuple::new("compilation_args")
                    .label(label)
                    .int(index as i64)
                    .str(arg),
            )?;
        }
        for (index, tree) in cx.model().trees.iter().enumerate() {
            let file = File::create(cx, &tree.path)?;
            cx.emit(
                Tuple::new("compilation_compiling_files")
                    .label(label)
                    .int(index as i64)
                    .label(file.label()),
            )?;
        }
        for (index, reference) in info.references.iter().enumerate() {
            let file = File::create(cx, reference)?;
            cx.emit(
                Tuple::new("compilation_referencing_files")
                    .label(label)
                    .int(index as i64)
                    .label(file.label()),
            )?;
        }
        Ok(Compilation { label })
    }

    pub fn label(&self) -> Label {
        self.label
    }
}
