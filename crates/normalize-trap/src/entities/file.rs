use crate::context::{Cached, CachedEntity, Context};
use crate::error::Result;
use crate::writer::Tuple;
use normalize_trap_core::{Key, Label, TrapStackBehavior};

/// A source or binary file. The empty path is the generated file.
pub struct File {
    path: String,
}

impl File {
    pub fn create(cx: &mut Context<'_>, path: &str) -> Result<Cached<File>> {
        cx.get_or_create_by_value(path, |_, path| {
            Ok(File {
                path: path.replace('\\', "/"),
            })
        })
    }

    /// The file that generated code is attributed to.
    pub fn generated(cx: &mut Context<'_>) -> Result<Cached<File>> {
        Self::create(cx, "")
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl CachedEntity for File {
    fn id(&self) -> Key {
        Key::new().text(&self.path).text(";sourcefile")
    }

    fn populate(&self, cx: &mut Context<'_>, label: Label) -> Result<()> {
        cx.emit(Tuple::new("files").label(label).str(&self.path))?;
        if self.path.is_empty() || !cx.defines_file(&self.path) {
            return Ok(());
        }
        if let Some(tree) = cx.model().trees.iter().find(|t| t.path == self.path) {
            cx.emit(Tuple::new("numlines").label(label).int(tree.lines.into()))?;
        }
        Ok(())
    }

    fn trap_stack_behavior(&self) -> TrapStackBehavior {
        TrapStackBehavior::NoScope
    }
}
