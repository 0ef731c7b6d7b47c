//! Output units and the driver that extracts them.
//!
//! A unit is one trap file: a source file, an assembly, or the compilation
//! itself. Units are independent, so [`extract_all`] runs them in parallel, each
//! with its own [`Context`] and [`TrapWriter`].

use crate::config::{Compression, OutputConfig};
use crate::context::{Context, ContextStats};
use crate::entities::{Assembly, Compilation, File, extract_symbol};
use crate::error::{ExtractionError, Result};
use crate::extractor::Extractor;
use crate::model::SemanticModel;
use crate::scope::ExtractionScope;
use crate::writer::{TrapOutput, TrapWriter};
use normalize_trap_core::{Message, TreeId};
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Component, Path, PathBuf};

/// What one trap file covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitSpec {
    Source(TreeId),
    Assembly(String),
    Compilation,
}

impl UnitSpec {
    /// Every unit of a model: each tree, each assembly, then the compilation.
    pub fn all(model: &SemanticModel) -> Vec<UnitSpec> {
        let mut units: Vec<UnitSpec> = model.tree_ids().map(UnitSpec::Source).collect();
        units.extend(model.assemblies.iter().map(|a| UnitSpec::Assembly(a.name.clone())));
        units.push(UnitSpec::Compilation);
        units
    }

    /// Name of the unit, also used to place its trap file.
    pub fn name(&self, model: &SemanticModel) -> String {
        match self {
            UnitSpec::Source(tree) => model
                .tree(*tree)
                .map(|t| t.path.clone())
                .unwrap_or_else(|_| tree.to_string()),
            UnitSpec::Assembly(name) => name.clone(),
            UnitSpec::Compilation => "compilation".to_string(),
        }
    }

    fn scope(&self, extractor: &Extractor, model: &SemanticModel) -> Result<ExtractionScope> {
        Ok(match self {
            UnitSpec::Source(tree) => ExtractionScope::source(*tree, model.tree(*tree)?.path.clone()),
            UnitSpec::Assembly(name) => {
                ExtractionScope::assembly(name.clone(), assembly_path(extractor, model, name))
            }
            // The compilation belongs with the assembly it produces.
            UnitSpec::Compilation => match model.assemblies.first() {
                Some(output) => ExtractionScope::assembly(
                    output.name.clone(),
                    assembly_path(extractor, model, &output.name),
                ),
                None => ExtractionScope::assembly("", ""),
            },
        })
    }
}

fn assembly_path(extractor: &Extractor, model: &SemanticModel, name: &str) -> String {
    extractor
        .assembly_file(name)
        .or_else(|| model.assembly(name).map(|a| a.path.clone()))
        .unwrap_or_default()
}

/// Outcome of one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum UnitStatus {
    Extracted,
    /// A fatal error stopped extraction; the trap file holds what was produced
    /// before it.
    Aborted { reason: String },
    /// The trap file already existed and overwriting is disabled.
    Skipped,
}

/// What [`extract_unit`] produced.
#[derive(Debug)]
pub struct UnitResult {
    pub name: String,
    pub output: TrapOutput,
    pub status: UnitStatus,
    pub stats: ContextStats,
}

/// Per-unit line of the run report.
#[derive(Debug, Clone, Serialize)]
pub struct UnitReport {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(flatten)]
    pub status: UnitStatus,
    pub labels: u32,
    pub records: usize,
}

impl UnitReport {
    fn without_output(name: String, path: Option<PathBuf>, status: UnitStatus) -> Self {
        Self {
            name,
            path,
            status,
            labels: 0,
            records: 0,
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self.status, UnitStatus::Aborted { .. })
    }
}

/// Maps units to trap file paths under an output directory.
///
/// The unit name is mirrored below the directory (`src/a.cs` becomes
/// `<dir>/src/a.cs.trap.gz`); root, prefix and parent components are dropped.
#[derive(Debug, Clone)]
pub struct TrapLayout {
    pub dir: PathBuf,
    pub compression: Compression,
}

impl TrapLayout {
    pub fn new(dir: impl Into<PathBuf>, compression: Compression) -> Self {
        Self {
            dir: dir.into(),
            compression,
        }
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        let mut relative = PathBuf::new();
        for component in Path::new(name).components() {
            if let Component::Normal(part) = component {
                relative.push(part);
            }
        }
        if relative.as_os_str().is_empty() {
            relative.push("unnamed");
        }
        let mut file = self.dir.join(relative).into_os_string();
        file.push(".");
        file.push(self.compression.extension());
        PathBuf::from(file)
    }
}

// =============================================================================
// Extraction
// =============================================================================

fn extract_root(cx: &mut Context<'_>, unit: &UnitSpec) -> Result<()> {
    match unit {
        UnitSpec::Source(tree) => {
            let tree = cx.model().tree(*tree)?;
            File::create(cx, &tree.path)?;
            for &member in &tree.members {
                cx.try_extract(None, Some(member), |cx| extract_symbol(cx, member))?;
            }
        }
        UnitSpec::Assembly(name) => {
            Assembly::create(cx, name)?;
        }
        UnitSpec::Compilation => {
            Compilation::extract(cx)?;
        }
    }
    cx.populate_all()
}

/// Extract one unit into `writer`.
///
/// A fatal error aborts the unit with a single diagnostic; the output is still
/// finished. Errors are returned only when the unit cannot be set up or the
/// output cannot be finished.
pub fn extract_unit(
    extractor: &Extractor,
    model: &SemanticModel,
    unit: &UnitSpec,
    writer: TrapWriter,
) -> Result<UnitResult> {
    let name = unit.name(model);
    let scope = unit.scope(extractor, model)?;
    tracing::debug!(unit = %name, "extracting");

    let mut cx = Context::new(extractor, model, scope, writer);
    let status = match extract_root(&mut cx, unit) {
        Ok(()) => UnitStatus::Extracted,
        Err(e) if e.is_fatal() => {
            extractor.message(
                Message::error(format!("Aborted extraction of {}", name)).with_cause(e.to_string()),
            );
            UnitStatus::Aborted {
                reason: e.to_string(),
            }
        }
        Err(e) => {
            cx.report_error(&e, None, None);
            UnitStatus::Extracted
        }
    };

    let stats = cx.stats();
    let output = cx.finish()?;
    tracing::debug!(unit = %name, labels = stats.labels, records = stats.records, "finished");
    Ok(UnitResult {
        name,
        output,
        status,
        stats,
    })
}

fn run_unit(
    extractor: &Extractor,
    model: &SemanticModel,
    unit: &UnitSpec,
    layout: &TrapLayout,
    overwrite: bool,
) -> UnitReport {
    let name = unit.name(model);
    let path = layout.path_for(&name);
    if !overwrite && path.exists() {
        tracing::debug!(unit = %name, path = %path.display(), "skipping existing trap file");
        return UnitReport::without_output(name, Some(path), UnitStatus::Skipped);
    }

    let failed = |name: String, error: ExtractionError| {
        extractor.message(
            Message::error(format!("Failed to extract {}", name)).with_cause(error.to_string()),
        );
        let reason = error.to_string();
        UnitReport::without_output(name, Some(path.clone()), UnitStatus::Aborted { reason })
    };

    let writer = match TrapWriter::create(&path, layout.compression) {
        Ok(writer) => writer,
        Err(e) => return failed(name, e.into()),
    };
    match extract_unit(extractor, model, unit, writer) {
        Ok(result) => UnitReport {
            name: result.name,
            path: Some(path.clone()),
            status: result.status,
            labels: result.stats.labels,
            records: result.stats.records,
        },
        Err(e) => failed(name, e),
    }
}

/// Extract `units` into trap files laid out by `layout`, in parallel.
///
/// Assembly files known to the model are registered with the extractor first.
/// Reports are returned in the order of `units`.
pub fn extract_all(
    extractor: &Extractor,
    model: &SemanticModel,
    units: &[UnitSpec],
    layout: &TrapLayout,
    output: &OutputConfig,
) -> Vec<UnitReport> {
    for assembly in &model.assemblies {
        if extractor.assembly_file(&assembly.name).is_none() {
            extractor.set_assembly_file(&assembly.name, &assembly.path);
        }
    }

    let run = || {
        units
            .par_iter()
            .map(|unit| run_unit(extractor, model, unit, layout, output.overwrite))
            .collect::<Vec<_>>()
    };
    if output.threads == 0 {
        return run();
    }
    match rayon::ThreadPoolBuilder::new()
        .num_threads(output.threads)
        .build()
    {
        Ok(pool) => pool.install(run),
        Err(e) => {
            tracing::warn!(error = %e, "cannot build thread pool, using the global one");
            run()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_mirrors_unit_name() {
        let layout = TrapLayout::new("/out", Compression::Gzip);
        assert_eq!(layout.path_for("src/a.cs"), PathBuf::from("/out/src/a.cs.trap.gz"));
        assert_eq!(layout.path_for("/abs/../b.cs"), PathBuf::from("/out/abs/b.cs.trap.gz"));

        let layout = TrapLayout::new("/out", Compression::None);
        assert_eq!(layout.path_for("mscorlib"), PathBuf::from("/out/mscorlib.trap"));
        assert_eq!(layout.path_for(""), PathBuf::from("/out/unnamed.trap"));
    }

    #[test]
    fn test_all_units() {
        let model = SemanticModel::from_json(
            r#"{
                "assemblies": [{ "name": "App", "path": "/bin/App.dll" }],
                "trees": [{ "path": "a.cs" }, { "path": "b.cs" }]
            }"#,
        )
        .unwrap();
        let units = UnitSpec::all(&model);
        assert_eq!(
            units,
            vec![
                UnitSpec::Source(TreeId(0)),
                UnitSpec::Source(TreeId(1)),
                UnitSpec::Assembly("App".to_string()),
                UnitSpec::Compilation,
            ]
        );
        assert_eq!(units[1].name(&model), "b.cs");
        assert_eq!(units[3].name(&model), "compilation");
    }

    #[test]
    fn test_status_serializes_tagged() {
        let report = UnitReport::without_output(
            "a.cs".to_string(),
            None,
            UnitStatus::Aborted {
                reason: "boom".to_string(),
            },
        );
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "aborted");
        assert_eq!(json["reason"], "boom");
        assert!(json.get("path").is_none());
    }
}
