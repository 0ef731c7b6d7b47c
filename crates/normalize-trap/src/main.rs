//! Command-line driver: load a semantic model and write its trap files.

use clap::Parser;
use normalize_trap::{
    Extractor, Result, SemanticModel, TracingSink, TrapConfig, TrapLayout, UnitReport, UnitSpec,
    UnitStatus, extract_all,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "normalize-trap", version, about = "Extract a semantic model into trap files")]
struct Cli {
    /// Semantic model (JSON) produced by a frontend
    #[arg(long)]
    model: PathBuf,

    /// Directory trap files are written to
    #[arg(long, short)]
    out: PathBuf,

    /// Extract this source file (repeatable)
    #[arg(long = "source", value_name = "PATH")]
    sources: Vec<String>,

    /// Extract this assembly (repeatable)
    #[arg(long = "assembly", value_name = "NAME")]
    assemblies: Vec<String>,

    /// Extract the compilation unit
    #[arg(long)]
    compilation: bool,

    /// Worker threads (overrides config)
    #[arg(long)]
    threads: Option<usize>,

    /// Config file (default: .normalize/trap.toml, then the global config)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Tolerate an incomplete model
    #[arg(long)]
    standalone: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

fn load_config(cli: &Cli) -> Result<TrapConfig> {
    let mut config = match &cli.config {
        Some(path) => TrapConfig::load_file(path)?.ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("config file not found: {}", path.display()),
            )
        })?,
        None => TrapConfig::load(&std::env::current_dir()?),
    };
    if let Some(threads) = cli.threads {
        config.output.threads = threads;
    }
    if cli.standalone {
        config.extraction.standalone = true;
    }
    Ok(config)
}

fn select_units(cli: &Cli, model: &SemanticModel) -> std::result::Result<Vec<UnitSpec>, String> {
    if cli.sources.is_empty() && cli.assemblies.is_empty() && !cli.compilation {
        return Ok(UnitSpec::all(model));
    }
    let mut units = Vec::new();
    for source in &cli.sources {
        let tree = model
            .tree_ids()
            .find(|&id| model.tree(id).is_ok_and(|t| &t.path == source))
            .ok_or_else(|| format!("source file not in model: {}", source))?;
        units.push(UnitSpec::Source(tree));
    }
    for assembly in &cli.assemblies {
        if model.assembly(assembly).is_none() {
            return Err(format!("assembly not in model: {}", assembly));
        }
        units.push(UnitSpec::Assembly(assembly.clone()));
    }
    if cli.compilation {
        units.push(UnitSpec::Compilation);
    }
    Ok(units)
}

fn format_text(reports: &[UnitReport], errors: usize, missing: &[String]) -> String {
    let mut lines = Vec::new();
    let (mut extracted, mut aborted, mut skipped) = (0, 0, 0);
    for report in reports {
        let path = report
            .path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        match &report.status {
            UnitStatus::Extracted => {
                extracted += 1;
                lines.push(format!(
                    "extracted  {} -> {} ({} labels, {} records)",
                    report.name, path, report.labels, report.records
                ));
            }
            UnitStatus::Aborted { reason } => {
                aborted += 1;
                lines.push(format!("aborted    {}: {}", report.name, reason));
            }
            UnitStatus::Skipped => {
                skipped += 1;
                lines.push(format!("skipped    {} ({} exists)", report.name, path));
            }
        }
    }
    if !missing.is_empty() {
        lines.push(format!("{} unresolved types:", missing.len()));
        for name in missing {
            lines.push(format!("  {}", name));
        }
    }
    lines.push(format!(
        "{} units: {} extracted, {} aborted, {} skipped; {} errors",
        reports.len(),
        extracted,
        aborted,
        skipped,
        errors
    ));
    lines.join("\n")
}

/// Returns whether every unit completed.
fn run(cli: Cli) -> std::result::Result<bool, String> {
    let config = load_config(&cli).map_err(|e| e.to_string())?;
    let model = SemanticModel::load(&cli.model)
        .map_err(|e| format!("cannot load {}: {}", cli.model.display(), e))?;
    let units = select_units(&cli, &model)?;

    let extractor = Extractor::new(config.extraction.clone(), TracingSink);
    let layout = TrapLayout::new(&cli.out, config.output.compression);
    let reports = extract_all(&extractor, &model, &units, &layout, &config.output);
    let missing = extractor.missing_types();

    if cli.json {
        let report = serde_json::json!({
            "units": reports,
            "errors": extractor.errors(),
            "missing_types": missing,
        });
        let text = serde_json::to_string_pretty(&report).map_err(|e| e.to_string())?;
        println!("{}", text);
    } else {
        println!("{}", format_text(&reports, extractor.errors(), &missing));
    }
    Ok(!reports.iter().any(UnitReport::is_aborted))
}

fn main() {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}
