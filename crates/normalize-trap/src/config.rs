//! Configuration for trap extraction.
//!
//! Loads config from:
//! 1. Global: ~/.config/normalize/trap.toml
//! 2. Per-project: .normalize/trap.toml (overrides global)
//!
//! Example trap.toml:
//! ```toml
//! [extraction]
//! max_recursion_depth = 150
//! max_errors = 1000
//! standalone = false
//!
//! [output]
//! compression = "gzip"
//! overwrite = true
//! threads = 0
//! ```

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default nesting limit for entity creation. Chosen empirically; deeper nesting
/// almost always means pathological input such as unbounded generic nesting.
pub const DEFAULT_MAX_RECURSION_DEPTH: usize = 150;

/// Default number of errors logged before logging stops.
pub const DEFAULT_MAX_ERRORS: usize = 1000;

/// Engine limits and extraction mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Maximum number of nested entity creations before the unit is aborted.
    pub max_recursion_depth: usize,
    /// Errors logged before further log lines are suppressed.
    pub max_errors: usize,
    /// Standalone extraction: the model is expected to be incomplete, so model
    /// errors are ignored instead of reported.
    pub standalone: bool,
    /// Warn when two distinct source objects define the same identity key.
    pub check_label_collisions: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_recursion_depth: DEFAULT_MAX_RECURSION_DEPTH,
            max_errors: DEFAULT_MAX_ERRORS,
            standalone: false,
            check_label_collisions: false,
        }
    }
}

/// Trap file compression.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    None,
    #[default]
    Gzip,
}

impl Compression {
    pub fn extension(&self) -> &'static str {
        match self {
            Compression::None => "trap",
            Compression::Gzip => "trap.gz",
        }
    }
}

/// Where and how trap files are written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub compression: Compression,
    /// Overwrite existing trap files. When false, units whose trap file already
    /// exists are skipped.
    pub overwrite: bool,
    /// Worker threads for independent units. 0 = rayon default.
    pub threads: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            compression: Compression::default(),
            overwrite: true,
            threads: 0,
        }
    }
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrapConfig {
    pub extraction: ExtractionConfig,
    pub output: OutputConfig,
}

impl TrapConfig {
    /// Load configuration for a project.
    ///
    /// Loads global config from ~/.config/normalize/trap.toml, then lets the
    /// per-project .normalize/trap.toml override it. Unreadable or invalid files
    /// are ignored.
    pub fn load(root: &Path) -> Self {
        let project_path = root.join(".normalize").join("trap.toml");
        if let Some(project) = Self::load_file(&project_path).ok().flatten() {
            return project;
        }
        Self::global_config_path()
            .and_then(|path| Self::load_file(&path).ok().flatten())
            .unwrap_or_default()
    }

    /// Load config from a file path. Returns `Ok(None)` if the file does not exist.
    pub fn load_file(path: &Path) -> Result<Option<Self>> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(Self::parse(&content)?))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    fn global_config_path() -> Option<PathBuf> {
        let config_home = std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .ok()
            .or_else(|| dirs::home_dir().map(|h| h.join(".config")))?;
        Some(config_home.join("normalize").join("trap.toml"))
    }
}
