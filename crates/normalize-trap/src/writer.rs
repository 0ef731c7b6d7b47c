//! Trap output.
//!
//! A trap file is an append-only sequence of records:
//!
//! ```text
//! #1=@"{#0}.Foo;type"        define a label for a key
//! #2=*                        define a fresh (never shared) label
//! .push @"{#1}{#3}"           open a duplication guard
//! types(#1,1,"Foo")           a fact tuple
//! .pop                        close the innermost guard
//! // comment
//! ```
//!
//! File output goes to a temporary file next to the target and is moved into
//! place by [`TrapWriter::finish`], so readers never see a half-written file.

use crate::config::Compression;
use flate2::Compression as GzLevel;
use flate2::write::GzEncoder;
use normalize_trap_core::{Key, Label};
use std::fmt;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// A value in a fact tuple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrapValue {
    Label(Label),
    Int(i64),
    Str(String),
}

impl fmt::Display for TrapValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrapValue::Label(label) => write!(f, "{}", label),
            TrapValue::Int(value) => write!(f, "{}", value),
            TrapValue::Str(value) => write!(f, "\"{}\"", value.replace('"', "\"\"")),
        }
    }
}

/// A fact tuple, e.g. `types(#1,1,"Foo")`.
#[derive(Debug, Clone, PartialEq)]
pub struct Tuple {
    pub relation: &'static str,
    pub args: Vec<TrapValue>,
}

impl Tuple {
    pub fn new(relation: &'static str) -> Self {
        Self {
            relation,
            args: Vec::new(),
        }
    }

    pub fn label(mut self, label: Label) -> Self {
        self.args.push(TrapValue::Label(label));
        self
    }

    pub fn int(mut self, value: i64) -> Self {
        self.args.push(TrapValue::Int(value));
        self
    }

    pub fn str(mut self, value: impl Into<String>) -> Self {
        self.args.push(TrapValue::Str(value.into()));
        self
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.relation)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", arg)?;
        }
        write!(f, ")")
    }
}

/// One line of trap output.
#[derive(Debug, Clone, PartialEq)]
pub enum TrapRecord {
    DefineLabel(Label, Key),
    FreshLabel(Label),
    Push(Key),
    Pop,
    Tuple(Tuple),
    Comment(String),
}

impl fmt::Display for TrapRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrapRecord::DefineLabel(label, key) => write!(f, "{}={}", label, key),
            TrapRecord::FreshLabel(label) => write!(f, "{}=*", label),
            TrapRecord::Push(key) => write!(f, ".push {}", key),
            TrapRecord::Pop => write!(f, ".pop"),
            TrapRecord::Tuple(tuple) => write!(f, "{}", tuple),
            TrapRecord::Comment(text) => write!(f, "// {}", text),
        }
    }
}

enum Sink {
    Memory(Vec<u8>),
    Plain(BufWriter<NamedTempFile>),
    Gzip(GzEncoder<BufWriter<NamedTempFile>>),
}

/// What a finished writer produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrapOutput {
    Memory(String),
    File(PathBuf),
}

impl TrapOutput {
    /// The in-memory trap text, if this output was written to memory.
    pub fn text(&self) -> Option<&str> {
        match self {
            TrapOutput::Memory(text) => Some(text),
            TrapOutput::File(_) => None,
        }
    }
}

/// Append-only writer for one trap file.
pub struct TrapWriter {
    sink: Sink,
    target: Option<PathBuf>,
    records: usize,
}

impl TrapWriter {
    /// A writer that keeps the trap text in memory.
    pub fn memory() -> Self {
        Self {
            sink: Sink::Memory(Vec::new()),
            target: None,
            records: 0,
        }
    }

    /// A writer for `path`. The file only appears once [`TrapWriter::finish`] succeeds.
    pub fn create(path: &Path, compression: Compression) -> io::Result<Self> {
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;
        let tmp = BufWriter::new(NamedTempFile::new_in(dir)?);
        let sink = match compression {
            Compression::None => Sink::Plain(tmp),
            Compression::Gzip => Sink::Gzip(GzEncoder::new(tmp, GzLevel::default())),
        };
        Ok(Self {
            sink,
            target: Some(path.to_path_buf()),
            records: 0,
        })
    }

    pub fn emit(&mut self, record: &TrapRecord) -> io::Result<()> {
        self.records += 1;
        let out: &mut dyn Write = match &mut self.sink {
            Sink::Memory(buf) => buf,
            Sink::Plain(w) => w,
            Sink::Gzip(w) => w,
        };
        writeln!(out, "{}", record)
    }

    pub fn define_label(&mut self, label: Label, key: &Key) -> io::Result<()> {
        self.emit(&TrapRecord::DefineLabel(label, key.clone()))
    }

    pub fn fresh_label(&mut self, label: Label) -> io::Result<()> {
        self.emit(&TrapRecord::FreshLabel(label))
    }

    pub fn push(&mut self, key: &Key) -> io::Result<()> {
        self.emit(&TrapRecord::Push(key.clone()))
    }

    pub fn pop(&mut self) -> io::Result<()> {
        self.emit(&TrapRecord::Pop)
    }

    pub fn tuple(&mut self, tuple: Tuple) -> io::Result<()> {
        self.emit(&TrapRecord::Tuple(tuple))
    }

    pub fn comment(&mut self, text: impl Into<String>) -> io::Result<()> {
        self.emit(&TrapRecord::Comment(text.into()))
    }

    /// Number of records emitted so far.
    pub fn records(&self) -> usize {
        self.records
    }

    /// Flush and, for file output, move the file into place.
    pub fn finish(self) -> io::Result<TrapOutput> {
        let tmp = match self.sink {
            Sink::Memory(buf) => {
                return Ok(TrapOutput::Memory(String::from_utf8_lossy(&buf).into_owned()));
            }
            Sink::Plain(w) => w.into_inner().map_err(|e| e.into_error())?,
            Sink::Gzip(w) => w.finish()?.into_inner().map_err(|e| e.into_error())?,
        };
        // Only file sinks reach this point, and those always have a target.
        let target = self.target.unwrap_or_default();
        tmp.persist(&target).map_err(|e| e.error)?;
        Ok(TrapOutput::File(target))
    }
}
