use std::path::PathBuf;

use thiserror::Error;

pub type LemResult<T> = Result<T, LemError>;

/// Everything that can go wrong between opening a mesh file and writing the
/// aligned lattice nodes.
///
/// Only a few of these are fatal. The parser records the recoverable ones in
/// `Mesh::diagnostics` and keeps going.
#[derive(Debug, Error)]
pub enum LemError {
    #[error("mesh file {path} could not be opened: {source}")]
    FileNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read mesh stream: {0}")]
    Read(#[from] std::io::Error),

    #[error("cannot find keyword: {keyword}")]
    MalformedSection { keyword: String },

    #[error("invalid entry in {section} section: {line:?} ({reason})")]
    MalformedLine {
        section: &'static str,
        line: String,
        reason: String,
    },

    #[error("{section} section ended after {found} of {expected} entries")]
    TruncatedSection {
        section: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("element {element_id} has unknown element type {code}")]
    UnknownElementType { element_id: u32, code: u32 },

    #[error("plane alignment stopped: {reason}")]
    Alignment { reason: String },

    #[error("unable to open config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config error: {reason}")]
    Config { reason: String },

    #[error("failed to write {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl LemError {
    /// Whether the parser may log this and continue with the next line or
    /// section.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            LemError::MalformedSection { .. }
                | LemError::MalformedLine { .. }
                | LemError::TruncatedSection { .. }
                | LemError::UnknownElementType { .. }
        )
    }
}
