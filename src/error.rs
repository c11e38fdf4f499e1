use std::path::PathBuf;
use thiserror::Error;

use crate::token::Level;

/// Result type for model construction
pub type Result<T> = std::result::Result<T, Error>;

/// Where in the input something went wrong
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub path: Option<PathBuf>,
    /// 1-based line number
    pub line: usize,
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{}:{}", path.display(), self.line),
            None => write!(f, "line {}", self.line),
        }
    }
}

/// Errors raised while building a model or preparing its input.
#[derive(Error, Debug)]
pub enum Error {
    /// A token lacks a factor label or carries it twice
    #[error("malformed token {token:?}{}: {reason}",
            .location.as_ref().map(|l| format!(" at {}", l)).unwrap_or_default())]
    Parse {
        token: String,
        reason: String,
        location: Option<Location>,
    },

    /// The corpus maps one key to two different clusters
    #[error("{kind} mapping for {key:?} is {existing:?}, corpus also gives {conflicting:?}{}",
            .location.as_ref().map(|l| format!(" at {}", l)).unwrap_or_default())]
    Consistency {
        kind: &'static str,
        key: String,
        existing: String,
        conflicting: String,
        location: Option<Location>,
    },

    /// The corpus uses a sentence boundary symbol as a word or cluster
    #[error("{symbol:?} is the {role} symbol but the corpus uses it as a {level:?}{}",
            .location.as_ref().map(|l| format!(" at {}", l)).unwrap_or_default())]
    ReservedSymbol {
        symbol: String,
        role: &'static str,
        level: Level,
        location: Option<Location>,
    },

    /// A log-probability or weight is not a finite number
    #[error("undefined {what} for {key:?}: {detail}")]
    Numerical {
        what: &'static str,
        key: String,
        detail: String,
    },

    /// A lookup that the corpus invariants guarantee came up empty
    #[error("no {what} entry for {key:?}")]
    MissingMapping { what: &'static str, key: String },

    /// Factor file line not of the form `key<delim>value`
    #[error("factor file {path}:{line} has {parts} fields, expected 2")]
    MalformedFactorLine {
        path: PathBuf,
        line: usize,
        parts: usize,
    },

    /// Factor file lists the same key twice
    #[error("factor file {path}:{line}: {key:?} appears more than once")]
    DuplicateFactorKey {
        path: PathBuf,
        line: usize,
        key: String,
    },

    /// Configuration could not be read
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Process exit status for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::MalformedFactorLine { .. } => 1,
            Self::DuplicateFactorKey { .. } => 2,
            Self::Parse { .. } => 3,
            Self::Consistency { .. } => 4,
            Self::Numerical { .. } => 5,
            Self::MissingMapping { .. } => 6,
            Self::Config(_) => 7,
            Self::Io(_) => 8,
            Self::ReservedSymbol { .. } => 9,
        }
    }

    /// Attach an input location to errors raised while reading a corpus line.
    pub fn at(mut self, here: Location) -> Self {
        match &mut self {
            Self::Parse { location, .. }
            | Self::Consistency { location, .. }
            | Self::ReservedSymbol { location, .. } => {
                if location.is_none() {
                    *location = Some(here);
                }
            }
            _ => {}
        }
        self
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Self::Config(e.to_string())
    }
}
