//! Error taxonomy for loading and comparing contract documents.

use crate::loader::ContractFormat;
use std::fmt;

/// Which of the two compared documents something belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Old,
    New,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Old => write!(f, "old"),
            Side::New => write!(f, "new"),
        }
    }
}

/// Fatal errors raised while turning a raw document into a contract model.
#[derive(Debug, thiserror::Error)]
pub enum ContractError {
    /// The input is not well-formed under its declared format.
    #[error("{format} parse error{}: {message}", position(.line, .column, .offset))]
    Parse {
        format: ContractFormat,
        line: Option<usize>,
        column: Option<usize>,
        offset: Option<usize>,
        message: String,
    },

    /// A reference points at a location that does not exist in the document.
    #[error("unresolved reference \"{reference}\" at {pointer}")]
    UnresolvedReference { reference: String, pointer: String },

    /// A reference leaves the document or uses a form the resolver cannot follow.
    #[error("unsupported reference \"{reference}\" at {pointer}: {reason}")]
    UnsupportedReference {
        reference: String,
        pointer: String,
        reason: &'static str,
    },

    /// The source provider could not materialize a document.
    #[error("could not fetch {id}: {message}")]
    Source { id: String, message: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl ContractError {
    /// Exit code reported by the CLI when a comparison cannot complete.
    pub fn exit_code(&self) -> i32 {
        2
    }
}

fn position(line: &Option<usize>, column: &Option<usize>, offset: &Option<usize>) -> String {
    match (*line, *column, *offset) {
        (Some(line), Some(column), _) => format!(" at line {line}, column {column}"),
        (_, _, Some(offset)) => format!(" at byte {offset}"),
        _ => String::new(),
    }
}

/// A comparison aborted because one side could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    #[error("failed to load {side} contract: {source}")]
    Load {
        side: Side,
        #[source]
        source: ContractError,
    },
}

impl DiffError {
    pub fn exit_code(&self) -> i32 {
        match self {
            DiffError::Load { source, .. } => source.exit_code(),
        }
    }
}

/// A recoverable problem found while normalizing a document, most often a
/// schema construct with no defined normalization.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, serde::Serialize)]
pub struct Warning {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub side: Option<Side>,
    pub pointer: String,
    pub message: String,
}

impl Warning {
    pub fn unsupported_construct(pointer: impl Into<String>, construct: &str) -> Self {
        Self {
            side: None,
            pointer: pointer.into(),
            message: format!("unsupported schema construct \"{construct}\" was ignored"),
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.side {
            Some(side) => write!(f, "[{side}] {}: {}", self.pointer, self.message),
            None => write!(f, "{}: {}", self.pointer, self.message),
        }
    }
}
