//! Error types for the Bro log reader.

use std::path::PathBuf;

use thiserror::Error;

use crate::header::Marker;

/// Result type alias for log reading operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when loading or iterating a Bro log file.
///
/// `Header` and `UnknownType` are fatal to loading a file. `Decode` and
/// `RowShape` are scoped to a single row; the row iterator yields them and
/// keeps going, so the caller decides whether to skip or abort.
#[derive(Debug, Error)]
pub enum Error {
    /// A header marker line is missing, out of order, or malformed
    #[error("{origin}: invalid header at #{}: {reason}", .marker.keyword())]
    Header {
        origin: String,
        marker: Marker,
        reason: String,
    },

    /// A declared field type has no registered pipeline
    #[error("{origin}: unknown field type '{type_name}' for field '{field}'")]
    UnknownType {
        origin: String,
        field: String,
        type_name: String,
    },

    /// A data token failed its type's translator
    #[error("{origin}:{line}: cannot decode field '{field}' ({type_name}) from {token:?}: {reason}")]
    Decode {
        origin: String,
        line: usize,
        field: String,
        type_name: String,
        token: String,
        reason: DecodeError,
    },

    /// A data line has a different number of tokens than there are fields
    #[error("{origin}:{line}: expected {expected} fields, found {found}")]
    RowShape {
        origin: String,
        line: usize,
        expected: usize,
        found: usize,
    },

    /// A requested field name is not declared by the log
    #[error("unknown field '{0}'")]
    UnknownField(String),

    /// I/O error while reading the line source
    #[error("{}: {source}", .origin.display())]
    Io {
        origin: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failure while writing rendered output
    #[error("output error: {0}")]
    Output(String),
}

impl Error {
    pub(crate) fn io(origin: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            origin: origin.into(),
            source,
        }
    }

    /// Line number of the row this error is scoped to, if any.
    pub fn line(&self) -> Option<usize> {
        match self {
            Error::Decode { line, .. } | Error::RowShape { line, .. } => Some(*line),
            _ => None,
        }
    }

    /// True for errors that only invalidate one row of the stream.
    pub fn is_row_error(&self) -> bool {
        matches!(self, Error::Decode { .. } | Error::RowShape { .. })
    }
}

/// Why a single token could not be translated into a typed value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("not a valid {expected}")]
    Invalid { expected: &'static str },

    #[error("element {index} of container: {inner}")]
    Element { index: usize, inner: Box<DecodeError> },
}

impl DecodeError {
    pub(crate) fn invalid(expected: &'static str) -> Self {
        DecodeError::Invalid { expected }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::io("<stream>", err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Output(err.to_string())
    }
}
