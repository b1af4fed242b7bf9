//! Error types for the Carlae interpreter
//!
//! Every failure raised by the language is one of three kinds. There is no
//! "plain" language error: callers always see a syntax, name, or evaluation
//! error.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the interpreter.
pub type Result<T> = std::result::Result<T, CarlaeError>;

/// The category of a [`CarlaeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Syntax,
    Name,
    Evaluation,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CarlaeError {
    /// Malformed token stream or unbalanced parentheses
    #[error("syntax error: {0}")]
    Syntax(String),

    /// Unbound or invalid variable name
    #[error("name error: {0}")]
    Name(String),

    /// Anything else that goes wrong while evaluating
    #[error("evaluation error: {0}")]
    Evaluation(String),
}

impl CarlaeError {
    pub fn syntax(message: impl Into<String>) -> Self {
        CarlaeError::Syntax(message.into())
    }

    pub fn name(message: impl Into<String>) -> Self {
        CarlaeError::Name(message.into())
    }

    pub fn evaluation(message: impl Into<String>) -> Self {
        CarlaeError::Evaluation(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CarlaeError::Syntax(_) => ErrorKind::Syntax,
            CarlaeError::Name(_) => ErrorKind::Name,
            CarlaeError::Evaluation(_) => ErrorKind::Evaluation,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            CarlaeError::Syntax(m) | CarlaeError::Name(m) | CarlaeError::Evaluation(m) => m,
        }
    }
}

/// Failure while loading and evaluating a source file.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Language(#[from] CarlaeError),
}
