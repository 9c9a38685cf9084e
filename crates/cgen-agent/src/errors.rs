//! Run-level error taxonomy.
//!
//! Compile failures never show up here: they are in-band data consumed by the
//! retry loop. Everything in [`CodegenError`] ends the run.
//!
//! | Kind          | Examples                                   | Exit |
//! |---------------|--------------------------------------------|------|
//! | Exhausted     | ceiling reached without a clean compile    | 1    |
//! | Configuration | missing API key, zero attempt ceiling      | 2    |
//! | Oracle        | HTTP failure, bad status, malformed body   | 3    |
//! | Environment   | compiler missing, source not writable      | 4    |

use std::fmt;
use std::path::PathBuf;

use coordination::{CompilerError, OutOfTurn};
use thiserror::Error;

/// Coarse classification used for exit codes and log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Oracle,
    Environment,
    Exhausted,
}

impl ErrorKind {
    pub fn exit_code(self) -> u8 {
        match self {
            Self::Exhausted => 1,
            Self::Configuration => 2,
            Self::Oracle => 3,
            Self::Environment => 4,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "configuration"),
            Self::Oracle => write!(f, "oracle"),
            Self::Environment => write!(f, "environment"),
            Self::Exhausted => write!(f, "exhausted"),
        }
    }
}

/// Unified error type for a `cgen` run.
#[derive(Debug, Error)]
pub enum CodegenError {
    /// Settings or credentials are missing or invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The generation request could not be completed.
    #[error("Generation request failed: {0}")]
    Transport(String),

    /// The oracle answered, but not with anything usable.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Internal sequencing bug: a turn was appended out of order.
    #[error("Transcript error: {0}")]
    Transcript(#[from] OutOfTurn),

    #[error("Compiler unavailable: {0}")]
    Compiler(#[from] CompilerError),

    #[error("Failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Every attempt failed to compile.
    #[error("Failed to generate compilable code after {attempts} attempts")]
    Exhausted {
        attempts: u32,
        last_diagnostic: String,
    },

    #[error("Internal error: {0:#}")]
    Internal(#[from] anyhow::Error),
}

impl CodegenError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Transport(_) | Self::MalformedResponse(_) => ErrorKind::Oracle,
            Self::Transcript(_) | Self::Compiler(_) | Self::Io { .. } | Self::Internal(_) => {
                ErrorKind::Environment
            }
            Self::Exhausted { .. } => ErrorKind::Exhausted,
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.kind().exit_code()
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse(message.into())
    }
}
