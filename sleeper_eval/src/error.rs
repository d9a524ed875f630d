// src/error.rs
//
// Error taxonomy for the sleeper evaluation pipeline.
//
// Every failure aborts the current run. Variants carry the file path or
// aggregation key needed to locate the offending input.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Convenience alias for `Result<T, SleeperError>`.
pub type SleeperResult<T> = Result<T, SleeperError>;

/// Coarse classification of a [`SleeperError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad filename shape, missing attribute or dataset.
    MalformedInput,
    /// Mismatched or degenerate action sequences.
    InvalidInput,
    /// Aggregator used after `finalize()`.
    AlreadyFinalized,
    /// Internal bookkeeping invariant broken.
    Internal,
    /// Filesystem access failed.
    Io,
    /// Configuration rejected.
    Config,
}

#[derive(Error, Debug)]
pub enum SleeperError {
    #[error("malformed input '{}': {reason}", .path.display())]
    MalformedInput { path: PathBuf, reason: String },

    #[error("invalid input ({context}): {reason}")]
    InvalidInput { context: String, reason: String },

    #[error("aggregator already finalized")]
    AlreadyFinalized,

    #[error("inconsistent counts for {key}: total={total} but categories sum to {sum}")]
    InconsistentCounts { key: String, total: u64, sum: u64 },

    #[error("i/o error on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config error: {reason}")]
    Config { reason: String },
}

impl SleeperError {
    pub fn malformed(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        SleeperError::MalformedInput {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }

    pub fn invalid(context: impl Into<String>, reason: impl Into<String>) -> Self {
        SleeperError::InvalidInput {
            context: context.into(),
            reason: reason.into(),
        }
    }

    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        SleeperError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn config(reason: impl Into<String>) -> Self {
        SleeperError::Config {
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            SleeperError::MalformedInput { .. } => ErrorKind::MalformedInput,
            SleeperError::InvalidInput { .. } => ErrorKind::InvalidInput,
            SleeperError::AlreadyFinalized => ErrorKind::AlreadyFinalized,
            SleeperError::InconsistentCounts { .. } => ErrorKind::Internal,
            SleeperError::Io { .. } => ErrorKind::Io,
            SleeperError::Config { .. } => ErrorKind::Config,
        }
    }

    /// Attach a location to an input error raised without one.
    ///
    /// `InvalidInput` takes `context` as its context; `MalformedInput`
    /// gets it prefixed to its reason.
    pub(crate) fn with_context(self, context: impl Into<String>) -> Self {
        match self {
            SleeperError::InvalidInput { reason, .. } => SleeperError::InvalidInput {
                context: context.into(),
                reason,
            },
            SleeperError::MalformedInput { path, reason } => SleeperError::MalformedInput {
                path,
                reason: format!("{}: {}", context.into(), reason),
            },
            other => other,
        }
    }

    /// Fill in the file of a `MalformedInput` raised without one.
    pub(crate) fn with_path(self, file: impl AsRef<Path>) -> Self {
        match self {
            SleeperError::MalformedInput { path, reason } if path.as_os_str().is_empty() => {
                SleeperError::malformed(file, reason)
            }
            other => other,
        }
    }
}
