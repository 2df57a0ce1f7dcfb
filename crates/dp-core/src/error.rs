//! Unified error type for the packaging pipeline.
//!
//! All crates funnel their failures into [`Error`]. Each variant belongs to
//! one class of the failure taxonomy exposed by [`Error::kind`], which the
//! orchestrator uses when logging the outcome of a run.

use std::fmt;
use std::path::{Path, PathBuf};

/// Failure class of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Registry or staged data violates an expected invariant.
    Precondition,
    /// Media transformation (poster extraction, external tools) failed.
    Transform,
    /// A remote collaborator was unreachable or rejected a request.
    Transport,
    /// Local filesystem failure.
    Io,
    /// Invalid configuration or invocation parameters.
    Config,
    /// Unexpected internal state.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Precondition => "precondition",
            Self::Transform => "transform",
            Self::Transport => "transport",
            Self::Io => "io",
            Self::Config => "config",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// Unified error type covering all failure modes of a packaging run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The registry returned a number of matches other than exactly one.
    #[error("{count} results found for search {query}. Expected one result.")]
    RegistryMatch {
        /// Number of matches returned.
        count: usize,
        /// The query that was issued.
        query: String,
    },

    /// Registry or staged data is missing something the run requires.
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// No staged file carries a recognized format signal.
    #[error("Unrecognized format for files: [{}]", .files.join(", "))]
    UnrecognizedFormat {
        /// Names of the staged files that were inspected.
        files: Vec<String>,
    },

    /// Staged files carry both audio and video signals.
    #[error("Ambiguous format, both audio and video files present: [{}]", .files.join(", "))]
    AmbiguousFormat {
        /// Names of the staged files that were inspected.
        files: Vec<String>,
    },

    /// A registry date string could not be interpreted.
    #[error("Invalid date {value:?}: {message}")]
    InvalidDate {
        /// The raw date string.
        value: String,
        /// Human-readable error description.
        message: String,
    },

    /// Invalid configuration or invocation parameters.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An external tool (ffmpeg) returned an error.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// A bag could not be written or failed validation.
    #[error("Bag error: {0}")]
    Bag(String),

    /// A remote collaborator failed.
    #[error("Transport error [{service}]: {message}")]
    Transport {
        /// The collaborator that failed (e.g. "registry", "object-store").
        service: String,
        /// Human-readable error description.
        message: String,
    },

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// An I/O operation on a known path failed.
    #[error("IO error at {}: {source}", .path.display())]
    File {
        /// The path being operated on.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A pipeline step failed; wraps the step's own error.
    #[error("Pipeline error [{step}]: {source}")]
    Pipeline {
        /// The step that failed.
        step: String,
        /// The step's error.
        #[source]
        source: Box<Error>,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Failure class of this error. Pipeline wrappers report the class of
    /// the wrapped error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::RegistryMatch { .. }
            | Error::Precondition(_)
            | Error::UnrecognizedFormat { .. }
            | Error::AmbiguousFormat { .. }
            | Error::InvalidDate { .. } => ErrorKind::Precondition,
            Error::Tool { .. } | Error::Bag(_) => ErrorKind::Transform,
            Error::Transport { .. } => ErrorKind::Transport,
            Error::Io { .. } | Error::File { .. } => ErrorKind::Io,
            Error::Config(_) => ErrorKind::Config,
            Error::Pipeline { source, .. } => source.kind(),
            Error::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Name of the failing step, if this error was raised inside the pipeline.
    pub fn step(&self) -> Option<&str> {
        match self {
            Error::Pipeline { step, .. } => Some(step),
            _ => None,
        }
    }

    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Transport`].
    pub fn transport(service: impl Into<String>, message: impl fmt::Display) -> Self {
        Error::Transport {
            service: service.into(),
            message: message.to_string(),
        }
    }

    /// Convenience constructor for [`Error::File`].
    pub fn file(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Error::File {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Convenience constructor for [`Error::InvalidDate`].
    pub fn invalid_date(value: impl Into<String>, message: impl Into<String>) -> Self {
        Error::InvalidDate {
            value: value.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Pipeline`].
    pub fn pipeline(step: impl Into<String>, source: Error) -> Self {
        Error::Pipeline {
            step: step.into(),
            source: Box::new(source),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
