//! Error types for the help bridge.

use std::io;
use std::path::PathBuf;

use hyper::StatusCode;
use thiserror::Error;

/// Body sent when a handler produces a value of an unrecognized shape.
pub const INVALID_RESPONSE_MESSAGE: &str = "Invalid response from R";

/// Failure raised while evaluating an expression in the interpreter.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalFault {
    /// The interpreter reported an error it could not recover from itself.
    #[error("{0}")]
    Error(String),

    /// The evaluation unwound through the host (crash-class failure).
    #[error("interpreter panicked: {0}")]
    Panic(String),
}

impl EvalFault {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(message.into())
    }

    pub fn panic(message: impl Into<String>) -> Self {
        Self::Panic(message.into())
    }
}

/// Errors raised by the native replacements of interpreter built-ins.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HookError {
    #[error("{name}() expects {expected} argument(s), got {got}")]
    Arity {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("{name}() expects a character argument, got {found}")]
    InvalidArgument { name: String, found: String },

    #[error("Failed to register replacement for '{0}'")]
    Registration(String),
}

impl HookError {
    pub fn arity(name: impl Into<String>, expected: usize, got: usize) -> Self {
        Self::Arity {
            name: name.into(),
            expected,
            got,
        }
    }

    pub fn invalid_argument(name: impl Into<String>, found: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name: name.into(),
            found: found.into(),
        }
    }
}

/// Errors surfaced by the bridge. Every variant maps to a well-formed HTTP response.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The handler call faulted inside the interpreter.
    #[error(transparent)]
    Evaluation(#[from] EvalFault),

    /// The handler returned an explicit error string.
    #[error("{0}")]
    Handler(String),

    /// The handler returned a value of an unrecognized shape.
    #[error("{}", INVALID_RESPONSE_MESSAGE)]
    MalformedResult,

    /// A file-backed response could not be read.
    #[error("{source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Hook(#[from] HookError),

    /// The interpreter worker is gone or its queue is full.
    #[error("Help server is busy")]
    WorkerUnavailable,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl BridgeError {
    pub fn file_read(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    /// HTTP status used when this error becomes a response.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::FileRead { source, .. } if source.kind() == io::ErrorKind::NotFound => {
                StatusCode::NOT_FOUND
            }
            Self::WorkerUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type BridgeResult<T> = Result<T, BridgeError>;
