//! Purpose: Single error type for locator, loader, session, and envelope failures.
//! Exports: `Error`, `ErrorKind`, `to_exit_code`.
//! Role: Every fallible operation returns this type; the CLI maps kinds to exit codes.
//! Invariants: Exit codes are stable once published; new kinds are appended.
//! Invariants: Native error objects are carried verbatim in `details`, never rewritten.
use std::error::Error as StdError;
use std::fmt;
use std::path::{Path, PathBuf};

use serde_json::Value;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    Internal,
    Usage,
    LibraryNotFound,
    UnsupportedPlatform,
    LibraryLoad,
    IsolateCreationFailed,
    TeardownFailed,
    Protocol,
    Compilation,
    Evaluation,
    UseAfterClose,
    NotInitialized,
    Decode,
    Timeout,
    Io,
}

impl ErrorKind {
    /// Stable snake_case label used in JSON error output.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Internal => "internal",
            ErrorKind::Usage => "usage",
            ErrorKind::LibraryNotFound => "library_not_found",
            ErrorKind::UnsupportedPlatform => "unsupported_platform",
            ErrorKind::LibraryLoad => "library_load",
            ErrorKind::IsolateCreationFailed => "isolate_creation_failed",
            ErrorKind::TeardownFailed => "teardown_failed",
            ErrorKind::Protocol => "protocol",
            ErrorKind::Compilation => "compilation",
            ErrorKind::Evaluation => "evaluation",
            ErrorKind::UseAfterClose => "use_after_close",
            ErrorKind::NotInitialized => "not_initialized",
            ErrorKind::Decode => "decode",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Io => "io",
        }
    }
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    hint: Option<String>,
    path: Option<PathBuf>,
    code: Option<i32>,
    details: Option<Value>,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            hint: None,
            path: None,
            code: None,
            details: None,
            source: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Return code reported by a native lifecycle call, when one failed.
    pub fn code(&self) -> Option<i32> {
        self.code
    }

    /// The native `error` object exactly as the library produced it.
    pub fn details(&self) -> Option<&Value> {
        self.details.as_ref()
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_code(mut self, code: i32) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        if let Some(path) = &self.path {
            write!(f, " (path: {})", path.display())?;
        }
        if let Some(code) = self.code {
            write!(f, " (code: {code})")?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn StdError + 'static))
    }
}

pub fn to_exit_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Internal => 1,
        ErrorKind::Usage => 2,
        ErrorKind::LibraryNotFound => 3,
        ErrorKind::UnsupportedPlatform => 4,
        ErrorKind::LibraryLoad => 5,
        ErrorKind::IsolateCreationFailed => 6,
        ErrorKind::TeardownFailed => 7,
        ErrorKind::Protocol => 8,
        ErrorKind::Compilation => 9,
        ErrorKind::Evaluation => 10,
        ErrorKind::UseAfterClose => 11,
        ErrorKind::NotInitialized => 12,
        ErrorKind::Decode => 13,
        ErrorKind::Timeout => 14,
        ErrorKind::Io => 15,
    }
}
