// Error model shared by the store, the age calculator, and the CLI.
use std::error::Error as StdError;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    Internal,
    Usage,
    Connectivity,
    Schema,
    Constraint,
    MalformedInput,
    Busy,
    Permission,
    Io,
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    hint: Option<String>,
    path: Option<PathBuf>,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            hint: None,
            path: None,
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
        ErrorKind::Connectivity => 3,
        ErrorKind::Schema => 4,
        ErrorKind::Constraint => 5,
        ErrorKind::MalformedInput => 6,
        ErrorKind::Busy => 7,
        ErrorKind::Permission => 8,
        ErrorKind::Io => 9,
    }
}

/// Classifies a SQLite failure, falling back to `fallback` for codes that
/// carry no more specific meaning at the call site.
pub fn sqlite_error_kind(err: &rusqlite::Error, fallback: ErrorKind) -> ErrorKind {
    use rusqlite::ErrorCode;

    let Some(code) = err.sqlite_error_code() else {
        return fallback;
    };
    match code {
        ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => ErrorKind::Busy,
        ErrorCode::PermissionDenied | ErrorCode::ReadOnly => ErrorKind::Permission,
        ErrorCode::ConstraintViolation => ErrorKind::Constraint,
        ErrorCode::DatabaseCorrupt | ErrorCode::NotADatabase => ErrorKind::Schema,
        ErrorCode::CannotOpen => ErrorKind::Connectivity,
        _ => fallback,
    }
}

pub(crate) fn sqlite_error(err: rusqlite::Error, fallback: ErrorKind, message: &str) -> Error {
    Error::new(sqlite_error_kind(&err, fallback))
        .with_message(message)
        .with_source(err)
}
