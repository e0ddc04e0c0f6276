use backtrace::Backtrace;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::result::Result;

use crate::common::{atomic, Atomic, ReadExecutor};

/// Error kinds for nestdoc operations.
///
/// Vetoes raised by lifecycle hooks are not errors and never surface as an
/// [ErrorKind]; the relation calls report them through their return values.
///
/// # Examples
///
/// ```rust,ignore
/// use nestdoc::errors::{NestdocError, ErrorKind, NestdocResult};
///
/// fn example() -> NestdocResult<()> {
///     Err(NestdocError::new("Schema not found", ErrorKind::SchemaNotFound))
/// }
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorKind {
    // ID and Identity Errors
    /// The provided identifier is malformed
    InvalidId,
    /// The requested resource was not found
    NotFound,

    // Operation Errors
    /// The operation is not valid in the current context
    InvalidOperation,
    /// Invalid field name
    InvalidFieldName,
    /// Invalid data type for operation
    InvalidDataType,

    // Model Errors
    /// No schema is registered under the requested model name
    SchemaNotFound,
    /// The model schema declares no relation with the requested name
    RelationNotFound,
    /// The relation exists but is of the other embedding kind
    RelationTypeMismatch,
    /// An embedded model whose owning parent is no longer alive
    OrphanedModel,

    // Store Errors
    /// Error from storage backend
    BackendError,
    /// Store has not been initialized
    StoreNotInitialized,
    /// Store has already been closed
    StoreAlreadyClosed,

    // Event Errors
    /// Error in event processing
    EventError,

    /// Internal error (usually indicates a bug)
    InternalError,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::InvalidId => write!(f, "Invalid ID"),
            ErrorKind::NotFound => write!(f, "Not found"),
            ErrorKind::InvalidOperation => write!(f, "Invalid operation"),
            ErrorKind::InvalidFieldName => write!(f, "Invalid field name"),
            ErrorKind::InvalidDataType => write!(f, "Invalid data type"),
            ErrorKind::SchemaNotFound => write!(f, "Schema not found"),
            ErrorKind::RelationNotFound => write!(f, "Relation not found"),
            ErrorKind::RelationTypeMismatch => write!(f, "Relation type mismatch"),
            ErrorKind::OrphanedModel => write!(f, "Orphaned model"),
            ErrorKind::BackendError => write!(f, "Backend error"),
            ErrorKind::StoreNotInitialized => write!(f, "Store not initialized"),
            ErrorKind::StoreAlreadyClosed => write!(f, "Store already closed"),
            ErrorKind::EventError => write!(f, "Event error"),
            ErrorKind::InternalError => write!(f, "Internal error"),
        }
    }
}

/// Custom nestdoc error type.
///
/// `NestdocError` carries a message, an [ErrorKind] and an optional cause,
/// and captures a backtrace at construction.
///
/// # Examples
///
/// ```rust,ignore
/// use nestdoc::errors::{NestdocError, ErrorKind};
///
/// let cause = NestdocError::new("store closed", ErrorKind::StoreAlreadyClosed);
/// let err = NestdocError::new_with_cause("Failed to persist parent", ErrorKind::BackendError, cause);
/// ```
#[derive(Clone)]
pub struct NestdocError {
    message: String,
    error_kind: ErrorKind,
    cause: Option<Box<NestdocError>>,
    backtrace: Atomic<Backtrace>,
}

impl NestdocError {
    /// Creates a new `NestdocError` with the specified message and error kind.
    pub fn new(message: &str, error_kind: ErrorKind) -> Self {
        NestdocError {
            message: message.to_string(),
            error_kind,
            cause: None,
            backtrace: atomic(Backtrace::new()),
        }
    }

    /// Creates a new `NestdocError` that wraps an underlying cause.
    pub fn new_with_cause(message: &str, error_kind: ErrorKind, cause: NestdocError) -> Self {
        NestdocError {
            message: message.to_string(),
            error_kind,
            cause: Some(Box::new(cause)),
            backtrace: atomic(Backtrace::new()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.error_kind
    }

    pub fn cause(&self) -> Option<&NestdocError> {
        self.cause.as_deref()
    }
}

impl Display for NestdocError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Debug for NestdocError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{}\nCaused by: {:?}", self.message, cause),
            None => {
                let backtrace = self.backtrace.read_with(|bt| format!("{:?}", bt));
                write!(f, "{}\n{}", self.message, backtrace)
            }
        }
    }
}

impl Error for NestdocError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(cause.as_ref()),
            None => None,
        }
    }
}

/// A result type alias for nestdoc operations.
pub type NestdocResult<T> = Result<T, NestdocError>;

impl From<std::fmt::Error> for NestdocError {
    fn from(err: std::fmt::Error) -> Self {
        NestdocError::new(
            &format!("Formatting error: {}", err),
            ErrorKind::InternalError,
        )
    }
}

impl From<std::num::ParseIntError> for NestdocError {
    fn from(err: std::num::ParseIntError) -> Self {
        NestdocError::new(
            &format!("Integer parsing error: {}", err),
            ErrorKind::InvalidDataType,
        )
    }
}

impl From<String> for NestdocError {
    fn from(msg: String) -> Self {
        NestdocError::new(&msg, ErrorKind::InternalError)
    }
}

impl From<&str> for NestdocError {
    fn from(msg: &str) -> Self {
        NestdocError::new(msg, ErrorKind::InternalError)
    }
}
