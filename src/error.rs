use thiserror::Error;

use crate::{callback::CallbackPanic, userdata::UserdataBorrowError};

/// Errors raised by handles, wrappers and the callback boundary.
#[derive(Debug, Error)]
pub enum Error {
    /// The handle was closed or disarmed.
    #[error("cannot use closed object")]
    ClosedObject,

    /// `close`/`disarm` could not take the exclusive lock because the handle is in use.
    #[error("recursive lock detected, cannot {0} object")]
    RecursiveLock(&'static str),

    #[error("cannot disarm closed object")]
    DisarmClosed,

    /// The owning VM has been closed.
    #[error("cannot {0} on closed Lua VM")]
    VmClosed(&'static str),

    /// An object was used with a VM that does not own it.
    #[error("cannot use {0} from a different Lua instance")]
    ForeignVm(&'static str),

    #[error("{0} pointer is null")]
    NullPointer(&'static str),

    /// A host callback failed or panicked.
    #[error("{0}")]
    Callback(String),

    /// An error string handed over by the native engine.
    #[error("{0}")]
    Native(String),

    #[error(transparent)]
    Borrow(#[from] UserdataBorrowError),

    #[error("expected at least {expected} values but got {got} values")]
    MissingValue { expected: usize, got: usize },

    #[error("expected arg #{index} to be a {expected}, but got {got}")]
    TypeMismatch {
        index: usize,
        expected: &'static str,
        got: &'static str,
    },

    /// More than one value failed to close; each failure is kept.
    #[error("multiple errors occurred while closing values: {}", join_errors(.0))]
    CloseMany(Vec<Error>),

    /// An offset and length reaching past the end of a buffer.
    #[error("range {offset}..{offset}+{len} out of bounds for buffer of {size} bytes")]
    OutOfBounds { offset: usize, len: usize, size: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn join_errors(errors: &[Error]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<CallbackPanic> for Error {
    fn from(panic: CallbackPanic) -> Self {
        Error::Callback(panic.0)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
