use std::error::Error;
use std::fmt::{self, Display, Formatter};

/// The kind of error that occurred while talking to the backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No response was received at all.
    Transport,
    /// The backend answered with a non-2xx status.
    Status,
    /// The backend rejected the bearer credential.
    Unauthorized,
    /// The referenced resource does not exist (anymore).
    NotFound,
    /// The backend answered successfully, but the body could not be
    /// understood.
    InvalidResponse,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Transport => write!(f, "Transport error"),
            ErrorKind::Status => write!(f, "Backend error"),
            ErrorKind::Unauthorized => write!(f, "Unauthorized"),
            ErrorKind::NotFound => write!(f, "Not found"),
            ErrorKind::InvalidResponse => write!(f, "Invalid response"),
        }
    }
}

/// The error type for a backend.
///
/// The `Display` output is the user-facing message, the one the client
/// shows inline or next to the affected control.
pub trait BackendError: Error + Send + Sync + 'static {
    /// Returns the kind of this error.
    fn kind(&self) -> ErrorKind;

    /// Returns the HTTP status the backend answered with, if any.
    fn status(&self) -> Option<u16> {
        None
    }
}
