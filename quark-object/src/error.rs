use crate::signal::SignalLink;
use quark_value::ActionId;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// An error surfaced by a call future.
///
/// The textual renditions are part of the engine's contract: remote peers
/// match on their prefixes.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Can't find methodID: {0}")]
    MethodNotFound(ActionId),

    #[error("Cannot find signal")]
    SignalNotFound(ActionId),

    #[error("Cannot find local signal connection.")]
    SignalConnectionNotFound(SignalLink),

    #[error(transparent)]
    Property(#[from] PropertyError),

    #[error("setProperty: {0}")]
    SetProperty(#[source] PropertyError),

    #[error("Time-out acquiring lock. Deadlock?")]
    LockTimeout,

    #[error("Unknown exception caught.")]
    UnknownException,

    #[error("object is being destroyed")]
    ObjectDying,

    #[error("the call promise was dropped before completion")]
    BrokenPromise,

    #[error(transparent)]
    Other(#[from] BoxError),
}

impl From<&str> for Error {
    fn from(err: &str) -> Self {
        Self::Other(err.into())
    }
}

impl From<String> for Error {
    fn from(err: String) -> Self {
        Self::Other(err.into())
    }
}

/// An error raised by a property cell.
#[derive(Debug, thiserror::Error)]
pub enum PropertyError {
    #[error("{0} is not the id of a property")]
    NotAProperty(ActionId),

    #[error("value of type \"{actual}\" does not conform to the property type \"{expected}\"")]
    TypeMismatch { expected: String, actual: String },
}
