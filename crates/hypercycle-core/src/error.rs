use std::{error::Error, fmt};

/// Contract violations raised by cell, urn and space operations.
///
/// Soft outcomes of a tick (no product, exhausted energy) are not errors; see
/// [`crate::space::ChainOutcome`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A value outside the operation's domain (bad product type, coordinates
    /// off the grid, adding to a dead cell).
    InvalidArgument(String),
    /// A lookup with no match where the contract requires one.
    NotFound(String),
}

impl CoreError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        CoreError::InvalidArgument(msg.into())
    }

    pub(crate) fn not_found(msg: impl Into<String>) -> Self {
        CoreError::NotFound(msg.into())
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            CoreError::NotFound(msg) => write!(f, "not found: {msg}"),
        }
    }
}

impl Error for CoreError {}
