//! Error types reported by introspection and object-runtime collaborators

/// Collaborator-side failure.
///
/// The text carried by each variant is the collaborator's own message; the
/// bridge surfaces it to the host unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    /// A namespace could not be loaded
    #[error("{0}")]
    Namespace(String),

    /// The generic invoke primitive reported failure
    #[error("{0}")]
    Invocation(String),

    /// Object construction was refused
    #[error("{0}")]
    Construction(String),

    /// Property read or write was refused
    #[error("{0}")]
    Property(String),

    /// Field read or write was refused
    #[error("{0}")]
    Field(String),

    /// Signal connection failed
    #[error("{0}")]
    Signal(String),
}

/// Result type for collaborator operations
pub type OracleResult<T> = Result<T, OracleError>;
