//! Bridge error types

use gyre_sdk::OracleError;

/// Errors surfaced to the host by bridge operations.
///
/// Every error is raised where it is detected and aborts the whole
/// host-visible operation; nothing is retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
    /// Host value does not fit the declared type
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch {
        /// What the declared type accepts
        expected: String,
        /// What the host supplied
        got: String,
    },

    /// Declared type is outside the supported conversion matrix
    #[error("Unsupported type: {0}")]
    UnsupportedType(String),

    /// No method, property, field or signal of that name
    #[error("No such member: {0}")]
    NoSuchMember(String),

    /// Enum has no value of that name
    #[error("No such enum value: {0}")]
    NoSuchEnumValue(String),

    /// Object type chain declares no such signal
    #[error("Object does not support signal \"{0}\"")]
    SignalNotSupported(String),

    /// `signal_` lookup exhausted the parent chain
    #[error("Signal {0} not found")]
    SignalNotFound(String),

    /// Handle cannot be evaluated in its current state
    #[error("Object is not callable: {0}")]
    NotCallable(String),

    /// Callable invoked with the wrong number of arguments
    #[error("function takes {expected} arguments, got {got}")]
    ArgumentCountMismatch {
        /// Declared argument count
        expected: usize,
        /// Supplied argument count
        got: usize,
    },

    /// Property lacks the readable flag
    #[error("property is not readable: {0}")]
    PropertyNotReadable(String),

    /// Property lacks the writable flag
    #[error("property is not writable: {0}")]
    PropertyNotWritable(String),

    /// Native call reported failure (message passed through verbatim)
    #[error("{0}")]
    NativeInvocationFailed(String),

    /// Fatal signal trapped during a native call
    #[error("native call received signal {0}")]
    NativeFatalSignal(String),

    /// Method invoked on a handle without an instance
    #[error("method {0} called without an instance")]
    NullReceiver(String),

    /// Signal declares more arguments than the callback tables cover
    #[error("unimplemented: callback with {0} arguments")]
    UnsupportedCallbackArity(usize),

    /// Handle carries no type information
    #[error("Object has no type information")]
    NoTypeInformation,

    /// Namespace could not be loaded
    #[error("{0}")]
    NamespaceLoadFailed(String),

    /// Native construction failed or produced nothing
    #[error("construction of {0} failed")]
    ConstructionFailed(String),

    /// Field read or write refused
    #[error("field access failed: {0}")]
    FieldAccessFailed(String),

    /// Navigation on an empty list
    #[error("G(S)List is nil")]
    NilList,

    /// `prev` on a singly linked list
    #[error("Single-linked list: no prev")]
    NoPrevious,

    /// List member other than data/next/prev/size
    #[error("Unknown action for G(S)List: {0}")]
    UnknownListMember(String),

    /// List index past the end
    #[error("index out of range: {0}")]
    IndexOutOfRange(i64),

    /// Member read without a host variable to receive it
    #[error("member {0} read without an output reference")]
    OutputNotReference(String),

    /// Native allocation failed
    #[error("could not allocate {0} bytes")]
    AllocationFailed(usize),

    /// Floating-point environment could not be saved
    #[error("fenv error")]
    FloatEnvironment,

    /// Collaborator failure outside a native call
    #[error(transparent)]
    Oracle(#[from] OracleError),

    /// Host interpreter failure
    #[error("host error: {0}")]
    Host(String),
}

impl BridgeError {
    /// Shorthand for a type mismatch
    pub fn mismatch(expected: impl Into<String>, got: impl Into<String>) -> Self {
        BridgeError::TypeMismatch {
            expected: expected.into(),
            got: got.into(),
        }
    }
}

/// Result type for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;
