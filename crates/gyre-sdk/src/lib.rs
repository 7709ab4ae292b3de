//! Gyre SDK - contracts between the bridge and its collaborators
//!
//! This crate holds the pieces that both sides of the bridge agree on without
//! depending on the engine itself:
//!
//! - [`Introspector`]: read-only queries against a type-introspection database
//! - [`ObjectRuntime`]: the reference-counted native object system
//! - [`ArgumentSlot`] / [`ValueBox`]: values exchanged across the native boundary
//! - the type tags, info kinds and flag sets that describe native entities
//!
//! An adapter for a concrete introspection library implements both traits;
//! the blanket [`Oracle`] impl then makes it usable by `gyre-engine`.

#![warn(missing_docs)]

pub mod error;
pub mod oracle;
pub mod slot;
pub mod types;

pub use error::{OracleError, OracleResult};
pub use oracle::{Introspector, ObjectRuntime, Oracle, PropertyInit, SignalHandler};
pub use slot::{ArgumentSlot, ValueBox};
pub use types::{
    ArrayKind, Direction, FunctionFlags, InfoKind, MemberKind, PropertyFlags, RawInfo,
    RuntimeType, TypeTag,
};
