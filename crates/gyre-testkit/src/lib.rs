//! Gyre Testkit - in-memory collaborators for bridge tests
//!
//! [`MockRepository`] implements both collaborator traits of `gyre-sdk`:
//!
//! - an introspection database built with small builder calls
//!   (`object_type`, `add_property`, `method(..).arg(..).build()`, ...)
//! - a reference-counted object runtime whose instances live in real memory
//!   and count their references, finalizations and signal handlers
//!
//! Every entry token returned by a query is counted, so tests can assert
//! that the engine gave back everything it took
//! ([`MockRepository::outstanding_info_refs`]).

#![warn(missing_docs)]

mod database;
mod introspect;
mod runtime;

pub use database::{FunctionBuilder, MockList, MockRepository, NativeFn};
pub use runtime::INSTANCE_STORAGE;

/// Runtime type reported for the boxed generic value struct
pub const VALUE_BOX_TYPE: gyre_sdk::RuntimeType = gyre_sdk::RuntimeType::from_bits(1);

/// Version given to namespaces created implicitly by type builders
pub const DEFAULT_VERSION: &str = "1.0";
