//! Gyre Bridge Engine
//!
//! Exposes a native object system described by a type-introspection
//! database to an embedding interpreter:
//! - Argument codec between host values and native argument slots
//! - Member resolution with parent walks and property-name normalization
//! - Dynamic handles with construction, cast and member get/set
//! - Native invocation with argument-block lifetime and fault containment
//! - Signal connection with direct host callbacks

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod codec;
pub mod debug;
pub mod describe;
pub mod error;
pub mod handle;
pub mod host;
pub mod info;
pub mod invoke;
mod list;
pub mod options;
pub mod repository;
pub mod resolver;
pub mod signal;
pub mod value;

pub use describe::{MemberListing, MemberSection};
pub use error::{BridgeError, BridgeResult};
pub use handle::{DynamicHandle, Instance, Ownership};
pub use host::{HostClosure, HostInterpreter};
pub use info::TypeDescriptor;
pub use invoke::{CallableSignature, FatalSignal, Parameter};
pub use options::BridgeOptions;
pub use repository::{Namespace, NamespaceEntry, Repository};
pub use resolver::ResolvedMember;
pub use signal::{connect, CallbackTarget};
pub use value::{Arg, HostArray, HostValue};
