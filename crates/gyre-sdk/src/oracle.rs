//! Collaborator traits consumed by the bridge
//!
//! [`Introspector`] answers questions about declared types; [`ObjectRuntime`]
//! manipulates live instances of the native object system. Both are
//! object-safe so the engine can hold them as `Rc<dyn Oracle>`.
//!
//! # Reference conventions
//!
//! Every `Option<RawInfo>` returned by an [`Introspector`] method carries one
//! new reference owned by the caller. Instance pointers passed to
//! [`ObjectRuntime`] methods are borrowed unless the method says otherwise.

use std::ffi::c_void;
use std::path::{Path, PathBuf};

use crate::error::OracleResult;
use crate::slot::ArgumentSlot;
use crate::types::{
    ArrayKind, Direction, FunctionFlags, InfoKind, MemberKind, PropertyFlags, RawInfo,
    RuntimeType, TypeTag,
};

/// Handler installed on a native signal.
///
/// Receives the emitter in slot 0 followed by the signal's declared
/// arguments, and returns the handler's result slot.
pub type SignalHandler = Box<dyn Fn(&[ArgumentSlot]) -> ArgumentSlot>;

/// One property initializer passed to object construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyInit {
    /// Canonical property name
    pub name: String,
    /// Encoded value
    pub value: ArgumentSlot,
}

// ============================================================================
// Introspector
// ============================================================================

/// Read-only view of the type-introspection database.
pub trait Introspector {
    // ------------------------------------------------------------------------
    // Entry lifecycle and identity
    // ------------------------------------------------------------------------

    /// Take one more reference on an entry
    fn info_ref(&self, info: RawInfo);

    /// Give back one reference on an entry
    fn info_unref(&self, info: RawInfo);

    /// Kind of an entry
    fn info_kind(&self, info: RawInfo) -> InfoKind;

    /// Declared name (type entries have none)
    fn info_name(&self, info: RawInfo) -> Option<String>;

    /// Namespace the entry belongs to
    fn info_namespace(&self, info: RawInfo) -> Option<String>;

    // ------------------------------------------------------------------------
    // Repository
    // ------------------------------------------------------------------------

    /// Load a namespace, returning the version that was loaded
    fn require(&self, namespace: &str, version: Option<&str>) -> OracleResult<String>;

    /// Load a namespace from a private directory
    fn require_private(
        &self,
        dir: &Path,
        namespace: &str,
        version: Option<&str>,
    ) -> OracleResult<String>;

    /// Current typelib search path
    fn search_path(&self) -> Vec<PathBuf>;

    /// Add a directory at the front of the search path
    fn prepend_search_path(&self, dir: &Path);

    /// Whether a namespace (optionally a specific version) is loaded
    fn is_registered(&self, namespace: &str, version: Option<&str>) -> bool;

    /// Loaded version of a namespace
    fn version(&self, namespace: &str) -> Option<String>;

    /// Versions available for a namespace
    fn enumerate_versions(&self, namespace: &str) -> Vec<String>;

    /// Names of loaded namespaces
    fn loaded_namespaces(&self) -> Vec<String>;

    /// Number of top-level entries in a loaded namespace
    fn n_infos(&self, namespace: &str) -> usize;

    /// Top-level entry by index
    fn info_at(&self, namespace: &str, index: usize) -> Option<RawInfo>;

    /// Top-level entry by name
    fn find_by_name(&self, namespace: &str, name: &str) -> Option<RawInfo>;

    /// Entry describing a runtime type
    fn find_by_runtime_type(&self, rtype: RuntimeType) -> Option<RawInfo>;

    // ------------------------------------------------------------------------
    // Container members
    // ------------------------------------------------------------------------

    /// Number of members of a kind declared directly on a container
    fn n_members(&self, info: RawInfo, kind: MemberKind) -> usize;

    /// Member by index
    fn member(&self, info: RawInfo, kind: MemberKind, index: usize) -> Option<RawInfo>;

    /// Declared parent of an object type
    fn parent(&self, info: RawInfo) -> Option<RawInfo>;

    /// Runtime type registered for a type entry
    fn registered_type(&self, info: RawInfo) -> RuntimeType;

    /// Size in bytes of a struct-like entry
    fn struct_size(&self, info: RawInfo) -> usize;

    /// Runtime type of the boxed generic value
    fn value_box_type(&self) -> RuntimeType;

    // ------------------------------------------------------------------------
    // Type information
    // ------------------------------------------------------------------------

    /// Tag of a type entry
    fn type_tag(&self, ty: RawInfo) -> TypeTag;

    /// Entry referenced by an interface-tagged type
    fn type_interface(&self, ty: RawInfo) -> Option<RawInfo>;

    /// Parameter type (array element, list element...)
    fn type_param(&self, ty: RawInfo, index: usize) -> Option<RawInfo>;

    /// Whether the type is passed by pointer
    fn type_is_pointer(&self, ty: RawInfo) -> bool;

    /// Storage kind of an array type
    fn array_kind(&self, ty: RawInfo) -> ArrayKind;

    /// Index of the argument carrying the array length
    fn array_length_index(&self, ty: RawInfo) -> Option<usize>;

    /// Fixed element count
    fn array_fixed_size(&self, ty: RawInfo) -> Option<usize>;

    /// Whether the array ends with a zero element
    fn array_zero_terminated(&self, ty: RawInfo) -> bool;

    // ------------------------------------------------------------------------
    // Enums
    // ------------------------------------------------------------------------

    /// Storage tag of an enum or flags entry
    fn enum_storage(&self, info: RawInfo) -> TypeTag;

    /// Numeric value of an enum value entry
    fn value_of(&self, value: RawInfo) -> i64;

    // ------------------------------------------------------------------------
    // Callables
    // ------------------------------------------------------------------------

    /// Number of declared arguments (receiver excluded)
    fn callable_n_args(&self, callable: RawInfo) -> usize;

    /// Argument entry by index
    fn callable_arg(&self, callable: RawInfo, index: usize) -> Option<RawInfo>;

    /// Declared return type
    fn callable_return_type(&self, callable: RawInfo) -> Option<RawInfo>;

    /// Flags of a function entry
    fn function_flags(&self, function: RawInfo) -> FunctionFlags;

    /// Direction of an argument entry
    fn arg_direction(&self, arg: RawInfo) -> Direction;

    /// Declared type of an argument entry
    fn arg_type(&self, arg: RawInfo) -> Option<RawInfo>;

    // ------------------------------------------------------------------------
    // Properties, fields, constants
    // ------------------------------------------------------------------------

    /// Declared type of a property
    fn property_type(&self, property: RawInfo) -> Option<RawInfo>;

    /// Access flags of a property
    fn property_flags(&self, property: RawInfo) -> PropertyFlags;

    /// Declared type of a field
    fn field_type(&self, field: RawInfo) -> Option<RawInfo>;

    /// Read a field out of an instance
    fn field_get(&self, field: RawInfo, instance: *mut c_void) -> OracleResult<ArgumentSlot>;

    /// Write a field of an instance
    fn field_set(
        &self,
        field: RawInfo,
        instance: *mut c_void,
        value: ArgumentSlot,
    ) -> OracleResult<()>;

    /// Declared type of a constant
    fn constant_type(&self, constant: RawInfo) -> Option<RawInfo>;

    /// Value of a constant
    fn constant_value(&self, constant: RawInfo) -> OracleResult<ArgumentSlot>;

    // ------------------------------------------------------------------------
    // Invocation
    // ------------------------------------------------------------------------

    /// Generic invoke primitive.
    ///
    /// `in_args` holds the receiver (for methods) followed by in and inout
    /// arguments; `out_args` holds out and inout arguments and is written by
    /// the callee. Returns the return slot, or the callee's error message.
    fn invoke(
        &self,
        callable: RawInfo,
        in_args: &[ArgumentSlot],
        out_args: &mut [ArgumentSlot],
    ) -> OracleResult<ArgumentSlot>;
}

// ============================================================================
// Object runtime
// ============================================================================

/// Live-instance operations of the native object system.
pub trait ObjectRuntime {
    /// Add one reference to an instance
    fn object_ref(&self, instance: *mut c_void);

    /// Drop one reference from an instance
    fn object_unref(&self, instance: *mut c_void);

    /// Current reference count
    fn ref_count(&self, instance: *mut c_void) -> u32;

    /// Whether the pointer is a live reference-counted instance
    fn is_object(&self, instance: *mut c_void) -> bool;

    /// Whether the instance still holds an unclaimed (floating) reference
    fn is_floating(&self, instance: *mut c_void) -> bool;

    /// Claim the floating reference, or add one if none is floating
    fn ref_sink(&self, instance: *mut c_void);

    /// Concrete runtime type of an instance
    fn type_of_instance(&self, instance: *mut c_void) -> RuntimeType;

    /// Registered name of a runtime type
    fn type_name(&self, rtype: RuntimeType) -> Option<String>;

    /// Whether `rtype` is `ancestor` or derives from it
    fn type_is_a(&self, rtype: RuntimeType, ancestor: RuntimeType) -> bool;

    /// Construct an instance. The returned pointer carries the
    /// construction reference (possibly floating).
    fn new_object(&self, rtype: RuntimeType, params: &[PropertyInit])
        -> OracleResult<*mut c_void>;

    /// Read a property by canonical name
    fn get_property(&self, instance: *mut c_void, name: &str) -> OracleResult<ArgumentSlot>;

    /// Write a property by canonical name
    fn set_property(
        &self,
        instance: *mut c_void,
        name: &str,
        value: ArgumentSlot,
    ) -> OracleResult<()>;

    /// Attach a handler to a named signal, returning the connection id.
    /// The runtime owns the handler until the instance is finalized.
    fn connect_signal(
        &self,
        instance: *mut c_void,
        signal: &str,
        handler: SignalHandler,
    ) -> OracleResult<u64>;
}

/// Everything the bridge needs from its collaborators.
pub trait Oracle: Introspector + ObjectRuntime {}

impl<T: Introspector + ObjectRuntime + ?Sized> Oracle for T {}
