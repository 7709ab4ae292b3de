//! Descriptive types shared with the introspection database
//!
//! Everything here is plain data: opaque tokens, tags and flag sets. None of
//! these types own native resources.

use std::fmt;
use std::ops::BitOr;

// ============================================================================
// Tokens
// ============================================================================

/// Opaque token naming one entry in the introspection database.
///
/// Tokens are reference counted by the database. Every method of
/// [`Introspector`](crate::Introspector) that returns a `RawInfo` hands the
/// caller one new reference, which must be given back with
/// [`info_unref`](crate::Introspector::info_unref).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct RawInfo(u64);

impl RawInfo {
    /// Create from raw bits
    #[inline]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Get raw bits
    #[inline]
    pub const fn to_bits(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for RawInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawInfo({:#x})", self.0)
    }
}

/// Identifier of a type registered with the native object runtime
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct RuntimeType(u64);

impl RuntimeType {
    /// The "no type" marker
    pub const INVALID: RuntimeType = RuntimeType(0);

    /// Create from raw bits
    #[inline]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Get raw bits
    #[inline]
    pub const fn to_bits(self) -> u64 {
        self.0
    }

    /// Whether this names a registered type
    #[inline]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Debug for RuntimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RuntimeType({})", self.0)
    }
}

// ============================================================================
// Kinds and tags
// ============================================================================

/// Kind of an introspection entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InfoKind {
    /// Not a valid entry
    Invalid,
    /// Free function, method or constructor
    Function,
    /// Callback (function pointer) type
    Callback,
    /// Plain C structure
    Struct,
    /// Boxed (copyable registered) type
    Boxed,
    /// Enumeration
    Enum,
    /// Bit-flag enumeration
    Flags,
    /// Reference-counted object class
    Object,
    /// Object interface
    Interface,
    /// Named constant
    Constant,
    /// C union
    Union,
    /// Single enumeration value
    Value,
    /// Signal declared on an object or interface
    Signal,
    /// Virtual function slot
    VFunc,
    /// Object property
    Property,
    /// Structure or object field
    Field,
    /// Callable argument
    Arg,
    /// Type information (scalars, arrays, lists, interface references)
    Type,
    /// Reference into a namespace that is not loaded
    Unresolved,
}

impl InfoKind {
    /// Lower-case name used in listings and diagnostics
    pub fn name(self) -> &'static str {
        match self {
            InfoKind::Invalid => "invalid",
            InfoKind::Function => "function",
            InfoKind::Callback => "callback",
            InfoKind::Struct => "struct",
            InfoKind::Boxed => "boxed",
            InfoKind::Enum => "enum",
            InfoKind::Flags => "flags",
            InfoKind::Object => "object",
            InfoKind::Interface => "interface",
            InfoKind::Constant => "constant",
            InfoKind::Union => "union",
            InfoKind::Value => "value",
            InfoKind::Signal => "signal",
            InfoKind::VFunc => "vfunc",
            InfoKind::Property => "property",
            InfoKind::Field => "field",
            InfoKind::Arg => "arg",
            InfoKind::Type => "type",
            InfoKind::Unresolved => "unresolved",
        }
    }

    /// Entries that can be invoked through the generic invoke primitive
    pub fn is_callable(self) -> bool {
        matches!(
            self,
            InfoKind::Function | InfoKind::Callback | InfoKind::Signal | InfoKind::VFunc
        )
    }

    /// Entries backed by a runtime-registered type
    pub fn is_registered_type(self) -> bool {
        matches!(
            self,
            InfoKind::Struct
                | InfoKind::Boxed
                | InfoKind::Enum
                | InfoKind::Flags
                | InfoKind::Object
                | InfoKind::Interface
                | InfoKind::Union
        )
    }

    /// Struct-like entries whose instances are plain memory blocks
    pub fn is_struct_like(self) -> bool {
        matches!(self, InfoKind::Struct | InfoKind::Boxed | InfoKind::Union)
    }
}

impl fmt::Display for InfoKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Tag of a type-information entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    /// No value (or untyped pointer)
    Void,
    /// Boolean
    Boolean,
    /// Signed 8-bit integer
    Int8,
    /// Unsigned 8-bit integer
    UInt8,
    /// Signed 16-bit integer
    Int16,
    /// Unsigned 16-bit integer
    UInt16,
    /// Signed 32-bit integer
    Int32,
    /// Unsigned 32-bit integer
    UInt32,
    /// Signed 64-bit integer
    Int64,
    /// Unsigned 64-bit integer
    UInt64,
    /// Single precision float
    Float,
    /// Double precision float
    Double,
    /// Runtime type identifier
    GType,
    /// UTF-8 string
    Utf8,
    /// File-system path string
    Filename,
    /// Array (see [`ArrayKind`])
    Array,
    /// Reference to another entry (object, struct, enum, callback...)
    Interface,
    /// Doubly linked list
    GList,
    /// Singly linked list
    GSList,
    /// Hash table
    GHash,
    /// Error record
    Error,
    /// Unicode code point
    Unichar,
}

impl TypeTag {
    /// Lower-case name used in diagnostics
    pub fn name(self) -> &'static str {
        match self {
            TypeTag::Void => "void",
            TypeTag::Boolean => "boolean",
            TypeTag::Int8 => "int8",
            TypeTag::UInt8 => "uint8",
            TypeTag::Int16 => "int16",
            TypeTag::UInt16 => "uint16",
            TypeTag::Int32 => "int32",
            TypeTag::UInt32 => "uint32",
            TypeTag::Int64 => "int64",
            TypeTag::UInt64 => "uint64",
            TypeTag::Float => "float",
            TypeTag::Double => "double",
            TypeTag::GType => "gtype",
            TypeTag::Utf8 => "utf8",
            TypeTag::Filename => "filename",
            TypeTag::Array => "array",
            TypeTag::Interface => "interface",
            TypeTag::GList => "glist",
            TypeTag::GSList => "gslist",
            TypeTag::GHash => "ghash",
            TypeTag::Error => "error",
            TypeTag::Unichar => "unichar",
        }
    }

    /// Linked-list tags
    pub fn is_list(self) -> bool {
        matches!(self, TypeTag::GList | TypeTag::GSList)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Storage representation of an array type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArrayKind {
    /// Contiguous C array
    C,
    /// Runtime-managed growable array
    Array,
    /// Runtime-managed pointer array
    PtrArray,
    /// Runtime-managed byte array
    ByteArray,
}

/// Direction of a callable argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Caller to callee
    In,
    /// Callee to caller
    Out,
    /// Both ways through the same storage
    InOut,
}

/// Kind of member enumerated on a container entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    /// Methods and constructors
    Method,
    /// Object or interface properties
    Property,
    /// Struct or object fields
    Field,
    /// Signals
    Signal,
    /// Virtual functions
    VFunc,
    /// Constants declared on the type
    Constant,
    /// Enumeration values
    Value,
}

impl MemberKind {
    /// Plural heading used in listings
    pub fn heading(self) -> &'static str {
        match self {
            MemberKind::Method => "methods",
            MemberKind::Property => "properties",
            MemberKind::Field => "fields",
            MemberKind::Signal => "signals",
            MemberKind::VFunc => "virtual functions",
            MemberKind::Constant => "constants",
            MemberKind::Value => "values",
        }
    }
}

// ============================================================================
// Flag sets
// ============================================================================

macro_rules! flag_set {
    ($(#[$meta:meta])* $name:ident { $($(#[$fmeta:meta])* $flag:ident = $bit:expr;)* }) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
        #[repr(transparent)]
        pub struct $name(u32);

        impl $name {
            /// No flags set
            pub const NONE: $name = $name(0);
            $($(#[$fmeta])* pub const $flag: $name = $name($bit);)*

            /// Create from raw bits
            #[inline]
            pub const fn from_bits(bits: u32) -> Self {
                Self(bits)
            }

            /// Get raw bits
            #[inline]
            pub const fn bits(self) -> u32 {
                self.0
            }

            /// Whether every flag of `other` is set
            #[inline]
            pub const fn contains(self, other: $name) -> bool {
                self.0 & other.0 == other.0
            }
        }

        impl BitOr for $name {
            type Output = $name;

            fn bitor(self, rhs: $name) -> $name {
                $name(self.0 | rhs.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let mut list = f.debug_set();
                $(if self.contains($name::$flag) && $bit != 0 {
                    list.entry(&stringify!($flag));
                })*
                list.finish()
            }
        }
    };
}

flag_set! {
    /// Flags of a function entry
    FunctionFlags {
        /// Takes the instance as an implicit first argument
        IS_METHOD = 1 << 0;
        /// Constructs a new instance
        IS_CONSTRUCTOR = 1 << 1;
        /// Property getter
        IS_GETTER = 1 << 2;
        /// Property setter
        IS_SETTER = 1 << 3;
        /// Wraps a virtual function
        WRAPS_VFUNC = 1 << 4;
        /// Reports failures through an error out-argument
        THROWS = 1 << 5;
    }
}

flag_set! {
    /// Access flags of a property
    PropertyFlags {
        /// Value can be read
        READABLE = 1 << 0;
        /// Value can be written
        WRITABLE = 1 << 1;
        /// Set during construction
        CONSTRUCT = 1 << 2;
        /// Only settable during construction
        CONSTRUCT_ONLY = 1 << 3;
    }
}

impl PropertyFlags {
    /// Both readable and writable
    pub const READWRITE: PropertyFlags = PropertyFlags(1 | 2);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_set_contains() {
        let flags = FunctionFlags::IS_METHOD | FunctionFlags::THROWS;
        assert!(flags.contains(FunctionFlags::IS_METHOD));
        assert!(flags.contains(FunctionFlags::THROWS));
        assert!(!flags.contains(FunctionFlags::IS_CONSTRUCTOR));
        assert!(flags.contains(FunctionFlags::NONE));
    }

    #[test]
    fn test_property_readwrite() {
        assert!(PropertyFlags::READWRITE.contains(PropertyFlags::READABLE));
        assert!(PropertyFlags::READWRITE.contains(PropertyFlags::WRITABLE));
        assert!(!PropertyFlags::READABLE.contains(PropertyFlags::WRITABLE));
    }

    #[test]
    fn test_flag_debug_lists_names() {
        let text = format!("{:?}", FunctionFlags::IS_METHOD);
        assert_eq!(text, "{\"IS_METHOD\"}");
    }

    #[test]
    fn test_kind_helpers() {
        assert!(InfoKind::Signal.is_callable());
        assert!(!InfoKind::Object.is_callable());
        assert!(InfoKind::Boxed.is_struct_like());
        assert!(InfoKind::Enum.is_registered_type());
        assert_eq!(TypeTag::GSList.to_string(), "gslist");
        assert!(TypeTag::GList.is_list());
    }

    #[test]
    fn test_runtime_type_validity() {
        assert!(!RuntimeType::INVALID.is_valid());
        assert!(RuntimeType::from_bits(80).is_valid());
    }
}
