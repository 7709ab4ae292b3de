//! Host-side values
//!
//! [`HostValue`] is what the embedding interpreter hands the bridge and gets
//! back. It mirrors the interpreter's tagged values: nil, integers, reals,
//! strings, raw pointers, typed arrays, and the bridge's own handles.

use std::ffi::c_void;
use std::fmt;

use crate::handle::DynamicHandle;
use crate::repository::Namespace;

/// Homogeneous host array
#[derive(Debug, Clone, PartialEq)]
pub enum HostArray {
    /// 8-bit values
    Char(Vec<u8>),
    /// 16-bit values
    Short(Vec<i16>),
    /// 32-bit values
    Int(Vec<i32>),
    /// 64-bit values
    Long(Vec<i64>),
    /// Single precision values
    Float(Vec<f32>),
    /// Double precision values
    Double(Vec<f64>),
    /// Strings
    Str(Vec<String>),
}

impl HostArray {
    /// Number of elements
    pub fn len(&self) -> usize {
        match self {
            HostArray::Char(v) => v.len(),
            HostArray::Short(v) => v.len(),
            HostArray::Int(v) => v.len(),
            HostArray::Long(v) => v.len(),
            HostArray::Float(v) => v.len(),
            HostArray::Double(v) => v.len(),
            HostArray::Str(v) => v.len(),
        }
    }

    /// Whether the array has no elements
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element type name used in diagnostics
    pub fn element_name(&self) -> &'static str {
        match self {
            HostArray::Char(_) => "char",
            HostArray::Short(_) => "short",
            HostArray::Int(_) => "int",
            HostArray::Long(_) => "long",
            HostArray::Float(_) => "float",
            HostArray::Double(_) => "double",
            HostArray::Str(_) => "string",
        }
    }
}

/// A host interpreter value
#[derive(Clone)]
pub enum HostValue {
    /// The "no value" marker
    Nil,
    /// Integer
    Int(i64),
    /// Real
    Real(f64),
    /// String
    Str(String),
    /// Raw native pointer
    Pointer(*mut c_void),
    /// Typed array
    Array(HostArray),
    /// Bridge handle on a native entity
    Handle(DynamicHandle),
    /// Loaded namespace
    Namespace(Namespace),
}

impl HostValue {
    /// Whether this is nil
    pub fn is_nil(&self) -> bool {
        matches!(self, HostValue::Nil)
    }

    /// Integer view (reals truncate)
    pub fn as_int(&self) -> Option<i64> {
        match self {
            HostValue::Int(i) => Some(*i),
            HostValue::Real(r) => Some(*r as i64),
            _ => None,
        }
    }

    /// Real view (integers widen)
    pub fn as_real(&self) -> Option<f64> {
        match self {
            HostValue::Int(i) => Some(*i as f64),
            HostValue::Real(r) => Some(*r),
            _ => None,
        }
    }

    /// String view
    pub fn as_str(&self) -> Option<&str> {
        match self {
            HostValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Handle view
    pub fn as_handle(&self) -> Option<&DynamicHandle> {
        match self {
            HostValue::Handle(h) => Some(h),
            _ => None,
        }
    }

    /// Host truth value: non-zero numbers, non-empty strings and non-null
    /// pointers or instances are true.
    pub fn truthy(&self) -> bool {
        match self {
            HostValue::Nil => false,
            HostValue::Int(i) => *i != 0,
            HostValue::Real(r) => *r != 0.0,
            HostValue::Str(s) => !s.is_empty(),
            HostValue::Pointer(p) => !p.is_null(),
            HostValue::Array(a) => !a.is_empty(),
            HostValue::Handle(h) => h.is_bound(),
            HostValue::Namespace(_) => true,
        }
    }

    /// Type name used in diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            HostValue::Nil => "nil",
            HostValue::Int(_) => "integer",
            HostValue::Real(_) => "real",
            HostValue::Str(_) => "string",
            HostValue::Pointer(_) => "pointer",
            HostValue::Array(_) => "array",
            HostValue::Handle(_) => "handle",
            HostValue::Namespace(_) => "namespace",
        }
    }
}

impl PartialEq for HostValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (HostValue::Nil, HostValue::Nil) => true,
            (HostValue::Int(a), HostValue::Int(b)) => a == b,
            (HostValue::Real(a), HostValue::Real(b)) => a == b,
            (HostValue::Str(a), HostValue::Str(b)) => a == b,
            (HostValue::Pointer(a), HostValue::Pointer(b)) => a == b,
            (HostValue::Array(a), HostValue::Array(b)) => a == b,
            (HostValue::Handle(a), HostValue::Handle(b)) => a.same_entity(b),
            (HostValue::Namespace(a), HostValue::Namespace(b)) => {
                a.name() == b.name() && a.version() == b.version()
            }
            _ => false,
        }
    }
}

impl fmt::Debug for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::Nil => write!(f, "Nil"),
            HostValue::Int(i) => write!(f, "Int({})", i),
            HostValue::Real(r) => write!(f, "Real({})", r),
            HostValue::Str(s) => write!(f, "Str({:?})", s),
            HostValue::Pointer(p) => write!(f, "Pointer({:p})", *p),
            HostValue::Array(a) => write!(f, "Array({:?})", a),
            HostValue::Handle(h) => write!(f, "Handle({})", h),
            HostValue::Namespace(ns) => write!(f, "Namespace({})", ns),
        }
    }
}

impl From<i64> for HostValue {
    fn from(value: i64) -> Self {
        HostValue::Int(value)
    }
}

impl From<f64> for HostValue {
    fn from(value: f64) -> Self {
        HostValue::Real(value)
    }
}

impl From<&str> for HostValue {
    fn from(value: &str) -> Self {
        HostValue::Str(value.to_string())
    }
}

impl From<String> for HostValue {
    fn from(value: String) -> Self {
        HostValue::Str(value)
    }
}

impl From<DynamicHandle> for HostValue {
    fn from(value: DynamicHandle) -> Self {
        HostValue::Handle(value)
    }
}

/// One argument of a handle evaluation, as the host parsed it
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    /// Positional value
    Value(HostValue),
    /// `name=value` keyword
    Keyword {
        /// Keyword name
        name: String,
        /// Keyword value
        value: HostValue,
    },
    /// Bare identifier (a member name written without quotes)
    Symbol(String),
    /// Reference to a host variable that receives a result
    Output(String),
}

impl Arg {
    /// Keyword argument
    pub fn keyword(name: impl Into<String>, value: impl Into<HostValue>) -> Self {
        Arg::Keyword {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Positional argument
    pub fn value(value: impl Into<HostValue>) -> Self {
        Arg::Value(value.into())
    }

    /// Member name when used as a name position (string or bare symbol)
    pub(crate) fn as_name(&self) -> Option<&str> {
        match self {
            Arg::Value(HostValue::Str(s)) | Arg::Symbol(s) => Some(s),
            _ => None,
        }
    }
}
