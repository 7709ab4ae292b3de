//! Argument codec
//!
//! Converts between [`HostValue`]s and [`ArgumentSlot`]s under a declared
//! type. The declared (tag, interface kind) pair is classified once into a
//! [`SlotShape`]; encode and decode are then a single match over the shape.
//! Combinations outside the supported matrix fail in `classify` with
//! [`BridgeError::UnsupportedType`] and never produce a zero value.
//!
//! Integer conversions truncate silently to the declared width.

use std::ffi::{c_char, c_void, CStr};

use gyre_sdk::{ArgumentSlot, ArrayKind, InfoKind, TypeTag, ValueBox};

use crate::bridge_trace;
use crate::error::{BridgeError, BridgeResult};
use crate::handle::DynamicHandle;
use crate::info::TypeDescriptor;
use crate::invoke::block::{ArgumentBlock, NativeBuffer};
use crate::repository::Repository;
use crate::value::{HostArray, HostValue};

// ============================================================================
// Shapes
// ============================================================================

/// Fixed-width numeric representation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScalarKind {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float,
    Double,
}

impl ScalarKind {
    pub(crate) fn from_tag(tag: TypeTag) -> Option<Self> {
        Some(match tag {
            TypeTag::Int8 => ScalarKind::Int8,
            TypeTag::UInt8 => ScalarKind::UInt8,
            TypeTag::Int16 => ScalarKind::Int16,
            TypeTag::UInt16 => ScalarKind::UInt16,
            TypeTag::Int32 => ScalarKind::Int32,
            TypeTag::UInt32 => ScalarKind::UInt32,
            TypeTag::Int64 => ScalarKind::Int64,
            TypeTag::UInt64 => ScalarKind::UInt64,
            TypeTag::Float => ScalarKind::Float,
            TypeTag::Double => ScalarKind::Double,
            _ => return None,
        })
    }

    fn is_integer(self) -> bool {
        !matches!(self, ScalarKind::Float | ScalarKind::Double)
    }

    fn encode(self, value: &HostValue) -> BridgeResult<ArgumentSlot> {
        match self {
            ScalarKind::Float => Ok(ArgumentSlot::f32(host_real(value)? as f32)),
            ScalarKind::Double => Ok(ArgumentSlot::f64(host_real(value)?)),
            _ => {
                let i = host_int(value)?;
                Ok(match self {
                    ScalarKind::Int8 => ArgumentSlot::i8(i as i8),
                    ScalarKind::UInt8 => ArgumentSlot::u8(i as u8),
                    ScalarKind::Int16 => ArgumentSlot::i16(i as i16),
                    ScalarKind::UInt16 => ArgumentSlot::u16(i as u16),
                    ScalarKind::Int32 => ArgumentSlot::i32(i as i32),
                    ScalarKind::UInt32 => ArgumentSlot::u32(i as u32),
                    ScalarKind::Int64 => ArgumentSlot::i64(i),
                    _ => ArgumentSlot::u64(i as u64),
                })
            }
        }
    }

    fn decode(self, slot: ArgumentSlot) -> HostValue {
        match self {
            ScalarKind::Int8 => HostValue::Int(slot.as_i8() as i64),
            ScalarKind::UInt8 => HostValue::Int(slot.as_u8() as i64),
            ScalarKind::Int16 => HostValue::Int(slot.as_i16() as i64),
            ScalarKind::UInt16 => HostValue::Int(slot.as_u16() as i64),
            ScalarKind::Int32 => HostValue::Int(slot.as_i32() as i64),
            ScalarKind::UInt32 => HostValue::Int(slot.as_u32() as i64),
            ScalarKind::Int64 => HostValue::Int(slot.as_i64()),
            ScalarKind::UInt64 => HostValue::Int(slot.as_u64() as i64),
            ScalarKind::Float => HostValue::Real(slot.as_f32() as f64),
            ScalarKind::Double => HostValue::Real(slot.as_f64()),
        }
    }
}

/// Classified declared type
#[derive(Debug)]
pub(crate) enum SlotShape {
    Void,
    Boolean,
    Scalar(ScalarKind),
    Str,
    CArray {
        element: TypeDescriptor,
        zero_terminated: bool,
        fixed_size: Option<usize>,
    },
    Enum(ScalarKind),
    Object(TypeDescriptor),
    Interface(TypeDescriptor),
    Struct {
        iface: TypeDescriptor,
        value_box: bool,
    },
    Callback,
    List,
}

/// Classify a type entry into the supported matrix
pub(crate) fn classify(ty: &TypeDescriptor) -> BridgeResult<SlotShape> {
    let tag = ty.tag();
    let oracle = ty.oracle();
    let shape = match tag {
        TypeTag::Void => SlotShape::Void,
        TypeTag::Boolean => SlotShape::Boolean,
        TypeTag::Utf8 | TypeTag::Filename => SlotShape::Str,
        TypeTag::GList | TypeTag::GSList => SlotShape::List,
        TypeTag::Array => {
            let kind = ty.array_kind();
            bridge_trace!(
                ?kind,
                length = ?oracle.array_length_index(ty.raw()),
                fixed_size = ?oracle.array_fixed_size(ty.raw()),
                zero_terminated = oracle.array_zero_terminated(ty.raw()),
                "array argument"
            );
            if kind != ArrayKind::C {
                return Err(BridgeError::UnsupportedType(format!("{:?} array", kind)));
            }
            let element = ty
                .param_type(0)
                .ok_or_else(|| BridgeError::UnsupportedType("array without element type".into()))?;
            SlotShape::CArray {
                element,
                zero_terminated: oracle.array_zero_terminated(ty.raw()),
                fixed_size: oracle.array_fixed_size(ty.raw()),
            }
        }
        TypeTag::Interface => {
            let iface = ty
                .interface()
                .ok_or_else(|| BridgeError::UnsupportedType("interface without target".into()))?;
            match iface.kind() {
                InfoKind::Enum | InfoKind::Flags => {
                    let storage = oracle.enum_storage(iface.raw());
                    match ScalarKind::from_tag(storage) {
                        Some(kind) if kind.is_integer() => SlotShape::Enum(kind),
                        _ => {
                            return Err(BridgeError::UnsupportedType(format!(
                                "enum storage {}",
                                storage
                            )))
                        }
                    }
                }
                InfoKind::Object => SlotShape::Object(iface),
                InfoKind::Interface => SlotShape::Interface(iface),
                InfoKind::Callback => SlotShape::Callback,
                kind if kind.is_struct_like() => {
                    let value_box =
                        oracle.type_is_a(iface.registered_type(), oracle.value_box_type());
                    SlotShape::Struct { iface, value_box }
                }
                other => {
                    return Err(BridgeError::UnsupportedType(format!("interface kind {}", other)))
                }
            }
        }
        other => match ScalarKind::from_tag(other) {
            Some(kind) => SlotShape::Scalar(kind),
            None => return Err(BridgeError::UnsupportedType(other.to_string())),
        },
    };
    Ok(shape)
}

// ============================================================================
// Encode
// ============================================================================

/// Encode a host value under a declared type.
///
/// Temporaries (strings, converted arrays, value boxes) are kept in `block`.
pub fn encode(
    value: &HostValue,
    ty: &TypeDescriptor,
    block: &mut ArgumentBlock,
) -> BridgeResult<ArgumentSlot> {
    let shape = classify(ty)?;
    bridge_trace!(ty = %ty.qualified_name(), host = value.type_name(), "encoding");
    match shape {
        SlotShape::Void => {
            if value.is_nil() {
                Ok(ArgumentSlot::ZERO)
            } else {
                Err(BridgeError::mismatch("nil", value.type_name()))
            }
        }
        SlotShape::Boolean => Ok(ArgumentSlot::boolean(value.truthy())),
        SlotShape::Scalar(kind) | SlotShape::Enum(kind) => kind.encode(value),
        SlotShape::Str => match value {
            HostValue::Nil => Ok(ArgumentSlot::ZERO),
            HostValue::Str(s) => Ok(ArgumentSlot::pointer(block.hold_string(s)?)),
            other => Err(BridgeError::mismatch("string", other.type_name())),
        },
        SlotShape::CArray { element, .. } => encode_array(value, &element, block),
        SlotShape::Struct {
            value_box: true, ..
        } => encode_value_box(value, ty, block),
        SlotShape::Object(_)
        | SlotShape::Interface(_)
        | SlotShape::Struct { .. }
        | SlotShape::Callback
        | SlotShape::List => Ok(ArgumentSlot::pointer(instance_pointer(value)?)),
    }
}

fn encode_array(
    value: &HostValue,
    element: &TypeDescriptor,
    block: &mut ArgumentBlock,
) -> BridgeResult<ArgumentSlot> {
    let array = match value {
        HostValue::Nil => return Ok(ArgumentSlot::ZERO),
        HostValue::Pointer(p) => return Ok(ArgumentSlot::pointer(*p)),
        HostValue::Str(s) => {
            return encode_array(&HostValue::Array(HostArray::Str(vec![s.clone()])), element, block)
        }
        HostValue::Array(array) => array,
        other => {
            return Err(BridgeError::mismatch(
                "array, string, pointer or nil",
                other.type_name(),
            ))
        }
    };

    let tag = element.tag();
    let ptr: *mut c_void = match tag {
        TypeTag::Utf8 | TypeTag::Filename => match array {
            HostArray::Str(items) => block.hold_string_vector(items)? as *mut c_void,
            other => {
                return Err(BridgeError::mismatch(
                    "string array",
                    format!("{} array", other.element_name()),
                ))
            }
        },
        TypeTag::UInt8 => copy_to_malloc(&convert::<u8>(array)?)?,
        TypeTag::Int8 => block.hold_buffer(NativeBuffer::I8(convert(array)?)),
        TypeTag::Int16 => block.hold_buffer(NativeBuffer::I16(convert(array)?)),
        TypeTag::UInt16 => block.hold_buffer(NativeBuffer::U16(convert(array)?)),
        TypeTag::Int32 => block.hold_buffer(NativeBuffer::I32(convert(array)?)),
        TypeTag::UInt32 => block.hold_buffer(NativeBuffer::U32(convert(array)?)),
        TypeTag::Int64 => block.hold_buffer(NativeBuffer::I64(convert(array)?)),
        TypeTag::UInt64 => block.hold_buffer(NativeBuffer::U64(convert(array)?)),
        TypeTag::Float => block.hold_buffer(NativeBuffer::F32(convert(array)?)),
        TypeTag::Double => block.hold_buffer(NativeBuffer::F64(convert(array)?)),
        TypeTag::Void => return Err(BridgeError::mismatch("nil", "array")),
        other => return Err(BridgeError::UnsupportedType(format!("array of {}", other))),
    };
    bridge_trace!(element = %tag, len = array.len(), ?ptr, "array encoded");
    Ok(ArgumentSlot::pointer(ptr))
}

/// Byte arrays are handed to the callee in a fresh `malloc` block the
/// callee takes ownership of.
fn copy_to_malloc(bytes: &[u8]) -> BridgeResult<*mut c_void> {
    let size = bytes.len().max(1);
    // SAFETY: plain allocation; checked for null below.
    let ptr = unsafe { libc::malloc(size) };
    if ptr.is_null() {
        return Err(BridgeError::AllocationFailed(size));
    }
    // SAFETY: `ptr` has room for `bytes.len()` bytes and does not overlap.
    unsafe { std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr.cast::<u8>(), bytes.len()) };
    Ok(ptr)
}

fn encode_value_box(
    value: &HostValue,
    ty: &TypeDescriptor,
    block: &mut ArgumentBlock,
) -> BridgeResult<ArgumentSlot> {
    if value.is_nil() {
        return Ok(ArgumentSlot::ZERO);
    }
    let ptr = instance_pointer(value)?;
    let oracle = ty.oracle();
    if ptr.is_null() || !oracle.is_object(ptr) {
        return Err(BridgeError::mismatch("object instance", value.type_name()));
    }
    let boxed = ValueBox::for_pointer(oracle.type_of_instance(ptr), ptr);
    Ok(ArgumentSlot::pointer(block.hold_value_box(boxed)))
}

fn instance_pointer(value: &HostValue) -> BridgeResult<*mut c_void> {
    match value {
        HostValue::Nil => Ok(std::ptr::null_mut()),
        HostValue::Handle(handle) => Ok(handle.instance_ptr()),
        HostValue::Pointer(p) => Ok(*p),
        other => Err(BridgeError::mismatch("handle, pointer or nil", other.type_name())),
    }
}

fn host_int(value: &HostValue) -> BridgeResult<i64> {
    value
        .as_int()
        .ok_or_else(|| BridgeError::mismatch("integer", value.type_name()))
}

fn host_real(value: &HostValue) -> BridgeResult<f64> {
    value
        .as_real()
        .ok_or_else(|| BridgeError::mismatch("real", value.type_name()))
}

trait FromHostNumber: Sized {
    fn from_i64(v: i64) -> Self;
    fn from_f64(v: f64) -> Self;
}

macro_rules! from_host_number {
    ($($t:ty),*) => {$(
        impl FromHostNumber for $t {
            fn from_i64(v: i64) -> Self { v as $t }
            fn from_f64(v: f64) -> Self { v as $t }
        }
    )*};
}

from_host_number!(i8, u8, i16, u16, i32, u32, i64, u64, f32, f64);

fn convert<T: FromHostNumber>(array: &HostArray) -> BridgeResult<Vec<T>> {
    Ok(match array {
        HostArray::Char(v) => v.iter().map(|&x| T::from_i64(x as i64)).collect(),
        HostArray::Short(v) => v.iter().map(|&x| T::from_i64(x as i64)).collect(),
        HostArray::Int(v) => v.iter().map(|&x| T::from_i64(x as i64)).collect(),
        HostArray::Long(v) => v.iter().map(|&x| T::from_i64(x)).collect(),
        HostArray::Float(v) => v.iter().map(|&x| T::from_f64(x as f64)).collect(),
        HostArray::Double(v) => v.iter().map(|&x| T::from_f64(x)).collect(),
        HostArray::Str(_) => return Err(BridgeError::mismatch("numeric array", "string array")),
    })
}

// ============================================================================
// Decode
// ============================================================================

/// Decode a slot under a declared type.
///
/// Object results take a new reference and are re-typed after the
/// instance's runtime type when the repository knows it.
pub fn decode(slot: ArgumentSlot, ty: &TypeDescriptor, repo: &Repository) -> BridgeResult<HostValue> {
    let shape = classify(ty)?;
    bridge_trace!(ty = %ty.qualified_name(), ?slot, "decoding");
    let ptr = slot.as_ptr();
    Ok(match shape {
        SlotShape::Void => HostValue::Nil,
        SlotShape::Boolean => HostValue::Int(slot.as_bool() as i64),
        SlotShape::Scalar(kind) | SlotShape::Enum(kind) => kind.decode(slot),
        SlotShape::Str => decode_string(ptr),
        SlotShape::CArray {
            element,
            zero_terminated,
            fixed_size,
        } => decode_array(ptr, &element, zero_terminated, fixed_size),
        SlotShape::Object(iface) => wrap_object(repo, ptr, iface, true),
        SlotShape::Interface(iface) => {
            let retain = !ptr.is_null() && repo.oracle().is_object(ptr);
            wrap_object(repo, ptr, iface, retain)
        }
        SlotShape::Struct { iface, .. } => decode_struct(repo, ptr, iface),
        SlotShape::Callback => {
            if ptr.is_null() {
                HostValue::Nil
            } else {
                HostValue::Pointer(ptr)
            }
        }
        SlotShape::List => HostValue::Handle(DynamicHandle::borrowed(repo, Some(ty.clone()), ptr)),
    })
}

/// Wrap an instance pointer, re-resolving its runtime type.
///
/// With `retain`, the handle takes one new reference on the instance.
pub(crate) fn wrap_object(
    repo: &Repository,
    ptr: *mut c_void,
    declared: TypeDescriptor,
    retain: bool,
) -> HostValue {
    if ptr.is_null() {
        return HostValue::Nil;
    }
    let oracle = repo.oracle();
    let info = if oracle.is_object(ptr) {
        let rtype = oracle.type_of_instance(ptr);
        match repo.descriptor_for(rtype) {
            Some(actual) => {
                bridge_trace!(declared = %declared.qualified_name(), actual = %actual.qualified_name(), "re-resolved runtime type");
                actual
            }
            None => declared,
        }
    } else {
        declared
    };
    let handle = if retain {
        DynamicHandle::retained(repo, Some(info), ptr)
    } else {
        DynamicHandle::borrowed(repo, Some(info), ptr)
    };
    HostValue::Handle(handle)
}

fn decode_struct(repo: &Repository, ptr: *mut c_void, declared: TypeDescriptor) -> HostValue {
    if ptr.is_null() {
        return HostValue::Nil;
    }
    let info = repo.descriptor_for(declared.registered_type()).unwrap_or(declared);
    let handle = if info.kind() == InfoKind::Object {
        DynamicHandle::retained(repo, Some(info), ptr)
    } else {
        DynamicHandle::borrowed(repo, Some(info), ptr)
    };
    HostValue::Handle(handle)
}

fn decode_string(ptr: *mut c_void) -> HostValue {
    if ptr.is_null() {
        return HostValue::Nil;
    }
    // SAFETY: the declared type says this is a NUL-terminated string.
    let text = unsafe { CStr::from_ptr(ptr as *const c_char) };
    HostValue::Str(text.to_string_lossy().into_owned())
}

fn decode_array(
    ptr: *mut c_void,
    element: &TypeDescriptor,
    zero_terminated: bool,
    fixed_size: Option<usize>,
) -> HostValue {
    if ptr.is_null() {
        return HostValue::Nil;
    }
    let tag = element.tag();
    match (tag, fixed_size) {
        (TypeTag::Utf8 | TypeTag::Filename, _) if zero_terminated || fixed_size.is_some() => {
            let strings = ptr as *const *const c_char;
            let mut items = Vec::new();
            let mut i = 0;
            loop {
                if fixed_size.is_some_and(|n| i >= n) {
                    break;
                }
                // SAFETY: the array is NULL terminated or has `fixed_size` entries.
                let item = unsafe { *strings.add(i) };
                if item.is_null() {
                    break;
                }
                // SAFETY: each entry is a NUL-terminated string.
                items.push(unsafe { CStr::from_ptr(item) }.to_string_lossy().into_owned());
                i += 1;
            }
            HostValue::Array(HostArray::Str(items))
        }
        (_, Some(n)) => match ScalarKind::from_tag(tag) {
            // SAFETY: the declared type says `n` elements of this width follow.
            Some(kind) => HostValue::Array(unsafe { read_scalars(ptr, kind, n) }),
            None => HostValue::Pointer(ptr),
        },
        _ => HostValue::Pointer(ptr),
    }
}

unsafe fn read_scalars(ptr: *const c_void, kind: ScalarKind, n: usize) -> HostArray {
    macro_rules! longs {
        ($t:ty) => {
            HostArray::Long(
                std::slice::from_raw_parts(ptr as *const $t, n)
                    .iter()
                    .map(|&x| x as i64)
                    .collect(),
            )
        };
    }
    match kind {
        ScalarKind::Int8 => longs!(i8),
        ScalarKind::UInt8 => longs!(u8),
        ScalarKind::Int16 => longs!(i16),
        ScalarKind::UInt16 => longs!(u16),
        ScalarKind::Int32 => longs!(i32),
        ScalarKind::UInt32 => longs!(u32),
        ScalarKind::Int64 => longs!(i64),
        ScalarKind::UInt64 => longs!(u64),
        ScalarKind::Float => HostArray::Double(
            std::slice::from_raw_parts(ptr as *const f32, n)
                .iter()
                .map(|&x| x as f64)
                .collect(),
        ),
        ScalarKind::Double => {
            HostArray::Double(std::slice::from_raw_parts(ptr as *const f64, n).to_vec())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_truncation_is_silent() {
        let slot = ScalarKind::Int8.encode(&HostValue::Int(300)).unwrap();
        assert_eq!(ScalarKind::Int8.decode(slot), HostValue::Int(44));

        let slot = ScalarKind::UInt16.encode(&HostValue::Int(-1)).unwrap();
        assert_eq!(ScalarKind::UInt16.decode(slot), HostValue::Int(65535));
    }

    #[test]
    fn test_real_to_integer_truncates() {
        let slot = ScalarKind::Int32.encode(&HostValue::Real(-7.9)).unwrap();
        assert_eq!(slot.as_i32(), -7);
    }

    #[test]
    fn test_integer_widens_to_double() {
        let slot = ScalarKind::Double.encode(&HostValue::Int(3)).unwrap();
        assert_eq!(slot.as_f64(), 3.0);
        let slot = ScalarKind::Float.encode(&HostValue::Real(0.5)).unwrap();
        assert_eq!(ScalarKind::Float.decode(slot), HostValue::Real(0.5));
    }

    #[test]
    fn test_string_rejected_for_number() {
        assert!(matches!(
            ScalarKind::Int64.encode(&HostValue::from("12")),
            Err(BridgeError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_convert_numeric_arrays() {
        let converted: Vec<u8> = convert(&HostArray::Long(vec![1, 256, -1])).unwrap();
        assert_eq!(converted, vec![1, 0, 255]);
        let converted: Vec<f32> = convert(&HostArray::Int(vec![2, -3])).unwrap();
        assert_eq!(converted, vec![2.0, -3.0]);
        assert!(convert::<i32>(&HostArray::Str(vec!["x".into()])).is_err());
    }

    #[test]
    fn test_malloc_copy() {
        let ptr = copy_to_malloc(&[1, 2, 3]).unwrap();
        let copy = unsafe { std::slice::from_raw_parts(ptr as *const u8, 3) }.to_vec();
        assert_eq!(copy, vec![1, 2, 3]);
        unsafe { libc::free(ptr) };
    }

    #[test]
    fn test_read_scalars() {
        let data: [i16; 3] = [-5, 0, 7];
        let arr = unsafe { read_scalars(data.as_ptr().cast(), ScalarKind::Int16, 3) };
        assert_eq!(arr, HostArray::Long(vec![-5, 0, 7]));
    }

    #[test]
    fn test_null_string_decodes_to_nil() {
        assert_eq!(decode_string(std::ptr::null_mut()), HostValue::Nil);
    }
}
