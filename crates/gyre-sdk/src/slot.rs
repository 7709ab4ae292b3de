//! One native call argument
//!
//! A slot is 64 bits wide and carries whatever the declared type says it
//! carries: a scalar of any width, a float or double, or a pointer (strings
//! included). It has no tag of its own and owns nothing; narrow values sit in
//! the low bits the way a C argument union stores them on a little-endian
//! machine.
//!
//! ```text
//! boolean / int8..uint64 : zero-extended low bits
//! float                  : f32 bits in the low 32 bits
//! double                 : f64 bits
//! pointer / string       : address
//! ```

use std::ffi::c_void;
use std::fmt;

use crate::types::RuntimeType;

/// Untagged 64-bit native argument container.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct ArgumentSlot(u64);

impl ArgumentSlot {
    /// All bits clear: false, zero, or a null pointer
    pub const ZERO: ArgumentSlot = ArgumentSlot(0);

    // ========================================================================
    // Raw access
    // ========================================================================

    /// Create from raw bits
    #[inline(always)]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Get raw bits
    #[inline(always)]
    pub const fn to_bits(self) -> u64 {
        self.0
    }

    // ========================================================================
    // Constructors
    // ========================================================================

    /// Boolean slot (1 or 0)
    #[inline]
    pub const fn boolean(b: bool) -> Self {
        Self(b as u64)
    }

    /// Signed 8-bit slot
    #[inline]
    pub const fn i8(v: i8) -> Self {
        Self(v as u8 as u64)
    }

    /// Unsigned 8-bit slot
    #[inline]
    pub const fn u8(v: u8) -> Self {
        Self(v as u64)
    }

    /// Signed 16-bit slot
    #[inline]
    pub const fn i16(v: i16) -> Self {
        Self(v as u16 as u64)
    }

    /// Unsigned 16-bit slot
    #[inline]
    pub const fn u16(v: u16) -> Self {
        Self(v as u64)
    }

    /// Signed 32-bit slot
    #[inline]
    pub const fn i32(v: i32) -> Self {
        Self(v as u32 as u64)
    }

    /// Unsigned 32-bit slot
    #[inline]
    pub const fn u32(v: u32) -> Self {
        Self(v as u64)
    }

    /// Signed 64-bit slot
    #[inline]
    pub const fn i64(v: i64) -> Self {
        Self(v as u64)
    }

    /// Unsigned 64-bit slot
    #[inline]
    pub const fn u64(v: u64) -> Self {
        Self(v)
    }

    /// Single precision slot
    #[inline]
    pub fn f32(v: f32) -> Self {
        Self(v.to_bits() as u64)
    }

    /// Double precision slot
    #[inline]
    pub fn f64(v: f64) -> Self {
        Self(v.to_bits())
    }

    /// Pointer slot
    #[inline]
    pub fn pointer<T>(ptr: *const T) -> Self {
        Self(ptr as usize as u64)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Read as boolean (any non-zero low byte is true)
    #[inline]
    pub const fn as_bool(self) -> bool {
        self.0 as u32 != 0
    }

    /// Read as signed 8-bit
    #[inline]
    pub const fn as_i8(self) -> i8 {
        self.0 as u8 as i8
    }

    /// Read as unsigned 8-bit
    #[inline]
    pub const fn as_u8(self) -> u8 {
        self.0 as u8
    }

    /// Read as signed 16-bit
    #[inline]
    pub const fn as_i16(self) -> i16 {
        self.0 as u16 as i16
    }

    /// Read as unsigned 16-bit
    #[inline]
    pub const fn as_u16(self) -> u16 {
        self.0 as u16
    }

    /// Read as signed 32-bit
    #[inline]
    pub const fn as_i32(self) -> i32 {
        self.0 as u32 as i32
    }

    /// Read as unsigned 32-bit
    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0 as u32
    }

    /// Read as signed 64-bit
    #[inline]
    pub const fn as_i64(self) -> i64 {
        self.0 as i64
    }

    /// Read as unsigned 64-bit
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Read as single precision
    #[inline]
    pub fn as_f32(self) -> f32 {
        f32::from_bits(self.0 as u32)
    }

    /// Read as double precision
    #[inline]
    pub fn as_f64(self) -> f64 {
        f64::from_bits(self.0)
    }

    /// Read as pointer
    #[inline]
    pub fn as_ptr(self) -> *mut c_void {
        self.0 as usize as *mut c_void
    }

    /// Whether the slot is all zeroes (null pointer)
    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for ArgumentSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ArgumentSlot({:#018x})", self.0)
    }
}

// ============================================================================
// Value box
// ============================================================================

/// Tagged generic value, laid out like the native runtime's boxed value type.
///
/// Used when a callable declares a boxed-value parameter: the bridge packs an
/// object pointer into one of these and passes its address.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueBox {
    /// Runtime type of the boxed payload
    pub g_type: RuntimeType,
    /// Payload words
    pub data: [u64; 2],
}

impl ValueBox {
    /// An uninitialized (typeless) box
    pub const EMPTY: ValueBox = ValueBox {
        g_type: RuntimeType::INVALID,
        data: [0; 2],
    };

    /// Box a pointer payload of the given runtime type
    pub fn for_pointer(g_type: RuntimeType, ptr: *mut c_void) -> Self {
        ValueBox {
            g_type,
            data: [ptr as usize as u64, 0],
        }
    }

    /// Pointer payload
    pub fn pointer(&self) -> *mut c_void {
        self.data[0] as usize as *mut c_void
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_narrow_values_zero_extend() {
        let slot = ArgumentSlot::i8(-1);
        assert_eq!(slot.to_bits(), 0xFF);
        assert_eq!(slot.as_i8(), -1);

        let slot = ArgumentSlot::i16(i16::MIN);
        assert_eq!(slot.to_bits(), 0x8000);
        assert_eq!(slot.as_i16(), i16::MIN);

        let slot = ArgumentSlot::i32(-2);
        assert_eq!(slot.to_bits(), 0xFFFF_FFFE);
        assert_eq!(slot.as_i32(), -2);
        assert_eq!(slot.as_u32(), u32::MAX - 1);
    }

    #[test]
    fn test_floats() {
        assert_eq!(ArgumentSlot::f32(1.5).as_f32(), 1.5);
        assert_eq!(ArgumentSlot::f64(-0.25).as_f64(), -0.25);
        assert_eq!(ArgumentSlot::f32(2.0).to_bits() >> 32, 0);
    }

    #[test]
    fn test_pointer_and_null() {
        let value = 7u32;
        let slot = ArgumentSlot::pointer(&value as *const u32);
        assert!(!slot.is_null());
        assert_eq!(slot.as_ptr() as *const u32, &value as *const u32);
        assert!(ArgumentSlot::ZERO.is_null());
        assert!(!ArgumentSlot::ZERO.as_bool());
    }

    #[test]
    fn test_value_box_pointer() {
        let mut target = 0u8;
        let ptr = &mut target as *mut u8 as *mut c_void;
        let boxed = ValueBox::for_pointer(RuntimeType::from_bits(80), ptr);
        assert_eq!(boxed.pointer(), ptr);
        assert_eq!(boxed.g_type, RuntimeType::from_bits(80));
        assert_eq!(ValueBox::EMPTY.pointer(), std::ptr::null_mut());
    }
}
