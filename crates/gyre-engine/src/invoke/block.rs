//! Argument block: storage that must outlive one native call
//!
//! Encoding a string, an array or a boxed value produces a pointer into
//! memory the callee only borrows. The block owns that memory and frees it
//! when dropped, i.e. after the call returned and its result was decoded.

use std::ffi::{c_char, c_void, CString};

use gyre_sdk::ValueBox;

use crate::error::{BridgeError, BridgeResult};

/// Typed contiguous buffer handed to the callee as a C array
#[derive(Debug, Clone, PartialEq)]
pub enum NativeBuffer {
    /// int8 elements
    I8(Vec<i8>),
    /// int16 elements
    I16(Vec<i16>),
    /// uint16 elements
    U16(Vec<u16>),
    /// int32 elements
    I32(Vec<i32>),
    /// uint32 elements
    U32(Vec<u32>),
    /// int64 elements
    I64(Vec<i64>),
    /// uint64 elements
    U64(Vec<u64>),
    /// float elements
    F32(Vec<f32>),
    /// double elements
    F64(Vec<f64>),
}

impl NativeBuffer {
    fn as_mut_ptr(&mut self) -> *mut c_void {
        match self {
            NativeBuffer::I8(v) => v.as_mut_ptr().cast(),
            NativeBuffer::I16(v) => v.as_mut_ptr().cast(),
            NativeBuffer::U16(v) => v.as_mut_ptr().cast(),
            NativeBuffer::I32(v) => v.as_mut_ptr().cast(),
            NativeBuffer::U32(v) => v.as_mut_ptr().cast(),
            NativeBuffer::I64(v) => v.as_mut_ptr().cast(),
            NativeBuffer::U64(v) => v.as_mut_ptr().cast(),
            NativeBuffer::F32(v) => v.as_mut_ptr().cast(),
            NativeBuffer::F64(v) => v.as_mut_ptr().cast(),
        }
    }
}

/// Owner of every temporary produced while encoding one call.
#[derive(Default)]
pub struct ArgumentBlock {
    strings: Vec<CString>,
    string_vectors: Vec<(Vec<CString>, Vec<*const c_char>)>,
    buffers: Vec<NativeBuffer>,
    value_boxes: Vec<Box<ValueBox>>,
}

impl ArgumentBlock {
    /// Empty block
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep a NUL-terminated copy of `s` alive, returning its address
    pub fn hold_string(&mut self, s: &str) -> BridgeResult<*const c_char> {
        let owned = to_cstring(s)?;
        let ptr = owned.as_ptr();
        self.strings.push(owned);
        Ok(ptr)
    }

    /// Keep a NULL-terminated `char*` vector alive, returning its address
    pub fn hold_string_vector(&mut self, items: &[String]) -> BridgeResult<*const *const c_char> {
        let owned = items
            .iter()
            .map(|s| to_cstring(s))
            .collect::<BridgeResult<Vec<_>>>()?;
        let mut pointers: Vec<*const c_char> = owned.iter().map(|s| s.as_ptr()).collect();
        pointers.push(std::ptr::null());
        let ptr = pointers.as_ptr();
        self.string_vectors.push((owned, pointers));
        Ok(ptr)
    }

    /// Keep a typed buffer alive, returning its first element's address
    pub fn hold_buffer(&mut self, buffer: NativeBuffer) -> *mut c_void {
        self.buffers.push(buffer);
        match self.buffers.last_mut() {
            Some(held) => held.as_mut_ptr(),
            None => std::ptr::null_mut(),
        }
    }

    /// Keep a value box alive, returning its address
    pub fn hold_value_box(&mut self, value: ValueBox) -> *mut c_void {
        let mut boxed = Box::new(value);
        let ptr = (&mut *boxed as *mut ValueBox).cast();
        self.value_boxes.push(boxed);
        ptr
    }

    /// Number of held allocations
    pub fn len(&self) -> usize {
        self.strings.len() + self.string_vectors.len() + self.buffers.len() + self.value_boxes.len()
    }

    /// Whether nothing is held
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn to_cstring(s: &str) -> BridgeResult<CString> {
    CString::new(s).map_err(|_| BridgeError::mismatch("string without NUL bytes", "string with NUL byte"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gyre_sdk::RuntimeType;
    use std::ffi::CStr;

    #[test]
    fn test_string_stays_valid_while_block_lives() {
        let mut block = ArgumentBlock::new();
        let ptr = block.hold_string("hello").unwrap();
        let other = block.hold_string("world").unwrap();
        assert_eq!(unsafe { CStr::from_ptr(ptr) }.to_str().unwrap(), "hello");
        assert_eq!(unsafe { CStr::from_ptr(other) }.to_str().unwrap(), "world");
        assert_eq!(block.len(), 2);
    }

    #[test]
    fn test_interior_nul_is_a_mismatch() {
        let mut block = ArgumentBlock::new();
        assert!(matches!(
            block.hold_string("a\0b"),
            Err(BridgeError::TypeMismatch { .. })
        ));
        assert!(block.is_empty());
    }

    #[test]
    fn test_string_vector_is_null_terminated() {
        let mut block = ArgumentBlock::new();
        let items = vec!["a".to_string(), "bc".to_string()];
        let ptr = block.hold_string_vector(&items).unwrap();
        unsafe {
            assert_eq!(CStr::from_ptr(*ptr).to_str().unwrap(), "a");
            assert_eq!(CStr::from_ptr(*ptr.add(1)).to_str().unwrap(), "bc");
            assert!((*ptr.add(2)).is_null());
        }
    }

    #[test]
    fn test_buffer_and_value_box_addresses() {
        let mut block = ArgumentBlock::new();
        let ptr = block.hold_buffer(NativeBuffer::I16(vec![-1, 2, 3])) as *const i16;
        unsafe {
            assert_eq!(*ptr, -1);
            assert_eq!(*ptr.add(2), 3);
        }

        let boxed = block.hold_value_box(ValueBox::for_pointer(
            RuntimeType::from_bits(9),
            std::ptr::null_mut(),
        )) as *const ValueBox;
        assert_eq!(unsafe { (*boxed).g_type }, RuntimeType::from_bits(9));
    }
}
