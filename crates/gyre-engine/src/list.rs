//! Linked-list views
//!
//! A handle whose descriptor is a glist/gslist type entry is a borrowed
//! cursor over native list nodes. Navigation never mutates or frees nodes.

use std::ffi::c_void;

use gyre_sdk::{ArgumentSlot, InfoKind, TypeTag};

use crate::bridge_trace;
use crate::codec;
use crate::error::{BridgeError, BridgeResult};
use crate::handle::DynamicHandle;
use crate::info::TypeDescriptor;
use crate::value::{Arg, HostValue};

/// Doubly linked node layout; `data` and `next` are read through [`SListNode`]
#[repr(C)]
#[allow(dead_code)]
struct ListNode {
    data: *mut c_void,
    next: *mut ListNode,
    prev: *mut ListNode,
}

/// Singly linked node layout
#[repr(C)]
struct SListNode {
    data: *mut c_void,
    next: *mut SListNode,
}

/// Whether `info` describes a list type
pub(crate) fn is_list_type(info: &TypeDescriptor) -> bool {
    info.kind() == InfoKind::Type && info.tag().is_list()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListMember {
    Data,
    Next,
    Prev,
    Size,
}

impl ListMember {
    fn parse(name: &str) -> BridgeResult<Self> {
        match name {
            "data" => Ok(ListMember::Data),
            "next" => Ok(ListMember::Next),
            "prev" => Ok(ListMember::Prev),
            "size" => Ok(ListMember::Size),
            other => Err(BridgeError::UnknownListMember(other.to_string())),
        }
    }
}

// Both layouts start with `data, next`.
unsafe fn node_data(node: *mut c_void) -> *mut c_void {
    (*(node as *const SListNode)).data
}

unsafe fn node_next(node: *mut c_void) -> *mut c_void {
    (*(node as *const SListNode)).next.cast()
}

unsafe fn node_prev(node: *mut c_void) -> *mut c_void {
    (*(node as *const ListNode)).prev.cast()
}

/// Member access on a list handle: `data`, `next`, `prev` or `size`
pub(crate) fn extract(
    handle: &DynamicHandle,
    info: &TypeDescriptor,
    name: &str,
) -> BridgeResult<HostValue> {
    let member = ListMember::parse(name)?;
    let head = handle.instance_ptr();
    let doubly = info.tag() == TypeTag::GList;

    bridge_trace!(?member, node = ?head, doubly, "list member");

    match member {
        ListMember::Size => Ok(HostValue::Int(length(head) as i64)),
        _ if head.is_null() => Err(BridgeError::NilList),
        // SAFETY: `head` is a non-null node of the declared layout.
        ListMember::Data => decode_datum(handle, info, unsafe { node_data(head) }),
        ListMember::Next => Ok(neighbour(handle, info, unsafe { node_next(head) })),
        ListMember::Prev if !doubly => Err(BridgeError::NoPrevious),
        ListMember::Prev => Ok(neighbour(handle, info, unsafe { node_prev(head) })),
    }
}

/// 1-based element access: `list(n)`
pub(crate) fn nth(handle: &DynamicHandle, info: &TypeDescriptor, args: &[Arg]) -> BridgeResult<HostValue> {
    let index = match args {
        [Arg::Value(value)] => value
            .as_int()
            .ok_or_else(|| BridgeError::mismatch("list index", value.type_name()))?,
        _ => return Err(BridgeError::mismatch("one list index", format!("{} arguments", args.len()))),
    };
    let head = handle.instance_ptr();
    if head.is_null() {
        return Err(BridgeError::NilList);
    }
    if index < 1 {
        return Err(BridgeError::IndexOutOfRange(index));
    }

    let mut node = head;
    for _ in 1..index {
        // SAFETY: `node` is a non-null list node.
        node = unsafe { node_next(node) };
        if node.is_null() {
            return Err(BridgeError::IndexOutOfRange(index));
        }
    }
    // SAFETY: as above.
    let data = unsafe { node_data(node) };
    if data.is_null() {
        return Err(BridgeError::IndexOutOfRange(index));
    }
    decode_datum(handle, info, data)
}

fn length(head: *mut c_void) -> usize {
    let mut count = 0;
    let mut node = head;
    while !node.is_null() {
        count += 1;
        // SAFETY: `node` is a non-null list node.
        node = unsafe { node_next(node) };
    }
    count
}

fn neighbour(handle: &DynamicHandle, info: &TypeDescriptor, node: *mut c_void) -> HostValue {
    if node.is_null() {
        return HostValue::Nil;
    }
    HostValue::Handle(DynamicHandle::borrowed(
        handle.repository(),
        Some(info.clone()),
        node,
    ))
}

fn decode_datum(
    handle: &DynamicHandle,
    info: &TypeDescriptor,
    data: *mut c_void,
) -> BridgeResult<HostValue> {
    let element = info
        .param_type(0)
        .ok_or_else(|| BridgeError::UnsupportedType("list without element type".into()))?;
    codec::decode(ArgumentSlot::pointer(data), &element, handle.repository())
}
