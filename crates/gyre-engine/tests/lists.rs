//! Borrowed cursors over native linked lists

mod common;

use std::rc::Rc;

use common::{handle_of, Fixture};
use gyre_engine::{Arg, BridgeError, DynamicHandle, HostValue};
use gyre_sdk::{ArgumentSlot, ObjectRuntime, TypeTag};
use gyre_testkit::MockList;

struct Children {
    fx: Fixture,
    items: Vec<*mut std::ffi::c_void>,
    _list: Rc<MockList>,
    list: DynamicHandle,
}

fn children(tag: TypeTag) -> Children {
    let fx = Fixture::new();
    let widget = fx.mock.object_type("Demo", "Widget", None);
    let element = fx.mock.interface_ref(widget);
    let list_ty = fx.mock.list_of(tag, element);
    let items: Vec<_> = (0..3).map(|_| fx.mock.new_instance(widget)).collect();
    let nodes = Rc::new(MockList::new(&items));

    let head = nodes.clone();
    fx.mock
        .function("Demo", "children")
        .returns(list_ty)
        .native(move |_, _, _| Ok(ArgumentSlot::pointer(head.head())))
        .build();
    let call = handle_of(fx.repo.require("Demo", None).unwrap().extract("children").unwrap());
    let list = handle_of(call.eval(&[]).unwrap());

    Children {
        fx,
        items,
        _list: nodes,
        list,
    }
}

impl Drop for Children {
    fn drop(&mut self) {
        for &item in &self.items {
            self.fx.mock.object_unref(item);
        }
    }
}

#[test]
fn test_list_size_and_display() {
    let c = children(TypeTag::GList);
    assert_eq!(c.list.extract("size").unwrap(), HostValue::Int(3));
    assert!(c.list.to_string().ends_with("double linked list"));
    assert_eq!(c.list.ownership(), Some(gyre_engine::Ownership::Borrowed));
}

#[test]
fn test_indexed_access_yields_retained_elements() {
    let c = children(TypeTag::GList);
    let second = handle_of(c.list.eval(&[Arg::value(2i64)]).unwrap());
    assert_eq!(second.instance_ptr(), c.items[1]);
    assert_eq!(second.info().unwrap().name(), "Widget");
    assert_eq!(c.fx.mock.instance_refs(c.items[1]), 2);
    drop(second);
    assert_eq!(c.fx.mock.instance_refs(c.items[1]), 1);

    assert_eq!(
        c.list.eval(&[Arg::value(0i64)]).unwrap_err(),
        BridgeError::IndexOutOfRange(0)
    );
    assert_eq!(
        c.list.eval(&[Arg::value(4i64)]).unwrap_err(),
        BridgeError::IndexOutOfRange(4)
    );
    assert!(matches!(
        c.list.eval(&[Arg::value("first")]),
        Err(BridgeError::TypeMismatch { .. })
    ));
}

#[test]
fn test_walking_forward_and_back() {
    let c = children(TypeTag::GList);
    let first = handle_of(c.list.extract("data").unwrap());
    assert_eq!(first.instance_ptr(), c.items[0]);

    let next = handle_of(c.list.extract("next").unwrap());
    assert_eq!(next.instance_ptr(), c._list.node(1));
    assert_eq!(next.extract("size").unwrap(), HostValue::Int(2));
    let back = handle_of(next.extract("prev").unwrap());
    assert_eq!(back.instance_ptr(), c.list.instance_ptr());

    assert_eq!(c.list.extract("prev").unwrap(), HostValue::Nil);
    let last = handle_of(handle_of(next.extract("next").unwrap()).extract("data").unwrap());
    assert_eq!(last.instance_ptr(), c.items[2]);
}

#[test]
fn test_singly_linked_list_has_no_previous() {
    let c = children(TypeTag::GSList);
    assert!(c.list.to_string().ends_with("single linked list"));
    assert_eq!(c.list.extract("prev").unwrap_err(), BridgeError::NoPrevious);
    assert!(matches!(
        c.list.extract("tail"),
        Err(BridgeError::UnknownListMember(name)) if name == "tail"
    ));
}

#[test]
fn test_empty_list() {
    let fx = Fixture::new();
    let widget = fx.mock.object_type("Demo", "Widget", None);
    let element = fx.mock.interface_ref(widget);
    let list_ty = fx.descriptor(fx.mock.list_of(TypeTag::GSList, element));
    let empty = DynamicHandle::borrowed(&fx.repo, Some(list_ty), std::ptr::null_mut());

    assert_eq!(empty.extract("size").unwrap(), HostValue::Int(0));
    assert_eq!(empty.extract("data").unwrap_err(), BridgeError::NilList);
    assert_eq!(empty.eval(&[Arg::value(1i64)]).unwrap_err(), BridgeError::NilList);
}
