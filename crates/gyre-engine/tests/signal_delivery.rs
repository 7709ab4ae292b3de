//! Signal connection and delivery to host callables

mod common;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use common::Fixture;
use gyre_engine::{connect, BridgeError, CallbackTarget, HostClosure, HostValue, Ownership};
use gyre_sdk::{ArgumentSlot, ObjectRuntime, TypeTag};

#[test]
fn test_two_argument_signal_reaches_named_function() {
    let fx = Fixture::new();
    let void = fx.mock.scalar(TypeTag::Void);
    let int = fx.mock.scalar(TypeTag::Int32);
    let widget = fx.mock.object_type("Demo", "Widget", None);
    let widget_ref = fx.mock.interface_ref(widget);
    fx.mock.add_signal(widget, "moved", &[widget_ref, int], void);

    let emitter = fx.instance(widget);
    let other = fx.instance(widget);
    let emitter_ptr = emitter.instance_ptr();
    let other_ptr = other.instance_ptr();

    let observed = Rc::new(RefCell::new(Vec::new()));
    let record = observed.clone();
    let mock = fx.mock.clone();
    fx.host.define("on_moved", move |args| {
        let emitter = args[0].as_handle().expect("emitter handle");
        let extra = args[1].as_handle().expect("extra handle");
        record.borrow_mut().push((
            args.len(),
            emitter.ownership(),
            mock.instance_refs(emitter.instance_ptr()),
            extra.ownership(),
            mock.instance_refs(extra.instance_ptr()),
            args[2].clone(),
            args[3].clone(),
        ));
        Ok(HostValue::Nil)
    });

    let id = connect(&emitter, "moved", "on_moved".into(), Some(HostValue::from("tag"))).unwrap();
    assert!(id > 0);
    let result = fx.mock.emit(
        emitter_ptr,
        "moved",
        &[ArgumentSlot::pointer(other_ptr), ArgumentSlot::i32(-5)],
    );

    assert_eq!(result, Some(ArgumentSlot::ZERO));
    assert_eq!(fx.host.calls(), vec![("on_moved".to_string(), 4)]);
    let observed = observed.borrow();
    assert_eq!(observed.len(), 1);
    let (argc, emitter_own, emitter_refs, extra_own, extra_refs, number, data) = observed[0].clone();
    assert_eq!(argc, 4);
    assert_eq!(emitter_own, Some(Ownership::Retained));
    assert_eq!(emitter_refs, 2);
    assert_eq!(extra_own, Some(Ownership::Borrowed));
    assert_eq!(extra_refs, 1);
    assert_eq!(number, HostValue::Int(-5));
    assert_eq!(data, HostValue::from("tag"));

    assert_eq!(fx.mock.instance_refs(emitter_ptr), 1);
    assert_eq!(fx.mock.instance_refs(other_ptr), 1);
}

#[test]
fn test_boolean_signal_returns_callback_truth() {
    let fx = Fixture::new();
    let boolean = fx.mock.scalar(TypeTag::Boolean);
    let widget = fx.mock.object_type("Demo", "Widget", None);
    let event = fx.mock.struct_type("Demo", "Event", 8);
    let event_ref = fx.mock.interface_ref(event);
    fx.mock.add_signal(widget, "key-press", &[event_ref], boolean);
    let obj = fx.instance(widget);

    let answer = Rc::new(Cell::new(1i64));
    let reply = answer.clone();
    let closure: HostClosure = Rc::new(move |args: Vec<HostValue>| {
        assert_eq!(args.len(), 2);
        Ok(HostValue::Int(reply.get()))
    });
    connect(&obj, "key-press", CallbackTarget::Closure(closure), None).unwrap();

    let mut event_block = [0u64; 1];
    let slots = [ArgumentSlot::pointer(event_block.as_mut_ptr())];
    assert_eq!(fx.mock.emit(obj.instance_ptr(), "key-press", &slots), Some(ArgumentSlot::boolean(true)));
    answer.set(0);
    assert_eq!(fx.mock.emit(obj.instance_ptr(), "key-press", &slots), Some(ArgumentSlot::boolean(false)));
}

#[test]
fn test_inherited_signal_connects() {
    let fx = Fixture::new();
    let void = fx.mock.scalar(TypeTag::Void);
    let base = fx.mock.object_type("Demo", "Base", None);
    let child = fx.mock.object_type("Demo", "Child", Some(base));
    fx.mock.add_signal(base, "destroy", &[], void);
    let obj = fx.instance(child);

    let fired = Rc::new(Cell::new(0));
    let counter = fired.clone();
    fx.host.define("on_destroy", move |args| {
        assert_eq!(args[0].as_handle().map(|h| h.info().unwrap().name()), Some("Child".to_string()));
        counter.set(counter.get() + 1);
        Ok(HostValue::Nil)
    });
    connect(&obj, "destroy", "on_destroy".into(), None).unwrap();
    fx.mock.emit(obj.instance_ptr(), "destroy", &[]);
    assert_eq!(fired.get(), 1);
}

#[test]
fn test_connection_errors() {
    let fx = Fixture::new();
    let void = fx.mock.scalar(TypeTag::Void);
    let int = fx.mock.scalar(TypeTag::Int32);
    let double = fx.mock.scalar(TypeTag::Double);
    let widget = fx.mock.object_type("Demo", "Widget", None);
    fx.mock.add_signal(widget, "resized", &[int, int, int], void);
    fx.mock.add_signal(widget, "measured", &[], double);
    let point = fx.mock.struct_type("Demo", "Point", 8);
    let obj = fx.instance(widget);

    assert_eq!(
        connect(&obj, "resized", "f".into(), None).unwrap_err(),
        BridgeError::UnsupportedCallbackArity(3)
    );
    assert!(matches!(
        connect(&obj, "measured", "f".into(), None),
        Err(BridgeError::UnsupportedType(_))
    ));
    assert!(matches!(
        connect(&obj, "vanished", "f".into(), None),
        Err(BridgeError::SignalNotSupported(name)) if name == "vanished"
    ));
    assert!(matches!(
        connect(&fx.class(widget), "resized", "f".into(), None),
        Err(BridgeError::TypeMismatch { .. })
    ));
    let p = fx.class(point);
    assert!(matches!(
        connect(&p, "resized", "f".into(), None),
        Err(BridgeError::TypeMismatch { .. })
    ));
    assert_eq!(fx.mock.handler_count(obj.instance_ptr()), 0);
}

#[test]
fn test_failing_callback_warns() {
    let fx = Fixture::new();
    let void = fx.mock.scalar(TypeTag::Void);
    let widget = fx.mock.object_type("Demo", "Widget", None);
    fx.mock.add_signal(widget, "clicked", &[], void);
    let obj = fx.instance(widget);

    connect(&obj, "clicked", "missing_function".into(), None).unwrap();
    fx.mock.emit(obj.instance_ptr(), "clicked", &[]);
    assert_eq!(
        fx.host.warnings(),
        vec!["callback for signal clicked failed: undefined function missing_function".to_string()]
    );
}

#[test]
fn test_closure_is_released_with_the_instance() {
    let fx = Fixture::new();
    let void = fx.mock.scalar(TypeTag::Void);
    let widget = fx.mock.object_type("Demo", "Widget", None);
    fx.mock.add_signal(widget, "clicked", &[], void);
    let ptr = fx.mock.new_instance(widget);
    let obj = gyre_engine::DynamicHandle::retained(&fx.repo, Some(fx.descriptor(widget)), ptr);

    let token = Rc::new(());
    let held = token.clone();
    let closure: HostClosure = Rc::new(move |_: Vec<HostValue>| {
        let _ = &held;
        Ok(HostValue::Nil)
    });
    connect(&obj, "clicked", CallbackTarget::Closure(closure), None).unwrap();
    assert_eq!(Rc::strong_count(&token), 2);

    drop(obj);
    fx.mock.object_unref(ptr);
    assert_eq!(fx.mock.live_objects(), 0);
    assert_eq!(Rc::strong_count(&token), 1);
}
