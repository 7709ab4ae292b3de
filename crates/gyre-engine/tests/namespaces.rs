//! Namespace loading, top-level extraction and listings

mod common;

use std::path::{Path, PathBuf};

use common::{handle_of, Fixture};
use gyre_engine::{BridgeError, HostValue, NamespaceEntry};
use gyre_sdk::{ArgumentSlot, InfoKind, MemberKind, PropertyFlags, TypeTag};

#[test]
fn test_require_reports_loaded_version() {
    let fx = Fixture::new();
    fx.mock.namespace("Gtk", "3.0");
    fx.mock.namespace("Gtk", "4.0");

    let ns = fx.repo.require("Gtk", Some("4.0")).unwrap();
    assert_eq!(ns.name(), "Gtk");
    assert_eq!(ns.version(), "4.0");
    assert_eq!(ns.to_string(), "namespace Gtk version 4.0");
    assert!(fx.repo.is_registered("Gtk", Some("4.0")));
    assert_eq!(fx.repo.version("Gtk").as_deref(), Some("4.0"));
    assert_eq!(fx.repo.enumerate_versions("Gtk"), vec!["3.0", "4.0"]);
    assert_eq!(fx.repo.required_namespaces(), vec![("Gtk".to_string(), "4.0".to_string())]);
}

#[test]
fn test_require_failure_carries_oracle_message() {
    let fx = Fixture::new();
    fx.mock.namespace("Gtk", "3.0");

    let err = fx.repo.require("Gtk", Some("9.0")).unwrap_err();
    assert!(matches!(err, BridgeError::NamespaceLoadFailed(_)));
    assert_eq!(
        err.to_string(),
        "Typelib file for namespace 'Gtk' (version 9.0) not found"
    );
    assert!(fx.repo.required_namespaces().is_empty());
    assert!(fx.repo.loaded_namespaces().is_empty());
}

#[test]
fn test_private_directory_and_search_path() {
    let fx = Fixture::new();
    let dir = Path::new("/opt/app/typelibs");
    fx.mock.private_namespace(dir, "App", "1.0");

    assert!(fx.repo.require("App", None).is_err());
    let ns = fx.repo.require_private(dir, "App", None).unwrap();
    assert_eq!(ns.version(), "1.0");

    fx.repo.prepend_search_path(Path::new("/opt/extra"));
    assert_eq!(fx.repo.search_path().first(), Some(&PathBuf::from("/opt/extra")));
}

#[test]
fn test_loaded_namespaces_are_sorted() {
    let fx = Fixture::new();
    fx.mock.namespace("Pango", "1.0");
    fx.mock.namespace("Atk", "1.0");
    fx.repo.require("Pango", None).unwrap();
    fx.repo.require("Atk", None).unwrap();

    assert_eq!(fx.repo.loaded_namespaces(), vec!["Atk", "Pango"]);
}

#[test]
fn test_extract_top_level_entities() {
    let fx = Fixture::new();
    fx.mock.namespace("Demo", "1.0");
    let widget = fx.mock.object_type("Demo", "Widget", None);
    let color = fx.mock.enum_type("Demo", "Color", TypeTag::Int32, &[("red", 0), ("blue", 2)]);
    let int = fx.mock.scalar(TypeTag::Int32);
    fx.mock.constant("Demo", "MAJOR_VERSION", int, ArgumentSlot::i32(3));
    fx.mock.string_constant("Demo", "NAME", "demo-lib");
    let _ = (widget, color);

    let ns = fx.repo.require("Demo", None).unwrap();
    assert_eq!(ns.extract("MAJOR_VERSION").unwrap(), HostValue::Int(3));
    assert_eq!(ns.extract("NAME").unwrap(), HostValue::from("demo-lib"));

    let class = handle_of(ns.extract("Widget").unwrap());
    assert!(!class.is_bound());
    assert_eq!(
        class.to_string(),
        "gyre object name: Widget, type: object, namespace: Demo"
    );

    let color = handle_of(ns.extract("Color").unwrap());
    assert_eq!(color.extract("blue").unwrap(), HostValue::Int(2));
    assert!(matches!(
        color.extract("Blue"),
        Err(BridgeError::NoSuchEnumValue(_))
    ));
    assert!(matches!(
        ns.extract("Missing"),
        Err(BridgeError::NoSuchMember(name)) if name == "Demo.Missing"
    ));

    assert_eq!(
        ns.list(),
        vec![
            NamespaceEntry { kind: InfoKind::Object, name: "Widget".into() },
            NamespaceEntry { kind: InfoKind::Enum, name: "Color".into() },
            NamespaceEntry { kind: InfoKind::Constant, name: "MAJOR_VERSION".into() },
            NamespaceEntry { kind: InfoKind::Constant, name: "NAME".into() },
        ]
    );
}

#[test]
fn test_member_listing_of_bound_object() {
    let fx = Fixture::new();
    let void = fx.mock.scalar(TypeTag::Void);
    let int = fx.mock.scalar(TypeTag::Int32);
    let base = fx.mock.object_type("Demo", "Base", None);
    let button = fx.mock.object_type("Demo", "Button", Some(base));
    fx.mock.add_property(button, "label", int, PropertyFlags::READWRITE);
    fx.mock.add_signal(button, "clicked", &[], void);
    fx.mock.add_vfunc(button, "draw");
    fx.mock.method(button, "click").build();
    let obj = fx.instance(button);

    let listing = obj.list().unwrap();
    assert_eq!(listing.instance, Some(format!("{:p}", obj.instance_ptr())));
    assert_eq!(listing.runtime_type.as_deref(), Some("Button"));
    assert_eq!(listing.section(MemberKind::VFunc).unwrap().entries, vec!["draw"]);
    let text = listing.to_string();
    assert!(text.contains("with instance at "));
    assert!(text.contains("1 virtual functions\n  draw\n"));
    assert!(text.ends_with("parent: Demo.Base\n"));

    let root = fx.class(base).list().unwrap();
    assert!(root.instance.is_none());
    assert!(root.to_string().ends_with("fundamental\n"));
}

#[test]
fn test_all_references_are_returned() {
    let fx = Fixture::new();
    let int = fx.mock.scalar(TypeTag::Int32);
    let base = fx.mock.object_type("Demo", "Base", None);
    let widget = fx.mock.object_type("Demo", "Widget", Some(base));
    fx.mock.add_property(widget, "size", int, PropertyFlags::READWRITE);
    fx.mock.method(base, "show").build();

    {
        let ns = fx.repo.require("Demo", None).unwrap();
        let class = handle_of(ns.extract("Widget").unwrap());
        let _ = class.extract("show").unwrap();
        let _ = class.list().unwrap();
        let _ = ns.list();
    }
    assert_eq!(fx.mock.outstanding_info_refs(), 0);
}
