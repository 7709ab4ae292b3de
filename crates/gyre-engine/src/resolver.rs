//! Member resolution
//!
//! Given a type descriptor and a symbolic name, finds the entity the name
//! refers to. Lookups run in a fixed precedence, first match wins:
//!
//! 1. enum value (enum and flags types only)
//! 2. method, walking the parent chain for objects
//! 3. property (objects and interfaces), exact then hyphenized
//! 4. field (objects and structs), exact then hyphenized
//! 5. `signal_<name>` signal (objects), walking the parent chain
//!
//! Anything else is [`BridgeError::NoSuchMember`].

use gyre_sdk::{InfoKind, MemberKind};

use crate::bridge_trace;
use crate::error::{BridgeError, BridgeResult};
use crate::info::TypeDescriptor;
use crate::options::SIGNAL_MEMBER_PREFIX;

/// What a member name resolved to
#[derive(Debug, Clone)]
pub enum ResolvedMember {
    /// Enum constant value
    EnumValue(i64),
    /// Method (or static function) declared on the type or an ancestor
    Method(TypeDescriptor),
    /// Property; `name` is the canonical (possibly hyphenized) name
    Property {
        /// Property entry
        info: TypeDescriptor,
        /// Canonical name
        name: String,
    },
    /// Field; `name` is the canonical name
    Field {
        /// Field entry
        info: TypeDescriptor,
        /// Canonical name
        name: String,
    },
    /// Signal declared on the type or an ancestor
    Signal(TypeDescriptor),
}

/// Resolve `name` against `info`.
pub fn resolve(info: &TypeDescriptor, name: &str) -> BridgeResult<ResolvedMember> {
    let kind = info.kind();
    bridge_trace!(member = name, owner = %info.qualified_name(), %kind, "resolving member");

    if matches!(kind, InfoKind::Enum | InfoKind::Flags) {
        return find_enum_value(info, name)
            .map(ResolvedMember::EnumValue)
            .ok_or_else(|| BridgeError::NoSuchEnumValue(name.to_string()));
    }

    let is_object = kind == InfoKind::Object;
    let is_interface = kind == InfoKind::Interface;
    let is_struct = kind.is_struct_like();

    if is_object || is_interface || is_struct {
        if let Some(method) = find_method(info, name) {
            return Ok(ResolvedMember::Method(method));
        }
    }

    if is_object || is_interface {
        if let Some((prop, canonical)) = find_property(info, name) {
            return Ok(ResolvedMember::Property {
                info: prop,
                name: canonical,
            });
        }
    }

    if is_object || is_struct {
        if let Some((field, canonical)) = find_field(info, name) {
            return Ok(ResolvedMember::Field {
                info: field,
                name: canonical,
            });
        }
    }

    if is_object {
        if let Some(signal_name) = name.strip_prefix(SIGNAL_MEMBER_PREFIX) {
            return find_signal(info, signal_name)
                .map(ResolvedMember::Signal)
                .ok_or_else(|| BridgeError::SignalNotFound(signal_name.to_string()));
        }
    }

    Err(BridgeError::NoSuchMember(name.to_string()))
}

// ============================================================================
// Lookup primitives
// ============================================================================

/// Run `probe` on `start` and then on each declared ancestor, returning the
/// first hit. The chain ends at a type without a parent.
pub fn walk_parents<T>(
    start: &TypeDescriptor,
    mut probe: impl FnMut(&TypeDescriptor) -> Option<T>,
) -> Option<T> {
    if let Some(hit) = probe(start) {
        return Some(hit);
    }
    let mut current = start.parent();
    while let Some(ancestor) = current {
        bridge_trace!(ancestor = %ancestor.qualified_name(), "walking to parent");
        if let Some(hit) = probe(&ancestor) {
            return Some(hit);
        }
        current = ancestor.parent();
    }
    None
}

/// Exact-name enum value
pub fn find_enum_value(info: &TypeDescriptor, name: &str) -> Option<i64> {
    info.find_member(MemberKind::Value, name)
        .map(|value| info.oracle().value_of(value.raw()))
}

/// Method by exact name; objects also search their ancestors
pub fn find_method(info: &TypeDescriptor, name: &str) -> Option<TypeDescriptor> {
    if info.kind() == InfoKind::Object {
        walk_parents(info, |ty| ty.find_member(MemberKind::Method, name))
    } else {
        info.find_member(MemberKind::Method, name)
    }
}

/// Property by exact name, then with underscores turned into hyphens
pub fn find_property(info: &TypeDescriptor, name: &str) -> Option<(TypeDescriptor, String)> {
    if !matches!(info.kind(), InfoKind::Object | InfoKind::Interface) {
        return None;
    }
    find_normalized(info, MemberKind::Property, name)
}

/// Field by exact name, then with underscores turned into hyphens
pub fn find_field(info: &TypeDescriptor, name: &str) -> Option<(TypeDescriptor, String)> {
    let kind = info.kind();
    if kind != InfoKind::Object && !kind.is_struct_like() {
        return None;
    }
    find_normalized(info, MemberKind::Field, name)
}

/// Signal by exact name on the type or any ancestor
pub fn find_signal(info: &TypeDescriptor, name: &str) -> Option<TypeDescriptor> {
    walk_parents(info, |ty| ty.find_member(MemberKind::Signal, name))
}

fn find_normalized(
    info: &TypeDescriptor,
    kind: MemberKind,
    name: &str,
) -> Option<(TypeDescriptor, String)> {
    if let Some(found) = info.find_member(kind, name) {
        return Some((found, name.to_string()));
    }
    let hyphenated = hyphenize(name)?;
    bridge_trace!(member = name, retry = %hyphenated, "retrying with hyphens");
    info.find_member(kind, &hyphenated)
        .map(|found| (found, hyphenated))
}

/// `foo_bar` → `foo-bar`; `None` when there is nothing to replace
pub(crate) fn hyphenize(name: &str) -> Option<String> {
    if name.contains('_') {
        Some(name.replace('_', "-"))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gyre_sdk::{Oracle, PropertyFlags, TypeTag};
    use gyre_testkit::MockRepository;
    use std::rc::Rc;

    fn descriptor(mock: &Rc<MockRepository>, raw: gyre_sdk::RawInfo) -> TypeDescriptor {
        let oracle: Rc<dyn Oracle> = mock.clone();
        TypeDescriptor::retain(&oracle, raw)
    }

    #[test]
    fn test_hyphenize() {
        assert_eq!(hyphenize("foo_bar_baz").as_deref(), Some("foo-bar-baz"));
        assert_eq!(hyphenize("plain"), None);
    }

    #[test]
    fn test_enum_lookup_is_exact() {
        let mock = Rc::new(MockRepository::new());
        let color = mock.enum_type("Demo", "Color", TypeTag::Int32, &[("red", 0), ("green", 1)]);
        let desc = descriptor(&mock, color);

        assert!(matches!(resolve(&desc, "green"), Ok(ResolvedMember::EnumValue(1))));
        assert!(matches!(
            resolve(&desc, "GREEN"),
            Err(BridgeError::NoSuchEnumValue(_))
        ));
    }

    #[test]
    fn test_method_shadows_property() {
        let mock = Rc::new(MockRepository::new());
        let widget = mock.object_type("Demo", "Widget", None);
        let int = mock.scalar(TypeTag::Int32);
        mock.add_property(widget, "show", int, PropertyFlags::READWRITE);
        mock.method(widget, "show").build();
        let desc = descriptor(&mock, widget);

        assert!(matches!(resolve(&desc, "show"), Ok(ResolvedMember::Method(_))));
    }

    #[test]
    fn test_property_shadows_field() {
        let mock = Rc::new(MockRepository::new());
        let widget = mock.object_type("Demo", "Widget", None);
        let int = mock.scalar(TypeTag::Int32);
        mock.add_field(widget, "border-width", int, 0);
        mock.add_property(widget, "border-width", int, PropertyFlags::READWRITE);
        let desc = descriptor(&mock, widget);

        match resolve(&desc, "border_width") {
            Ok(ResolvedMember::Property { name, .. }) => assert_eq!(name, "border-width"),
            other => panic!("expected property, got {:?}", other),
        }
    }

    #[test]
    fn test_struct_has_no_properties() {
        let mock = Rc::new(MockRepository::new());
        let point = mock.struct_type("Demo", "Point", 16);
        let double = mock.scalar(TypeTag::Double);
        mock.add_field(point, "x", double, 0);
        let desc = descriptor(&mock, point);

        assert!(find_property(&desc, "x").is_none());
        assert!(matches!(resolve(&desc, "x"), Ok(ResolvedMember::Field { .. })));
    }

    #[test]
    fn test_signal_prefix_walks_parents() {
        let mock = Rc::new(MockRepository::new());
        let void = mock.scalar(TypeTag::Void);
        let base = mock.object_type("Demo", "Base", None);
        mock.add_signal(base, "changed", &[], void);
        let child = mock.object_type("Demo", "Child", Some(base));
        let desc = descriptor(&mock, child);

        match resolve(&desc, "signal_changed") {
            Ok(ResolvedMember::Signal(sig)) => assert_eq!(sig.name(), "changed"),
            other => panic!("expected signal, got {:?}", other),
        }
        assert!(matches!(
            resolve(&desc, "signal_missing"),
            Err(BridgeError::SignalNotFound(name)) if name == "missing"
        ));
        assert!(matches!(
            resolve(&desc, "missing"),
            Err(BridgeError::NoSuchMember(_))
        ));
    }

    #[test]
    fn test_walk_parents_stops_at_root() {
        let mock = Rc::new(MockRepository::new());
        let root = mock.object_type("Demo", "Root", None);
        let mid = mock.object_type("Demo", "Mid", Some(root));
        let leaf = mock.object_type("Demo", "Leaf", Some(mid));
        let desc = descriptor(&mock, leaf);

        let mut visited = Vec::new();
        let hit: Option<()> = walk_parents(&desc, |ty| {
            visited.push(ty.name());
            None
        });
        assert!(hit.is_none());
        assert_eq!(visited, vec!["Leaf", "Mid", "Root"]);
        drop(desc);
        assert_eq!(mock.outstanding_info_refs(), 0);
    }
}
