//! Owned reference to an introspection entry
//!
//! Wraps a [`RawInfo`] together with the oracle that issued it. Cloning
//! takes a new database reference and dropping gives one back, so each
//! acquisition is released exactly once.

use std::fmt;
use std::rc::Rc;

use gyre_sdk::{ArrayKind, InfoKind, MemberKind, Oracle, RawInfo, RuntimeType, TypeTag};

/// Owned handle on an introspection entry.
pub struct TypeDescriptor {
    oracle: Rc<dyn Oracle>,
    raw: RawInfo,
}

impl TypeDescriptor {
    /// Take ownership of a reference the oracle already handed out
    pub fn adopt(oracle: &Rc<dyn Oracle>, raw: RawInfo) -> Self {
        Self {
            oracle: Rc::clone(oracle),
            raw,
        }
    }

    /// [`adopt`](Self::adopt) for optional oracle results
    pub fn adopt_opt(oracle: &Rc<dyn Oracle>, raw: Option<RawInfo>) -> Option<Self> {
        raw.map(|raw| Self::adopt(oracle, raw))
    }

    /// Take a new reference on a borrowed token
    pub fn retain(oracle: &Rc<dyn Oracle>, raw: RawInfo) -> Self {
        oracle.info_ref(raw);
        Self::adopt(oracle, raw)
    }

    /// Underlying token (still owned by `self`)
    #[inline]
    pub fn raw(&self) -> RawInfo {
        self.raw
    }

    /// Oracle that issued this entry
    #[inline]
    pub fn oracle(&self) -> &Rc<dyn Oracle> {
        &self.oracle
    }

    /// Entry kind
    pub fn kind(&self) -> InfoKind {
        self.oracle.info_kind(self.raw)
    }

    /// Declared name, empty for nameless entries
    pub fn name(&self) -> String {
        self.oracle.info_name(self.raw).unwrap_or_default()
    }

    /// Namespace, empty when unknown
    pub fn namespace(&self) -> String {
        self.oracle.info_namespace(self.raw).unwrap_or_default()
    }

    /// Whether both descriptors name the same entry
    pub fn same_entry(&self, other: &TypeDescriptor) -> bool {
        self.raw == other.raw
    }

    // ========================================================================
    // Container queries
    // ========================================================================

    /// Members of one kind declared directly on this entry
    pub fn members(&self, kind: MemberKind) -> Vec<TypeDescriptor> {
        let count = self.oracle.n_members(self.raw, kind);
        (0..count)
            .filter_map(|i| TypeDescriptor::adopt_opt(&self.oracle, self.oracle.member(self.raw, kind, i)))
            .collect()
    }

    /// Member of one kind with an exact name
    pub fn find_member(&self, kind: MemberKind, name: &str) -> Option<TypeDescriptor> {
        let count = self.oracle.n_members(self.raw, kind);
        (0..count)
            .filter_map(|i| TypeDescriptor::adopt_opt(&self.oracle, self.oracle.member(self.raw, kind, i)))
            .find(|member| self.oracle.info_name(member.raw).as_deref() == Some(name))
    }

    /// Declared parent of an object type
    pub fn parent(&self) -> Option<TypeDescriptor> {
        TypeDescriptor::adopt_opt(&self.oracle, self.oracle.parent(self.raw))
    }

    /// Runtime type registered for this entry
    pub fn registered_type(&self) -> RuntimeType {
        self.oracle.registered_type(self.raw)
    }

    // ========================================================================
    // Type-info queries
    // ========================================================================

    /// Type tag (type entries only)
    pub fn tag(&self) -> TypeTag {
        self.oracle.type_tag(self.raw)
    }

    /// Referenced entry of an interface-tagged type
    pub fn interface(&self) -> Option<TypeDescriptor> {
        TypeDescriptor::adopt_opt(&self.oracle, self.oracle.type_interface(self.raw))
    }

    /// Parameter type (array or list element)
    pub fn param_type(&self, index: usize) -> Option<TypeDescriptor> {
        TypeDescriptor::adopt_opt(&self.oracle, self.oracle.type_param(self.raw, index))
    }

    /// Array storage kind
    pub fn array_kind(&self) -> ArrayKind {
        self.oracle.array_kind(self.raw)
    }

    /// Declared type of a property, field, argument or constant entry
    pub fn declared_type(&self) -> Option<TypeDescriptor> {
        let raw = match self.kind() {
            InfoKind::Property => self.oracle.property_type(self.raw),
            InfoKind::Field => self.oracle.field_type(self.raw),
            InfoKind::Arg => self.oracle.arg_type(self.raw),
            InfoKind::Constant => self.oracle.constant_type(self.raw),
            _ => None,
        };
        TypeDescriptor::adopt_opt(&self.oracle, raw)
    }

    /// Human-readable type name: `Namespace.Name` for named entries, the
    /// tag for type entries.
    pub fn qualified_name(&self) -> String {
        match self.kind() {
            InfoKind::Type => match self.interface() {
                Some(iface) => iface.qualified_name(),
                None => self.tag().to_string(),
            },
            _ => {
                let ns = self.namespace();
                if ns.is_empty() {
                    self.name()
                } else {
                    format!("{}.{}", ns, self.name())
                }
            }
        }
    }
}

impl Clone for TypeDescriptor {
    fn clone(&self) -> Self {
        Self::retain(&self.oracle, self.raw)
    }
}

impl Drop for TypeDescriptor {
    fn drop(&mut self) {
        self.oracle.info_unref(self.raw);
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeDescriptor({} {})", self.kind(), self.qualified_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gyre_sdk::PropertyFlags;
    use gyre_testkit::MockRepository;

    #[test]
    fn test_clone_and_drop_balance_references() {
        let mock = Rc::new(MockRepository::new());
        let base = mock.object_type("Demo", "Base", None);
        let oracle: Rc<dyn Oracle> = mock.clone();

        let desc = TypeDescriptor::retain(&oracle, base);
        let copy = desc.clone();
        assert_eq!(mock.outstanding_info_refs(), 2);
        drop(desc);
        assert_eq!(mock.outstanding_info_refs(), 1);
        drop(copy);
        assert_eq!(mock.outstanding_info_refs(), 0);
    }

    #[test]
    fn test_find_member_releases_misses() {
        let mock = Rc::new(MockRepository::new());
        let widget = mock.object_type("Demo", "Widget", None);
        let int = mock.scalar(TypeTag::Int32);
        mock.add_property(widget, "width", int, PropertyFlags::READWRITE);
        mock.add_property(widget, "height", int, PropertyFlags::READWRITE);
        let oracle: Rc<dyn Oracle> = mock.clone();

        let desc = TypeDescriptor::retain(&oracle, widget);
        let found = desc.find_member(MemberKind::Property, "height");
        assert_eq!(found.as_ref().map(|p| p.name()), Some("height".to_string()));
        assert!(desc.find_member(MemberKind::Property, "depth").is_none());
        drop(found);
        drop(desc);
        assert_eq!(mock.outstanding_info_refs(), 0);
    }

    #[test]
    fn test_qualified_name() {
        let mock = Rc::new(MockRepository::new());
        let widget = mock.object_type("Demo", "Widget", None);
        let iface_ty = mock.interface_ref(widget);
        let oracle: Rc<dyn Oracle> = mock.clone();

        assert_eq!(TypeDescriptor::retain(&oracle, widget).qualified_name(), "Demo.Widget");
        assert_eq!(TypeDescriptor::retain(&oracle, iface_ty).qualified_name(), "Demo.Widget");
        let double = mock.scalar(TypeTag::Double);
        assert_eq!(TypeDescriptor::retain(&oracle, double).qualified_name(), "double");
    }
}
