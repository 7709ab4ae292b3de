//! Member listings
//!
//! Human-readable inventory of what a handle's type declares: enum values,
//! fields, properties, methods, signals, virtual functions, constants and
//! the parent type.

use std::fmt;

use gyre_sdk::{InfoKind, MemberKind};

use crate::error::{BridgeError, BridgeResult};
use crate::handle::DynamicHandle;
use crate::info::TypeDescriptor;

/// One group of declared members
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberSection {
    /// Member kind of every entry
    pub kind: MemberKind,
    /// Entries; enum values are rendered `name = value`
    pub entries: Vec<String>,
}

/// Listing of one type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberListing {
    /// `Namespace.Name`
    pub qualified_name: String,
    /// Entry kind
    pub kind: InfoKind,
    /// Instance address, when bound
    pub instance: Option<String>,
    /// Runtime type name of a bound object
    pub runtime_type: Option<String>,
    /// Member groups in display order
    pub sections: Vec<MemberSection>,
    /// Parent type of an object, `None` at the root
    pub parent: Option<String>,
}

impl MemberListing {
    /// Members of one kind
    pub fn section(&self, kind: MemberKind) -> Option<&MemberSection> {
        self.sections.iter().find(|s| s.kind == kind)
    }
}

fn sections_for(kind: InfoKind) -> &'static [MemberKind] {
    match kind {
        InfoKind::Enum | InfoKind::Flags => &[MemberKind::Value, MemberKind::Method],
        InfoKind::Object => &[
            MemberKind::Field,
            MemberKind::Property,
            MemberKind::Method,
            MemberKind::Signal,
            MemberKind::VFunc,
            MemberKind::Constant,
        ],
        InfoKind::Interface => &[
            MemberKind::Property,
            MemberKind::Method,
            MemberKind::Signal,
            MemberKind::VFunc,
            MemberKind::Constant,
        ],
        kind if kind.is_struct_like() => &[MemberKind::Field, MemberKind::Method],
        _ => &[],
    }
}

/// List the members `info` declares directly
pub fn describe(info: &TypeDescriptor) -> MemberListing {
    let kind = info.kind();
    let oracle = info.oracle();
    let sections = sections_for(kind)
        .iter()
        .map(|&member_kind| MemberSection {
            kind: member_kind,
            entries: info
                .members(member_kind)
                .iter()
                .map(|member| match member_kind {
                    MemberKind::Value => {
                        format!("{} = {}", member.name(), oracle.value_of(member.raw()))
                    }
                    _ => member.name(),
                })
                .collect(),
        })
        .collect();

    MemberListing {
        qualified_name: info.qualified_name(),
        kind,
        instance: None,
        runtime_type: None,
        sections,
        parent: if kind == InfoKind::Object {
            info.parent().map(|p| p.qualified_name())
        } else {
            None
        },
    }
}

impl DynamicHandle {
    /// Listing of this handle's type, with instance details when bound
    pub fn list(&self) -> BridgeResult<MemberListing> {
        let info = self.info().ok_or(BridgeError::NoTypeInformation)?;
        let mut listing = describe(info);
        if self.is_bound() {
            let ptr = self.instance_ptr();
            listing.instance = Some(format!("{:p}", ptr));
            let oracle = self.repository().oracle();
            if oracle.is_object(ptr) {
                listing.runtime_type = oracle.type_name(oracle.type_of_instance(ptr));
            }
        }
        Ok(listing)
    }
}

impl fmt::Display for MemberListing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} ({})", self.qualified_name, self.kind)?;
        if let Some(instance) = &self.instance {
            writeln!(f, "with instance at {}", instance)?;
        }
        if let Some(rtype) = &self.runtime_type {
            writeln!(f, "runtime type: {}", rtype)?;
        }
        for section in &self.sections {
            writeln!(f, "{} {}", section.entries.len(), section.kind.heading())?;
            for entry in &section.entries {
                writeln!(f, "  {}", entry)?;
            }
        }
        if self.kind == InfoKind::Object {
            match &self.parent {
                Some(parent) => writeln!(f, "parent: {}", parent)?,
                None => writeln!(f, "fundamental")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gyre_sdk::{Oracle, PropertyFlags, TypeTag};
    use gyre_testkit::MockRepository;
    use std::rc::Rc;

    #[test]
    fn test_object_listing() {
        let mock = Rc::new(MockRepository::new());
        let base = mock.object_type("Demo", "Base", None);
        let button = mock.object_type("Demo", "Button", Some(base));
        let text = mock.scalar(TypeTag::Utf8);
        let void = mock.scalar(TypeTag::Void);
        mock.add_property(button, "label", text, PropertyFlags::READWRITE);
        mock.add_signal(button, "clicked", &[], void);
        mock.method(button, "click").build();
        let oracle: Rc<dyn Oracle> = mock.clone();

        let listing = describe(&TypeDescriptor::retain(&oracle, button));
        assert_eq!(listing.qualified_name, "Demo.Button");
        assert_eq!(listing.parent.as_deref(), Some("Demo.Base"));
        assert_eq!(listing.section(MemberKind::Property).unwrap().entries, vec!["label"]);
        assert_eq!(listing.section(MemberKind::Signal).unwrap().entries, vec!["clicked"]);
        assert!(listing.section(MemberKind::Value).is_none());

        let text = listing.to_string();
        assert!(text.starts_with("Demo.Button (object)\n"));
        assert!(text.contains("1 methods\n  click\n"));
        assert!(text.ends_with("parent: Demo.Base\n"));
    }

    #[test]
    fn test_enum_listing_shows_values() {
        let mock = Rc::new(MockRepository::new());
        let color = mock.enum_type("Demo", "Color", TypeTag::Int32, &[("red", 0), ("blue", 4)]);
        let oracle: Rc<dyn Oracle> = mock.clone();

        let listing = describe(&TypeDescriptor::retain(&oracle, color));
        assert_eq!(
            listing.section(MemberKind::Value).unwrap().entries,
            vec!["red = 0", "blue = 4"]
        );
        assert!(listing.parent.is_none());
    }
}
