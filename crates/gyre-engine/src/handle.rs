//! Dynamic handles
//!
//! A [`DynamicHandle`] pairs an optional type descriptor with an optional
//! live native instance. Depending on which parts are present it is
//! *unbound* (a class or prototype), *bound* (an instance), or *callable*
//! (a function, method, signal or vfunc entry).
//!
//! Handles are shared by the host through `Rc`. The single release point is
//! the `Drop` of the last clone, which consults the instance's
//! [`Ownership`] tag: one native reference is given back for `Retained`,
//! the zeroed block is freed for `OwnedBlock`, nothing happens for
//! `Borrowed`.

use std::ffi::c_void;
use std::fmt;
use std::rc::Rc;

use gyre_sdk::{FunctionFlags, InfoKind, PropertyFlags, PropertyInit};

use crate::bridge_trace;
use crate::codec;
use crate::error::{BridgeError, BridgeResult};
use crate::info::TypeDescriptor;
use crate::invoke::{self, block::ArgumentBlock};
use crate::list;
use crate::repository::Repository;
use crate::resolver::{self, ResolvedMember};
use crate::value::{Arg, HostValue};

// ============================================================================
// Instance ownership
// ============================================================================

/// How a handle holds its instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// One native reference is held and released on drop
    Retained,
    /// A view; nothing is released
    Borrowed,
    /// A zeroed block allocated by the bridge and freed on drop
    OwnedBlock,
}

/// Live native instance with its ownership tag
#[derive(Debug)]
pub struct Instance {
    ptr: *mut c_void,
    ownership: Ownership,
}

impl Instance {
    /// Native address
    #[inline]
    pub fn ptr(&self) -> *mut c_void {
        self.ptr
    }

    /// Ownership tag
    #[inline]
    pub fn ownership(&self) -> Ownership {
        self.ownership
    }
}

struct HandleInner {
    info: Option<TypeDescriptor>,
    instance: Option<Instance>,
    repo: Repository,
    /// Handle whose instance a borrowed view aliases
    _keep_alive: Option<DynamicHandle>,
}

impl Drop for HandleInner {
    fn drop(&mut self) {
        let Some(instance) = self.instance.take() else {
            return;
        };
        match instance.ownership {
            Ownership::Retained => {
                bridge_trace!(ptr = ?instance.ptr, "releasing instance reference");
                self.repo.oracle().object_unref(instance.ptr);
            }
            Ownership::OwnedBlock => {
                bridge_trace!(ptr = ?instance.ptr, "freeing owned block");
                // SAFETY: owned blocks come from `libc::calloc` in `construct_struct`.
                unsafe { libc::free(instance.ptr) };
            }
            Ownership::Borrowed => {}
        }
    }
}

/// The host-visible wrapper around a native entity.
#[derive(Clone)]
pub struct DynamicHandle(Rc<HandleInner>);

impl DynamicHandle {
    fn from_parts(
        repo: &Repository,
        info: Option<TypeDescriptor>,
        instance: Option<Instance>,
        keep_alive: Option<DynamicHandle>,
    ) -> Self {
        DynamicHandle(Rc::new(HandleInner {
            info,
            instance,
            repo: repo.clone(),
            _keep_alive: keep_alive,
        }))
    }

    /// Handle with a type and no instance
    pub fn unbound(repo: &Repository, info: TypeDescriptor) -> Self {
        Self::from_parts(repo, Some(info), None, None)
    }

    /// Take a new native reference on `ptr` and wrap it.
    ///
    /// A null `ptr` gives a handle without instance.
    pub fn retained(repo: &Repository, info: Option<TypeDescriptor>, ptr: *mut c_void) -> Self {
        if ptr.is_null() {
            return Self::from_parts(repo, info, None, None);
        }
        repo.oracle().object_ref(ptr);
        Self::adopt_reference(repo, info, ptr)
    }

    /// Wrap `ptr`, taking over a reference the caller already holds
    pub(crate) fn adopt_reference(
        repo: &Repository,
        info: Option<TypeDescriptor>,
        ptr: *mut c_void,
    ) -> Self {
        let instance = (!ptr.is_null()).then_some(Instance {
            ptr,
            ownership: Ownership::Retained,
        });
        Self::from_parts(repo, info, instance, None)
    }

    /// Wrap `ptr` as a view without taking a reference
    pub fn borrowed(repo: &Repository, info: Option<TypeDescriptor>, ptr: *mut c_void) -> Self {
        let instance = (!ptr.is_null()).then_some(Instance {
            ptr,
            ownership: Ownership::Borrowed,
        });
        Self::from_parts(repo, info, instance, None)
    }

    /// Wrap a zeroed `calloc` block the handle will free
    pub(crate) fn owned_block(repo: &Repository, info: TypeDescriptor, ptr: *mut c_void) -> Self {
        Self::from_parts(
            repo,
            Some(info),
            Some(Instance {
                ptr,
                ownership: Ownership::OwnedBlock,
            }),
            None,
        )
    }

    /// Borrowed view of `owner`'s instance that keeps `owner` alive
    fn alias_of(owner: &DynamicHandle, info: Option<TypeDescriptor>, ptr: *mut c_void) -> Self {
        if ptr.is_null() {
            return Self::from_parts(&owner.0.repo, info, None, None);
        }
        Self::from_parts(
            &owner.0.repo,
            info,
            Some(Instance {
                ptr,
                ownership: Ownership::Borrowed,
            }),
            Some(owner.clone()),
        )
    }

    /// Alias `ptr` under `info`, retaining when either side is an object
    fn alias_retaining_objects(
        owner: &DynamicHandle,
        info: Option<TypeDescriptor>,
        ptr: *mut c_void,
        retain: bool,
    ) -> Self {
        if retain {
            Self::retained(&owner.0.repo, info, ptr)
        } else {
            Self::alias_of(owner, info, ptr)
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Static type, if any
    #[inline]
    pub fn info(&self) -> Option<&TypeDescriptor> {
        self.0.info.as_ref()
    }

    /// Live instance, if any
    #[inline]
    pub fn instance(&self) -> Option<&Instance> {
        self.0.instance.as_ref()
    }

    /// Instance address, null when unbound
    pub fn instance_ptr(&self) -> *mut c_void {
        self.instance().map_or(std::ptr::null_mut(), Instance::ptr)
    }

    /// Whether an instance is attached
    pub fn is_bound(&self) -> bool {
        self.0.instance.is_some()
    }

    /// Ownership of the attached instance
    pub fn ownership(&self) -> Option<Ownership> {
        self.instance().map(Instance::ownership)
    }

    /// Owning repository
    #[inline]
    pub fn repository(&self) -> &Repository {
        &self.0.repo
    }

    fn kind(&self) -> Option<InfoKind> {
        self.info().map(TypeDescriptor::kind)
    }

    /// Whether both handles denote the same native entity
    pub fn same_entity(&self, other: &DynamicHandle) -> bool {
        if Rc::ptr_eq(&self.0, &other.0) {
            return true;
        }
        let same_info = match (self.info(), other.info()) {
            (Some(a), Some(b)) => a.same_entry(b),
            (None, None) => true,
            _ => false,
        };
        same_info && self.instance_ptr() == other.instance_ptr()
    }

    // ========================================================================
    // Member access
    // ========================================================================

    /// Resolve `name` as a member and return its value.
    ///
    /// Enum values come back as integers, methods as callable handles
    /// (bound to this instance when they take one), properties and fields
    /// as their current decoded value, and signals as signal handles.
    pub fn extract(&self, name: &str) -> BridgeResult<HostValue> {
        let info = self.info().ok_or(BridgeError::NoTypeInformation)?;
        if list::is_list_type(info) {
            return list::extract(self, info, name);
        }

        match resolver::resolve(info, name)? {
            ResolvedMember::EnumValue(value) => Ok(HostValue::Int(value)),
            ResolvedMember::Method(method) => Ok(HostValue::Handle(self.bind_method(method))),
            ResolvedMember::Property { info: prop, name } => self.read_property(&prop, &name),
            ResolvedMember::Field { info: field, name } => self.read_field(&field, &name),
            ResolvedMember::Signal(signal) => {
                Ok(HostValue::Handle(DynamicHandle::unbound(&self.0.repo, signal)))
            }
        }
    }

    fn bind_method(&self, method: TypeDescriptor) -> DynamicHandle {
        let flags = self.0.repo.oracle().function_flags(method.raw());
        if !flags.contains(FunctionFlags::IS_METHOD) || !self.is_bound() {
            return DynamicHandle::unbound(&self.0.repo, method);
        }
        let retain = self.kind() == Some(InfoKind::Object);
        bridge_trace!(method = %method.name(), retain, "binding method to instance");
        Self::alias_retaining_objects(self, Some(method), self.instance_ptr(), retain)
    }

    fn require_instance(&self, member: &str) -> BridgeResult<*mut c_void> {
        match self.instance() {
            Some(instance) => Ok(instance.ptr),
            None => Err(BridgeError::NullReceiver(member.to_string())),
        }
    }

    fn read_property(&self, prop: &TypeDescriptor, name: &str) -> BridgeResult<HostValue> {
        let ptr = self.require_instance(name)?;
        let oracle = self.0.repo.oracle();
        if !oracle.property_flags(prop.raw()).contains(PropertyFlags::READABLE) {
            return Err(BridgeError::PropertyNotReadable(name.to_string()));
        }
        let ty = member_type(prop, name)?;
        bridge_trace!(property = name, "getting property");
        let slot = oracle.get_property(ptr, name)?;
        codec::decode(slot, &ty, &self.0.repo)
    }

    fn write_property(&self, prop: &TypeDescriptor, name: &str, value: &HostValue) -> BridgeResult<()> {
        let ptr = self.require_instance(name)?;
        let oracle = self.0.repo.oracle();
        if !oracle.property_flags(prop.raw()).contains(PropertyFlags::WRITABLE) {
            return Err(BridgeError::PropertyNotWritable(name.to_string()));
        }
        let ty = member_type(prop, name)?;
        let mut block = ArgumentBlock::new();
        let slot = codec::encode(value, &ty, &mut block)?;
        bridge_trace!(property = name, "setting property");
        oracle.set_property(ptr, name, slot)?;
        Ok(())
    }

    fn read_field(&self, field: &TypeDescriptor, name: &str) -> BridgeResult<HostValue> {
        let ptr = self.require_instance(name)?;
        let ty = member_type(field, name)?;
        let slot = self
            .0
            .repo
            .oracle()
            .field_get(field.raw(), ptr)
            .map_err(|e| BridgeError::FieldAccessFailed(format!("get {}: {}", name, e)))?;
        codec::decode(slot, &ty, &self.0.repo)
    }

    fn write_field(&self, field: &TypeDescriptor, name: &str, value: &HostValue) -> BridgeResult<()> {
        let ptr = self.require_instance(name)?;
        let ty = member_type(field, name)?;
        let mut block = ArgumentBlock::new();
        let slot = codec::encode(value, &ty, &mut block)?;
        self.0
            .repo
            .oracle()
            .field_set(field.raw(), ptr, slot)
            .map_err(|e| BridgeError::FieldAccessFailed(format!("set {}: {}", name, e)))
    }

    /// Read a property or field by name
    pub fn get_member(&self, name: &str) -> BridgeResult<HostValue> {
        let info = self.info().ok_or(BridgeError::NoTypeInformation)?;
        if let Some((prop, canonical)) = resolver::find_property(info, name) {
            return self.read_property(&prop, &canonical);
        }
        if let Some((field, canonical)) = resolver::find_field(info, name) {
            return self.read_field(&field, &canonical);
        }
        Err(BridgeError::NoSuchMember(name.to_string()))
    }

    /// Write a property or field by name
    pub fn set_member(&self, name: &str, value: &HostValue) -> BridgeResult<()> {
        let info = self.info().ok_or(BridgeError::NoTypeInformation)?;
        if let Some((prop, canonical)) = resolver::find_property(info, name) {
            return self.write_property(&prop, &canonical, value);
        }
        if let Some((field, canonical)) = resolver::find_field(info, name) {
            return self.write_field(&field, &canonical, value);
        }
        Err(BridgeError::NoSuchMember(name.to_string()))
    }

    // ========================================================================
    // Evaluation
    // ========================================================================

    /// Evaluate the handle with call syntax.
    ///
    /// * list type: 1-based element access
    /// * callable: invoke with the positional arguments
    /// * unbound object, struct or interface with a handle argument: cast
    /// * unbound object: construct, arguments are property initializers
    /// * unbound struct: allocate a zeroed block
    /// * bound (or freshly built struct): member get/set
    pub fn eval(&self, args: &[Arg]) -> BridgeResult<HostValue> {
        let info = self.info().ok_or(BridgeError::NoTypeInformation)?;
        let kind = info.kind();

        if list::is_list_type(info) {
            return list::nth(self, info, args);
        }

        if kind.is_callable() {
            return self.call(info, args);
        }

        let constructible = matches!(kind, InfoKind::Object | InfoKind::Interface) || kind.is_struct_like();
        if !constructible {
            return Err(BridgeError::NotCallable(info.qualified_name()));
        }

        let (target, rest) = if self.is_bound() {
            (self.clone(), args)
        } else if let Some(Arg::Value(HostValue::Handle(source))) = args.first() {
            (self.cast(info, source), &args[1..])
        } else if kind == InfoKind::Object {
            let initializers: &[Arg] = match args {
                [Arg::Value(HostValue::Nil)] => &[],
                _ => args,
            };
            return self.construct_object(info, initializers);
        } else if kind.is_struct_like() {
            (self.construct_struct(info)?, args)
        } else {
            return Err(BridgeError::NotCallable(info.qualified_name()));
        };

        if matches!(rest, [Arg::Value(HostValue::Nil)]) {
            return Ok(HostValue::Handle(target));
        }
        target.access_members(rest)?;
        Ok(HostValue::Handle(target))
    }

    fn call(&self, callable: &TypeDescriptor, args: &[Arg]) -> BridgeResult<HostValue> {
        let values = args
            .iter()
            .map(|arg| match arg {
                Arg::Value(value) => Ok(value.clone()),
                other => Err(BridgeError::mismatch("positional argument", arg_kind(other))),
            })
            .collect::<BridgeResult<Vec<_>>>()?;
        invoke::invoke(callable, self.instance_ptr(), &values, &self.0.repo)
    }

    fn cast(&self, info: &TypeDescriptor, source: &DynamicHandle) -> DynamicHandle {
        let retain = info.kind() == InfoKind::Object || source.kind() == Some(InfoKind::Object);
        bridge_trace!(to = %info.qualified_name(), retain, "casting handle");
        Self::alias_retaining_objects(source, Some(info.clone()), source.instance_ptr(), retain)
    }

    fn construct_object(&self, info: &TypeDescriptor, args: &[Arg]) -> BridgeResult<HostValue> {
        let mut block = ArgumentBlock::new();
        let mut params = Vec::new();
        let mut i = 0;
        while i < args.len() {
            let (name, value) = match &args[i] {
                Arg::Keyword { name, value } => {
                    i += 1;
                    (name.as_str(), value)
                }
                arg => {
                    let name = arg
                        .as_name()
                        .ok_or_else(|| BridgeError::mismatch("property name", arg_kind(arg)))?;
                    let value = match args.get(i + 1) {
                        Some(Arg::Value(value)) => value,
                        Some(other) => {
                            return Err(BridgeError::mismatch(
                                format!("value for property {}", name),
                                arg_kind(other),
                            ))
                        }
                        None => {
                            return Err(BridgeError::mismatch(
                                format!("value for property {}", name),
                                "nothing",
                            ))
                        }
                    };
                    i += 2;
                    (name, value)
                }
            };
            let (prop, canonical) = resolver::find_property(info, name)
                .ok_or_else(|| BridgeError::NoSuchMember(name.to_string()))?;
            let ty = member_type(&prop, &canonical)?;
            let slot = codec::encode(value, &ty, &mut block)?;
            params.push(PropertyInit {
                name: canonical,
                value: slot,
            });
        }

        let oracle = self.0.repo.oracle();
        bridge_trace!(ty = %info.qualified_name(), n_params = params.len(), "constructing object");
        let instance = oracle
            .new_object(info.registered_type(), &params)
            .map_err(|e| BridgeError::ConstructionFailed(format!("{} ({})", info.qualified_name(), e)))?;
        if instance.is_null() {
            return Err(BridgeError::ConstructionFailed(info.qualified_name()));
        }
        if oracle.is_floating(instance) {
            oracle.ref_sink(instance);
        }
        if oracle.ref_count(instance) == 0 {
            oracle.object_ref(instance);
        }
        bridge_trace!(refs = oracle.ref_count(instance), "constructed");
        Ok(HostValue::Handle(DynamicHandle::adopt_reference(
            &self.0.repo,
            Some(info.clone()),
            instance,
        )))
    }

    fn construct_struct(&self, info: &TypeDescriptor) -> BridgeResult<DynamicHandle> {
        let size = self.0.repo.oracle().struct_size(info.raw()).max(1);
        // SAFETY: plain zeroed allocation; checked for null below.
        let ptr = unsafe { libc::calloc(1, size) };
        if ptr.is_null() {
            return Err(BridgeError::AllocationFailed(size));
        }
        bridge_trace!(ty = %info.qualified_name(), size, "allocated struct block");
        Ok(DynamicHandle::owned_block(&self.0.repo, info.clone(), ptr))
    }

    /// `name=value` sets; `name, &var` gets into a host variable
    fn access_members(&self, args: &[Arg]) -> BridgeResult<()> {
        let mut i = 0;
        while i < args.len() {
            match &args[i] {
                Arg::Keyword { name, value } => {
                    self.set_member(name, value)?;
                    i += 1;
                }
                arg => {
                    let name = arg
                        .as_name()
                        .ok_or_else(|| BridgeError::mismatch("member name", arg_kind(arg)))?;
                    let Some(Arg::Output(var)) = args.get(i + 1) else {
                        return Err(BridgeError::OutputNotReference(name.to_string()));
                    };
                    let value = self.get_member(name)?;
                    self.0.repo.host().set_global(var, value);
                    i += 2;
                }
            }
        }
        Ok(())
    }
}

fn member_type(entry: &TypeDescriptor, name: &str) -> BridgeResult<TypeDescriptor> {
    entry
        .declared_type()
        .ok_or_else(|| BridgeError::UnsupportedType(format!("{} has no type", name)))
}

fn arg_kind(arg: &Arg) -> &'static str {
    match arg {
        Arg::Value(value) => value.type_name(),
        Arg::Keyword { .. } => "keyword",
        Arg::Symbol(_) => "symbol",
        Arg::Output(_) => "output reference",
    }
}

impl fmt::Display for DynamicHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(instance) = self.instance() {
            write!(f, "{:p} is pointer to ", instance.ptr)?;
        }
        let Some(info) = self.info() else {
            return write!(f, "unknown type object");
        };
        if info.kind() == InfoKind::Type {
            return match info.tag() {
                gyre_sdk::TypeTag::GList => write!(f, "double linked list"),
                gyre_sdk::TypeTag::GSList => write!(f, "single linked list"),
                tag => write!(f, "{} type", tag),
            };
        }
        write!(
            f,
            "gyre object name: {}, type: {}, namespace: {}",
            info.name(),
            info.kind(),
            info.namespace()
        )
    }
}

impl fmt::Debug for DynamicHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicHandle")
            .field("info", &self.0.info)
            .field("instance", &self.0.instance)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostInterpreter;
    use gyre_sdk::{ObjectRuntime, Oracle, TypeTag};
    use gyre_testkit::MockRepository;

    struct SilentHost;

    impl HostInterpreter for SilentHost {
        fn warn(&self, _message: &str) {}
        fn get_global(&self, _name: &str) -> Option<HostValue> {
            None
        }
        fn set_global(&self, _name: &str, _value: HostValue) {}
        fn call(&self, name: &str, _args: Vec<HostValue>) -> Result<HostValue, String> {
            Err(format!("no function {}", name))
        }
    }

    fn setup() -> (Rc<MockRepository>, Repository) {
        let mock = Rc::new(MockRepository::new());
        let oracle: Rc<dyn Oracle> = mock.clone();
        let repo = Repository::new(oracle, Rc::new(SilentHost));
        (mock, repo)
    }

    #[test]
    fn test_unbound_display() {
        let (mock, repo) = setup();
        let widget = mock.object_type("Demo", "Widget", None);
        let handle = DynamicHandle::unbound(&repo, TypeDescriptor::retain(repo.oracle(), widget));
        assert_eq!(
            handle.to_string(),
            "gyre object name: Widget, type: object, namespace: Demo"
        );
        let opaque = DynamicHandle::borrowed(&repo, None, std::ptr::null_mut());
        assert_eq!(opaque.to_string(), "unknown type object");
    }

    #[test]
    fn test_retained_releases_once() {
        let (mock, repo) = setup();
        let widget = mock.object_type("Demo", "Widget", None);
        let ptr = mock.new_instance(widget);
        let handle = DynamicHandle::retained(&repo, None, ptr);
        assert_eq!(mock.instance_refs(ptr), 2);
        let copy = handle.clone();
        assert_eq!(mock.instance_refs(ptr), 2);
        drop(handle);
        drop(copy);
        assert_eq!(mock.instance_refs(ptr), 1);
        mock.object_unref(ptr);
        assert_eq!(mock.live_objects(), 0);
    }

    #[test]
    fn test_null_receiver_for_property_on_unbound() {
        let (mock, repo) = setup();
        let widget = mock.object_type("Demo", "Widget", None);
        let int = mock.scalar(TypeTag::Int32);
        mock.add_property(widget, "width", int, PropertyFlags::READWRITE);
        let handle = DynamicHandle::unbound(&repo, TypeDescriptor::retain(repo.oracle(), widget));
        assert!(matches!(
            handle.extract("width"),
            Err(BridgeError::NullReceiver(name)) if name == "width"
        ));
    }

    #[test]
    fn test_enum_is_not_callable() {
        let (mock, repo) = setup();
        let color = mock.enum_type("Demo", "Color", TypeTag::Int32, &[("red", 0)]);
        let handle = DynamicHandle::unbound(&repo, TypeDescriptor::retain(repo.oracle(), color));
        assert!(matches!(handle.eval(&[]), Err(BridgeError::NotCallable(_))));
        assert_eq!(handle.extract("red").unwrap(), HostValue::Int(0));
    }

    #[test]
    fn test_no_type_information() {
        let (_mock, repo) = setup();
        let opaque = DynamicHandle::borrowed(&repo, None, std::ptr::null_mut());
        assert_eq!(opaque.extract("x").unwrap_err(), BridgeError::NoTypeInformation);
        assert_eq!(opaque.eval(&[]).unwrap_err(), BridgeError::NoTypeInformation);
    }
}
