//! Mock object runtime
//!
//! Instances are heap blocks whose first bytes are plain storage, so field
//! offsets address real memory. Each block counts its references and keeps
//! its properties, copied strings and signal handlers until finalization.

use std::cell::{Cell, RefCell};
use std::ffi::{c_void, CStr, CString};
use std::rc::Rc;

use gyre_sdk::{
    ArgumentSlot, InfoKind, MemberKind, ObjectRuntime, OracleError, OracleResult, PropertyInit,
    RawInfo, RuntimeType, SignalHandler, TypeTag,
};
use rustc_hash::FxHashMap;

use crate::database::MockRepository;

/// Bytes of field storage at the start of every instance
pub const INSTANCE_STORAGE: usize = 64;

type Handler = Rc<dyn Fn(&[ArgumentSlot]) -> ArgumentSlot>;

#[repr(C)]
struct MockObject {
    storage: [u64; INSTANCE_STORAGE / 8],
    rtype: RuntimeType,
    refs: Cell<u32>,
    floating: Cell<bool>,
    properties: RefCell<FxHashMap<String, ArgumentSlot>>,
    strings: RefCell<Vec<CString>>,
    handlers: RefCell<Vec<(u64, String, Handler)>>,
}

impl MockRepository {
    // ------------------------------------------------------------------------
    // Instance bookkeeping
    // ------------------------------------------------------------------------

    fn allocate(&self, rtype: RuntimeType, floating: bool) -> *mut c_void {
        let object = Box::new(MockObject {
            storage: [0; INSTANCE_STORAGE / 8],
            rtype,
            refs: Cell::new(1),
            floating: Cell::new(floating),
            properties: RefCell::new(FxHashMap::default()),
            strings: RefCell::new(Vec::new()),
            handlers: RefCell::new(Vec::new()),
        });
        let ptr = Box::into_raw(object).cast::<c_void>();
        self.live.borrow_mut().insert(ptr as usize);
        self.created.set(self.created.get() + 1);
        ptr
    }

    fn object<R>(&self, instance: *mut c_void, f: impl FnOnce(&MockObject) -> R) -> R {
        assert!(
            self.live.borrow().contains(&(instance as usize)),
            "{:p} is not a live instance",
            instance
        );
        // SAFETY: live pointers come from Box::into_raw in `allocate`
        f(unsafe { &*instance.cast::<MockObject>() })
    }

    fn finalize(&self, instance: *mut c_void) {
        self.live.borrow_mut().remove(&(instance as usize));
        // SAFETY: removed from the live set, so this is the only owner
        let object = unsafe { Box::from_raw(instance.cast::<MockObject>()) };
        let handlers = object.handlers.take();
        drop(object);
        self.finalized.set(self.finalized.get() + 1);
        drop(handlers);
    }

    /// Entry registered for a runtime type, without counting a reference
    fn entry_for(&self, rtype: RuntimeType) -> Option<RawInfo> {
        self.by_rtype.borrow().get(&rtype).copied()
    }

    /// Type chain of `rtype`, most derived first
    fn chain(&self, rtype: RuntimeType) -> Vec<RawInfo> {
        let mut out = Vec::new();
        let mut current = self.entry_for(rtype);
        while let Some(raw) = current {
            out.push(raw);
            current = self.with_entry(raw, |e| e.parent);
        }
        out
    }

    /// Declared member of `kind` named `name` on the chain of `rtype`
    fn chain_member(&self, rtype: RuntimeType, kind: MemberKind, name: &str) -> Option<RawInfo> {
        self.chain(rtype).into_iter().find_map(|owner| {
            let members = self.with_entry(owner, |e| e.members.clone());
            members.into_iter().find_map(|(k, member)| {
                let hit = k == kind && self.with_entry(member, |m| m.name.as_deref() == Some(name));
                hit.then_some(member)
            })
        })
    }

    fn property_tag(&self, property: RawInfo) -> TypeTag {
        self.with_entry(property, |e| e.ty)
            .map_or(TypeTag::Void, |ty| self.with_entry(ty, |t| t.tag))
    }

    fn store_property(&self, instance: *mut c_void, property: RawInfo, name: &str, value: ArgumentSlot) {
        let is_string = matches!(self.property_tag(property), TypeTag::Utf8 | TypeTag::Filename);
        self.object(instance, |object| {
            let value = if is_string && !value.is_null() {
                // SAFETY: utf8 slots carry a nul-terminated string
                let copy = unsafe { CStr::from_ptr(value.as_ptr().cast()) }.to_owned();
                let slot = ArgumentSlot::pointer(copy.as_ptr());
                object.strings.borrow_mut().push(copy);
                slot
            } else {
                value
            };
            object.properties.borrow_mut().insert(name.to_string(), value);
        });
    }

    // ------------------------------------------------------------------------
    // Test helpers
    // ------------------------------------------------------------------------

    /// New instance of an object entry with one owned (non-floating)
    /// reference
    pub fn new_instance(&self, info: RawInfo) -> *mut c_void {
        let rtype = self.with_entry(info, |e| e.rtype);
        self.allocate(rtype, false)
    }

    /// Reference count of a live instance
    pub fn instance_refs(&self, instance: *mut c_void) -> u32 {
        self.object(instance, |o| o.refs.get())
    }

    /// Number of instances not yet finalized
    pub fn live_objects(&self) -> usize {
        self.live.borrow().len()
    }

    /// Instances created so far
    pub fn created_objects(&self) -> usize {
        self.created.get()
    }

    /// Instances finalized so far
    pub fn finalized_objects(&self) -> usize {
        self.finalized.get()
    }

    /// Stored value of a property, `None` when never set
    pub fn property_value(&self, instance: *mut c_void, name: &str) -> Option<ArgumentSlot> {
        self.object(instance, |o| o.properties.borrow().get(name).copied())
    }

    /// Number of handlers connected on an instance
    pub fn handler_count(&self, instance: *mut c_void) -> usize {
        self.object(instance, |o| o.handlers.borrow().len())
    }

    /// Emit a signal: run every handler connected to `signal` with the
    /// emitter prepended to `args`, returning the last handler's result.
    pub fn emit(&self, instance: *mut c_void, signal: &str, args: &[ArgumentSlot]) -> Option<ArgumentSlot> {
        let handlers: Vec<Handler> = self.object(instance, |o| {
            o.handlers
                .borrow()
                .iter()
                .filter(|(_, name, _)| name == signal)
                .map(|(_, _, handler)| Rc::clone(handler))
                .collect()
        });
        let mut slots = Vec::with_capacity(args.len() + 1);
        slots.push(ArgumentSlot::pointer(instance));
        slots.extend_from_slice(args);
        handlers.iter().fold(None, |_, handler| Some(handler(&slots)))
    }
}

impl ObjectRuntime for MockRepository {
    fn object_ref(&self, instance: *mut c_void) {
        self.object(instance, |o| o.refs.set(o.refs.get() + 1));
    }

    fn object_unref(&self, instance: *mut c_void) {
        let remaining = self.object(instance, |o| {
            let refs = o.refs.get() - 1;
            o.refs.set(refs);
            refs
        });
        if remaining == 0 {
            self.finalize(instance);
        }
    }

    fn ref_count(&self, instance: *mut c_void) -> u32 {
        self.instance_refs(instance)
    }

    fn is_object(&self, instance: *mut c_void) -> bool {
        self.live.borrow().contains(&(instance as usize))
    }

    fn is_floating(&self, instance: *mut c_void) -> bool {
        self.object(instance, |o| o.floating.get())
    }

    fn ref_sink(&self, instance: *mut c_void) {
        self.object(instance, |o| {
            if o.floating.get() {
                o.floating.set(false);
            } else {
                o.refs.set(o.refs.get() + 1);
            }
        });
    }

    fn type_of_instance(&self, instance: *mut c_void) -> RuntimeType {
        self.object(instance, |o| o.rtype)
    }

    fn type_name(&self, rtype: RuntimeType) -> Option<String> {
        self.entry_for(rtype).and_then(|raw| self.with_entry(raw, |e| e.name.clone()))
    }

    fn type_is_a(&self, rtype: RuntimeType, ancestor: RuntimeType) -> bool {
        if rtype == ancestor {
            return rtype.is_valid();
        }
        self.chain(rtype)
            .into_iter()
            .any(|raw| self.with_entry(raw, |e| e.rtype) == ancestor)
    }

    fn new_object(&self, rtype: RuntimeType, params: &[PropertyInit]) -> OracleResult<*mut c_void> {
        let Some(raw) = self.entry_for(rtype) else {
            return Err(OracleError::Construction(format!("{:?} is not registered", rtype)));
        };
        let (kind, name, floating) =
            self.with_entry(raw, |e| (e.kind, e.name.clone().unwrap_or_default(), e.initially_unowned));
        if kind != InfoKind::Object {
            return Err(OracleError::Construction(format!(
                "cannot instantiate {} type {}",
                kind, name
            )));
        }
        let mut resolved = Vec::with_capacity(params.len());
        for param in params {
            let property = self
                .chain_member(rtype, MemberKind::Property, &param.name)
                .ok_or_else(|| {
                    OracleError::Construction(format!(
                        "object class '{}' has no property named '{}'",
                        name, param.name
                    ))
                })?;
            resolved.push((property, param));
        }
        let instance = self.allocate(rtype, floating);
        for (property, param) in resolved {
            self.store_property(instance, property, &param.name, param.value);
        }
        Ok(instance)
    }

    fn get_property(&self, instance: *mut c_void, name: &str) -> OracleResult<ArgumentSlot> {
        let rtype = self.type_of_instance(instance);
        if self.chain_member(rtype, MemberKind::Property, name).is_none() {
            return Err(OracleError::Property(format!("no property named '{}'", name)));
        }
        Ok(self.property_value(instance, name).unwrap_or(ArgumentSlot::ZERO))
    }

    fn set_property(&self, instance: *mut c_void, name: &str, value: ArgumentSlot) -> OracleResult<()> {
        let rtype = self.type_of_instance(instance);
        let property = self
            .chain_member(rtype, MemberKind::Property, name)
            .ok_or_else(|| OracleError::Property(format!("no property named '{}'", name)))?;
        self.store_property(instance, property, name, value);
        Ok(())
    }

    fn connect_signal(
        &self,
        instance: *mut c_void,
        signal: &str,
        handler: SignalHandler,
    ) -> OracleResult<u64> {
        let rtype = self.type_of_instance(instance);
        if self.chain_member(rtype, MemberKind::Signal, signal).is_none() {
            return Err(OracleError::Signal(format!("no signal named '{}'", signal)));
        }
        let id = self.next_handler.get();
        self.next_handler.set(id + 1);
        let handler: Handler = Rc::from(handler);
        self.object(instance, |o| {
            o.handlers.borrow_mut().push((id, signal.to_string(), handler));
        });
        Ok(id)
    }
}
