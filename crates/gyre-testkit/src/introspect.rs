//! Introspector implementation over the in-memory entry table

use std::ffi::{c_void, CStr};
use std::path::{Path, PathBuf};

use gyre_sdk::{
    ArgumentSlot, ArrayKind, Direction, FunctionFlags, InfoKind, Introspector, MemberKind,
    OracleError, OracleResult, PropertyFlags, RawInfo, RuntimeType, TypeTag,
};

use crate::database::MockRepository;
use crate::VALUE_BOX_TYPE;

/// Width in bytes of a value stored directly in a struct field
fn field_width(tag: TypeTag) -> usize {
    match tag {
        TypeTag::Int8 | TypeTag::UInt8 => 1,
        TypeTag::Int16 | TypeTag::UInt16 => 2,
        TypeTag::Boolean
        | TypeTag::Int32
        | TypeTag::UInt32
        | TypeTag::Float
        | TypeTag::Unichar => 4,
        _ => 8,
    }
}

fn version_not_found(namespace: &str, version: Option<&str>) -> OracleError {
    let wanted = match version {
        Some(v) => format!("version {}", v),
        None => "any version".to_string(),
    };
    OracleError::Namespace(format!(
        "Typelib file for namespace '{}' ({}) not found",
        namespace, wanted
    ))
}

impl MockRepository {
    fn load(
        &self,
        namespace: &str,
        version: Option<&str>,
        dir: Option<&Path>,
    ) -> OracleResult<String> {
        let mut namespaces = self.namespaces.borrow_mut();
        let candidate = namespaces.iter_mut().find(|ns| {
            ns.name == namespace
                && version.map_or(true, |v| ns.version == v)
                && match (&ns.private_dir, dir) {
                    (Some(own), Some(dir)) => own == dir,
                    (Some(_), None) => false,
                    (None, _) => true,
                }
        });
        match candidate {
            Some(ns) => {
                ns.loaded = true;
                Ok(ns.version.clone())
            }
            None => Err(version_not_found(namespace, version)),
        }
    }

    /// Top-level entries of a namespace in declaration order
    fn top_level(&self, namespace: &str) -> Vec<RawInfo> {
        self.infos
            .borrow()
            .iter()
            .enumerate()
            .filter(|(_, e)| e.top_level && e.namespace.as_deref() == Some(namespace))
            .map(|(i, _)| RawInfo::from_bits(i as u64 + 1))
            .collect()
    }

    fn type_entry_tag(&self, ty: Option<RawInfo>) -> TypeTag {
        ty.map_or(TypeTag::Void, |ty| self.with_entry(ty, |e| e.tag))
    }
}

impl Introspector for MockRepository {
    fn info_ref(&self, info: RawInfo) {
        self.with_entry(info, |e| e.refs.set(e.refs.get() + 1));
    }

    fn info_unref(&self, info: RawInfo) {
        self.with_entry(info, |e| e.refs.set(e.refs.get() - 1));
    }

    fn info_kind(&self, info: RawInfo) -> InfoKind {
        self.with_entry(info, |e| e.kind)
    }

    fn info_name(&self, info: RawInfo) -> Option<String> {
        self.with_entry(info, |e| e.name.clone())
    }

    fn info_namespace(&self, info: RawInfo) -> Option<String> {
        self.with_entry(info, |e| e.namespace.clone())
    }

    // ------------------------------------------------------------------------
    // Repository
    // ------------------------------------------------------------------------

    fn require(&self, namespace: &str, version: Option<&str>) -> OracleResult<String> {
        self.load(namespace, version, None)
    }

    fn require_private(
        &self,
        dir: &Path,
        namespace: &str,
        version: Option<&str>,
    ) -> OracleResult<String> {
        self.load(namespace, version, Some(dir))
    }

    fn search_path(&self) -> Vec<PathBuf> {
        self.search_path.borrow().clone()
    }

    fn prepend_search_path(&self, dir: &Path) {
        self.search_path.borrow_mut().insert(0, dir.to_path_buf());
    }

    fn is_registered(&self, namespace: &str, version: Option<&str>) -> bool {
        self.namespaces.borrow().iter().any(|ns| {
            ns.loaded && ns.name == namespace && version.map_or(true, |v| ns.version == v)
        })
    }

    fn version(&self, namespace: &str) -> Option<String> {
        self.namespaces
            .borrow()
            .iter()
            .find(|ns| ns.loaded && ns.name == namespace)
            .map(|ns| ns.version.clone())
    }

    fn enumerate_versions(&self, namespace: &str) -> Vec<String> {
        self.namespaces
            .borrow()
            .iter()
            .filter(|ns| ns.name == namespace && ns.private_dir.is_none())
            .map(|ns| ns.version.clone())
            .collect()
    }

    fn loaded_namespaces(&self) -> Vec<String> {
        self.namespaces
            .borrow()
            .iter()
            .filter(|ns| ns.loaded)
            .map(|ns| ns.name.clone())
            .collect()
    }

    fn n_infos(&self, namespace: &str) -> usize {
        self.top_level(namespace).len()
    }

    fn info_at(&self, namespace: &str, index: usize) -> Option<RawInfo> {
        let raw = self.top_level(namespace).get(index).copied();
        self.hand_out_opt(raw)
    }

    fn find_by_name(&self, namespace: &str, name: &str) -> Option<RawInfo> {
        let raw = self
            .top_level(namespace)
            .into_iter()
            .find(|raw| self.with_entry(*raw, |e| e.name.as_deref() == Some(name)));
        self.hand_out_opt(raw)
    }

    fn find_by_runtime_type(&self, rtype: RuntimeType) -> Option<RawInfo> {
        let raw = self.by_rtype.borrow().get(&rtype).copied();
        self.hand_out_opt(raw)
    }

    // ------------------------------------------------------------------------
    // Container members
    // ------------------------------------------------------------------------

    fn n_members(&self, info: RawInfo, kind: MemberKind) -> usize {
        self.with_entry(info, |e| e.members.iter().filter(|(k, _)| *k == kind).count())
    }

    fn member(&self, info: RawInfo, kind: MemberKind, index: usize) -> Option<RawInfo> {
        let raw = self.with_entry(info, |e| {
            e.members
                .iter()
                .filter(|(k, _)| *k == kind)
                .nth(index)
                .map(|(_, raw)| *raw)
        });
        self.hand_out_opt(raw)
    }

    fn parent(&self, info: RawInfo) -> Option<RawInfo> {
        let raw = self.with_entry(info, |e| e.parent);
        self.hand_out_opt(raw)
    }

    fn registered_type(&self, info: RawInfo) -> RuntimeType {
        self.with_entry(info, |e| e.rtype)
    }

    fn struct_size(&self, info: RawInfo) -> usize {
        self.with_entry(info, |e| e.size)
    }

    fn value_box_type(&self) -> RuntimeType {
        VALUE_BOX_TYPE
    }

    // ------------------------------------------------------------------------
    // Type information
    // ------------------------------------------------------------------------

    fn type_tag(&self, ty: RawInfo) -> TypeTag {
        self.with_entry(ty, |e| e.tag)
    }

    fn type_interface(&self, ty: RawInfo) -> Option<RawInfo> {
        let raw = self.with_entry(ty, |e| e.interface);
        self.hand_out_opt(raw)
    }

    fn type_param(&self, ty: RawInfo, index: usize) -> Option<RawInfo> {
        let raw = self.with_entry(ty, |e| e.params.get(index).copied());
        self.hand_out_opt(raw)
    }

    fn type_is_pointer(&self, ty: RawInfo) -> bool {
        self.with_entry(ty, |e| {
            matches!(
                e.tag,
                TypeTag::Utf8
                    | TypeTag::Filename
                    | TypeTag::Array
                    | TypeTag::GList
                    | TypeTag::GSList
                    | TypeTag::GHash
                    | TypeTag::Error
            ) || e.interface.is_some()
        })
    }

    fn array_kind(&self, ty: RawInfo) -> ArrayKind {
        self.with_entry(ty, |e| e.array_kind)
    }

    fn array_length_index(&self, ty: RawInfo) -> Option<usize> {
        self.with_entry(ty, |e| e.length_index)
    }

    fn array_fixed_size(&self, ty: RawInfo) -> Option<usize> {
        self.with_entry(ty, |e| e.fixed_size)
    }

    fn array_zero_terminated(&self, ty: RawInfo) -> bool {
        self.with_entry(ty, |e| e.zero_terminated)
    }

    // ------------------------------------------------------------------------
    // Enums
    // ------------------------------------------------------------------------

    fn enum_storage(&self, info: RawInfo) -> TypeTag {
        self.with_entry(info, |e| e.storage)
    }

    fn value_of(&self, value: RawInfo) -> i64 {
        self.with_entry(value, |e| e.value)
    }

    // ------------------------------------------------------------------------
    // Callables
    // ------------------------------------------------------------------------

    fn callable_n_args(&self, callable: RawInfo) -> usize {
        self.with_entry(callable, |e| e.args.len())
    }

    fn callable_arg(&self, callable: RawInfo, index: usize) -> Option<RawInfo> {
        let raw = self.with_entry(callable, |e| e.args.get(index).copied());
        self.hand_out_opt(raw)
    }

    fn callable_return_type(&self, callable: RawInfo) -> Option<RawInfo> {
        let raw = self.with_entry(callable, |e| e.ret);
        self.hand_out_opt(raw)
    }

    fn function_flags(&self, function: RawInfo) -> FunctionFlags {
        self.with_entry(function, |e| e.flags)
    }

    fn arg_direction(&self, arg: RawInfo) -> Direction {
        self.with_entry(arg, |e| e.direction)
    }

    fn arg_type(&self, arg: RawInfo) -> Option<RawInfo> {
        let raw = self.with_entry(arg, |e| e.ty);
        self.hand_out_opt(raw)
    }

    // ------------------------------------------------------------------------
    // Properties, fields, constants
    // ------------------------------------------------------------------------

    fn property_type(&self, property: RawInfo) -> Option<RawInfo> {
        let raw = self.with_entry(property, |e| e.ty);
        self.hand_out_opt(raw)
    }

    fn property_flags(&self, property: RawInfo) -> PropertyFlags {
        self.with_entry(property, |e| e.property_flags)
    }

    fn field_type(&self, field: RawInfo) -> Option<RawInfo> {
        let raw = self.with_entry(field, |e| e.ty);
        self.hand_out_opt(raw)
    }

    fn field_get(&self, field: RawInfo, instance: *mut c_void) -> OracleResult<ArgumentSlot> {
        let (offset, ty, name) = self.with_entry(field, |e| (e.offset, e.ty, e.name.clone()));
        if instance.is_null() {
            return Err(OracleError::Field(format!(
                "cannot read field {} of a null instance",
                name.unwrap_or_default()
            )));
        }
        let width = field_width(self.type_entry_tag(ty));
        let mut bytes = [0u8; 8];
        // SAFETY: the caller passes an instance at least `offset + width` bytes long
        unsafe {
            std::ptr::copy_nonoverlapping(
                instance.cast::<u8>().add(offset),
                bytes.as_mut_ptr(),
                width,
            );
        }
        Ok(ArgumentSlot::from_bits(u64::from_le_bytes(bytes)))
    }

    fn field_set(
        &self,
        field: RawInfo,
        instance: *mut c_void,
        value: ArgumentSlot,
    ) -> OracleResult<()> {
        let (offset, ty, name) = self.with_entry(field, |e| (e.offset, e.ty, e.name.clone()));
        if instance.is_null() {
            return Err(OracleError::Field(format!(
                "cannot write field {} of a null instance",
                name.unwrap_or_default()
            )));
        }
        let tag = self.type_entry_tag(ty);
        let value = if matches!(tag, TypeTag::Utf8 | TypeTag::Filename) && !value.is_null() {
            // SAFETY: utf8 slots carry a nul-terminated string
            let text = unsafe { CStr::from_ptr(value.as_ptr().cast()) };
            ArgumentSlot::pointer(self.intern(&text.to_string_lossy()))
        } else {
            value
        };
        let width = field_width(tag);
        let bytes = value.to_bits().to_le_bytes();
        // SAFETY: see field_get
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), instance.cast::<u8>().add(offset), width);
        }
        Ok(())
    }

    fn constant_type(&self, constant: RawInfo) -> Option<RawInfo> {
        let raw = self.with_entry(constant, |e| e.ty);
        self.hand_out_opt(raw)
    }

    fn constant_value(&self, constant: RawInfo) -> OracleResult<ArgumentSlot> {
        Ok(self.with_entry(constant, |e| e.constant))
    }

    // ------------------------------------------------------------------------
    // Invocation
    // ------------------------------------------------------------------------

    fn invoke(
        &self,
        callable: RawInfo,
        in_args: &[ArgumentSlot],
        out_args: &mut [ArgumentSlot],
    ) -> OracleResult<ArgumentSlot> {
        let (native, name) = self.with_entry(callable, |e| (e.native.clone(), e.name.clone()));
        let name = name.unwrap_or_default();
        match native {
            Some(native) => native(self, in_args, out_args).map_err(OracleError::Invocation),
            None => Err(OracleError::Invocation(format!(
                "{} has no native implementation",
                name
            ))),
        }
    }
}
