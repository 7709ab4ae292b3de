//! Entry table, namespaces and builders

use std::cell::{Cell, RefCell};
use std::ffi::{c_char, c_void, CString};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use gyre_sdk::{
    ArgumentSlot, ArrayKind, Direction, FunctionFlags, InfoKind, MemberKind, PropertyFlags,
    RawInfo, RuntimeType, TypeTag,
};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::{DEFAULT_VERSION, VALUE_BOX_TYPE};

/// Native implementation of a mock callable.
///
/// Receives the repository, the in slots (receiver first for methods) and
/// the out slots; an `Err` is reported as the call's error message.
pub type NativeFn =
    dyn Fn(&MockRepository, &[ArgumentSlot], &mut [ArgumentSlot]) -> Result<ArgumentSlot, String>;

// ============================================================================
// Entries
// ============================================================================

pub(crate) struct InfoEntry {
    pub(crate) kind: InfoKind,
    pub(crate) name: Option<String>,
    pub(crate) namespace: Option<String>,
    pub(crate) top_level: bool,
    pub(crate) refs: Cell<i64>,

    // registered types
    pub(crate) rtype: RuntimeType,
    pub(crate) parent: Option<RawInfo>,
    pub(crate) size: usize,
    pub(crate) storage: TypeTag,
    pub(crate) members: Vec<(MemberKind, RawInfo)>,
    pub(crate) initially_unowned: bool,

    // type entries
    pub(crate) tag: TypeTag,
    pub(crate) interface: Option<RawInfo>,
    pub(crate) params: Vec<RawInfo>,
    pub(crate) array_kind: ArrayKind,
    pub(crate) zero_terminated: bool,
    pub(crate) fixed_size: Option<usize>,
    pub(crate) length_index: Option<usize>,

    // enum values
    pub(crate) value: i64,

    // callables and their arguments
    pub(crate) args: Vec<RawInfo>,
    pub(crate) ret: Option<RawInfo>,
    pub(crate) flags: FunctionFlags,
    pub(crate) native: Option<Rc<NativeFn>>,
    pub(crate) direction: Direction,

    // properties, fields, constants and arguments
    pub(crate) ty: Option<RawInfo>,
    pub(crate) property_flags: PropertyFlags,
    pub(crate) offset: usize,
    pub(crate) constant: ArgumentSlot,
}

impl InfoEntry {
    fn new(kind: InfoKind) -> Self {
        Self {
            kind,
            name: None,
            namespace: None,
            top_level: false,
            refs: Cell::new(0),
            rtype: RuntimeType::INVALID,
            parent: None,
            size: 0,
            storage: TypeTag::Int32,
            members: Vec::new(),
            initially_unowned: false,
            tag: TypeTag::Void,
            interface: None,
            params: Vec::new(),
            array_kind: ArrayKind::C,
            zero_terminated: false,
            fixed_size: None,
            length_index: None,
            value: 0,
            args: Vec::new(),
            ret: None,
            flags: FunctionFlags::NONE,
            native: None,
            direction: Direction::In,
            ty: None,
            property_flags: PropertyFlags::NONE,
            offset: 0,
            constant: ArgumentSlot::ZERO,
        }
    }

    fn named(kind: InfoKind, namespace: &str, name: &str) -> Self {
        let mut entry = Self::new(kind);
        entry.namespace = Some(namespace.to_string());
        entry.name = Some(name.to_string());
        entry
    }
}

pub(crate) struct MockNamespace {
    pub(crate) name: String,
    pub(crate) version: String,
    pub(crate) private_dir: Option<PathBuf>,
    pub(crate) implicit: bool,
    pub(crate) loaded: bool,
}

// ============================================================================
// Repository
// ============================================================================

/// In-memory introspection database and object runtime.
pub struct MockRepository {
    pub(crate) infos: RefCell<Vec<InfoEntry>>,
    pub(crate) namespaces: RefCell<Vec<MockNamespace>>,
    pub(crate) search_path: RefCell<Vec<PathBuf>>,
    pub(crate) by_rtype: RefCell<FxHashMap<RuntimeType, RawInfo>>,
    next_rtype: Cell<u64>,
    /// Strings owned by the database (constants, string fields)
    pub(crate) strings: RefCell<Vec<CString>>,

    pub(crate) live: RefCell<FxHashSet<usize>>,
    pub(crate) created: Cell<usize>,
    pub(crate) finalized: Cell<usize>,
    pub(crate) next_handler: Cell<u64>,
}

impl Default for MockRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRepository {
    /// Empty database with no namespaces
    pub fn new() -> Self {
        Self {
            infos: RefCell::new(Vec::new()),
            namespaces: RefCell::new(Vec::new()),
            search_path: RefCell::new(vec![PathBuf::from("/usr/lib/girepository-1.0")]),
            by_rtype: RefCell::new(FxHashMap::default()),
            next_rtype: Cell::new(100),
            strings: RefCell::new(Vec::new()),
            live: RefCell::new(FxHashSet::default()),
            created: Cell::new(0),
            finalized: Cell::new(0),
            next_handler: Cell::new(1),
        }
    }

    // ------------------------------------------------------------------------
    // Token bookkeeping
    // ------------------------------------------------------------------------

    pub(crate) fn index(raw: RawInfo) -> usize {
        raw.to_bits() as usize - 1
    }

    pub(crate) fn with_entry<R>(&self, raw: RawInfo, f: impl FnOnce(&InfoEntry) -> R) -> R {
        let infos = self.infos.borrow();
        match infos.get(Self::index(raw)) {
            Some(entry) => f(entry),
            None => panic!("unknown info token {:?}", raw),
        }
    }

    fn with_entry_mut<R>(&self, raw: RawInfo, f: impl FnOnce(&mut InfoEntry) -> R) -> R {
        let mut infos = self.infos.borrow_mut();
        match infos.get_mut(Self::index(raw)) {
            Some(entry) => f(entry),
            None => panic!("unknown info token {:?}", raw),
        }
    }

    /// Count one more caller-owned reference on `raw` and return it
    pub(crate) fn hand_out(&self, raw: RawInfo) -> RawInfo {
        self.with_entry(raw, |e| e.refs.set(e.refs.get() + 1));
        raw
    }

    pub(crate) fn hand_out_opt(&self, raw: Option<RawInfo>) -> Option<RawInfo> {
        raw.map(|raw| self.hand_out(raw))
    }

    /// References handed out by queries (or taken with `info_ref`) and not
    /// yet given back. Tokens returned by builders are not counted.
    pub fn outstanding_info_refs(&self) -> i64 {
        self.infos.borrow().iter().map(|e| e.refs.get()).sum()
    }

    fn push(&self, entry: InfoEntry) -> RawInfo {
        let mut infos = self.infos.borrow_mut();
        infos.push(entry);
        RawInfo::from_bits(infos.len() as u64)
    }

    fn add_member(&self, owner: RawInfo, kind: MemberKind, member: RawInfo) {
        self.with_entry_mut(owner, |e| e.members.push((kind, member)));
    }

    fn namespace_of(&self, raw: RawInfo) -> String {
        self.with_entry(raw, |e| e.namespace.clone().unwrap_or_default())
    }

    pub(crate) fn intern(&self, s: &str) -> *const c_char {
        let owned = CString::new(s).unwrap_or_default();
        let ptr = owned.as_ptr();
        self.strings.borrow_mut().push(owned);
        ptr.cast()
    }

    // ------------------------------------------------------------------------
    // Namespaces
    // ------------------------------------------------------------------------

    fn ensure_namespace(&self, name: &str) {
        let mut namespaces = self.namespaces.borrow_mut();
        if !namespaces.iter().any(|ns| ns.name == name) {
            namespaces.push(MockNamespace {
                name: name.to_string(),
                version: DEFAULT_VERSION.to_string(),
                private_dir: None,
                implicit: true,
                loaded: false,
            });
        }
    }

    /// Declare an available namespace version
    pub fn namespace(&self, name: &str, version: &str) {
        let mut namespaces = self.namespaces.borrow_mut();
        if let Some(ns) = namespaces.iter_mut().find(|ns| ns.name == name && ns.implicit) {
            ns.version = version.to_string();
            ns.implicit = false;
            return;
        }
        if !namespaces.iter().any(|ns| ns.name == name && ns.version == version) {
            namespaces.push(MockNamespace {
                name: name.to_string(),
                version: version.to_string(),
                private_dir: None,
                implicit: false,
                loaded: false,
            });
        }
    }

    /// Declare a namespace only loadable from a private directory
    pub fn private_namespace(&self, dir: &Path, name: &str, version: &str) {
        self.namespaces.borrow_mut().push(MockNamespace {
            name: name.to_string(),
            version: version.to_string(),
            private_dir: Some(dir.to_path_buf()),
            implicit: false,
            loaded: false,
        });
    }

    // ------------------------------------------------------------------------
    // Registered types
    // ------------------------------------------------------------------------

    fn registered(&self, namespace: &str, name: &str, kind: InfoKind, rtype: Option<RuntimeType>) -> RawInfo {
        self.ensure_namespace(namespace);
        let rtype = rtype.unwrap_or_else(|| {
            let bits = self.next_rtype.get();
            self.next_rtype.set(bits + 1);
            RuntimeType::from_bits(bits)
        });
        let mut entry = InfoEntry::named(kind, namespace, name);
        entry.top_level = true;
        entry.rtype = rtype;
        let raw = self.push(entry);
        self.by_rtype.borrow_mut().entry(rtype).or_insert(raw);
        raw
    }

    /// Object type, optionally derived from `parent`
    pub fn object_type(&self, namespace: &str, name: &str, parent: Option<RawInfo>) -> RawInfo {
        let raw = self.registered(namespace, name, InfoKind::Object, None);
        self.with_entry_mut(raw, |e| e.parent = parent);
        raw
    }

    /// Instances of `info` start with a floating reference
    pub fn set_initially_unowned(&self, info: RawInfo) {
        self.with_entry_mut(info, |e| e.initially_unowned = true);
    }

    /// Interface type
    pub fn interface_type(&self, namespace: &str, name: &str) -> RawInfo {
        self.registered(namespace, name, InfoKind::Interface, None)
    }

    /// Plain struct of `size` bytes
    pub fn struct_type(&self, namespace: &str, name: &str, size: usize) -> RawInfo {
        let raw = self.registered(namespace, name, InfoKind::Struct, None);
        self.with_entry_mut(raw, |e| e.size = size);
        raw
    }

    /// Boxed struct registered under `rtype`
    pub fn boxed_type(&self, namespace: &str, name: &str, size: usize, rtype: RuntimeType) -> RawInfo {
        let raw = self.registered(namespace, name, InfoKind::Boxed, Some(rtype));
        self.with_entry_mut(raw, |e| e.size = size);
        raw
    }

    /// The boxed generic value struct
    pub fn value_struct(&self, namespace: &str, name: &str) -> RawInfo {
        let raw = self.registered(namespace, name, InfoKind::Struct, Some(VALUE_BOX_TYPE));
        self.with_entry_mut(raw, |e| e.size = std::mem::size_of::<gyre_sdk::ValueBox>());
        raw
    }

    fn enum_like(
        &self,
        kind: InfoKind,
        namespace: &str,
        name: &str,
        storage: TypeTag,
        values: &[(&str, i64)],
    ) -> RawInfo {
        let raw = self.registered(namespace, name, kind, None);
        self.with_entry_mut(raw, |e| e.storage = storage);
        for (value_name, value) in values {
            let mut entry = InfoEntry::named(InfoKind::Value, namespace, value_name);
            entry.value = *value;
            let member = self.push(entry);
            self.add_member(raw, MemberKind::Value, member);
        }
        raw
    }

    /// Enum with the given storage tag and values
    pub fn enum_type(&self, namespace: &str, name: &str, storage: TypeTag, values: &[(&str, i64)]) -> RawInfo {
        self.enum_like(InfoKind::Enum, namespace, name, storage, values)
    }

    /// Flags type with the given storage tag and values
    pub fn flags_type(&self, namespace: &str, name: &str, storage: TypeTag, values: &[(&str, i64)]) -> RawInfo {
        self.enum_like(InfoKind::Flags, namespace, name, storage, values)
    }

    /// Callback type
    pub fn callback_type(&self, namespace: &str, name: &str) -> RawInfo {
        self.ensure_namespace(namespace);
        let mut entry = InfoEntry::named(InfoKind::Callback, namespace, name);
        entry.top_level = true;
        self.push(entry)
    }

    // ------------------------------------------------------------------------
    // Type entries
    // ------------------------------------------------------------------------

    /// Type entry with a plain tag
    pub fn scalar(&self, tag: TypeTag) -> RawInfo {
        let mut entry = InfoEntry::new(InfoKind::Type);
        entry.tag = tag;
        self.push(entry)
    }

    /// Interface-tagged type entry referring to `target`
    pub fn interface_ref(&self, target: RawInfo) -> RawInfo {
        let mut entry = InfoEntry::new(InfoKind::Type);
        entry.tag = TypeTag::Interface;
        entry.interface = Some(target);
        self.push(entry)
    }

    /// Array type entry
    pub fn array_of(
        &self,
        element: RawInfo,
        kind: ArrayKind,
        zero_terminated: bool,
        fixed_size: Option<usize>,
    ) -> RawInfo {
        let mut entry = InfoEntry::new(InfoKind::Type);
        entry.tag = TypeTag::Array;
        entry.params = vec![element];
        entry.array_kind = kind;
        entry.zero_terminated = zero_terminated;
        entry.fixed_size = fixed_size;
        self.push(entry)
    }

    /// Record the index of the argument carrying an array's length
    pub fn set_array_length(&self, array: RawInfo, index: usize) {
        self.with_entry_mut(array, |e| e.length_index = Some(index));
    }

    /// glist or gslist type entry with element type `element`
    pub fn list_of(&self, tag: TypeTag, element: RawInfo) -> RawInfo {
        assert!(tag.is_list(), "{} is not a list tag", tag);
        let mut entry = InfoEntry::new(InfoKind::Type);
        entry.tag = tag;
        entry.params = vec![element];
        self.push(entry)
    }

    // ------------------------------------------------------------------------
    // Members
    // ------------------------------------------------------------------------

    /// Property of type `ty` on `owner`
    pub fn add_property(&self, owner: RawInfo, name: &str, ty: RawInfo, flags: PropertyFlags) -> RawInfo {
        let mut entry = InfoEntry::named(InfoKind::Property, &self.namespace_of(owner), name);
        entry.ty = Some(ty);
        entry.property_flags = flags;
        let raw = self.push(entry);
        self.add_member(owner, MemberKind::Property, raw);
        raw
    }

    /// Field of type `ty` at byte `offset` of `owner`
    pub fn add_field(&self, owner: RawInfo, name: &str, ty: RawInfo, offset: usize) -> RawInfo {
        let mut entry = InfoEntry::named(InfoKind::Field, &self.namespace_of(owner), name);
        entry.ty = Some(ty);
        entry.offset = offset;
        let raw = self.push(entry);
        self.add_member(owner, MemberKind::Field, raw);
        raw
    }

    /// Signal with argument types `args` (emitter excluded) returning `ret`
    pub fn add_signal(&self, owner: RawInfo, name: &str, args: &[RawInfo], ret: RawInfo) -> RawInfo {
        let namespace = self.namespace_of(owner);
        let args = args
            .iter()
            .enumerate()
            .map(|(i, ty)| self.arg_entry(&namespace, &format!("arg{}", i), Direction::In, *ty))
            .collect();
        let mut entry = InfoEntry::named(InfoKind::Signal, &namespace, name);
        entry.args = args;
        entry.ret = Some(ret);
        let raw = self.push(entry);
        self.add_member(owner, MemberKind::Signal, raw);
        raw
    }

    /// Virtual function without arguments
    pub fn add_vfunc(&self, owner: RawInfo, name: &str) -> RawInfo {
        let entry = InfoEntry::named(InfoKind::VFunc, &self.namespace_of(owner), name);
        let raw = self.push(entry);
        self.add_member(owner, MemberKind::VFunc, raw);
        raw
    }

    /// Top-level constant
    pub fn constant(&self, namespace: &str, name: &str, ty: RawInfo, value: ArgumentSlot) -> RawInfo {
        self.ensure_namespace(namespace);
        let mut entry = InfoEntry::named(InfoKind::Constant, namespace, name);
        entry.top_level = true;
        entry.ty = Some(ty);
        entry.constant = value;
        self.push(entry)
    }

    /// Top-level utf8 constant; the database owns the text
    pub fn string_constant(&self, namespace: &str, name: &str, value: &str) -> RawInfo {
        let ty = self.scalar(TypeTag::Utf8);
        let ptr = self.intern(value);
        self.constant(namespace, name, ty, ArgumentSlot::pointer(ptr))
    }

    fn arg_entry(&self, namespace: &str, name: &str, direction: Direction, ty: RawInfo) -> RawInfo {
        let mut entry = InfoEntry::named(InfoKind::Arg, namespace, name);
        entry.direction = direction;
        entry.ty = Some(ty);
        self.push(entry)
    }

    /// Top-level function
    pub fn function(&self, namespace: &str, name: &str) -> FunctionBuilder<'_> {
        self.ensure_namespace(namespace);
        FunctionBuilder::new(self, None, namespace.to_string(), name, FunctionFlags::NONE)
    }

    /// Method of `owner`; takes an instance unless made static
    pub fn method(&self, owner: RawInfo, name: &str) -> FunctionBuilder<'_> {
        let namespace = self.namespace_of(owner);
        FunctionBuilder::new(self, Some(owner), namespace, name, FunctionFlags::IS_METHOD)
    }
}

// ============================================================================
// Function builder
// ============================================================================

/// Builder for function and method entries
pub struct FunctionBuilder<'a> {
    repo: &'a MockRepository,
    owner: Option<RawInfo>,
    namespace: String,
    name: String,
    flags: FunctionFlags,
    args: Vec<(String, Direction, RawInfo)>,
    ret: Option<RawInfo>,
    native: Option<Rc<NativeFn>>,
}

impl<'a> FunctionBuilder<'a> {
    fn new(
        repo: &'a MockRepository,
        owner: Option<RawInfo>,
        namespace: String,
        name: &str,
        flags: FunctionFlags,
    ) -> Self {
        Self {
            repo,
            owner,
            namespace,
            name: name.to_string(),
            flags,
            args: Vec::new(),
            ret: None,
            native: None,
        }
    }

    /// Replace the flags
    pub fn flags(mut self, flags: FunctionFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Drop the implicit instance argument
    pub fn static_fn(mut self) -> Self {
        self.flags = FunctionFlags::from_bits(self.flags.bits() & !FunctionFlags::IS_METHOD.bits());
        self
    }

    /// Mark as reporting errors
    pub fn throws(mut self) -> Self {
        self.flags = self.flags | FunctionFlags::THROWS;
        self
    }

    /// Append a declared argument
    pub fn arg(mut self, name: &str, direction: Direction, ty: RawInfo) -> Self {
        self.args.push((name.to_string(), direction, ty));
        self
    }

    /// Declared return type
    pub fn returns(mut self, ty: RawInfo) -> Self {
        self.ret = Some(ty);
        self
    }

    /// Native implementation
    pub fn native(
        mut self,
        f: impl Fn(&MockRepository, &[ArgumentSlot], &mut [ArgumentSlot]) -> Result<ArgumentSlot, String>
            + 'static,
    ) -> Self {
        self.native = Some(Rc::new(f));
        self
    }

    /// Register the entry
    pub fn build(self) -> RawInfo {
        let repo = self.repo;
        let args = self
            .args
            .iter()
            .map(|(name, direction, ty)| repo.arg_entry(&self.namespace, name, *direction, *ty))
            .collect();
        let mut entry = InfoEntry::named(InfoKind::Function, &self.namespace, &self.name);
        entry.top_level = self.owner.is_none();
        entry.args = args;
        entry.ret = self.ret;
        entry.flags = self.flags;
        entry.native = self.native;
        let raw = repo.push(entry);
        if let Some(owner) = self.owner {
            repo.add_member(owner, MemberKind::Method, raw);
        }
        raw
    }
}

// ============================================================================
// Native lists
// ============================================================================

#[repr(C)]
struct ListNode {
    data: *mut c_void,
    next: *mut ListNode,
    prev: *mut ListNode,
}

/// Native linked list owned by the test.
///
/// Nodes use the doubly linked layout, whose prefix is the singly linked
/// one, so the same chain serves both list tags.
pub struct MockList {
    nodes: Vec<Box<ListNode>>,
}

impl MockList {
    /// Chain `items` in order
    pub fn new(items: &[*mut c_void]) -> Self {
        let mut nodes: Vec<Box<ListNode>> = items
            .iter()
            .map(|&data| {
                Box::new(ListNode {
                    data,
                    next: std::ptr::null_mut(),
                    prev: std::ptr::null_mut(),
                })
            })
            .collect();
        for i in 1..nodes.len() {
            let prev: *mut ListNode = &mut *nodes[i - 1];
            let next: *mut ListNode = &mut *nodes[i];
            nodes[i - 1].next = next;
            nodes[i].prev = prev;
        }
        Self { nodes }
    }

    /// First node, null when empty
    pub fn head(&self) -> *mut c_void {
        self.nodes
            .first()
            .map_or(std::ptr::null_mut(), |node| (&**node as *const ListNode).cast_mut().cast())
    }

    /// Node `index` (0-based)
    pub fn node(&self, index: usize) -> *mut c_void {
        self.nodes
            .get(index)
            .map_or(std::ptr::null_mut(), |node| (&**node as *const ListNode).cast_mut().cast())
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the list has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
