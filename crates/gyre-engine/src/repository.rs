//! Repository and namespace handles
//!
//! The [`Repository`] is the bridge context every handle points back to: it
//! owns the oracle, the host interface and the options, and resolves
//! runtime types back to descriptors. A [`Namespace`] is the handle returned
//! by `require`, from which top-level entities are extracted.

use std::cell::RefCell;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use gyre_sdk::{InfoKind, Oracle, RuntimeType};
use rustc_hash::FxHashMap;

use crate::bridge_trace;
use crate::codec;
use crate::debug;
use crate::error::{BridgeError, BridgeResult};
use crate::handle::DynamicHandle;
use crate::host::HostInterpreter;
use crate::info::TypeDescriptor;
use crate::options::BridgeOptions;
use crate::value::HostValue;

struct RepositoryInner {
    oracle: Rc<dyn Oracle>,
    host: Rc<dyn HostInterpreter>,
    options: BridgeOptions,
    /// Namespaces loaded through this repository, with their versions
    loaded: RefCell<FxHashMap<String, String>>,
}

/// Shared bridge context.
#[derive(Clone)]
pub struct Repository(Rc<RepositoryInner>);

impl Repository {
    /// Create with default options
    pub fn new(oracle: Rc<dyn Oracle>, host: Rc<dyn HostInterpreter>) -> Self {
        Self::with_options(oracle, host, BridgeOptions::default())
    }

    /// Create with explicit options
    pub fn with_options(
        oracle: Rc<dyn Oracle>,
        host: Rc<dyn HostInterpreter>,
        options: BridgeOptions,
    ) -> Self {
        if options.debug {
            debug::set_debug(true);
        }
        Repository(Rc::new(RepositoryInner {
            oracle,
            host,
            options,
            loaded: RefCell::new(FxHashMap::default()),
        }))
    }

    /// The introspection oracle
    #[inline]
    pub fn oracle(&self) -> &Rc<dyn Oracle> {
        &self.0.oracle
    }

    /// The host interpreter
    #[inline]
    pub fn host(&self) -> &Rc<dyn HostInterpreter> {
        &self.0.host
    }

    /// Bridge options
    #[inline]
    pub fn options(&self) -> &BridgeOptions {
        &self.0.options
    }

    // ========================================================================
    // Namespace loading
    // ========================================================================

    /// Load a namespace (any version when `version` is `None`)
    pub fn require(&self, namespace: &str, version: Option<&str>) -> BridgeResult<Namespace> {
        bridge_trace!(namespace, ?version, "requiring namespace");
        let loaded = self
            .oracle()
            .require(namespace, version)
            .map_err(|e| BridgeError::NamespaceLoadFailed(e.to_string()))?;
        Ok(self.record_loaded(namespace, loaded))
    }

    /// Load a namespace from a private typelib directory
    pub fn require_private(
        &self,
        dir: &Path,
        namespace: &str,
        version: Option<&str>,
    ) -> BridgeResult<Namespace> {
        bridge_trace!(namespace, dir = %dir.display(), "requiring private namespace");
        let loaded = self
            .oracle()
            .require_private(dir, namespace, version)
            .map_err(|e| BridgeError::NamespaceLoadFailed(e.to_string()))?;
        Ok(self.record_loaded(namespace, loaded))
    }

    fn record_loaded(&self, namespace: &str, version: String) -> Namespace {
        self.0
            .loaded
            .borrow_mut()
            .insert(namespace.to_string(), version.clone());
        Namespace {
            repo: self.clone(),
            name: namespace.to_string(),
            version,
        }
    }

    /// Typelib search path
    pub fn search_path(&self) -> Vec<PathBuf> {
        self.oracle().search_path()
    }

    /// Prepend a directory to the typelib search path
    pub fn prepend_search_path(&self, dir: &Path) {
        self.oracle().prepend_search_path(dir);
    }

    /// Whether a namespace is loaded
    pub fn is_registered(&self, namespace: &str, version: Option<&str>) -> bool {
        self.oracle().is_registered(namespace, version)
    }

    /// Loaded version of a namespace
    pub fn version(&self, namespace: &str) -> Option<String> {
        self.oracle().version(namespace)
    }

    /// Versions available for a namespace
    pub fn enumerate_versions(&self, namespace: &str) -> Vec<String> {
        self.oracle().enumerate_versions(namespace)
    }

    /// Namespaces the oracle has loaded, sorted
    pub fn loaded_namespaces(&self) -> Vec<String> {
        let mut names = self.oracle().loaded_namespaces();
        names.sort();
        names
    }

    /// Namespaces loaded through this repository, with versions, sorted
    pub fn required_namespaces(&self) -> Vec<(String, String)> {
        let mut out: Vec<_> = self
            .0
            .loaded
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        out.sort();
        out
    }

    // ========================================================================
    // Internal helpers
    // ========================================================================

    /// Descriptor registered for a runtime type
    pub(crate) fn descriptor_for(&self, rtype: RuntimeType) -> Option<TypeDescriptor> {
        if !rtype.is_valid() {
            return None;
        }
        TypeDescriptor::adopt_opt(self.oracle(), self.oracle().find_by_runtime_type(rtype))
    }

    /// Warn through both the host and the log
    pub(crate) fn warn(&self, message: &str) {
        tracing::warn!("{}", message);
        self.host().warn(message);
    }
}

impl fmt::Debug for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("options", &self.0.options)
            .field("loaded", &self.0.loaded.borrow().len())
            .finish()
    }
}

// ============================================================================
// Namespace
// ============================================================================

/// Loaded namespace handle
#[derive(Clone)]
pub struct Namespace {
    repo: Repository,
    name: String,
    version: String,
}

/// One line of a namespace listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceEntry {
    /// Entry kind
    pub kind: InfoKind,
    /// Entry name
    pub name: String,
}

impl Namespace {
    /// Namespace name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Loaded version
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Owning repository
    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    /// Extract a top-level entity.
    ///
    /// Constants yield their value; everything else yields an unbound
    /// handle.
    pub fn extract(&self, member: &str) -> BridgeResult<HostValue> {
        let oracle = self.repo.oracle();
        let info = TypeDescriptor::adopt_opt(oracle, oracle.find_by_name(&self.name, member))
            .ok_or_else(|| BridgeError::NoSuchMember(format!("{}.{}", self.name, member)))?;
        bridge_trace!(namespace = %self.name, member, kind = %info.kind(), "extracting");

        if info.kind() == InfoKind::Constant {
            let ty = info
                .declared_type()
                .ok_or_else(|| BridgeError::UnsupportedType(format!("constant {}", member)))?;
            let slot = oracle.constant_value(info.raw())?;
            return codec::decode(slot, &ty, &self.repo);
        }
        Ok(HostValue::Handle(DynamicHandle::unbound(&self.repo, info)))
    }

    /// Top-level entries in declaration order
    pub fn list(&self) -> Vec<NamespaceEntry> {
        let oracle = self.repo.oracle();
        (0..oracle.n_infos(&self.name))
            .filter_map(|i| TypeDescriptor::adopt_opt(oracle, oracle.info_at(&self.name, i)))
            .map(|info| NamespaceEntry {
                kind: info.kind(),
                name: info.name(),
            })
            .collect()
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "namespace {} version {}", self.name, self.version)
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Namespace({} {})", self.name, self.version)
    }
}
