//! Signal bridge
//!
//! Connects a host callable to a native signal. Each connection owns a
//! [`SignalClosure`] record; the native runtime owns the connection and
//! drops the record with it.
//!
//! Delivery calls the host target directly with
//! `(emitter, extra args..., user_data)`. Handlers with up to two extra
//! arguments returning void or boolean are supported; the callback shape
//! is picked from a fixed table keyed by (argument count, return kind).

use std::fmt;

use gyre_sdk::{ArgumentSlot, InfoKind, TypeTag};

use crate::bridge_trace;
use crate::codec;
use crate::error::{BridgeError, BridgeResult};
use crate::handle::DynamicHandle;
use crate::host::HostClosure;
use crate::info::TypeDescriptor;
use crate::repository::Repository;
use crate::resolver;
use crate::value::HostValue;

/// Maximum number of signal arguments after the emitter
pub const MAX_CALLBACK_ARGS: usize = 2;

/// What to call when a signal fires
#[derive(Clone)]
pub enum CallbackTarget {
    /// Host function called by name
    Named(String),
    /// First-class host callable
    Closure(HostClosure),
}

impl fmt::Debug for CallbackTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackTarget::Named(name) => write!(f, "Named({:?})", name),
            CallbackTarget::Closure(_) => write!(f, "Closure(..)"),
        }
    }
}

impl From<&str> for CallbackTarget {
    fn from(name: &str) -> Self {
        CallbackTarget::Named(name.to_string())
    }
}

/// Declared return kind of a supported signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnKind {
    /// No result
    Void,
    /// Boolean result (event handled / propagate)
    Boolean,
}

/// Record owned by one signal connection
pub struct SignalClosure {
    signal: TypeDescriptor,
    emitter_type: TypeDescriptor,
    target: CallbackTarget,
    repo: Repository,
    user_data: Option<HostValue>,
    arg_types: Vec<TypeDescriptor>,
}

impl SignalClosure {
    fn name(&self) -> String {
        self.signal.name()
    }

    fn deliver(&self, emitter: ArgumentSlot, extras: &[ArgumentSlot]) -> Option<HostValue> {
        let mut args = Vec::with_capacity(extras.len() + 2);
        args.push(codec::wrap_object(
            &self.repo,
            emitter.as_ptr(),
            self.emitter_type.clone(),
            true,
        ));
        for (slot, ty) in extras.iter().zip(&self.arg_types) {
            args.push(self.wrap_extra(*slot, ty));
        }
        if let Some(data) = &self.user_data {
            args.push(data.clone());
        }

        bridge_trace!(signal = %self.name(), target = ?self.target, n_args = args.len(), "delivering signal");
        let result = match &self.target {
            CallbackTarget::Named(function) => self.repo.host().call(function, args),
            CallbackTarget::Closure(closure) => closure(args),
        };
        match result {
            Ok(value) => Some(value),
            Err(message) => {
                self.repo
                    .warn(&format!("callback for signal {} failed: {}", self.name(), message));
                None
            }
        }
    }

    /// Interface-typed arguments become views; the rest go through the codec
    fn wrap_extra(&self, slot: ArgumentSlot, ty: &TypeDescriptor) -> HostValue {
        if ty.tag() == TypeTag::Interface {
            if let Some(iface) = ty.interface() {
                if matches!(iface.kind(), InfoKind::Object | InfoKind::Interface) {
                    let ptr = slot.as_ptr();
                    if ptr.is_null() {
                        return HostValue::Nil;
                    }
                    return HostValue::Handle(DynamicHandle::borrowed(&self.repo, Some(iface), ptr));
                }
            }
        }
        match codec::decode(slot, ty, &self.repo) {
            Ok(value) => value,
            Err(e) => {
                self.repo
                    .warn(&format!("signal {}: argument not converted: {}", self.name(), e));
                HostValue::Nil
            }
        }
    }
}

impl fmt::Debug for SignalClosure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalClosure")
            .field("signal", &self.signal)
            .field("target", &self.target)
            .field("arity", &self.arg_types.len())
            .finish()
    }
}

// ============================================================================
// Trampolines
// ============================================================================

type Trampoline = fn(&SignalClosure, &[ArgumentSlot]) -> ArgumentSlot;

fn dispatch<const N: usize>(closure: &SignalClosure, slots: &[ArgumentSlot]) -> Option<HostValue> {
    match slots.split_first() {
        Some((emitter, extras)) if extras.len() == N => closure.deliver(*emitter, extras),
        _ => {
            closure.repo.warn(&format!(
                "signal {} delivered {} slots, expected {}",
                closure.name(),
                slots.len(),
                N + 1
            ));
            None
        }
    }
}

fn void_trampoline<const N: usize>(closure: &SignalClosure, slots: &[ArgumentSlot]) -> ArgumentSlot {
    dispatch::<N>(closure, slots);
    ArgumentSlot::ZERO
}

fn bool_trampoline<const N: usize>(closure: &SignalClosure, slots: &[ArgumentSlot]) -> ArgumentSlot {
    let handled = dispatch::<N>(closure, slots).is_some_and(|value| value.truthy());
    ArgumentSlot::boolean(handled)
}

const VOID_TRAMPOLINES: [Trampoline; MAX_CALLBACK_ARGS + 1] =
    [void_trampoline::<0>, void_trampoline::<1>, void_trampoline::<2>];

const BOOL_TRAMPOLINES: [Trampoline; MAX_CALLBACK_ARGS + 1] =
    [bool_trampoline::<0>, bool_trampoline::<1>, bool_trampoline::<2>];

fn trampoline_for(kind: ReturnKind, arity: usize) -> BridgeResult<Trampoline> {
    let table = match kind {
        ReturnKind::Void => &VOID_TRAMPOLINES,
        ReturnKind::Boolean => &BOOL_TRAMPOLINES,
    };
    table
        .get(arity)
        .copied()
        .ok_or(BridgeError::UnsupportedCallbackArity(arity))
}

fn return_kind(signal: &TypeDescriptor) -> BridgeResult<ReturnKind> {
    let oracle = signal.oracle();
    let Some(ret) = TypeDescriptor::adopt_opt(oracle, oracle.callable_return_type(signal.raw())) else {
        return Ok(ReturnKind::Void);
    };
    match ret.tag() {
        TypeTag::Void => Ok(ReturnKind::Void),
        TypeTag::Boolean => Ok(ReturnKind::Boolean),
        other => Err(BridgeError::UnsupportedType(format!(
            "signal {} returning {}",
            signal.name(),
            other
        ))),
    }
}

// ============================================================================
// Connection
// ============================================================================

/// Connect `target` to signal `name` of a bound object handle.
///
/// Returns the native connection id.
pub fn connect(
    handle: &DynamicHandle,
    name: &str,
    target: CallbackTarget,
    user_data: Option<HostValue>,
) -> BridgeResult<u64> {
    let info = handle.info().ok_or(BridgeError::NoTypeInformation)?;
    if info.kind() != InfoKind::Object || !handle.is_bound() {
        return Err(BridgeError::mismatch("bound object handle", handle.to_string()));
    }

    let signal =
        resolver::find_signal(info, name).ok_or_else(|| BridgeError::SignalNotSupported(name.to_string()))?;
    let oracle = signal.oracle().clone();

    let arity = oracle.callable_n_args(signal.raw());
    if arity > MAX_CALLBACK_ARGS {
        return Err(BridgeError::UnsupportedCallbackArity(arity));
    }
    let kind = return_kind(&signal)?;
    let trampoline = trampoline_for(kind, arity)?;

    let arg_types = (0..arity)
        .map(|i| {
            TypeDescriptor::adopt_opt(&oracle, oracle.callable_arg(signal.raw(), i))
                .and_then(|arg| arg.declared_type())
                .ok_or_else(|| BridgeError::UnsupportedType(format!("signal {} argument {}", name, i)))
        })
        .collect::<BridgeResult<Vec<_>>>()?;

    bridge_trace!(signal = name, arity, ?kind, ?target, "connecting signal");
    let signal_name = signal.name();
    let closure = SignalClosure {
        signal,
        emitter_type: info.clone(),
        target,
        repo: handle.repository().clone(),
        user_data,
        arg_types,
    };
    let id = oracle.connect_signal(
        handle.instance_ptr(),
        &signal_name,
        Box::new(move |slots: &[ArgumentSlot]| trampoline(&closure, slots)),
    )?;
    Ok(id)
}
