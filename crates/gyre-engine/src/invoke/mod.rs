//! Invocation engine
//!
//! Drives one native call: checks arity, encodes each declared parameter
//! into the in and out slot vectors according to its direction, calls the
//! oracle's generic invoke primitive under the floating-point hold and
//! fatal-signal containment, and decodes the return value.
//!
//! All temporaries live in an [`ArgumentBlock`](block::ArgumentBlock) that
//! is dropped when the call returns, on success and on failure.

pub mod block;
pub(crate) mod fault;
pub(crate) mod fpu;

use std::ffi::c_void;

use gyre_sdk::{ArgumentSlot, Direction, FunctionFlags, InfoKind};

use crate::bridge_trace;
use crate::codec;
use crate::error::{BridgeError, BridgeResult};
use crate::info::TypeDescriptor;
use crate::repository::Repository;
use crate::value::HostValue;

use self::block::ArgumentBlock;
use self::fpu::FloatEnvGuard;

pub use self::fault::FatalSignal;

/// One declared parameter
#[derive(Debug, Clone)]
pub struct Parameter {
    /// Declared name
    pub name: String,
    /// Passing direction
    pub direction: Direction,
    /// Declared type
    pub ty: TypeDescriptor,
}

/// Declared shape of a callable
#[derive(Debug, Clone)]
pub struct CallableSignature {
    /// Parameters in declaration order, receiver excluded
    pub params: Vec<Parameter>,
    /// Declared return type
    pub return_type: Option<TypeDescriptor>,
    /// Whether an instance is passed before the parameters
    pub is_method: bool,
    /// Whether the callable reports errors
    pub can_throw: bool,
}

impl CallableSignature {
    /// Read the signature of a callable entry
    pub fn from_callable(callable: &TypeDescriptor) -> BridgeResult<Self> {
        let oracle = callable.oracle();
        let raw = callable.raw();
        let mut params = Vec::new();
        for i in 0..oracle.callable_n_args(raw) {
            let arg = TypeDescriptor::adopt_opt(oracle, oracle.callable_arg(raw, i))
                .ok_or_else(|| BridgeError::UnsupportedType(format!("{} argument {}", callable.name(), i)))?;
            let ty = arg
                .declared_type()
                .ok_or_else(|| BridgeError::UnsupportedType(format!("{} argument {}", callable.name(), i)))?;
            params.push(Parameter {
                name: arg.name(),
                direction: oracle.arg_direction(arg.raw()),
                ty,
            });
        }

        let flags = if callable.kind() == InfoKind::Function {
            oracle.function_flags(raw)
        } else {
            FunctionFlags::NONE
        };

        Ok(Self {
            params,
            return_type: TypeDescriptor::adopt_opt(oracle, oracle.callable_return_type(raw)),
            is_method: flags.contains(FunctionFlags::IS_METHOD),
            can_throw: flags.contains(FunctionFlags::THROWS),
        })
    }

    /// Number of declared parameters
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

/// Invoke `callable` with host arguments.
///
/// `receiver` is the instance passed first to methods; it is ignored for
/// static functions.
pub fn invoke(
    callable: &TypeDescriptor,
    receiver: *mut c_void,
    args: &[HostValue],
    repo: &Repository,
) -> BridgeResult<HostValue> {
    let signature = CallableSignature::from_callable(callable)?;
    let name = callable.qualified_name();
    let n_args = signature.arity();

    let nil_sentinel = n_args == 0 && matches!(args, [HostValue::Nil]);
    if args.len() != n_args && !nil_sentinel {
        return Err(BridgeError::ArgumentCountMismatch {
            expected: n_args,
            got: args.len(),
        });
    }

    let mut block = ArgumentBlock::new();
    let mut in_args = Vec::with_capacity(n_args + 1);
    let mut out_args = Vec::new();

    if signature.is_method {
        if receiver.is_null() {
            return Err(BridgeError::NullReceiver(name));
        }
        bridge_trace!(?receiver, "passing receiver");
        in_args.push(ArgumentSlot::pointer(receiver));
    }

    for (param, value) in signature.params.iter().zip(args) {
        let slot = codec::encode(value, &param.ty, &mut block)?;
        bridge_trace!(param = %param.name, direction = ?param.direction, "encoded argument");
        match param.direction {
            Direction::In => in_args.push(slot),
            Direction::Out => out_args.push(slot),
            Direction::InOut => {
                in_args.push(slot);
                out_args.push(slot);
            }
        }
    }

    let options = repo.options();
    let oracle = repo.oracle();
    bridge_trace!(callable = %name, n_in = in_args.len(), n_out = out_args.len(), "invoking");

    let outcome = {
        let _fpu = if options.hold_fp_exceptions {
            Some(FloatEnvGuard::hold()?)
        } else {
            None
        };
        fault::contain(options.contain_fatal_signals, || {
            oracle.invoke(callable.raw(), &in_args, &mut out_args)
        })
    };

    let retval = match outcome {
        Err(signal) => return Err(BridgeError::NativeFatalSignal(signal.to_string())),
        Ok(Err(e)) => return Err(BridgeError::NativeInvocationFailed(e.to_string())),
        Ok(Ok(retval)) => retval,
    };

    if !out_args.is_empty() {
        repo.warn(&format!(
            "unimplemented: positional out arguments ({} ignored in {})",
            out_args.len(),
            name
        ));
    }

    // Transfer-none results may point into `block`; it drops after decoding.
    match &signature.return_type {
        Some(ty) => codec::decode(retval, ty, repo),
        None => Ok(HostValue::Nil),
    }
}
