//! Floating-point environment hold
//!
//! Native code is called with floating-point exceptions cleared and
//! non-stop mode set (`feholdexcept`); the caller's environment is put back
//! with `fesetenv` when the guard drops.

use crate::error::BridgeResult;

#[cfg(unix)]
mod imp {
    use std::ffi::c_int;

    use crate::error::{BridgeError, BridgeResult};

    /// Opaque storage large enough for any libc `fenv_t`
    #[repr(C, align(16))]
    pub(super) struct FloatEnv([u8; 512]);

    #[cfg_attr(target_os = "linux", link(name = "m"))]
    extern "C" {
        fn feholdexcept(env: *mut FloatEnv) -> c_int;
        fn fesetenv(env: *const FloatEnv) -> c_int;
    }

    pub(super) fn hold() -> BridgeResult<Box<FloatEnv>> {
        let mut saved = Box::new(FloatEnv([0; 512]));
        // SAFETY: `saved` is writable and larger than `fenv_t`.
        if unsafe { feholdexcept(&mut *saved) } != 0 {
            return Err(BridgeError::FloatEnvironment);
        }
        Ok(saved)
    }

    pub(super) fn restore(saved: &FloatEnv) {
        // SAFETY: `saved` was filled by `feholdexcept`.
        if unsafe { fesetenv(saved) } != 0 {
            tracing::warn!("could not restore floating-point environment");
        }
    }
}

#[cfg(not(unix))]
mod imp {
    use crate::error::BridgeResult;

    pub(super) struct FloatEnv;

    pub(super) fn hold() -> BridgeResult<Box<FloatEnv>> {
        Ok(Box::new(FloatEnv))
    }

    pub(super) fn restore(_saved: &FloatEnv) {}
}

/// Restores the saved floating-point environment on drop
pub(crate) struct FloatEnvGuard {
    saved: Box<imp::FloatEnv>,
}

impl FloatEnvGuard {
    /// Save the current environment and hold exceptions
    pub(crate) fn hold() -> BridgeResult<Self> {
        Ok(Self { saved: imp::hold()? })
    }
}

impl Drop for FloatEnvGuard {
    fn drop(&mut self) {
        imp::restore(&self.saved);
    }
}
