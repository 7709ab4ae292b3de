//! Fatal-signal containment
//!
//! While a native call runs, SIGABRT and SIGSEGV are routed to a handler
//! that records the signal and returns. After the call the previous
//! dispositions are restored, whatever happened, and a recorded signal is
//! reported to the caller instead of terminating the process.
//!
//! Signal disposition is process-global, so calls are serialized by a
//! re-entrant lock: a native call that emits a signal into the host may
//! call back into native code on the same thread.
//!
//! A signal raised with `raise`/`kill` is contained. A hardware fault
//! re-executes the faulting instruction when the handler returns; the
//! handler notices the repeat, reinstates the default disposition and the
//! process terminates as it would have without the bridge.

use std::fmt;

/// Fatal signal observed during a native call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatalSignal {
    /// SIGABRT
    Abort,
    /// SIGSEGV
    Segfault,
}

impl FatalSignal {
    /// Conventional signal name
    pub fn name(self) -> &'static str {
        match self {
            FatalSignal::Abort => "SIGABRT",
            FatalSignal::Segfault => "SIGSEGV",
        }
    }
}

impl fmt::Display for FatalSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(unix)]
mod imp {
    use std::ffi::c_int;
    use std::sync::atomic::{AtomicI32, Ordering};

    use once_cell::sync::Lazy;
    use parking_lot::ReentrantMutex;

    use super::FatalSignal;

    const CONTAINED: [c_int; 2] = [libc::SIGABRT, libc::SIGSEGV];

    /// Signal recorded by the handler during the current guarded call
    static PENDING: AtomicI32 = AtomicI32::new(0);

    static GUARD_LOCK: Lazy<ReentrantMutex<()>> = Lazy::new(|| ReentrantMutex::new(()));

    extern "C" fn on_fatal_signal(sig: c_int) {
        if PENDING.swap(sig, Ordering::SeqCst) == sig {
            // SAFETY: `signal` is async-signal-safe on the supported targets.
            unsafe { libc::signal(sig, libc::SIG_DFL) };
        }
    }

    fn from_raw(sig: c_int) -> Option<FatalSignal> {
        match sig {
            libc::SIGABRT => Some(FatalSignal::Abort),
            libc::SIGSEGV => Some(FatalSignal::Segfault),
            _ => None,
        }
    }

    struct SignalGuard {
        previous: Vec<(c_int, libc::sigaction)>,
        outer_pending: i32,
    }

    impl SignalGuard {
        fn install() -> Self {
            let outer_pending = PENDING.swap(0, Ordering::SeqCst);
            let mut previous = Vec::with_capacity(CONTAINED.len());
            for sig in CONTAINED {
                // SAFETY: zeroed `sigaction` is a valid initial value; both
                // structs outlive the calls.
                unsafe {
                    let mut action: libc::sigaction = std::mem::zeroed();
                    action.sa_sigaction = on_fatal_signal as extern "C" fn(c_int) as libc::sighandler_t;
                    libc::sigemptyset(&mut action.sa_mask);
                    let mut old: libc::sigaction = std::mem::zeroed();
                    if libc::sigaction(sig, &action, &mut old) == 0 {
                        previous.push((sig, old));
                    } else {
                        tracing::warn!(sig, "could not install fatal-signal handler");
                    }
                }
            }
            Self {
                previous,
                outer_pending,
            }
        }

        fn take_pending(&self) -> Option<FatalSignal> {
            from_raw(PENDING.swap(0, Ordering::SeqCst))
        }
    }

    impl Drop for SignalGuard {
        fn drop(&mut self) {
            for (sig, old) in &self.previous {
                // SAFETY: restores the disposition saved by `install`.
                if unsafe { libc::sigaction(*sig, old, std::ptr::null_mut()) } != 0 {
                    tracing::warn!(sig, "could not restore signal handler");
                }
            }
            PENDING.store(self.outer_pending, Ordering::SeqCst);
        }
    }

    pub(crate) fn contain<T>(f: impl FnOnce() -> T) -> Result<T, FatalSignal> {
        let _lock = GUARD_LOCK.lock();
        let guard = SignalGuard::install();
        let out = f();
        let caught = guard.take_pending();
        drop(guard);
        match caught {
            Some(sig) => Err(sig),
            None => Ok(out),
        }
    }
}

#[cfg(not(unix))]
mod imp {
    use super::FatalSignal;

    pub(crate) fn contain<T>(f: impl FnOnce() -> T) -> Result<T, FatalSignal> {
        Ok(f())
    }
}

/// Run `f` with fatal signals contained when `enabled`
pub(crate) fn contain<T>(enabled: bool, f: impl FnOnce() -> T) -> Result<T, FatalSignal> {
    if enabled {
        imp::contain(f)
    } else {
        Ok(f())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_names() {
        assert_eq!(FatalSignal::Abort.to_string(), "SIGABRT");
        assert_eq!(FatalSignal::Segfault.name(), "SIGSEGV");
    }

    #[test]
    fn test_clean_call_passes_value_through() {
        assert_eq!(contain(true, || 41 + 1), Ok(42));
        assert_eq!(contain(false, || "x"), Ok("x"));
    }

    #[test]
    fn test_nested_containment() {
        let out = contain(true, || contain(true, || 7).map(|v| v * 2));
        assert_eq!(out, Ok(Ok(14)));
    }
}
