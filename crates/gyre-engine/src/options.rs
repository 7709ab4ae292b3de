//! Bridge configuration and its defaults.

/// Environment variable enabling diagnostic tracing.
pub const DEBUG_ENV: &str = "GYRE_DEBUG";

/// Environment variable controlling fatal-signal containment.
pub const CONTAIN_SIGNALS_ENV: &str = "GYRE_CONTAIN_SIGNALS";

/// Environment variable controlling the floating-point exception hold.
pub const HOLD_FPE_ENV: &str = "GYRE_HOLD_FPE";

/// Log filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "gyre_engine=warn";

/// Prefix selecting a signal in member lookup (`obj.signal_clicked`).
pub const SIGNAL_MEMBER_PREFIX: &str = "signal_";

/// Options for a bridge [`Repository`](crate::Repository).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeOptions {
    /// Turn on diagnostic tracing when the repository is created
    pub debug: bool,
    /// Convert SIGABRT/SIGSEGV raised during native calls into errors
    pub contain_fatal_signals: bool,
    /// Hold floating-point exceptions across native calls
    pub hold_fp_exceptions: bool,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            debug: false,
            contain_fatal_signals: true,
            hold_fp_exceptions: true,
        }
    }
}

impl BridgeOptions {
    /// Defaults overridden by `GYRE_*` environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            debug: env_flag(DEBUG_ENV, defaults.debug),
            contain_fatal_signals: env_flag(CONTAIN_SIGNALS_ENV, defaults.contain_fatal_signals),
            hold_fp_exceptions: env_flag(HOLD_FPE_ENV, defaults.hold_fp_exceptions),
        }
    }
}

/// Read a boolean environment variable.
///
/// `1`, `true`, `yes` and `on` (any case) are true; `0`, `false`, `no`, `off`
/// and the empty string are false; anything else keeps `default`.
pub(crate) fn env_flag(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(value) => parse_flag(&value).unwrap_or(default),
        Err(_) => default,
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "" | "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = BridgeOptions::default();
        assert!(!options.debug);
        assert!(options.contain_fatal_signals);
        assert!(options.hold_fp_exceptions);
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("1"), Some(true));
        assert_eq!(parse_flag(" On "), Some(true));
        assert_eq!(parse_flag("no"), Some(false));
        assert_eq!(parse_flag(""), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn test_from_env_overrides_defaults() {
        std::env::set_var(CONTAIN_SIGNALS_ENV, "0");
        std::env::set_var(HOLD_FPE_ENV, "off");
        let options = BridgeOptions::from_env();
        std::env::remove_var(CONTAIN_SIGNALS_ENV);
        std::env::remove_var(HOLD_FPE_ENV);

        assert!(!options.contain_fatal_signals);
        assert!(!options.hold_fp_exceptions);
        let restored = BridgeOptions::from_env();
        assert!(restored.contain_fatal_signals);
        assert!(restored.hold_fp_exceptions);
    }

    #[test]
    fn test_unset_variable_keeps_default() {
        assert!(env_flag("GYRE_TEST_SURELY_UNSET_VARIABLE", true));
        assert!(!env_flag("GYRE_TEST_SURELY_UNSET_VARIABLE", false));
    }
}
