//! # Runtime Configuration Module
//!
//! Environment-driven settings for the coroutine runtime that executes dispatch steps.
//!
//! ## Environment Variables
//!
//! ### `MINIMA_STACK_SIZE`
//!
//! Stack size for each chain-step coroutine. Accepts decimal (`16384`) or hexadecimal
//! (`0x4000`). Unparseable values fall back to the default.
//!
//! Default: `0x4000` (16 KB)
//!
//! Every step of a request runs in its own short-lived coroutine, so total memory is
//! roughly `stack_size × in-flight steps`. Handlers with deep call stacks or large locals
//! need `0x8000` or more.
//!
//! ```rust
//! use minima::runtime_config::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_env();
//! assert!(config.stack_size > 0);
//! ```

use std::env;

/// Stack size used when `MINIMA_STACK_SIZE` is unset or invalid.
pub const DEFAULT_STACK_SIZE: usize = 0x4000;

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Stack size for coroutines in bytes (default: 16 KB / 0x4000)
    pub stack_size: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            stack_size: DEFAULT_STACK_SIZE,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let stack_size = env::var("MINIMA_STACK_SIZE")
            .ok()
            .and_then(|val| parse_stack_size(&val))
            .unwrap_or(DEFAULT_STACK_SIZE);
        RuntimeConfig { stack_size }
    }
}

/// Parse a decimal or `0x`-prefixed hexadecimal size. Zero is rejected.
fn parse_stack_size(val: &str) -> Option<usize> {
    let val = val.trim();
    let parsed = match val.strip_prefix("0x").or_else(|| val.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16).ok(),
        None => val.parse().ok(),
    };
    parsed.filter(|size| *size > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_decimal_and_hex() {
        assert_eq!(parse_stack_size("16384"), Some(0x4000));
        assert_eq!(parse_stack_size("0x8000"), Some(0x8000));
        assert_eq!(parse_stack_size("0X10000"), Some(0x10000));
        assert_eq!(parse_stack_size(" 4096 "), Some(4096));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_stack_size("big"), None);
        assert_eq!(parse_stack_size("0xZZ"), None);
        assert_eq!(parse_stack_size("0"), None);
        assert_eq!(parse_stack_size(""), None);
    }

    #[test]
    fn test_default() {
        assert_eq!(RuntimeConfig::default().stack_size, DEFAULT_STACK_SIZE);
    }
}
