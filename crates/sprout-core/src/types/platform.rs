//! Target platform evaluation for platform-restricted dependencies.
//!
//! A restriction is either a plain target triple or a `cfg(...)`
//! expression. Expressions are evaluated against the cfg values the
//! compiler reports for the target (`rustc --print cfg --target <triple>`).

use crate::error::{SproutError, SproutResult};
use cargo_platform::Cfg;
use std::str::FromStr;

/// The platform dependencies are resolved for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    triple: String,
    cfgs: Vec<Cfg>,
}

impl Platform {
    /// Build a platform from a target triple and the compiler's
    /// `--print cfg` output for it, one cfg per line
    pub fn new(triple: impl Into<String>, cfg_output: &str) -> SproutResult<Self> {
        let cfgs = cfg_output
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| {
                Cfg::from_str(line).map_err(|e| SproutError::parse("target cfg", line, e.to_string()))
            })
            .collect::<SproutResult<Vec<_>>>()?;

        Ok(Self {
            triple: triple.into(),
            cfgs,
        })
    }

    pub fn triple(&self) -> &str {
        &self.triple
    }

    /// Whether a dependency restricted to `spec` applies to this platform
    pub fn matches(&self, spec: &str) -> SproutResult<bool> {
        let spec = spec.trim();
        let platform = cargo_platform::Platform::from_str(spec)
            .map_err(|e| SproutError::parse("target restriction", spec, e.to_string()))?;
        Ok(platform.matches(&self.triple, &self.cfgs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINUX: &str = r#"debug_assertions
panic="unwind"
target_abi=""
target_arch="x86_64"
target_endian="little"
target_env="gnu"
target_family="unix"
target_feature="fxsr"
target_feature="sse"
target_feature="sse2"
target_has_atomic="16"
target_has_atomic="32"
target_has_atomic="64"
target_has_atomic="8"
target_has_atomic="ptr"
target_os="linux"
target_pointer_width="64"
target_vendor="unknown"
unix
"#;

    const WINDOWS_I686: &str = r#"panic="unwind"
target_arch="x86"
target_endian="little"
target_env="msvc"
target_family="windows"
target_os="windows"
target_pointer_width="32"
target_vendor="pc"
windows
"#;

    fn linux() -> Platform {
        Platform::new("x86_64-unknown-linux-gnu", LINUX).unwrap()
    }

    #[test]
    fn test_plain_triple() {
        let linux = linux();
        assert_eq!(linux.triple(), "x86_64-unknown-linux-gnu");
        assert!(linux.matches("x86_64-unknown-linux-gnu").unwrap());
        assert!(!linux.matches("x86_64-pc-windows-msvc").unwrap());
    }

    #[test]
    fn test_cfg_expressions() {
        let linux = linux();
        assert!(linux.matches("cfg(unix)").unwrap());
        assert!(!linux.matches("cfg(windows)").unwrap());
        assert!(linux.matches(r#"cfg(target_os = "linux")"#).unwrap());
        assert!(linux.matches(r#"cfg(all(unix, target_pointer_width = "64"))"#).unwrap());
        assert!(linux.matches(r#"cfg(any(windows, target_env = "gnu"))"#).unwrap());
        assert!(linux.matches("cfg(not(windows))").unwrap());
    }

    #[test]
    fn test_compiler_reported_cfgs() {
        let linux = linux();
        assert!(linux.matches(r#"cfg(target_has_atomic = "64")"#).unwrap());
        assert!(linux.matches(r#"cfg(target_feature = "sse2")"#).unwrap());
        assert!(linux.matches(r#"cfg(panic = "unwind")"#).unwrap());
        assert!(linux.matches("cfg(debug_assertions)").unwrap());
        assert!(!linux.matches(r#"cfg(target_feature = "avx512f")"#).unwrap());

        let win = Platform::new("i686-pc-windows-msvc", WINDOWS_I686).unwrap();
        assert!(win.matches("cfg(windows)").unwrap());
        assert!(win.matches(r#"cfg(target_arch = "x86")"#).unwrap());
        assert!(win.matches(r#"cfg(target_pointer_width = "32")"#).unwrap());
        assert!(!win.matches(r#"cfg(target_has_atomic = "64")"#).unwrap());
    }

    #[test]
    fn test_malformed_cfg() {
        let linux = linux();
        assert!(linux.matches("cfg(all(unix)").is_err());
        assert!(linux.matches(r#"cfg(target_os = linux)"#).is_err());
        assert!(linux.matches("cfg(not(unix, windows))").is_err());
    }

    #[test]
    fn test_malformed_cfg_output() {
        let err = Platform::new("x86_64-unknown-linux-gnu", "unix\ntarget_os=linux\n").unwrap_err();
        assert!(matches!(err, SproutError::Parse { ref what, .. } if what == "target cfg"));
    }
}
