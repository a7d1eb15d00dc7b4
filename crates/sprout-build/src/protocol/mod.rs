//! Build-script output protocol
//!
//! A build script talks to the driver through `cargo:key=value` lines on
//! stdout (`cargo::key=value` in the newer spelling). Link directives and
//! cfgs shape the package's own compiler invocations; every other key is
//! metadata exported to direct dependents as `DEP_<LINKS>_<KEY>`.

use sprout_config::OverrideTable;
use sprout_core::error::SproutError;
use sprout_core::utils::envify;

use crate::BuildResult;

/// Parsed output of one build script run (or its configured override)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildScriptOutput {
    /// `-l` arguments
    pub library_links: Vec<String>,
    /// `-L` arguments
    pub library_paths: Vec<String>,
    /// `--cfg` arguments
    pub cfgs: Vec<String>,
    /// `rustc-env` pairs set for the package's remaining invocations
    pub env: Vec<(String, String)>,
    pub metadata: Vec<(String, String)>,
    pub warnings: Vec<String>,
}

impl BuildScriptOutput {
    /// Parse build script stdout; `package` is used in diagnostics
    pub fn parse(input: &str, package: &str) -> BuildResult<Self> {
        let mut output = Self::default();
        for line in input.lines() {
            let Some(data) = line.strip_prefix("cargo::").or_else(|| line.strip_prefix("cargo:")) else {
                continue;
            };
            let Some((key, value)) = data.split_once('=') else {
                continue;
            };
            output.apply(key, value.trim_end(), package, line)?;
        }
        Ok(output)
    }

    /// Build an output from a `[target.<triple>.<links>]` settings table
    pub fn from_override(table: &OverrideTable, package: &str) -> BuildResult<Self> {
        let mut output = Self::default();
        for (key, value) in table {
            for item in value.values() {
                output.apply(key, item, package, &format!("{}={}", key, item))?;
            }
        }
        Ok(output)
    }

    fn apply(&mut self, key: &str, value: &str, package: &str, line: &str) -> BuildResult<()> {
        match key {
            "rustc-link-lib" => self.library_links.push(value.to_string()),
            "rustc-link-search" => self.library_paths.push(value.to_string()),
            "rustc-cfg" => self.cfgs.push(value.to_string()),
            "rustc-flags" => {
                let (links, paths) = parse_rustc_flags(value, package)?;
                self.library_links.extend(links);
                self.library_paths.extend(paths);
            },
            "rustc-env" => match value.split_once('=') {
                Some((name, val)) => self.env.push((name.to_string(), val.to_string())),
                None => {
                    return Err(SproutError::parse(
                        "build script output",
                        line,
                        format!("rustc-env in build script of `{}` must be NAME=VALUE", package),
                    ))
                },
            },
            "warning" => self.warnings.push(value.to_string()),
            "rerun-if-changed" | "rerun-if-env-changed" | "rustc-check-cfg" => {},
            "metadata" => {
                if let Some((name, val)) = value.split_once('=') {
                    self.metadata.push((name.to_string(), val.to_string()));
                }
            },
            _ => self.metadata.push((key.to_string(), value.to_string())),
        }
        Ok(())
    }

    /// `-l` compiler arguments; search paths travel separately since
    /// dependents inherit them
    pub fn link_args(&self) -> Vec<String> {
        self.library_links
            .iter()
            .flat_map(|l| ["-l".to_string(), l.clone()])
            .collect()
    }

    /// `--cfg` compiler arguments
    pub fn cfg_args(&self) -> Vec<String> {
        self.cfgs
            .iter()
            .flat_map(|cfg| ["--cfg".to_string(), cfg.clone()])
            .collect()
    }

    /// `CARGO_FEATURE_<NAME>=1` for every emitted cfg, keyed by the cfg name
    pub fn feature_env(&self) -> Vec<(String, String)> {
        self.cfgs
            .iter()
            .map(|cfg| {
                let name = cfg.split('=').next().unwrap_or(cfg).trim();
                (format!("CARGO_FEATURE_{}", envify(name)), "1".to_string())
            })
            .collect()
    }
}

/// Split a `rustc-flags` value into link names and search paths
pub fn parse_rustc_flags(value: &str, package: &str) -> BuildResult<(Vec<String>, Vec<String>)> {
    let invalid = |reason: String| SproutError::parse("rustc-flags", value, reason);
    let mut flags = value.split_whitespace();
    let (mut links, mut paths) = (Vec::new(), Vec::new());

    while let Some(flag) = flags.next() {
        let (flag, inline) = match flag {
            "-l" | "-L" => (flag, None),
            f if f.starts_with("-l") || f.starts_with("-L") => (&f[..2], Some(&f[2..])),
            _ => {
                return Err(invalid(format!(
                    "only -l and -L flags are allowed in build script of `{}`",
                    package
                )))
            },
        };
        let arg = match inline.or_else(|| flags.next()) {
            Some(arg) => arg.to_string(),
            None => {
                return Err(invalid(format!(
                    "flag {} has no value in build script of `{}`",
                    flag, package
                )))
            },
        };
        if flag == "-l" {
            links.push(arg);
        } else {
            paths.push(arg);
        }
    }

    Ok((links, paths))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sprout_config::OverrideValue;

    #[test]
    fn test_parse_directives() {
        let stdout = "\
cargo:rustc-link-lib=ssl
cargo:rustc-link-search=native=/opt/ssl/lib
cargo:rustc-cfg=ossl110
cargo:include=/opt/ssl/include
cargo::metadata=version=1.1.1
cargo:rerun-if-changed=build.rs
cargo:warning=using system openssl
";
        let output = BuildScriptOutput::parse(stdout, "openssl-sys").unwrap();
        assert_eq!(output.library_links, vec!["ssl"]);
        assert_eq!(output.library_paths, vec!["native=/opt/ssl/lib"]);
        assert_eq!(output.cfgs, vec!["ossl110"]);
        assert_eq!(
            output.metadata,
            vec![
                ("include".to_string(), "/opt/ssl/include".to_string()),
                ("version".to_string(), "1.1.1".to_string()),
            ]
        );
        assert_eq!(output.warnings, vec!["using system openssl"]);
    }

    #[test]
    fn test_ignores_unrelated_lines() {
        let stdout = "compiling...\ncargo:novalue\nnot cargo:rustc-cfg=x\n\ncargo:rustc-cfg=yes  \n";
        let output = BuildScriptOutput::parse(stdout, "pkg").unwrap();
        assert_eq!(output.cfgs, vec!["yes"]);
        assert!(output.metadata.is_empty());
    }

    #[test]
    fn test_rustc_flags() {
        let output = BuildScriptOutput::parse("cargo:rustc-flags=-l foo -L /usr/lib -lbar\n", "pkg").unwrap();
        assert_eq!(output.library_links, vec!["foo", "bar"]);
        assert_eq!(output.library_paths, vec!["/usr/lib"]);
        assert_eq!(output.link_args(), vec!["-l", "foo", "-l", "bar"]);
    }

    #[test]
    fn test_rustc_flags_rejects_other_flags() {
        assert!(BuildScriptOutput::parse("cargo:rustc-flags=-C opt-level=3\n", "pkg").is_err());
        assert!(BuildScriptOutput::parse("cargo:rustc-flags=-l\n", "pkg").is_err());
    }

    #[test]
    fn test_rustc_env() {
        let output = BuildScriptOutput::parse("cargo:rustc-env=GIT_HASH=abc=1\n", "pkg").unwrap();
        assert_eq!(output.env, vec![("GIT_HASH".to_string(), "abc=1".to_string())]);
        assert!(BuildScriptOutput::parse("cargo:rustc-env=BROKEN\n", "pkg").is_err());
    }

    #[test]
    fn test_cfg_feature_env() {
        let output = BuildScriptOutput::parse("cargo:rustc-cfg=has-i128\ncargo:rustc-cfg=ver=\"2\"\n", "pkg").unwrap();
        assert_eq!(
            output.feature_env(),
            vec![
                ("CARGO_FEATURE_HAS_I128".to_string(), "1".to_string()),
                ("CARGO_FEATURE_VER".to_string(), "1".to_string()),
            ]
        );
        assert_eq!(output.cfg_args(), vec!["--cfg", "has-i128", "--cfg", "ver=\"2\""]);
    }

    #[test]
    fn test_from_override() {
        let mut table = OverrideTable::new();
        table.insert(
            "rustc-link-lib".to_string(),
            OverrideValue::Many(vec!["ssl".to_string(), "crypto".to_string()]),
        );
        table.insert("rustc-link-search".to_string(), OverrideValue::One("/opt/lib".to_string()));
        table.insert("root".to_string(), OverrideValue::One("/opt".to_string()));

        let output = BuildScriptOutput::from_override(&table, "openssl-sys").unwrap();
        assert_eq!(output.library_links, vec!["ssl", "crypto"]);
        assert_eq!(output.library_paths, vec!["/opt/lib"]);
        assert_eq!(output.metadata, vec![("root".to_string(), "/opt".to_string())]);
    }
}
