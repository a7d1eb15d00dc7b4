//! Process boundary: the compiler and build scripts

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::process::Command;

use sprout_core::error::SproutError;
use sprout_core::types::Platform;
use tracing::debug;

use crate::BuildResult;

/// One process to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub cwd: Option<PathBuf>,
}

/// Captured result of an `Invocation`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub success: bool,
    /// Exit status as displayed to the user
    pub status: String,
    pub stdout: String,
    pub stderr: String,
}

/// Runs compiler and build-script processes
pub trait Toolchain {
    fn execute(&self, invocation: &Invocation) -> BuildResult<ProcessOutput>;

    /// Host triple reported by `rustc -vV`
    fn host_triple(&self, rustc: &str) -> BuildResult<String> {
        let output = self.execute(&Invocation::new(rustc).arg("-vV"))?;
        let host = output
            .stdout
            .lines()
            .find_map(|line| line.strip_prefix("host:"))
            .map(|host| host.trim().to_string())
            .filter(|host| !host.is_empty());

        match host {
            Some(host) if output.success => Ok(host),
            _ => Err(SproutError::ConfigValidation {
                field: "rustc".to_string(),
                reason: format!("could not determine the host triple from `{} -vV`", rustc),
            }),
        }
    }

    /// Platform for `target` with the cfg values `rustc --print cfg` reports
    fn target_platform(&self, rustc: &str, target: &str) -> BuildResult<Platform> {
        let invocation = Invocation::new(rustc).args(["--print", "cfg", "--target", target]);
        let output = self.execute(&invocation)?;
        if !output.success {
            return Err(SproutError::ConfigValidation {
                field: "target".to_string(),
                reason: format!("`{}` failed ({}): {}", invocation, output.status, output.stderr.trim()),
            });
        }
        Platform::new(target, &output.stdout)
    }
}

/// `Toolchain` backed by real processes
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessToolchain;

impl Invocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            cwd: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn envs(mut self, env: &BTreeMap<String, String>) -> Self {
        self.env.extend(env.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            if arg.contains(' ') || arg.contains('"') {
                write!(f, " '{}'", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

impl ProcessToolchain {
    pub fn new() -> Self {
        Self
    }
}

impl Toolchain for ProcessToolchain {
    fn execute(&self, invocation: &Invocation) -> BuildResult<ProcessOutput> {
        debug!("Running `{}`", invocation);
        let mut command = Command::new(&invocation.program);
        command.args(&invocation.args).envs(&invocation.env);
        if let Some(cwd) = &invocation.cwd {
            command.current_dir(cwd);
        }

        let output = command.output().map_err(|e| {
            SproutError::io(format!("Failed to run {}", invocation.program.display()), e)
        })?;

        Ok(ProcessOutput {
            success: output.status.success(),
            status: output.status.to_string(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Answers every invocation with the same output and records its args
    struct Canned {
        output: ProcessOutput,
        calls: RefCell<Vec<Vec<String>>>,
    }

    impl Toolchain for Canned {
        fn execute(&self, invocation: &Invocation) -> BuildResult<ProcessOutput> {
            self.calls.borrow_mut().push(invocation.args.clone());
            Ok(self.output.clone())
        }
    }

    fn canned(success: bool, stdout: &str) -> Canned {
        Canned {
            output: ProcessOutput {
                success,
                status: if success { "exit status: 0" } else { "exit status: 1" }.to_string(),
                stdout: stdout.to_string(),
                stderr: if success { String::new() } else { "error: unknown target".to_string() },
            },
            calls: RefCell::new(Vec::new()),
        }
    }

    #[test]
    fn test_host_triple_from_rustc() {
        let toolchain = canned(
            true,
            "rustc 1.75.0 (82e1608df 2023-12-21)\nbinary: rustc\nhost: x86_64-unknown-linux-gnu\nrelease: 1.75.0\n",
        );
        assert_eq!(toolchain.host_triple("rustc").unwrap(), "x86_64-unknown-linux-gnu");
        assert_eq!(*toolchain.calls.borrow(), vec![vec!["-vV".to_string()]]);
    }

    #[test]
    fn test_host_triple_missing() {
        assert!(canned(true, "rustc 1.75.0\n").host_triple("rustc").is_err());
        assert!(canned(false, "host: x86_64-unknown-linux-gnu\n").host_triple("rustc").is_err());
    }

    #[test]
    fn test_target_platform_from_print_cfg() {
        let toolchain = canned(
            true,
            "panic=\"unwind\"\ntarget_arch=\"x86_64\"\ntarget_feature=\"sse2\"\ntarget_has_atomic=\"64\"\ntarget_os=\"linux\"\nunix\n",
        );
        let platform = toolchain
            .target_platform("rustc", "x86_64-unknown-linux-gnu")
            .unwrap();

        assert_eq!(
            *toolchain.calls.borrow(),
            vec![vec!["--print", "cfg", "--target", "x86_64-unknown-linux-gnu"]
                .into_iter()
                .map(String::from)
                .collect::<Vec<_>>()]
        );
        assert_eq!(platform.triple(), "x86_64-unknown-linux-gnu");
        assert!(platform.matches(r#"cfg(target_has_atomic = "64")"#).unwrap());
        assert!(platform.matches(r#"cfg(target_feature = "sse2")"#).unwrap());
        assert!(platform.matches(r#"cfg(panic = "unwind")"#).unwrap());
        assert!(!platform.matches("cfg(windows)").unwrap());
    }

    #[test]
    fn test_target_platform_unknown_target() {
        let err = canned(false, "")
            .target_platform("rustc", "nonsense-target")
            .unwrap_err();
        match err {
            SproutError::ConfigValidation { field, reason } => {
                assert_eq!(field, "target");
                assert!(reason.contains("unknown target"));
            },
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_invocation_display() {
        let invocation = Invocation::new("rustc")
            .args(["src/lib.rs", "--cfg"])
            .arg("feature=\"std\"");
        assert_eq!(invocation.to_string(), "rustc src/lib.rs --cfg 'feature=\"std\"'");
    }

    #[cfg(unix)]
    #[test]
    fn test_process_toolchain_captures_output() {
        let invocation = Invocation::new("sh")
            .args(["-c", "echo cargo:rustc-cfg=$FLAVOR; echo oops >&2; exit 3"])
            .envs(&BTreeMap::from([("FLAVOR".to_string(), "mint".to_string())]));
        let output = ProcessToolchain::new().execute(&invocation).unwrap();

        assert!(!output.success);
        assert_eq!(output.stdout.trim(), "cargo:rustc-cfg=mint");
        assert_eq!(output.stderr.trim(), "oops");
    }

    #[test]
    fn test_missing_program() {
        let err = ProcessToolchain::new()
            .execute(&Invocation::new("/nonexistent/sprout-test-program"))
            .unwrap_err();
        assert!(matches!(err, SproutError::Io { .. }));
    }
}
