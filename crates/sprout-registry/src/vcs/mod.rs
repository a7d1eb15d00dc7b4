//! Source-control black box for obtaining the index checkout

use std::future::Future;
use std::path::{Path, PathBuf};

use sprout_core::error::SproutError;
use tokio::process::Command;
use tracing::info;
use url::Url;

use crate::RegistryResult;

/// Opens an existing checkout or clones one
pub trait SourceControl {
    /// Return the checkout directory for `url` at `path`
    fn open_or_clone(&self, url: &str, path: &Path) -> impl Future<Output = RegistryResult<PathBuf>> + Send;
}

/// `git` command-line client
#[derive(Debug, Clone)]
pub struct GitCli {
    program: String,
    allow_clone: bool,
}

impl GitCli {
    pub fn new(allow_clone: bool) -> Self {
        Self {
            program: "git".to_string(),
            allow_clone,
        }
    }

    /// Use a different git executable
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn is_checkout(path: &Path) -> bool {
        path.join(".git").exists() || path.join("config.json").is_file()
    }
}

impl SourceControl for GitCli {
    async fn open_or_clone(&self, url: &str, path: &Path) -> RegistryResult<PathBuf> {
        if Self::is_checkout(path) {
            info!("Using existing index checkout at {}", path.display());
            return Ok(path.to_path_buf());
        }

        if !self.allow_clone {
            return Err(SproutError::ConfigValidation {
                field: "index-dir".to_string(),
                reason: format!(
                    "{} is not an index checkout and cloning is disabled",
                    path.display()
                ),
            });
        }

        // Local paths are valid clone sources too
        if Url::parse(url).is_err() && !Path::new(url).exists() {
            return Err(SproutError::ConfigValidation {
                field: "index-url".to_string(),
                reason: format!("'{}' is neither a URL nor an existing path", url),
            });
        }

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SproutError::io(format!("Failed to create {}", parent.display()), e))?;
        }

        info!("Cloning {} into {}", url, path.display());
        let output = Command::new(&self.program)
            .args(["clone", "--depth", "1", url])
            .arg(path)
            .output()
            .await
            .map_err(|e| SproutError::io(format!("Failed to run {}", self.program), e))?;

        if !output.status.success() {
            return Err(SproutError::network(
                format!("git clone of {} failed", url),
                std::io::Error::new(
                    std::io::ErrorKind::Other,
                    String::from_utf8_lossy(&output.stderr).trim().to_string(),
                ),
            ));
        }

        Ok(path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_open_existing_checkout() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("config.json"), "{}").unwrap();

        let git = GitCli::new(false);
        let path = git.open_or_clone("https://example.com/index.git", dir.path()).await.unwrap();
        assert_eq!(path, dir.path());
    }

    #[tokio::test]
    async fn test_missing_checkout_without_clone() {
        let dir = TempDir::new().unwrap();
        let git = GitCli::new(false);
        let err = git
            .open_or_clone("https://example.com/index.git", &dir.path().join("index"))
            .await
            .unwrap_err();
        assert!(matches!(err, SproutError::ConfigValidation { .. }));
    }

    #[tokio::test]
    async fn test_invalid_clone_source() {
        let dir = TempDir::new().unwrap();
        let git = GitCli::new(true);
        let err = git
            .open_or_clone("not a url", &dir.path().join("index"))
            .await
            .unwrap_err();
        assert!(matches!(err, SproutError::ConfigValidation { ref field, .. } if field == "index-url"));
    }

    #[tokio::test]
    async fn test_failing_git_program() {
        let dir = TempDir::new().unwrap();
        let git = GitCli::new(true).with_program("sprout-no-such-git");
        let result = git
            .open_or_clone("https://example.com/index.git", &dir.path().join("index"))
            .await;
        assert!(result.is_err());
    }
}
