//! Error types and result aliases for sprout operations.
//!
//! Provides a unified error type that covers every failure the bootstrapper
//! can hit, from a malformed version string to a compiler exiting non-zero.

use thiserror::Error;

use crate::types::VersionError;

/// Unified error type for all sprout operations
#[derive(Error, Debug)]
pub enum SproutError {
    // Parse errors
    #[error("Failed to parse {what} '{input}': {reason}")]
    Parse {
        what: String,
        input: String,
        reason: String,
    },

    #[error("Failed to parse TOML: {message} at line {line}, column {column}")]
    TomlParse {
        message: String,
        line: usize,
        column: usize,
    },

    #[error("Invalid manifest {path}: {reason}")]
    Manifest { path: String, reason: String },

    #[error("Configuration field '{field}' is invalid: {reason}")]
    ConfigValidation { field: String, reason: String },

    // Registry errors
    #[error("No version of '{name}' matches '{req}' (required by {requested_by})")]
    NotFound {
        name: String,
        req: String,
        requested_by: String,
    },

    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // Integrity errors
    #[error("Checksum mismatch for {package}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        package: String,
        expected: String,
        actual: String,
    },

    // Resolution errors
    #[error("Circular dependency detected: {cycle}")]
    CircularDependency { cycle: String },

    // Build errors
    #[error("Failed to build {target} of {package} ({status})\n{stderr}")]
    BuildFailure {
        package: String,
        target: String,
        status: String,
        stderr: String,
    },

    // IO errors
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for sprout operations
pub type SproutResult<T> = Result<T, SproutError>;

impl SproutError {
    /// Create a network error from any error type
    pub fn network<E>(message: String, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Network {
            message,
            source: Some(Box::new(source)),
        }
    }

    /// Create an IO error from std::io::Error
    pub fn io(message: String, source: std::io::Error) -> Self {
        Self::Io { message, source }
    }

    /// Create a parse error for the named kind of input
    pub fn parse(what: &str, input: &str, reason: impl Into<String>) -> Self {
        Self::Parse {
            what: what.to_string(),
            input: input.to_string(),
            reason: reason.into(),
        }
    }

    /// Get a user-friendly suggestion for fixing this error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            SproutError::NotFound { .. } => {
                Some("Check that the registry index checkout is up to date")
            },
            SproutError::Network { .. } => Some("Check your internet connection and try again"),
            SproutError::ChecksumMismatch { .. } => {
                Some("The index may be stale; update it or drop --strict-checksums")
            },
            SproutError::CircularDependency { .. } => {
                Some("Break the cycle between the listed packages")
            },
            SproutError::BuildFailure { .. } => {
                Some("Re-run with --verbose to see the full compiler command line")
            },
            _ => None,
        }
    }
}

impl From<VersionError> for SproutError {
    fn from(err: VersionError) -> Self {
        let (what, input) = match &err {
            VersionError::InvalidFormat { input } => ("version", input.clone()),
            VersionError::InvalidRange { input } => ("version range", input.clone()),
            VersionError::InvalidOperator { op } => ("version operator", op.clone()),
        };
        Self::Parse {
            what: what.to_string(),
            input,
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_error_converts_to_parse() {
        let err: SproutError = VersionError::InvalidFormat {
            input: "1.x".to_string(),
        }
        .into();
        assert!(matches!(err, SproutError::Parse { ref what, .. } if what == "version"));
        assert!(err.to_string().contains("1.x"));
    }

    #[test]
    fn test_suggestions() {
        let io = SproutError::io(
            "read".to_string(),
            std::io::Error::new(std::io::ErrorKind::Other, "boom"),
        );
        assert!(io.suggestion().is_none());

        let not_found = SproutError::NotFound {
            name: "libc".to_string(),
            req: "^0.2".to_string(),
            requested_by: "root-0.1.0".to_string(),
        };
        assert!(not_found.suggestion().is_some());
        assert!(not_found.to_string().contains("root-0.1.0"));
    }
}
