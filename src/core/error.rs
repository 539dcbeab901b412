use std::path::PathBuf;
use thiserror::Error;

/// Central error type for the installer backend.
/// Every module returns `Result<T, LauncherError>`.
#[derive(Debug, Error)]
pub enum LauncherError {
    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Network ─────────────────────────────────────────
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Download failed for {url}: HTTP {status}")]
    DownloadFailed { url: String, status: u16 },

    // ── Integrity ───────────────────────────────────────
    #[error("SHA-1 mismatch for {path:?}: expected {expected}, got {actual}")]
    Sha1Mismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    // ── Maven ───────────────────────────────────────────
    #[error("Invalid Maven coordinate: {0}")]
    InvalidMavenCoordinate(String),

    #[error("Artifact {coordinate} unavailable: {reason}")]
    ArtifactUnavailable { coordinate: String, reason: String },

    // ── Manifests ───────────────────────────────────────
    #[error("Manifest parse error in {source_name}: {message}")]
    ManifestParse {
        source_name: String,
        message: String,
    },

    #[error("Unknown token {{{key}}} in {template:?}")]
    UnknownToken { key: String, template: String },

    // ── JSON ────────────────────────────────────────────
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ── Java ────────────────────────────────────────────
    #[error("No usable JDK for Java {major} (compiler required: {require_compiler})")]
    JdkUnavailable { major: u32, require_compiler: bool },

    // ── Processors ──────────────────────────────────────
    #[error("Processor classpath entry does not exist: {0:?}")]
    MissingClasspathEntry(PathBuf),

    #[error("Failed to spawn processor {command}: {source}")]
    ProcessSpawnFailed {
        command: String,
        source: std::io::Error,
    },

    #[error("Processor exited with non-zero status {0}")]
    ProcessorExitNonZero(i32),

    #[error("Processor output validation failed for {0:?}")]
    OutputValidationFailed(Vec<PathBuf>),

    // ── Control flow ────────────────────────────────────
    /// Not a failure: the run observed its cancellation token and unwound.
    #[error("Installation cancelled")]
    Cancelled,

    // ── Archive ─────────────────────────────────────────
    #[error("Zip extraction error: {0}")]
    Zip(#[from] zip::result::ZipError),

    // ── Generic ─────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the crate.
pub type LauncherResult<T> = Result<T, LauncherError>;

impl LauncherError {
    /// Wrap an `std::io::Error` with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LauncherError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn manifest(source_name: impl Into<String>, message: impl ToString) -> Self {
        LauncherError::ManifestParse {
            source_name: source_name.into(),
            message: message.to_string(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, LauncherError::Cancelled)
    }
}

impl From<std::io::Error> for LauncherError {
    fn from(source: std::io::Error) -> Self {
        LauncherError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}

// Frontends receive errors as plain strings.
impl serde::Serialize for LauncherError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancelled_is_distinguishable_from_failures() {
        assert!(LauncherError::Cancelled.is_cancelled());
        assert!(!LauncherError::ProcessorExitNonZero(1).is_cancelled());
    }

    #[test]
    fn unknown_token_display_names_the_key() {
        let err = LauncherError::UnknownToken {
            key: "UNSET".into(),
            template: "{UNSET}".into(),
        };
        assert_eq!(err.to_string(), "Unknown token {UNSET} in \"{UNSET}\"");
    }

    #[test]
    fn serializes_as_display_string() {
        let json = serde_json::to_string(&LauncherError::ProcessorExitNonZero(3)).unwrap();
        assert_eq!(json, "\"Processor exited with non-zero status 3\"");
    }
}
