use std::path::{Path, PathBuf};
use std::process::Command;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::task::ProgressListener;

/// What the processor stage needs from a Java runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JdkRequest {
    pub major: u32,
    /// Processors compile nothing, but some need tools only a JDK ships.
    pub require_compiler: bool,
}

/// Supplies a runtime root (the directory holding `bin/java`) for a request.
#[async_trait]
pub trait JdkProvisioner: Send + Sync {
    async fn provision_jdk(
        &self,
        request: &JdkRequest,
        progress: &dyn ProgressListener,
    ) -> LauncherResult<PathBuf>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JavaInstallation {
    pub path: PathBuf,
    pub version: String,
    pub major: u32,
    pub is_64bit: bool,
    pub vendor: String,
}

/// Finds an installed JDK: the user's selected path, then managed runtimes
/// under `runtimes_dir`, then `JAVA_HOME`, then `PATH`.
pub struct LocalJdkProvisioner {
    runtimes_dir: PathBuf,
    selected_java_path: Option<PathBuf>,
}

impl LocalJdkProvisioner {
    pub fn new(runtimes_dir: PathBuf, selected_java_path: Option<PathBuf>) -> Self {
        Self {
            runtimes_dir,
            selected_java_path,
        }
    }

    /// Candidate runtime roots in priority order.
    fn candidate_roots(&self) -> Vec<PathBuf> {
        let mut roots = Vec::new();

        if let Some(selected) = &self.selected_java_path {
            roots.push(runtime_root_of(selected));
        }

        if let Ok(entries) = std::fs::read_dir(&self.runtimes_dir) {
            let mut managed: Vec<PathBuf> = entries
                .filter_map(Result::ok)
                .map(|e| e.path())
                .filter(|p| p.is_dir())
                .collect();
            managed.sort();
            roots.extend(managed);
        }

        if let Some(home) = std::env::var_os("JAVA_HOME") {
            roots.push(PathBuf::from(home));
        }

        if let Some(path) = std::env::var_os("PATH") {
            for dir in std::env::split_paths(&path) {
                if dir.join(java_exe()).is_file() {
                    roots.push(runtime_root_of(&dir.join(java_exe())));
                }
            }
        }

        roots.dedup();
        roots
    }
}

#[async_trait]
impl JdkProvisioner for LocalJdkProvisioner {
    #[instrument(skip(self, progress))]
    async fn provision_jdk(
        &self,
        request: &JdkRequest,
        progress: &dyn ProgressListener,
    ) -> LauncherResult<PathBuf> {
        progress.on_progress(&format!("Locating Java {}", request.major));

        let candidates = self.candidate_roots();
        let request = *request;
        let found = tokio::task::spawn_blocking(move || {
            candidates
                .into_iter()
                .find(|root| runtime_satisfies(root, &request))
        })
        .await
        .map_err(|e| LauncherError::Other(format!("Java probe task failed: {e}")))?;

        match found {
            Some(root) => {
                info!("Using Java runtime at {:?} for Java {}", root, request.major);
                Ok(root)
            }
            None => Err(LauncherError::JdkUnavailable {
                major: request.major,
                require_compiler: request.require_compiler,
            }),
        }
    }
}

fn runtime_satisfies(root: &Path, request: &JdkRequest) -> bool {
    let java = locate_java_binary(root);
    let Some(installation) = probe::probe_java(&java) else {
        return false;
    };
    if !is_java_compatible_major(installation.major, request.major) {
        debug!(
            "Skipping {:?}: Java {} does not satisfy Java {}",
            root, installation.major, request.major
        );
        return false;
    }
    if request.require_compiler && !has_compiler(&java) {
        warn!("Skipping {:?}: no javac next to {:?}", root, java);
        return false;
    }
    true
}

/// `bin/java` -> runtime root; anything else is taken to be a root already.
fn runtime_root_of(path: &Path) -> PathBuf {
    let is_binary = path.file_name().and_then(|n| n.to_str()) == Some(java_exe());
    if is_binary {
        if let Some(root) = path.parent().and_then(Path::parent) {
            return root.to_path_buf();
        }
    }
    path.to_path_buf()
}

fn has_compiler(java_bin: &Path) -> bool {
    let javac = if cfg!(windows) { "javac.exe" } else { "javac" };
    java_bin.with_file_name(javac).is_file()
}

fn runtime_track(required_major: u32) -> u32 {
    if required_major <= 8 {
        8
    } else if required_major >= 21 {
        21
    } else {
        17
    }
}

pub fn is_java_compatible_major(installed_major: u32, required_major: u32) -> bool {
    installed_major >= required_major
        && runtime_track(installed_major) == runtime_track(required_major)
}

fn parse_major_version(version: &str) -> u32 {
    let first_part = version.split('.').next().unwrap_or("0");
    let major: u32 = first_part.parse().unwrap_or(0);

    if major == 1 {
        version
            .split('.')
            .nth(1)
            .and_then(|s| s.parse().ok())
            .unwrap_or(major)
    } else {
        major
    }
}

fn java_exe() -> &'static str {
    if cfg!(windows) {
        "java.exe"
    } else {
        "java"
    }
}

/// The `java` executable inside a runtime root.
pub fn java_executable(runtime_root: &Path) -> PathBuf {
    locate_java_binary(runtime_root)
}

fn locate_java_binary(runtime_root: &Path) -> PathBuf {
    let primary = runtime_root.join("bin").join(java_exe());
    if primary.exists() {
        return primary;
    }

    let mac_layout = runtime_root
        .join("Contents")
        .join("Home")
        .join("bin")
        .join(java_exe());
    if mac_layout.exists() {
        return mac_layout;
    }

    primary
}

mod probe {
    use super::*;

    #[instrument]
    pub fn probe_java(path: &Path) -> Option<JavaInstallation> {
        let output = Command::new(path)
            .args(["-XshowSettings:properties", "-version"])
            .output()
            .ok()?;

        parse_output(path, output)
    }

    fn parse_output(path: &Path, output: std::process::Output) -> Option<JavaInstallation> {
        let version_output = format!(
            "{}\n{}",
            String::from_utf8_lossy(&output.stderr),
            String::from_utf8_lossy(&output.stdout)
        );
        debug!(
            "Probing {:?}: {}",
            path,
            version_output.lines().next().unwrap_or("")
        );

        let version_str = parse_version_string(&version_output)?;
        let major = parse_major_version(&version_str);
        let lower_output = version_output.to_ascii_lowercase();
        let is_64bit = lower_output.contains("sun.arch.data.model = 64")
            || lower_output.contains("os.arch = amd64")
            || lower_output.contains("os.arch = x86_64")
            || lower_output.contains("os.arch = aarch64");
        let vendor = parse_vendor(&version_output);

        let canonical = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());

        Some(JavaInstallation {
            path: canonical,
            version: version_str,
            major,
            is_64bit,
            vendor,
        })
    }

    pub(super) fn parse_version_string(output: &str) -> Option<String> {
        output.lines().find_map(|line| {
            let start = line.find('"')?;
            let end = line[start + 1..].find('"')?;
            Some(line[start + 1..start + 1 + end].to_string())
        })
    }

    fn parse_vendor(output: &str) -> String {
        for line in output.lines() {
            if line.contains("Temurin") {
                return "Temurin".to_string();
            }
            if line.contains("Adoptium") {
                return "Adoptium".to_string();
            }
            if line.contains("OpenJDK") {
                return "OpenJDK".to_string();
            }
        }
        "unknown".to_string()
    }
}
