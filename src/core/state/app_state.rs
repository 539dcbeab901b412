use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::downloader::{ArtifactDownloader, HttpDownloader};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::http::build_http_client;
use crate::core::java::{JdkProvisioner, LocalJdkProvisioner};
use crate::core::maven::{FORGE_MAVEN, MAVEN_CENTRAL, MOJANG_LIBRARIES};
use crate::core::version::VERSION_MANIFEST_URL;

const APP_DIR_NAME: &str = "InterfaceOficial";
const SETTINGS_FILE: &str = "launcher_settings.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxySettings {
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// What happens to a processor that is still running when the run is cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessCancelPolicy {
    /// Let it finish; no further processors are started.
    #[default]
    Complete,
    /// Kill it as soon as the token fires.
    Kill,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherSettings {
    pub proxy: Option<ProxySettings>,
    pub selected_java_path: Option<PathBuf>,
    pub library_concurrency: usize,
    pub cancel_policy: ProcessCancelPolicy,
    pub version_manifest_url: String,
    pub maven_repositories: Vec<String>,
}

impl Default for LauncherSettings {
    fn default() -> Self {
        Self {
            proxy: None,
            selected_java_path: None,
            library_concurrency: 8,
            cancel_policy: ProcessCancelPolicy::Complete,
            version_manifest_url: VERSION_MANIFEST_URL.to_string(),
            maven_repositories: vec![
                FORGE_MAVEN.to_string(),
                MOJANG_LIBRARIES.to_string(),
                MAVEN_CENTRAL.to_string(),
            ],
        }
    }
}

impl LauncherSettings {
    /// Load `launcher_settings.json` from `data_dir`. A missing file yields
    /// defaults; a corrupt one is reported and also yields defaults.
    pub fn load(data_dir: &Path) -> Self {
        let path = data_dir.join(SETTINGS_FILE);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(_) => return Self::default(),
        };
        match serde_json::from_str(&raw) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Ignoring corrupt settings at {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    pub fn save(&self, data_dir: &Path) -> LauncherResult<()> {
        let path = data_dir.join(SETTINGS_FILE);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json).map_err(|e| LauncherError::io(&path, e))
    }
}

/// Everything an installation needs from the surrounding application.
///
/// Built once and passed by reference; nothing in the core reaches for
/// process-wide state.
pub struct AppContext {
    pub data_dir: PathBuf,
    pub settings: LauncherSettings,
    pub downloader: Arc<dyn ArtifactDownloader>,
    pub jdk_provisioner: Arc<dyn JdkProvisioner>,
}

impl AppContext {
    /// Build a context with the real HTTP downloader and local JDK discovery.
    pub fn new(data_dir: PathBuf, settings: LauncherSettings) -> LauncherResult<Self> {
        let http_client = build_http_client(settings.proxy.as_ref())?;
        let downloader = Arc::new(HttpDownloader::new(http_client));
        let jdk_provisioner = Arc::new(LocalJdkProvisioner::new(
            data_dir.join("runtime"),
            settings.selected_java_path.clone(),
        ));

        Ok(Self {
            data_dir,
            settings,
            downloader,
            jdk_provisioner,
        })
    }

    pub fn with_downloader(mut self, downloader: Arc<dyn ArtifactDownloader>) -> Self {
        self.downloader = downloader;
        self
    }

    pub fn with_jdk_provisioner(mut self, provisioner: Arc<dyn JdkProvisioner>) -> Self {
        self.jdk_provisioner = provisioner;
        self
    }

    pub fn libraries_dir(&self) -> PathBuf {
        self.data_dir.join("libraries")
    }

    pub fn versions_dir(&self) -> PathBuf {
        self.data_dir.join("versions")
    }
}

/// `<platform data dir>/InterfaceOficial`, created if missing.
pub fn default_data_dir() -> LauncherResult<PathBuf> {
    let dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME);
    std::fs::create_dir_all(&dir).map_err(|e| LauncherError::io(&dir, e))?;
    Ok(dir)
}
