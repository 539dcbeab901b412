use std::collections::BTreeMap;

use serde::Deserialize;

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::maven::MavenArtifact;
use crate::core::version::LibraryEntry;

/// `install_profile.json` of a Forge-style installer (profile format v1).
#[derive(Debug, Deserialize)]
pub struct InstallManifest {
    /// Id of the version descriptor this installer produces.
    pub version: String,
    /// Vanilla version it builds on.
    pub minecraft: String,
    /// Archive path of the embedded version descriptor.
    pub json: String,
    #[serde(default)]
    pub libraries: Vec<LibraryEntry>,
    #[serde(default)]
    pub data: BTreeMap<String, DataEntry>,
    #[serde(default)]
    pub processors: Vec<Processor>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataEntry {
    pub client: String,
    #[serde(default)]
    pub server: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Processor {
    pub jar: MavenArtifact,
    #[serde(default)]
    pub classpath: Vec<MavenArtifact>,
    #[serde(default)]
    pub args: Vec<String>,
    /// Output expression -> expected SHA-1 expression.
    #[serde(default)]
    pub outputs: BTreeMap<String, String>,
    #[serde(default)]
    pub sides: Vec<String>,
}

impl InstallManifest {
    pub fn parse(raw: &[u8], source_name: &str) -> LauncherResult<Self> {
        serde_json::from_slice(raw).map_err(|e| LauncherError::manifest(source_name, e))
    }
}

impl Processor {
    /// Applies when no sides are declared or `client` is among them.
    pub fn runs_on_client(&self) -> bool {
        self.sides.is_empty() || self.sides.iter().any(|s| s == "client")
    }
}
