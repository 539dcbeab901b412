// ─── Version Index ───
// Handles fetching and parsing the Mojang version manifest v2.

use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::core::downloader::ArtifactDownloader;
use crate::core::error::{LauncherError, LauncherResult};

pub const VERSION_MANIFEST_URL: &str =
    "https://piston-meta.mojang.com/mc/game/version_manifest_v2.json";

/// Top-level Mojang version index.
#[derive(Debug, Deserialize)]
pub struct VersionIndex {
    pub versions: Vec<VersionEntry>,
}

/// A single entry in the index.
#[derive(Debug, Clone, Deserialize)]
pub struct VersionEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub version_type: String,
    pub url: String,
    #[serde(default)]
    pub sha1: Option<String>,
}

impl VersionIndex {
    /// Fetch the index through the shared downloader into `dest` and parse it.
    pub async fn fetch(
        downloader: &dyn ArtifactDownloader,
        url: &str,
        dest: &Path,
    ) -> LauncherResult<Self> {
        info!("Fetching Minecraft version manifest...");

        downloader.download_file(url, dest, None).await?;
        let raw = tokio::fs::read(dest)
            .await
            .map_err(|e| LauncherError::io(dest, e))?;
        let index: VersionIndex = serde_json::from_slice(&raw)
            .map_err(|e| LauncherError::manifest(dest.display().to_string(), e))?;

        info!("Loaded {} versions from manifest", index.versions.len());
        Ok(index)
    }

    /// Find a specific version entry by ID (e.g. "1.20.4").
    pub fn find_version(&self, id: &str) -> Option<&VersionEntry> {
        self.versions.iter().find(|v| v.id == id)
    }
}
