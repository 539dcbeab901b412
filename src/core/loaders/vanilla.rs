use std::path::PathBuf;

use tracing::{info, warn};

use crate::core::downloader::sha1_matches;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::version::{VersionIndex, VersionManifest};

use super::context::InstallContext;

/// `versions/<id>/<id>.jar` for a vanilla id.
pub fn client_jar_path(ctx: &InstallContext<'_>, id: &str) -> PathBuf {
    ctx.versions_dir.join(id).join(format!("{}.jar", id))
}

/// Make sure the vanilla descriptor and client jar for `minecraft_version`
/// are on disk, and return the parsed descriptor.
pub async fn download_vanilla(
    ctx: &InstallContext<'_>,
    minecraft_version: &str,
) -> LauncherResult<VersionManifest> {
    let json_path = ctx
        .versions_dir
        .join(minecraft_version)
        .join(format!("{}.json", minecraft_version));

    let local = if json_path.exists() {
        let raw = tokio::fs::read(&json_path)
            .await
            .map_err(|e| LauncherError::io(&json_path, e))?;
        match VersionManifest::parse(&raw, &json_path.display().to_string()) {
            Ok(manifest) => Some(manifest),
            Err(e) => {
                warn!("Re-downloading unreadable vanilla descriptor: {}", e);
                None
            }
        }
    } else {
        None
    };

    let manifest = match local {
        Some(manifest) => manifest,
        None => {
            let index = VersionIndex::fetch(
                ctx.downloader,
                &ctx.settings.version_manifest_url,
                &ctx.versions_dir.join("version_manifest_v2.json"),
            )
            .await?;
            let entry = index.find_version(minecraft_version).ok_or_else(|| {
                LauncherError::ArtifactUnavailable {
                    coordinate: format!("minecraft:{}", minecraft_version),
                    reason: "not listed in the version manifest".into(),
                }
            })?;

            ctx.downloader
                .download_file(&entry.url, &json_path, entry.sha1.as_deref())
                .await?;
            let raw = tokio::fs::read(&json_path)
                .await
                .map_err(|e| LauncherError::io(&json_path, e))?;
            VersionManifest::parse(&raw, &json_path.display().to_string())?
        }
    };

    match manifest.download("client") {
        Some(client) => {
            let jar = client_jar_path(ctx, &manifest.id);
            if !(jar.exists() && sha1_matches(&jar, &client.sha1).await?) {
                info!("Downloading Minecraft {} client jar", manifest.id);
                ctx.downloader
                    .download_file(&client.url, &jar, Some(&client.sha1))
                    .await?;
            }
        }
        None => warn!("Vanilla {} declares no client download", manifest.id),
    }

    Ok(manifest)
}
