// ─── Legacy FML libraries ───
// Minecraft 1.3.2 - 1.5.2 expect a handful of libraries under
// `<game dir>/lib/` with historical file names.

use std::path::Path;

use tracing::{info, warn};

use super::artifact::MavenArtifact;
use super::resolver::LibraryResolver;
use crate::core::downloader::file_sha1;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::task::CancelExt;
use crate::core::version::LibraryEntry;
use tokio_util::sync::CancellationToken;

/// One historical library: where to fetch it and what FML calls it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegacyLibrary {
    pub coordinate: &'static str,
    pub file_name: &'static str,
}

const fn lib(coordinate: &'static str, file_name: &'static str) -> LegacyLibrary {
    LegacyLibrary {
        coordinate,
        file_name,
    }
}

const LIBS_1_3: &[LegacyLibrary] = &[
    lib("net.sourceforge.argo:argo:2.25", "argo-2.25.jar"),
    lib("com.google.guava:guava:12.0.1", "guava-12.0.1.jar"),
    lib("org.ow2.asm:asm-all:4.0", "asm-all-4.0.jar"),
];

const LIBS_1_4: &[LegacyLibrary] = &[
    lib("net.sourceforge.argo:argo:2.25", "argo-2.25.jar"),
    lib("com.google.guava:guava:12.0.1", "guava-12.0.1.jar"),
    lib("org.ow2.asm:asm-all:4.0", "asm-all-4.0.jar"),
    lib("org.bouncycastle:bcprov-jdk15on:1.47", "bcprov-jdk15on-147.jar"),
];

const LIBS_1_5: &[LegacyLibrary] = &[
    lib("net.sourceforge.argo:argo:3.2", "argo-small-3.2.jar"),
    lib("com.google.guava:guava:14.0-rc3", "guava-14.0-rc3.jar"),
    lib("org.ow2.asm:asm-all:4.1", "asm-all-4.1.jar"),
    lib("org.bouncycastle:bcprov-jdk15on:1.48", "bcprov-jdk15on-148.jar"),
];

/// Libraries FML expects for `minecraft_version`; empty for anything else.
pub fn legacy_libraries_for(minecraft_version: &str) -> &'static [LegacyLibrary] {
    match minecraft_version {
        "1.3.2" => LIBS_1_3,
        v if v == "1.4" || v.starts_with("1.4.") => LIBS_1_4,
        v if v == "1.5" || v.starts_with("1.5.") => LIBS_1_5,
        _ => &[],
    }
}

/// Resolve each legacy library and copy it to `<game_dir>/lib/<file name>`.
///
/// A library that cannot be fetched is logged and skipped; FML retries its
/// own downloads on first launch.
pub async fn install_legacy_libraries(
    resolver: &LibraryResolver<'_>,
    game_dir: &Path,
    minecraft_version: &str,
    cancel: &CancellationToken,
) -> LauncherResult<()> {
    let libraries = legacy_libraries_for(minecraft_version);
    if libraries.is_empty() {
        return Ok(());
    }

    info!(
        "Installing {} legacy libraries for Minecraft {}",
        libraries.len(),
        minecraft_version
    );
    let lib_dir = game_dir.join("lib");
    tokio::fs::create_dir_all(&lib_dir)
        .await
        .map_err(|e| LauncherError::io(&lib_dir, e))?;

    for legacy in libraries {
        cancel.ensure_active()?;

        let entry = LibraryEntry {
            name: MavenArtifact::parse(legacy.coordinate)?,
            url: None,
            downloads: None,
            rules: None,
        };
        let source = match resolver.ensure_present(&entry, None).await {
            Ok(path) => path,
            Err(e) => {
                warn!("Legacy library {} unavailable: {}", legacy.coordinate, e);
                continue;
            }
        };

        let target = lib_dir.join(legacy.file_name);
        if target.exists() && file_sha1(&target).await? == file_sha1(&source).await? {
            continue;
        }
        tokio::fs::copy(&source, &target)
            .await
            .map_err(|e| LauncherError::io(&target, e))?;
    }

    Ok(())
}
