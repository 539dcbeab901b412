// ─── Forge-style installer pipeline ───
// Unpack installer → manifests → version descriptor → vanilla base →
// libraries → Java → processors → legacy libraries.

pub mod archive;
pub mod install_profile;
pub mod mojmaps;
pub mod outputs;
pub mod processor;
pub mod tokens;

use std::collections::HashSet;
use std::path::Path;

use futures_util::stream::{self, TryStreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::instance::Instance;
use crate::core::java::{java_executable, JdkRequest};
use crate::core::maven::legacy::install_legacy_libraries;
use crate::core::state::AppContext;
use crate::core::task::{into_outcome, CancelExt, InstallOutcome, ProgressListener};
use crate::core::version::{LibraryEntry, VersionManifest};

use super::context::InstallContext;
use super::vanilla::{client_jar_path, download_vanilla};
use archive::InstallerArchive;
use install_profile::InstallManifest;
use processor::{run_processor, ProcessorOutcome};
use tokens::{build_data_map, DataEnvironment};

pub use install_profile::{DataEntry, Processor};

/// Install a Forge-style loader into `instance` from `installer_path`.
///
/// Returns `Ok(InstallOutcome::Cancelled)` when `cancel` fires; every other
/// way of stopping early is an error.
pub async fn install_forge_like(
    app: &AppContext,
    instance: &Instance,
    installer_path: &Path,
    cancel: &CancellationToken,
    progress: &dyn ProgressListener,
) -> LauncherResult<InstallOutcome> {
    let libs_dir = app.libraries_dir();
    let versions_dir = app.versions_dir();
    let ctx = InstallContext {
        instance,
        root: &app.data_dir,
        libs_dir: &libs_dir,
        versions_dir: &versions_dir,
        installer_path,
        downloader: app.downloader.as_ref(),
        settings: &app.settings,
        cancel,
        progress,
    };

    let outcome = into_outcome(run_pipeline(app, &ctx).await)?;
    if outcome == InstallOutcome::Cancelled {
        info!("Installation into {:?} cancelled", instance.path);
    }
    Ok(outcome)
}

#[instrument(skip_all, fields(instance = %ctx.instance.name))]
async fn run_pipeline(app: &AppContext, ctx: &InstallContext<'_>) -> LauncherResult<()> {
    ctx.cancel.ensure_active()?;
    ctx.progress.on_progress("Unpacking installer");
    let archive = InstallerArchive::unpack(ctx.installer_path).await?;

    let profile_raw = archive.read("install_profile.json").await?;
    let profile = InstallManifest::parse(&profile_raw, "install_profile.json")?;
    let descriptor_raw = archive.read(&profile.json).await?;
    let forge_manifest = VersionManifest::parse(&descriptor_raw, &profile.json)?;
    info!(
        "Installing {} for Minecraft {}",
        profile.version, profile.minecraft
    );

    ctx.cancel.ensure_active()?;
    ctx.progress
        .on_progress(&format!("Installing version {}", profile.version));
    install_descriptor(ctx, &profile.version, &descriptor_raw).await?;

    ctx.cancel.ensure_active()?;
    ctx.progress
        .on_progress(&format!("Preparing Minecraft {}", profile.minecraft));
    let vanilla = download_vanilla(ctx, &profile.minecraft).await?;

    ctx.cancel.ensure_active()?;
    resolve_libraries(ctx, &archive, &forge_manifest, &profile).await?;

    ctx.cancel.ensure_active()?;
    let major = ctx
        .instance
        .required_java_major
        .unwrap_or_else(|| vanilla.required_java_major());
    ctx.progress
        .on_progress(&format!("Provisioning Java {}", major));
    let java_home = app
        .jdk_provisioner
        .provision_jdk(
            &JdkRequest {
                major,
                require_compiler: true,
            },
            ctx.progress,
        )
        .await?;
    let java = java_executable(&java_home);

    let minecraft_jar = client_jar_path(ctx, &vanilla.id);
    let data = build_data_map(
        &profile.data,
        &archive,
        &DataEnvironment {
            minecraft_jar: &minecraft_jar,
            minecraft_version: &vanilla.id,
            root: ctx.root,
            installer: ctx.installer_path,
            libs_dir: ctx.libs_dir,
        },
    )
    .await?;

    let applicable: Vec<&Processor> = profile
        .processors
        .iter()
        .filter(|p| p.runs_on_client())
        .collect();
    for (index, processor) in applicable.iter().enumerate() {
        ctx.cancel.ensure_active()?;
        ctx.progress.on_progress(&format!(
            "Processor {}/{}: {}",
            index + 1,
            applicable.len(),
            processor.jar
        ));
        let outcome = run_processor(ctx, processor, &data, &vanilla, &java).await?;
        if outcome == ProcessorOutcome::Skipped {
            ctx.progress
                .on_progress(&format!("Processor {} already up to date", processor.jar));
        }
    }

    ctx.cancel.ensure_active()?;
    install_legacy_libraries(
        &ctx.resolver(),
        &ctx.instance.game_dir(),
        &profile.minecraft,
        ctx.cancel,
    )
    .await?;

    ctx.progress
        .on_progress(&format!("Installed {}", profile.version));
    info!("{} installed successfully", profile.version);
    Ok(())
}

/// Copy the embedded descriptor to `versions/<id>/<id>.json` unchanged.
async fn install_descriptor(
    ctx: &InstallContext<'_>,
    version: &str,
    raw: &[u8],
) -> LauncherResult<()> {
    let dir = ctx.versions_dir.join(version);
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| LauncherError::io(&dir, e))?;
    let path = dir.join(format!("{}.json", version));
    tokio::fs::write(&path, raw)
        .await
        .map_err(|e| LauncherError::io(&path, e))
}

/// Resolve the forge-declared then installer-declared libraries,
/// first declaration of a coordinate winning.
async fn resolve_libraries(
    ctx: &InstallContext<'_>,
    archive: &InstallerArchive,
    forge_manifest: &VersionManifest,
    profile: &InstallManifest,
) -> LauncherResult<()> {
    let mut seen = HashSet::new();
    let libraries: Vec<&LibraryEntry> = forge_manifest
        .libraries
        .iter()
        .chain(profile.libraries.iter())
        .filter(|lib| lib.is_allowed_for_current_os())
        .filter(|lib| seen.insert(lib.name.to_string()))
        .collect();

    ctx.progress
        .on_progress(&format!("Resolving {} libraries", libraries.len()));

    let resolver = ctx.resolver();
    let resolver = &resolver;
    let installer_root = archive.root();
    let installer_root = installer_root.as_path();
    stream::iter(libraries.into_iter().map(Ok::<_, LauncherError>))
        .try_for_each_concurrent(
            ctx.settings.library_concurrency.max(1),
            move |library| async move {
                ctx.cancel.ensure_active()?;
                resolver
                    .ensure_present(library, Some(installer_root))
                    .await
                    .map(|_| ())
            },
        )
        .await
}
