use std::path::Path;

use tokio_util::sync::CancellationToken;

use crate::core::downloader::ArtifactDownloader;
use crate::core::instance::Instance;
use crate::core::maven::LibraryResolver;
use crate::core::state::LauncherSettings;
use crate::core::task::ProgressListener;

/// Everything one installation run borrows from the application.
pub struct InstallContext<'a> {
    pub instance: &'a Instance,
    /// Working directory of every processor; exposed to them as `{ROOT}`.
    pub root: &'a Path,
    pub libs_dir: &'a Path,
    pub versions_dir: &'a Path,
    pub installer_path: &'a Path,
    pub downloader: &'a dyn ArtifactDownloader,
    pub settings: &'a LauncherSettings,
    pub cancel: &'a CancellationToken,
    pub progress: &'a dyn ProgressListener,
}

impl<'a> InstallContext<'a> {
    pub fn resolver(&self) -> LibraryResolver<'a> {
        LibraryResolver::new(
            self.libs_dir,
            self.downloader,
            &self.settings.maven_repositories,
        )
    }
}
