use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::debug;

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::maven::posix_to_path;

/// An installer archive unpacked into a per-run temporary directory.
///
/// The directory, and every data file extracted from it, is removed when this
/// value is dropped.
pub struct InstallerArchive {
    temp: TempDir,
    source: PathBuf,
}

impl InstallerArchive {
    pub async fn unpack(installer_path: &Path) -> LauncherResult<Self> {
        let source = installer_path.to_path_buf();
        tokio::task::spawn_blocking(move || Self::unpack_blocking(source))
            .await
            .map_err(|e| LauncherError::Other(format!("Installer unpack task failed: {e}")))?
    }

    fn unpack_blocking(source: PathBuf) -> LauncherResult<Self> {
        let temp = tempfile::Builder::new()
            .prefix("forge_installer_")
            .tempdir()
            .map_err(|e| LauncherError::io(std::env::temp_dir(), e))?;

        let file = std::fs::File::open(&source).map_err(|e| LauncherError::io(&source, e))?;
        let mut zip = zip::ZipArchive::new(file)?;
        let root = temp.path().join("installer");
        zip.extract(&root)?;

        debug!(
            "Unpacked {:?} ({} entries) into {:?}",
            source,
            zip.len(),
            root
        );
        Ok(Self { temp, source })
    }

    /// Root of the unpacked archive contents.
    pub fn root(&self) -> PathBuf {
        self.temp.path().join("installer")
    }

    /// Path of an archive entry such as `/data/client.lzma` on disk.
    pub fn entry_path(&self, entry: &str) -> PathBuf {
        self.root().join(posix_to_path(entry.trim_start_matches('/')))
    }

    pub async fn read(&self, entry: &str) -> LauncherResult<Vec<u8>> {
        let path = self.entry_path(entry);
        if !path.is_file() {
            return Err(LauncherError::manifest(
                self.source.display().to_string(),
                format!("installer has no entry {entry}"),
            ));
        }
        tokio::fs::read(&path)
            .await
            .map_err(|e| LauncherError::io(&path, e))
    }

    /// Copy an archive entry into the run's scratch area, keeping its
    /// archive-relative layout, and return the absolute copy.
    pub async fn extract_entry(&self, entry: &str) -> LauncherResult<PathBuf> {
        let relative = entry.trim_start_matches('/');
        let source = self.entry_path(relative);
        if !source.is_file() {
            return Err(LauncherError::manifest(
                self.source.display().to_string(),
                format!("data entry {entry} is not in the installer"),
            ));
        }

        let target = self
            .temp
            .path()
            .join("extracted")
            .join(posix_to_path(relative));
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LauncherError::io(parent, e))?;
        }
        tokio::fs::copy(&source, &target)
            .await
            .map_err(|e| LauncherError::io(&target, e))?;
        Ok(target)
    }
}
