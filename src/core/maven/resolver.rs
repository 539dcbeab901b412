use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::artifact::{posix_to_path, MavenArtifact};
use crate::core::downloader::{file_sha1, sha1_matches, ArtifactDownloader};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::version::LibraryEntry;

/// Makes declared libraries present and hash-valid under a libraries root.
pub struct LibraryResolver<'a> {
    libs_dir: &'a Path,
    downloader: &'a dyn ArtifactDownloader,
    /// Ordered list of repository base URLs tried for coordinate-only libraries.
    repositories: &'a [String],
}

impl<'a> LibraryResolver<'a> {
    pub fn new(
        libs_dir: &'a Path,
        downloader: &'a dyn ArtifactDownloader,
        repositories: &'a [String],
    ) -> Self {
        Self {
            libs_dir,
            downloader,
            repositories,
        }
    }

    /// Where `artifact` lives under the libraries root. No I/O.
    pub fn resolve(&self, artifact: &MavenArtifact) -> PathBuf {
        artifact.resolve(self.libs_dir)
    }

    /// Ensure `library` exists on disk with the declared hash.
    ///
    /// `installer_root` is the unpacked installer, consulted for artifacts
    /// declared with an empty URL.
    pub async fn ensure_present(
        &self,
        library: &LibraryEntry,
        installer_root: Option<&Path>,
    ) -> LauncherResult<PathBuf> {
        let artifact = library.artifact();
        let relative = artifact
            .and_then(|a| a.path.clone())
            .unwrap_or_else(|| library.name.relative_path());
        let target = self.libs_dir.join(posix_to_path(&relative));
        let sha1 = artifact.and_then(|a| a.sha1.as_deref());

        if target.exists() {
            match sha1 {
                None => return Ok(target),
                Some(expected) if sha1_matches(&target, expected).await? => return Ok(target),
                Some(expected) => {
                    warn!(
                        "Library {} has a bad hash (expected {}), re-acquiring",
                        library.name, expected
                    );
                    tokio::fs::remove_file(&target)
                        .await
                        .map_err(|e| LauncherError::io(&target, e))?;
                }
            }
        }

        let acquired = match artifact {
            Some(a) if !a.url.is_empty() => {
                self.downloader
                    .download_file(&a.url, &target, sha1)
                    .await
            }
            Some(_) => {
                self.copy_from_installer(library, &relative, &target, sha1, installer_root)
                    .await
            }
            None => self.try_repositories(library, &target).await,
        };
        acquired.map_err(|e| unavailable(library, e))?;

        debug!("Library ready: {} -> {:?}", library.name, target);
        Ok(target)
    }

    /// Artifacts bundled under `maven/<path>` inside the installer archive.
    async fn copy_from_installer(
        &self,
        library: &LibraryEntry,
        relative: &str,
        target: &Path,
        sha1: Option<&str>,
        installer_root: Option<&Path>,
    ) -> LauncherResult<()> {
        let unavailable = |reason: String| LauncherError::ArtifactUnavailable {
            coordinate: library.name.to_string(),
            reason,
        };

        let root = installer_root
            .ok_or_else(|| unavailable("no download URL and no installer archive".into()))?;
        let source = root.join("maven").join(posix_to_path(relative));
        if !source.is_file() {
            return Err(unavailable(format!(
                "not bundled in installer at maven/{}",
                relative
            )));
        }

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LauncherError::io(parent, e))?;
        }
        tokio::fs::copy(&source, target)
            .await
            .map_err(|e| LauncherError::io(target, e))?;

        if let Some(expected) = sha1 {
            let actual = file_sha1(target).await?;
            if !actual.eq_ignore_ascii_case(expected) {
                if let Err(e) = tokio::fs::remove_file(target).await {
                    warn!("Could not remove corrupt copy {:?}: {}", target, e);
                }
                return Err(LauncherError::Sha1Mismatch {
                    path: target.to_path_buf(),
                    expected: expected.to_string(),
                    actual,
                });
            }
        }
        Ok(())
    }

    /// Try the library's own repository, then each configured one, until a
    /// download succeeds.
    async fn try_repositories(&self, library: &LibraryEntry, dest: &Path) -> LauncherResult<()> {
        let mut last_err: Option<LauncherError> = None;

        let repos = library
            .url
            .iter()
            .filter(|u| !u.is_empty())
            .chain(self.repositories.iter());

        for repo in repos {
            let url = library.name.url(repo);
            match self.downloader.download_file(&url, dest, None).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    debug!("Repository {} failed for {}: {}", repo, library.name, e);
                    last_err = Some(e);
                }
            }
        }

        Err(LauncherError::ArtifactUnavailable {
            coordinate: library.name.to_string(),
            reason: match last_err {
                Some(e) => e.to_string(),
                None => "no repositories configured".into(),
            },
        })
    }
}

/// Every way of failing to acquire a library surfaces as
/// `ArtifactUnavailable`; cancellation still unwinds as itself.
fn unavailable(library: &LibraryEntry, err: LauncherError) -> LauncherError {
    match err {
        LauncherError::Cancelled | LauncherError::ArtifactUnavailable { .. } => err,
        other => {
            warn!("Library {} could not be acquired: {}", library.name, other);
            LauncherError::ArtifactUnavailable {
                coordinate: library.name.to_string(),
                reason: other.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    const HELLO_SHA1: &str = "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d";

    /// Serves bytes from a URL map and records every request.
    #[derive(Default)]
    struct MapDownloader {
        files: HashMap<String, Vec<u8>>,
        requests: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ArtifactDownloader for MapDownloader {
        async fn download_file(
            &self,
            url: &str,
            dest: &Path,
            _sha1_expected: Option<&str>,
        ) -> LauncherResult<()> {
            self.requests.lock().unwrap().push(url.to_string());
            let body = self.files.get(url).ok_or_else(|| LauncherError::DownloadFailed {
                url: url.to_string(),
                status: 404,
            })?;
            std::fs::create_dir_all(dest.parent().unwrap()).unwrap();
            std::fs::write(dest, body).unwrap();
            Ok(())
        }
    }

    fn library(json: &str) -> LibraryEntry {
        serde_json::from_str(json).unwrap()
    }

    #[tokio::test]
    async fn present_file_with_matching_hash_is_not_downloaded() {
        let libs = tempfile::tempdir().unwrap();
        let target = libs.path().join("a/b/1/b-1.jar");
        std::fs::create_dir_all(target.parent().unwrap()).unwrap();
        std::fs::write(&target, "hello").unwrap();

        let downloader = MapDownloader::default();
        let repos: Vec<String> = vec![];
        let resolver = LibraryResolver::new(libs.path(), &downloader, &repos);
        let lib = library(&format!(
            r#"{{"name":"a:b:1","downloads":{{"artifact":{{"path":"a/b/1/b-1.jar","sha1":"{}","url":"https://x/b.jar"}}}}}}"#,
            HELLO_SHA1
        ));

        assert_eq!(resolver.ensure_present(&lib, None).await.unwrap(), target);
        assert!(downloader.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn corrupt_file_is_replaced() {
        let libs = tempfile::tempdir().unwrap();
        let target = libs.path().join("a/b/1/b-1.jar");
        std::fs::create_dir_all(target.parent().unwrap()).unwrap();
        std::fs::write(&target, "garbage").unwrap();

        let mut downloader = MapDownloader::default();
        downloader
            .files
            .insert("https://x/b.jar".into(), b"hello".to_vec());
        let repos: Vec<String> = vec![];
        let resolver = LibraryResolver::new(libs.path(), &downloader, &repos);
        let lib = library(&format!(
            r#"{{"name":"a:b:1","downloads":{{"artifact":{{"path":"a/b/1/b-1.jar","sha1":"{}","url":"https://x/b.jar"}}}}}}"#,
            HELLO_SHA1
        ));

        resolver.ensure_present(&lib, None).await.unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"hello");
    }

    #[tokio::test]
    async fn empty_url_copies_from_installer() {
        let libs = tempfile::tempdir().unwrap();
        let installer = tempfile::tempdir().unwrap();
        let bundled = installer.path().join("maven/net/forge/forge/1/forge-1.jar");
        std::fs::create_dir_all(bundled.parent().unwrap()).unwrap();
        std::fs::write(&bundled, "hello").unwrap();

        let downloader = MapDownloader::default();
        let repos: Vec<String> = vec![];
        let resolver = LibraryResolver::new(libs.path(), &downloader, &repos);
        let lib = library(&format!(
            r#"{{"name":"net.forge:forge:1","downloads":{{"artifact":{{"path":"net/forge/forge/1/forge-1.jar","sha1":"{}","url":""}}}}}}"#,
            HELLO_SHA1
        ));

        let path = resolver
            .ensure_present(&lib, Some(installer.path()))
            .await
            .unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"hello");
    }

    #[tokio::test]
    async fn coordinate_only_library_walks_repositories_in_order() {
        let libs = tempfile::tempdir().unwrap();
        let mut downloader = MapDownloader::default();
        downloader.files.insert(
            "https://second/org/ex/lib/2/lib-2.jar".into(),
            b"jar".to_vec(),
        );
        let repos = vec!["https://first".to_string(), "https://second".to_string()];
        let resolver = LibraryResolver::new(libs.path(), &downloader, &repos);
        let lib = library(r#"{"name":"org.ex:lib:2"}"#);

        let path = resolver.ensure_present(&lib, None).await.unwrap();
        assert_eq!(path, libs.path().join("org/ex/lib/2/lib-2.jar"));
        assert_eq!(
            *downloader.requests.lock().unwrap(),
            vec![
                "https://first/org/ex/lib/2/lib-2.jar".to_string(),
                "https://second/org/ex/lib/2/lib-2.jar".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn unreachable_library_is_artifact_unavailable() {
        let libs = tempfile::tempdir().unwrap();
        let downloader = MapDownloader::default();
        let repos = vec!["https://nowhere".to_string()];
        let resolver = LibraryResolver::new(libs.path(), &downloader, &repos);

        let err = resolver
            .ensure_present(&library(r#"{"name":"org.ex:gone:1"}"#), None)
            .await
            .unwrap_err();
        assert!(matches!(err, LauncherError::ArtifactUnavailable { .. }));

        let err = resolver
            .ensure_present(
                &library(r#"{"name":"org.ex:bundled:1","downloads":{"artifact":{"url":""}}}"#),
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LauncherError::ArtifactUnavailable { .. }));
    }

    #[tokio::test]
    async fn failed_download_of_declared_url_is_artifact_unavailable() {
        let libs = tempfile::tempdir().unwrap();
        let downloader = MapDownloader::default();
        let repos: Vec<String> = vec![];
        let resolver = LibraryResolver::new(libs.path(), &downloader, &repos);
        let lib = library(
            r#"{"name":"a:b:1","downloads":{"artifact":{"path":"a/b/1/b-1.jar","url":"https://x/b.jar"}}}"#,
        );

        let err = resolver.ensure_present(&lib, None).await.unwrap_err();
        match err {
            LauncherError::ArtifactUnavailable { coordinate, reason } => {
                assert_eq!(coordinate, "a:b:1");
                assert!(reason.contains("https://x/b.jar"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn corrupt_bundled_library_is_artifact_unavailable() {
        let libs = tempfile::tempdir().unwrap();
        let installer = tempfile::tempdir().unwrap();
        let bundled = installer.path().join("maven/net/forge/forge/1/forge-1.jar");
        std::fs::create_dir_all(bundled.parent().unwrap()).unwrap();
        std::fs::write(&bundled, "not hello").unwrap();

        let downloader = MapDownloader::default();
        let repos: Vec<String> = vec![];
        let resolver = LibraryResolver::new(libs.path(), &downloader, &repos);
        let lib = library(&format!(
            r#"{{"name":"net.forge:forge:1","downloads":{{"artifact":{{"path":"net/forge/forge/1/forge-1.jar","sha1":"{}","url":""}}}}}}"#,
            HELLO_SHA1
        ));

        let err = resolver
            .ensure_present(&lib, Some(installer.path()))
            .await
            .unwrap_err();
        assert!(matches!(err, LauncherError::ArtifactUnavailable { .. }));
        assert!(!libs.path().join("net/forge/forge/1/forge-1.jar").exists());
    }
}
