use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use sha1::{Digest, Sha1};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::debug;

use crate::core::error::{LauncherError, LauncherResult};

/// Fetches a URL to a path, optionally validating SHA-1.
///
/// Implementations create parent directories and must never leave a file at
/// `dest` whose hash does not match `sha1_expected`.
#[async_trait]
pub trait ArtifactDownloader: Send + Sync {
    async fn download_file(
        &self,
        url: &str,
        dest: &Path,
        sha1_expected: Option<&str>,
    ) -> LauncherResult<()>;
}

/// SHA-1 validated downloader on top of the shared (proxy-aware) client.
pub struct HttpDownloader {
    client: Client,
}

impl HttpDownloader {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ArtifactDownloader for HttpDownloader {
    /// Stream `url` into `<dest>.part`, hashing as it goes, then rename into
    /// place once the hash checks out.
    async fn download_file(
        &self,
        url: &str,
        dest: &Path,
        sha1_expected: Option<&str>,
    ) -> LauncherResult<()> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LauncherError::io(parent, e))?;
        }

        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LauncherError::DownloadFailed {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let partial = partial_path(dest);
        let mut hasher = Sha1::new();
        {
            let mut file = tokio::fs::File::create(&partial)
                .await
                .map_err(|e| LauncherError::io(&partial, e))?;
            let mut body = response.bytes_stream();
            while let Some(chunk) = body.next().await {
                let chunk = chunk?;
                hasher.update(&chunk);
                file.write_all(&chunk)
                    .await
                    .map_err(|e| LauncherError::io(&partial, e))?;
            }
            file.flush()
                .await
                .map_err(|e| LauncherError::io(&partial, e))?;
            // handle dropped here so the rename below works on Windows
        }

        if let Some(expected) = sha1_expected {
            let actual = hex::encode(hasher.finalize());
            if !actual.eq_ignore_ascii_case(expected) {
                let _ = tokio::fs::remove_file(&partial).await;
                return Err(LauncherError::Sha1Mismatch {
                    path: dest.to_path_buf(),
                    expected: expected.to_string(),
                    actual,
                });
            }
        }

        tokio::fs::rename(&partial, dest)
            .await
            .map_err(|e| LauncherError::io(dest, e))?;

        debug!("Downloaded: {} -> {:?}", url, dest);
        Ok(())
    }
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

/// Hex SHA-1 of a file on disk, read in chunks.
pub async fn file_sha1(path: &Path) -> LauncherResult<String> {
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| LauncherError::io(path, e))?;
    let mut hasher = Sha1::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = file
            .read(&mut buf)
            .await
            .map_err(|e| LauncherError::io(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// `true` when `path` exists and its SHA-1 equals `expected` (case-insensitive).
pub async fn sha1_matches(path: &Path, expected: &str) -> LauncherResult<bool> {
    Ok(file_sha1(path).await?.eq_ignore_ascii_case(expected))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO_SHA1: &str = "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d";

    #[tokio::test]
    async fn file_sha1_matches_known_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.txt");
        std::fs::write(&path, b"hello").unwrap();

        assert_eq!(file_sha1(&path).await.unwrap(), HELLO_SHA1);
        assert!(sha1_matches(&path, &HELLO_SHA1.to_uppercase()).await.unwrap());
    }

    #[tokio::test]
    async fn downloads_and_validates_hash() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/lib.jar")
            .with_status(200)
            .with_body("hello")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("nested/lib.jar");
        let downloader = HttpDownloader::new(Client::new());
        downloader
            .download_file(&format!("{}/lib.jar", server.url()), &dest, Some(HELLO_SHA1))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(std::fs::read(&dest).unwrap(), b"hello");
        assert!(!partial_path(&dest).exists());
    }

    #[tokio::test]
    async fn hash_mismatch_leaves_nothing_behind() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/lib.jar")
            .with_status(200)
            .with_body("corrupt")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("lib.jar");
        let downloader = HttpDownloader::new(Client::new());
        let err = downloader
            .download_file(&format!("{}/lib.jar", server.url()), &dest, Some(HELLO_SHA1))
            .await
            .unwrap_err();

        assert!(matches!(err, LauncherError::Sha1Mismatch { .. }));
        assert!(!dest.exists());
        assert!(!partial_path(&dest).exists());
    }

    #[tokio::test]
    async fn http_error_status_is_reported() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/missing.jar")
            .with_status(404)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let downloader = HttpDownloader::new(Client::new());
        let err = downloader
            .download_file(
                &format!("{}/missing.jar", server.url()),
                &dir.path().join("missing.jar"),
                None,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, LauncherError::DownloadFailed { status: 404, .. }));
    }
}
