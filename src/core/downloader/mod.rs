mod client;

pub use client::{file_sha1, sha1_matches, ArtifactDownloader, HttpDownloader};
