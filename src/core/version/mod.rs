pub mod manifest;
pub mod version_file;

pub use manifest::{VersionEntry, VersionIndex, VERSION_MANIFEST_URL};
pub use version_file::{
    DownloadArtifact, JavaVersionInfo, LibDownloadArtifact, LibraryDownloads, LibraryEntry,
    LibraryRule, OsRule, RuleAction, VersionManifest, DEFAULT_JAVA_MAJOR,
};
