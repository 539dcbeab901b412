use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::core::error::{LauncherError, LauncherResult};

/// Represents a fully parsed Maven coordinate.
///
/// Supported formats:
///   `groupId:artifactId:version`
///   `groupId:artifactId:version:classifier`
///   `groupId:artifactId:version:classifier@extension`
///   `groupId:artifactId:version@extension`
///
/// Serialized as its canonical string so manifests can hold it directly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct MavenArtifact {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    pub classifier: Option<String>,
    /// Explicit `@extension`; `None` means `jar`.
    pub extension: Option<String>,
}

impl MavenArtifact {
    /// Parse a Maven coordinate string.
    ///
    /// # Examples
    /// ```
    /// use interface_installer::core::maven::MavenArtifact;
    /// let a = MavenArtifact::parse("net.sf.jopt-simple:jopt-simple:5.0.4").unwrap();
    /// assert_eq!(a.group_id, "net.sf.jopt-simple");
    /// ```
    pub fn parse(coord: &str) -> LauncherResult<Self> {
        let invalid = || LauncherError::InvalidMavenCoordinate(coord.to_string());

        // Split off @extension first
        let (coord_part, extension) = match coord.rsplit_once('@') {
            Some((head, ext)) if !ext.is_empty() => (head, Some(ext.to_string())),
            Some(_) => return Err(invalid()),
            None => (coord, None),
        };

        let parts: Vec<&str> = coord_part.split(':').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(invalid());
        }

        match parts.as_slice() {
            [group, artifact, version] => Ok(Self {
                group_id: group.to_string(),
                artifact_id: artifact.to_string(),
                version: version.to_string(),
                classifier: None,
                extension,
            }),
            [group, artifact, version, classifier] => Ok(Self {
                group_id: group.to_string(),
                artifact_id: artifact.to_string(),
                version: version.to_string(),
                classifier: Some(classifier.to_string()),
                extension,
            }),
            _ => Err(invalid()),
        }
    }

    pub fn extension(&self) -> &str {
        self.extension.as_deref().unwrap_or("jar")
    }

    /// Construct the group path portion (`net/sf/jopt-simple`).
    pub fn group_path(&self) -> String {
        self.group_id.replace('.', "/")
    }

    /// Build the artifact filename.
    ///
    /// `artifactId-version[-classifier].extension`
    pub fn filename(&self) -> String {
        match &self.classifier {
            Some(c) => format!(
                "{}-{}-{}.{}",
                self.artifact_id,
                self.version,
                c,
                self.extension()
            ),
            None => format!("{}-{}.{}", self.artifact_id, self.version, self.extension()),
        }
    }

    /// POSIX-style path relative to a libraries root. Independent of the host
    /// platform.
    ///
    /// `<group_path>/<artifact_id>/<version>/<filename>`
    pub fn relative_path(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.group_path(),
            self.artifact_id,
            self.version,
            self.filename()
        )
    }

    /// Construct the full URL for this artifact under the given repository base.
    pub fn url(&self, repo_base: &str) -> String {
        format!(
            "{}/{}",
            repo_base.trim_end_matches('/'),
            self.relative_path()
        )
    }

    /// Platform path relative to the libraries directory.
    pub fn local_path(&self) -> PathBuf {
        posix_to_path(&self.relative_path())
    }

    /// Absolute location of this artifact under `libraries_root`. Pure.
    pub fn resolve(&self, libraries_root: &Path) -> PathBuf {
        libraries_root.join(self.local_path())
    }
}

/// Join the segments of a forward-slash path into a platform path.
pub fn posix_to_path(relative: &str) -> PathBuf {
    relative
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect()
}

impl fmt::Display for MavenArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group_id, self.artifact_id, self.version)?;
        if let Some(c) = &self.classifier {
            write!(f, ":{}", c)?;
        }
        if let Some(ext) = &self.extension {
            write!(f, "@{}", ext)?;
        }
        Ok(())
    }
}

impl TryFrom<String> for MavenArtifact {
    type Error = LauncherError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<MavenArtifact> for String {
    fn from(value: MavenArtifact) -> Self {
        value.to_string()
    }
}
