// ─── Token substitution ───
// `data` values and processor arguments are classified once into tagged
// values, then expanded against the run's data map.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::maven::MavenArtifact;

use super::archive::InstallerArchive;
use super::install_profile::DataEntry;

/// Client value of a `data` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataValue {
    /// `[group:artifact:version]`, a library path.
    Coordinate(MavenArtifact),
    /// `'text'`, used verbatim.
    Literal(String),
    /// Anything else: a file inside the installer archive.
    ArchivePath(String),
}

/// A processor argument or output expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgValue {
    Coordinate(MavenArtifact),
    Template(String),
}

fn surrounded_by(raw: &str, open: char, close: char) -> Option<&str> {
    if raw.len() >= 2 && raw.starts_with(open) && raw.ends_with(close) {
        Some(&raw[open.len_utf8()..raw.len() - close.len_utf8()])
    } else {
        None
    }
}

impl DataValue {
    pub fn parse(raw: &str) -> LauncherResult<Self> {
        if let Some(coord) = surrounded_by(raw, '[', ']') {
            Ok(Self::Coordinate(MavenArtifact::parse(coord)?))
        } else if let Some(literal) = surrounded_by(raw, '\'', '\'') {
            Ok(Self::Literal(literal.to_string()))
        } else {
            Ok(Self::ArchivePath(raw.to_string()))
        }
    }
}

impl ArgValue {
    pub fn parse(raw: &str) -> LauncherResult<Self> {
        match surrounded_by(raw, '[', ']') {
            Some(coord) => Ok(Self::Coordinate(MavenArtifact::parse(coord)?)),
            None => Ok(Self::Template(raw.to_string())),
        }
    }

    /// Resolve to the final string handed to a processor.
    pub fn resolve(&self, data: &HashMap<String, String>, libs_dir: &Path) -> LauncherResult<String> {
        match self {
            Self::Coordinate(artifact) => Ok(path_string(&artifact.resolve(libs_dir))),
            Self::Template(template) => expand(template, data),
        }
    }
}

/// Parse and resolve a raw argument in one go.
pub fn resolve_arg(
    raw: &str,
    data: &HashMap<String, String>,
    libs_dir: &Path,
) -> LauncherResult<String> {
    ArgValue::parse(raw)?.resolve(data, libs_dir)
}

/// Expand `{KEY}` references in `template`.
///
/// `\x` emits `x`, `'...'` emits its contents without substitution, and an
/// unknown key fails instead of passing through.
pub fn expand(template: &str, data: &HashMap<String, String>) -> LauncherResult<String> {
    let malformed = |what: &str| {
        LauncherError::manifest("processor arguments", format!("{what} in {template:?}"))
    };

    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(escaped) => out.push(escaped),
                None => return Err(malformed("trailing escape")),
            },
            '{' => {
                let mut key = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(k) => key.push(k),
                        None => return Err(malformed("unclosed '{'")),
                    }
                }
                let value = data.get(&key).ok_or_else(|| LauncherError::UnknownToken {
                    key: key.clone(),
                    template: template.to_string(),
                })?;
                out.push_str(value);
            }
            '\'' => loop {
                match chars.next() {
                    Some('\'') => break,
                    Some(l) => out.push(l),
                    None => return Err(malformed("unclosed quote")),
                }
            },
            other => out.push(other),
        }
    }

    Ok(out)
}

/// Keys every run adds on top of the manifest's `data`.
pub struct DataEnvironment<'a> {
    pub minecraft_jar: &'a Path,
    pub minecraft_version: &'a str,
    pub root: &'a Path,
    pub installer: &'a Path,
    pub libs_dir: &'a Path,
}

/// Build the substitution map for one run. Environment keys win over
/// manifest entries of the same name.
pub async fn build_data_map(
    entries: &BTreeMap<String, DataEntry>,
    archive: &InstallerArchive,
    env: &DataEnvironment<'_>,
) -> LauncherResult<HashMap<String, String>> {
    let mut data = HashMap::with_capacity(entries.len() + 6);

    for (key, entry) in entries {
        let value = match DataValue::parse(&entry.client)? {
            DataValue::Coordinate(artifact) => path_string(&artifact.resolve(env.libs_dir)),
            DataValue::Literal(text) => text,
            DataValue::ArchivePath(path) => path_string(&archive.extract_entry(&path).await?),
        };
        data.insert(key.clone(), value);
    }

    data.insert("SIDE".into(), "client".into());
    data.insert("MINECRAFT_JAR".into(), path_string(env.minecraft_jar));
    data.insert("MINECRAFT_VERSION".into(), env.minecraft_version.to_string());
    data.insert("ROOT".into(), path_string(env.root));
    data.insert("INSTALLER".into(), path_string(env.installer));
    data.insert("LIBRARY_DIR".into(), path_string(env.libs_dir));

    Ok(data)
}

pub fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
