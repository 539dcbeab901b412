use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::core::downloader::file_sha1;
use crate::core::error::{LauncherError, LauncherResult};

use super::tokens::{expand, ArgValue};

/// One declared processor output after token expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredOutput {
    pub path: PathBuf,
    pub expected_sha1: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheResult {
    /// Every declared output existed and matched. Always `false` for an
    /// empty declaration.
    pub valid: bool,
    pub failures: Vec<PathBuf>,
}

/// Expand a processor's `outputs` map into concrete paths and hashes.
pub fn declared_outputs(
    outputs: &BTreeMap<String, String>,
    data: &HashMap<String, String>,
    libs_dir: &Path,
) -> LauncherResult<Vec<DeclaredOutput>> {
    outputs
        .iter()
        .map(|(key, value)| {
            Ok(DeclaredOutput {
                path: PathBuf::from(ArgValue::parse(key)?.resolve(data, libs_dir)?),
                expected_sha1: expand(value, data)?,
            })
        })
        .collect()
}

/// Check every declared output against its hash.
///
/// Mismatching files are deleted so a later run cannot reuse them. Every
/// entry is checked so that all failures get logged.
pub async fn check_cached(outputs: &[DeclaredOutput]) -> LauncherResult<CacheResult> {
    let mut failures = Vec::new();

    for output in outputs {
        if !output.path.exists() {
            info!("Output {:?} does not exist", output.path);
            failures.push(output.path.clone());
            continue;
        }

        let actual = file_sha1(&output.path).await?;
        if actual.eq_ignore_ascii_case(&output.expected_sha1) {
            info!("Output {:?} validated: {}", output.path, actual);
            continue;
        }

        warn!("Output {:?} failed to validate, deleting it", output.path);
        warn!(" Expected: {}", output.expected_sha1);
        warn!(" Got     : {}", actual);
        tokio::fs::remove_file(&output.path)
            .await
            .map_err(|e| LauncherError::io(&output.path, e))?;
        failures.push(output.path.clone());
    }

    Ok(CacheResult {
        valid: !outputs.is_empty() && failures.is_empty(),
        failures,
    })
}
