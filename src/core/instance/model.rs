use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::core::error::{LauncherError, LauncherResult};

const INSTANCE_FILE: &str = "instance.json";

/// Lifecycle state of an instance.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InstanceState {
    /// Instance metadata exists but no loader has been installed.
    Created,
    /// Currently installing.
    Installing,
    /// Loader installed.
    Ready,
    /// Something went wrong during install.
    Error,
}

/// Instance representation persisted to disk as `instance.json`.
///
/// The instance folder holds:
/// - `minecraft/`  : game working directory (.minecraft equivalent)
/// - `instance.json` : this serialized struct
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    pub id: String,
    pub name: String,
    pub path: PathBuf,
    pub minecraft_version: String,
    /// Runtime override; wins over the vanilla manifest's Java version.
    #[serde(default)]
    pub required_java_major: Option<u32>,
    pub state: InstanceState,
    pub created_at: DateTime<Utc>,
}

impl Instance {
    /// Create a new instance rooted at `path`.
    pub fn new(name: String, minecraft_version: String, path: PathBuf) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            path,
            minecraft_version,
            required_java_major: None,
            state: InstanceState::Created,
            created_at: Utc::now(),
        }
    }

    /// Load `instance.json` from `dir`, or `None` when there is none.
    pub fn load(dir: &Path) -> LauncherResult<Option<Self>> {
        let path = dir.join(INSTANCE_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&path).map_err(|e| LauncherError::io(&path, e))?;
        let instance = serde_json::from_str(&raw)
            .map_err(|e| LauncherError::manifest(path.display().to_string(), e))?;
        Ok(Some(instance))
    }

    pub fn save(&self) -> LauncherResult<()> {
        std::fs::create_dir_all(&self.path).map_err(|e| LauncherError::io(&self.path, e))?;
        let path = self.config_path();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json).map_err(|e| LauncherError::io(&path, e))
    }

    /// Path to the instance's `minecraft/` game working directory.
    pub fn game_dir(&self) -> PathBuf {
        self.path.join("minecraft")
    }

    /// Path to this instance's config file.
    pub fn config_path(&self) -> PathBuf {
        self.path.join(INSTANCE_FILE)
    }
}
