use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PlannerError, Result};
use crate::model::Priority;
use crate::store::atomic::write_atomic;

pub const CONFIG_DIR: &str = ".config";
pub const CONFIG_FILE: &str = "config.json";

/// Workspace settings from `.config/config.json`. Missing keys take defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub checkin_frequency_hours: u32,
    pub auto_archive_completed_days: u32,
    pub default_priority: Priority,
    pub dashboard_host: String,
    pub dashboard_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            checkin_frequency_hours: 24,
            auto_archive_completed_days: 30,
            default_priority: Priority::Medium,
            dashboard_host: "127.0.0.1".into(),
            dashboard_port: 8080,
        }
    }
}

impl Config {
    pub fn path(root: &Path) -> PathBuf {
        root.join(CONFIG_DIR).join(CONFIG_FILE)
    }

    pub fn exists(root: &Path) -> bool {
        Self::path(root).is_file()
    }

    pub fn load(root: &Path) -> Result<Self> {
        let path = Self::path(root);
        if !path.is_file() {
            return Err(PlannerError::NotInitialized(root.display().to_string()));
        }
        let data = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        write_atomic(&Self::path(root), json.as_bytes())
    }
}

/// Walk up from `start` to the nearest directory holding a workspace config.
pub fn find_workspace_root(start: &Path) -> Result<PathBuf> {
    let mut dir = start.to_path_buf();
    loop {
        if Config::exists(&dir) {
            return Ok(dir);
        }
        if !dir.pop() {
            return Err(PlannerError::NotInitialized(start.display().to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_config_is_not_initialized() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            Config::load(dir.path()),
            Err(PlannerError::NotInitialized(_))
        ));
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join(CONFIG_DIR)).unwrap();
        fs::write(Config::path(dir.path()), r#"{"dashboard_port": 9191}"#).unwrap();

        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.dashboard_port, 9191);
        assert_eq!(config.checkin_frequency_hours, 24);
        assert_eq!(config.default_priority, Priority::Medium);
    }

    #[test]
    fn save_round_trips_and_is_found_from_subdirectory() {
        let dir = tempdir().unwrap();
        let config = Config {
            default_priority: Priority::High,
            ..Config::default()
        };
        config.save(dir.path()).unwrap();
        assert_eq!(Config::load(dir.path()).unwrap(), config);

        let nested = dir.path().join("projects").join("inbox");
        fs::create_dir_all(&nested).unwrap();
        assert_eq!(find_workspace_root(&nested).unwrap(), dir.path());
    }
}
