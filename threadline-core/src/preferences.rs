//! UI selection state, kept outside the entity graph.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::{config_dir, ConfigError};

/// Currently selected persona and objective.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub selected_persona_id: Option<String>,
    pub selected_objective_id: Option<String>,
}

impl Preferences {
    pub fn default_path() -> Option<PathBuf> {
        config_dir().map(|dir| dir.join("preferences.json"))
    }

    /// Read the snapshot; a missing file yields empty preferences.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        Ok(serde_json::from_str(&text)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text).map_err(io_err)
    }

    /// Forget selections that point at entities which no longer exist.
    pub fn retain_existing(&mut self, persona_exists: bool, objective_exists: bool) {
        if !persona_exists {
            self.selected_persona_id = None;
        }
        if !objective_exists {
            self.selected_objective_id = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let prefs = Preferences::load(&dir.path().join("none.json")).unwrap();
        assert_eq!(prefs, Preferences::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/preferences.json");
        let prefs = Preferences {
            selected_persona_id: Some("p1".into()),
            selected_objective_id: None,
        };
        prefs.save(&path).unwrap();
        assert_eq!(Preferences::load(&path).unwrap(), prefs);
    }

    #[test]
    fn test_retain_existing() {
        let mut prefs = Preferences {
            selected_persona_id: Some("p1".into()),
            selected_objective_id: Some("o1".into()),
        };
        prefs.retain_existing(true, false);
        assert_eq!(prefs.selected_persona_id.as_deref(), Some("p1"));
        assert!(prefs.selected_objective_id.is_none());
    }
}
