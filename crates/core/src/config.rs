use std::fs;
use std::path::{Path, PathBuf};

use daw_transport::{EditMode, LayerModel};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to write config: {0}")]
    Write(#[from] toml::ser::Error),
}

/// Editing preferences applied to new sessions and playlists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub edit_mode: EditMode,
    pub layer_model: LayerModel,
    /// Treat any overlap as equivalence, rather than identical bounds.
    pub use_overlap_equivalency: bool,
    pub default_tempo: f64,
    pub sample_rate: u32,
    /// Gain at the top of a gain automation lane.
    pub max_gain: f64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            edit_mode: EditMode::Normal,
            layer_model: LayerModel::LayeringIndex,
            use_overlap_equivalency: false,
            default_tempo: 120.0,
            sample_rate: 48_000,
            max_gain: 2.0,
        }
    }
}

impl EditorConfig {
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("daw").join("config.toml"))
    }

    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };

        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                if path.exists() {
                    log::warn!("ignoring config at {}: {e}", path.display());
                }
                Self::default()
            }
        }
    }

    pub fn save(&self) {
        let Some(path) = Self::config_path() else {
            return;
        };

        if let Err(e) = self.save_to(&path) {
            log::warn!("could not save config to {}: {e}", path.display());
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }
}
