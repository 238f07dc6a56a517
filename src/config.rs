//! Generation configuration, persisted as TOML.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Options recognized by the generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Resolve denotation ids to labels before evaluation (otherwise raw ids).
    #[serde(default = "default_true")]
    pub label_query_results: bool,
    /// Substitute canonical entity labels into edge string representations.
    #[serde(default = "default_true")]
    pub replace_entities: bool,
    /// Restrict model-guided grounding to whitelisted relations.
    #[serde(default)]
    pub use_whitelist: bool,
    /// Beam width of the model-guided search.
    #[serde(default = "default_beam_size")]
    pub beam_size: usize,
    /// Question words that signal a v-structure (character-role) construction.
    #[serde(default = "default_v_structure_markers")]
    pub v_structure_markers: Vec<String>,
}

fn default_true() -> bool {
    true
}
fn default_beam_size() -> usize {
    10
}
fn default_v_structure_markers() -> Vec<String> {
    [
        "play", "plays", "played", "playing", "star", "stars", "starred", "starring", "voice",
        "voices", "voiced", "portray", "portrays", "portrayed",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            label_query_results: default_true(),
            replace_entities: default_true(),
            use_whitelist: false,
            beam_size: default_beam_size(),
            v_structure_markers: default_v_structure_markers(),
        }
    }
}

impl GenerationConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Save to a TOML file.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }
}
