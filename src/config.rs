//! Story configuration: the scene list and parameter bounds.
//!
//! Loaded from a JSON file, or from the built-in narrative compiled into the
//! crate from `data/story.json`.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::risk::ClimateParameter;
use crate::scene::SceneDescriptor;

pub const BUILTIN_STORY_CONFIG: &str = include_str!("data/story.json");

/// Longest sweep a scene may configure, in ticks.
pub const MAX_ANIMATION_TICKS: f64 = 100_000.0;

fn default_title() -> String {
    "Untitled story".to_string()
}

fn default_temp_max() -> f64 {
    6.0
}

fn default_habitat_loss_max() -> f64 {
    100.0
}

fn default_co2_max() -> f64 {
    1000.0
}

/// Upper limits for slider input. The lower limit is always zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterBounds {
    #[serde(default = "default_temp_max")]
    pub temp_max: f64,
    #[serde(default = "default_habitat_loss_max")]
    pub habitat_loss_max: f64,
    #[serde(default = "default_co2_max")]
    pub co2_max: f64,
}

impl Default for ParameterBounds {
    fn default() -> Self {
        Self {
            temp_max: default_temp_max(),
            habitat_loss_max: default_habitat_loss_max(),
            co2_max: default_co2_max(),
        }
    }
}

impl ParameterBounds {
    pub fn max(&self, parameter: ClimateParameter) -> f64 {
        match parameter {
            ClimateParameter::Temp => self.temp_max,
            ClimateParameter::HabitatLoss => self.habitat_loss_max,
            ClimateParameter::Co2 => self.co2_max,
        }
    }

    /// Clamp a value into `[0, max]`. NaN becomes zero; infinities clamp to the nearer end.
    pub fn clamp(&self, parameter: ClimateParameter, value: f64) -> f64 {
        if value.is_nan() {
            return 0.0;
        }
        value.max(0.0).min(self.max(parameter))
    }
}

/// Root configuration for a story.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryConfig {
    #[serde(default = "default_title")]
    pub title: String,

    #[serde(default)]
    pub bounds: ParameterBounds,

    pub scenes: Vec<SceneDescriptor>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse story config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read story config from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid story config: {0}")]
    Invalid(String),
}

impl StoryConfig {
    /// The narrative shipped with the crate.
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_json_str(BUILTIN_STORY_CONFIG)
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: StoryConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json_str(&contents)?;
        log::info!("Loaded story config {:?} ({} scenes)", path, config.scenes.len());
        Ok(config)
    }

    /// Load `path` if given, otherwise the built-in story.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Self::builtin(),
        }
    }

    /// Check step ids, bounds and animation ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scenes.is_empty() {
            return Err(ConfigError::Invalid("story has no scenes".to_string()));
        }

        for parameter in ClimateParameter::ALL {
            let max = self.bounds.max(parameter);
            if !(max.is_finite() && max > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "bound for {} must be a positive number",
                    parameter
                )));
            }
        }

        let mut seen = BTreeSet::new();
        for scene in &self.scenes {
            if scene.step == 0 {
                return Err(ConfigError::Invalid("step ids start at 1".to_string()));
            }
            if !seen.insert(scene.step) {
                return Err(ConfigError::Invalid(format!("duplicate step {}", scene.step)));
            }
            if let Some(animation) = &scene.animate {
                let values = [animation.from, animation.to, animation.step];
                if values.iter().any(|v| !v.is_finite()) {
                    return Err(ConfigError::Invalid(format!(
                        "step {}: animation values must be finite",
                        scene.step
                    )));
                }
                if animation.from < 0.0 || animation.to < 0.0 {
                    return Err(ConfigError::Invalid(format!(
                        "step {}: {} cannot be animated below zero",
                        scene.step, animation.parameter
                    )));
                }
                let max = self.bounds.max(animation.parameter);
                if animation.from > max || animation.to > max {
                    return Err(ConfigError::Invalid(format!(
                        "step {}: {} animation leaves [0, {}]",
                        scene.step, animation.parameter, max
                    )));
                }
                let step = animation.step.abs();
                if step > 0.0 && (animation.to - animation.from).abs() / step > MAX_ANIMATION_TICKS {
                    return Err(ConfigError::Invalid(format!(
                        "step {}: {} animation needs more than {} ticks",
                        scene.step, animation.parameter, MAX_ANIMATION_TICKS
                    )));
                }
            }
        }
        Ok(())
    }
}
