use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Serde default functions
// ---------------------------------------------------------------------------

const fn default_population_size() -> usize {
    12
}
const fn default_elites() -> usize {
    4
}
const fn default_max_frame_time() -> f64 {
    0.001
}

// ---------------------------------------------------------------------------
// SolverConfig
// ---------------------------------------------------------------------------

/// Evolutionary solver configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Individuals per generation (default: 12).
    /// Should be much higher than the number of elites.
    #[serde(default = "default_population_size")]
    pub population_size: usize,

    /// Individuals that survive each generation unchanged apart from local
    /// exploitation (default: 4). Should be comparatively low.
    #[serde(default = "default_elites")]
    pub elites: usize,

    /// Wall-clock budget for one solver frame in seconds (default: 0.001).
    #[serde(default = "default_max_frame_time")]
    pub max_frame_time: f64,

    /// Master random seed.
    #[serde(default)]
    pub seed: u64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            population_size: default_population_size(),
            elites: default_elites(),
            max_frame_time: default_max_frame_time(),
            seed: 0,
        }
    }
}

impl SolverConfig {
    /// Validate configuration. Returns Err on invalid values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.population_size < 2 {
            return Err(ConfigError::InvalidPopulationSize(self.population_size));
        }
        if self.elites > self.population_size {
            return Err(ConfigError::TooManyElites {
                elites: self.elites,
                population: self.population_size,
            });
        }
        if !self.max_frame_time.is_finite() || self.max_frame_time < 0.0 {
            return Err(ConfigError::InvalidFrameTime(self.max_frame_time));
        }
        Ok(())
    }

    /// Per-frame search budget as a [`Duration`].
    pub fn frame_budget(&self) -> Duration {
        Duration::from_secs_f64(self.max_frame_time.max(0.0))
    }

    /// Change the population size, never dropping below the elite count.
    pub fn with_population_size(mut self, size: usize) -> Self {
        self.population_size = size.max(self.elites).max(2);
        self
    }

    /// Change the elite count, never exceeding the population size.
    pub fn with_elites(mut self, elites: usize) -> Self {
        self.elites = elites.min(self.population_size);
        self
    }

    /// Load from TOML file.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
