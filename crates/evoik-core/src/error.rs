use thiserror::Error;

/// Top-level error type for evoik.
#[derive(Debug, Error)]
pub enum EvoIkError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid topology: {0}")]
    InvalidTopology(#[from] TopologyError),
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid population_size: {0} (must be >= 2)")]
    InvalidPopulationSize(usize),

    #[error("elites ({elites}) must not exceed population_size ({population})")]
    TooManyElites { elites: usize, population: usize },

    #[error("Invalid max_frame_time: {0} (must be finite and >= 0)")]
    InvalidFrameTime(f64),
}

/// Kinematic topology errors.
///
/// Segments are addressed by their arena index.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologyError {
    #[error("segment {tip} is not reachable from root segment {root}")]
    Unreachable { root: usize, tip: usize },

    #[error("unknown segment: {0}")]
    UnknownSegment(usize),

    #[error("duplicate segment name: {0}")]
    DuplicateSegment(String),

    #[error("unknown tip: {0}")]
    UnknownTip(usize),
}
