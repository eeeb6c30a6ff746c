//! evoik-core: errors, solver configuration, and seeding for the evoik IK solver.

pub mod config;
pub mod error;
pub mod seed;

pub use config::SolverConfig;
pub use error::{ConfigError, EvoIkError, TopologyError};

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::config::SolverConfig;
    pub use crate::error::{ConfigError, EvoIkError, TopologyError};
    pub use crate::seed::{derive_seed, derive_seed_indexed, rebuild_rng};
}
