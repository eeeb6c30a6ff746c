//! URDF import for the evoik solver.
//!
//! ```text
//! URDF XML ──► parse_string / parse_file ──► RobotModel ──► load_topology ──► Topology
//! ```

pub mod error;
pub mod loader;
pub mod parser;
pub mod types;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use error::UrdfError;
pub use loader::{ImportOptions, load_topology, load_topology_with};
pub use parser::{parse_file, parse_string};
pub use types::{JointData, JointLimits, JointType, Origin, RobotModel};
