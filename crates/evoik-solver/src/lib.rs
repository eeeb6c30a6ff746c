//! Evolutionary inverse kinematics for evoik segment trees.
//!
//! Searches joint configurations that satisfy position, orientation, pose
//! and look-at objectives on any number of tip segments at once, within a
//! per-frame time budget.
//!
//! # Architecture
//!
//! ```text
//! Topology + Tips ──► Model (FK tree, fitness) ──► Evolution (population)
//!                                                      │
//!            joint targets ◄── assign_targets ◄── Solver::step
//! ```
//!
//! The [`Model`] mirrors the part of the [`Topology`](evoik_kinematics::Topology)
//! between the root and the tips and evaluates configurations lazily. The
//! [`Evolution`] keeps a persistent population across frames and never lets
//! its best solution regress. The [`Solver`] ties both to a topology and a
//! [`SolverConfig`](evoik_core::SolverConfig).

pub mod evolution;
pub mod model;
pub mod objective;
pub mod solver;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use evolution::{Evolution, Individual};
pub use model::{Model, MotionPtr, Residual, TipPtr};
pub use objective::{Objective, ObjectiveKind, Tip};
pub use solver::{SolveStats, Solver, StepReport, assign_targets, delta_angle};

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::evolution::{Evolution, Individual};
    pub use crate::model::{Model, MotionPtr, Residual, TipPtr};
    pub use crate::objective::{Objective, ObjectiveKind, Tip};
    pub use crate::solver::{SolveStats, Solver, StepReport, assign_targets, delta_angle};
}
