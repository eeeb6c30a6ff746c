//! Shared test fixtures and utilities for evoik crates.
//!
//! Provides canned segment trees and deterministic RNG setup.

pub mod fixtures;
pub mod rng;

// ---------------------------------------------------------------------------
// Re-exports for convenience
// ---------------------------------------------------------------------------

pub use fixtures::{
    Fixture, fixed_only_chain, hinge, planar_two_link_arm, single_revolute_arm,
    straight_two_joint_chain,
};
pub use rng::{deterministic_vec, seeded_rng};
