//! Deterministic seed derivation for reproducible searches.
//!
//! A solver run is reproducible from one root seed. Every rebuild of the
//! search draws a fresh stream derived from that root:
//!
//! ```text
//! Root seed (SolverConfig::seed)
//! └── Rebuild seed (per model/evolution rebuild)
//! ```

use std::hash::{DefaultHasher, Hash, Hasher};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Derive a child seed from a parent seed and a string key.
///
/// Uses `DefaultHasher` (SipHash-1-3) for fast, deterministic mixing.
///
/// # Example
///
/// ```
/// use evoik_core::seed::derive_seed;
///
/// let child = derive_seed(42, "evolution");
/// assert_ne!(child, 42);
/// assert_eq!(child, derive_seed(42, "evolution"));
/// ```
#[must_use]
pub fn derive_seed(parent: u64, key: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    parent.hash(&mut hasher);
    key.hash(&mut hasher);
    hasher.finish()
}

/// Derive a child seed from a parent seed and a numeric index.
///
/// # Example
///
/// ```
/// use evoik_core::seed::derive_seed_indexed;
///
/// assert_ne!(derive_seed_indexed(42, 0), derive_seed_indexed(42, 1));
/// ```
#[must_use]
pub fn derive_seed_indexed(parent: u64, index: u64) -> u64 {
    let mut hasher = DefaultHasher::new();
    parent.hash(&mut hasher);
    index.hash(&mut hasher);
    hasher.finish()
}

/// Create the `ChaCha8Rng` used by the `rebuild`-th search of a solver
/// seeded with `root`.
#[must_use]
pub fn rebuild_rng(root: u64, rebuild: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(derive_seed_indexed(root, rebuild))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
