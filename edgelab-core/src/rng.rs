//! Deterministic RNG hierarchy for simulation batches.
//!
//! A master seed is expanded into one sub-seed per simulated path. Sub-seeds
//! are derived via BLAKE3 from `(master_seed, path_index)`, so a batch produces
//! identical paths regardless of thread count or scheduling order.

use rand::rngs::StdRng;
use rand::SeedableRng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedHierarchy {
    master_seed: u64,
}

impl SeedHierarchy {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    /// Use the caller's seed when given, otherwise draw one from entropy.
    ///
    /// Either way the master seed is fixed once for the whole batch.
    pub fn from_optional(seed: Option<u64>) -> Self {
        Self::new(seed.unwrap_or_else(rand::random))
    }

    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    pub fn sub_seed(&self, path_index: u64) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.master_seed.to_le_bytes());
        hasher.update(&path_index.to_le_bytes());
        let hash = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(bytes)
    }

    pub fn rng_for(&self, path_index: u64) -> StdRng {
        StdRng::seed_from_u64(self.sub_seed(path_index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn sub_seeds_are_deterministic() {
        let h = SeedHierarchy::new(42);
        assert_eq!(h.sub_seed(7), h.sub_seed(7));
        assert_eq!(SeedHierarchy::new(42).sub_seed(7), h.sub_seed(7));
    }

    #[test]
    fn different_paths_different_seeds() {
        let h = SeedHierarchy::new(42);
        assert_ne!(h.sub_seed(0), h.sub_seed(1));
        assert_ne!(SeedHierarchy::new(43).sub_seed(0), h.sub_seed(0));
    }

    #[test]
    fn rng_streams_reproduce() {
        let h = SeedHierarchy::new(9);
        let mut r1 = h.rng_for(3);
        let mut r2 = h.rng_for(3);
        let a: Vec<u32> = (0..5).map(|_| r1.gen()).collect();
        let b: Vec<u32> = (0..5).map(|_| r2.gen()).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn explicit_seed_is_kept() {
        assert_eq!(SeedHierarchy::from_optional(Some(5)).master_seed(), 5);
    }
}
