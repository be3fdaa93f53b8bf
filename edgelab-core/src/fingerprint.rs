//! Sample fingerprinting — deterministic identity of a return sample.
//!
//! Results derived from a sample are keyed by the BLAKE3 hash of the label
//! and the exact bit pattern of every return, so two reports can be compared
//! knowing whether they describe the same data.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SampleFingerprint(pub String);

impl SampleFingerprint {
    /// Hash a labelled sample. Order matters; `-0.0` and `0.0` hash differently.
    pub fn of(label: &str, returns: &[f64]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&(label.len() as u64).to_le_bytes());
        hasher.update(label.as_bytes());
        hasher.update(&(returns.len() as u64).to_le_bytes());
        for r in returns {
            hasher.update(&r.to_bits().to_le_bytes());
        }
        Self(hasher.finalize().to_hex().to_string())
    }

    /// First 12 hex characters, for logs and tables.
    pub fn short(&self) -> &str {
        let end = self.0.len().min(12);
        &self.0[..end]
    }
}

impl fmt::Display for SampleFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_samples_match() {
        let a = SampleFingerprint::of("rally", &[0.01, -0.02]);
        let b = SampleFingerprint::of("rally", &[0.01, -0.02]);
        assert_eq!(a, b);
        assert_eq!(a.0.len(), 64);
        assert_eq!(a.short().len(), 12);
    }

    #[test]
    fn any_change_alters_fingerprint() {
        let base = SampleFingerprint::of("rally", &[0.01, -0.02]);
        assert_ne!(base, SampleFingerprint::of("rally", &[0.01, -0.0200001]));
        assert_ne!(base, SampleFingerprint::of("rally", &[-0.02, 0.01]));
        assert_ne!(base, SampleFingerprint::of("gap", &[0.01, -0.02]));
    }
}
