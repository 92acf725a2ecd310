//! Size limits enforced across the write path (spec §4.5, §4.8, §8.3).
//!
//! Mirrors the teacher's `strata_core::limits::Limits` convention: a plain
//! config struct with a frozen `Default`, overridable at container open
//! time.

/// Size ceilings enforced by the write session (H) and index maintainer
/// (F).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Limits {
    /// KV store key size limit (spec: typically 10 kB). Packed index keys
    /// at or above this size are rejected with `KeyTooLarge`.
    pub max_key_bytes: usize,
    /// KV store value size limit (spec: typically 100 kB) for a single
    /// record's serialized bytes.
    pub max_value_bytes: usize,
    /// Transaction approximate size at which a warning is logged (spec:
    /// `≥ 8 MB`).
    pub transaction_warn_bytes: usize,
    /// Transaction approximate size at which `TransactionTooLarge` is
    /// raised (spec: `≥ 9.5 MB`; KV store hard limit ≈ 10 MB).
    pub transaction_fail_bytes: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_key_bytes: 10_000,
            max_value_bytes: 100_000,
            transaction_warn_bytes: 8_000_000,
            transaction_fail_bytes: 9_500_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_boundaries() {
        let l = Limits::default();
        assert_eq!(l.max_key_bytes, 10_000);
        assert_eq!(l.transaction_warn_bytes, 8_000_000);
        assert_eq!(l.transaction_fail_bytes, 9_500_000);
    }
}
