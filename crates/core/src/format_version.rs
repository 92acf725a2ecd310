//! Format Version (spec §3.1, §4.4): a totally ordered `(major, minor,
//! patch)` triple gating store compatibility at open time.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// `(major, minor, patch)` with total order (major first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatVersion {
    /// Major version: a mismatch with the code's major is always fatal.
    pub major: i32,
    /// Minor version: online upgrade is possible within the same major.
    pub minor: i32,
    /// Patch version.
    pub patch: i32,
}

impl FormatVersion {
    /// Construct a version.
    pub const fn new(major: i32, minor: i32, patch: i32) -> Self {
        Self { major, minor, patch }
    }

    /// `(major:i32, minor:i32, patch:i32)` big-endian, per spec §6.3.
    pub fn to_bytes(&self) -> [u8; 12] {
        let mut out = [0u8; 12];
        out[0..4].copy_from_slice(&self.major.to_be_bytes());
        out[4..8].copy_from_slice(&self.minor.to_be_bytes());
        out[8..12].copy_from_slice(&self.patch.to_be_bytes());
        out
    }

    /// Inverse of [`Self::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != 12 {
            return None;
        }
        let major = i32::from_be_bytes(bytes[0..4].try_into().ok()?);
        let minor = i32::from_be_bytes(bytes[4..8].try_into().ok()?);
        let patch = i32::from_be_bytes(bytes[8..12].try_into().ok()?);
        Some(Self { major, minor, patch })
    }

    /// `canUpgradeOnline(from, to) ⇔ from.major == to.major` (spec §4.4).
    pub fn can_upgrade_online(from: FormatVersion, to: FormatVersion) -> bool {
        from.major == to.major
    }
}

impl Ord for FormatVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch).cmp(&(other.major, other.minor, other.patch))
    }
}

impl PartialOrd for FormatVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Reasons a store's on-disk format version fails the compatibility gate
/// (spec §4.4, §6.4).
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FormatVersionError {
    /// `stored < minimumSupported`.
    #[error("stored format version {stored} is older than the minimum supported {minimum}")]
    TooOld { stored: FormatVersion, minimum: FormatVersion },
    /// `stored > current`.
    #[error("stored format version {stored} is newer than this build's current {current}")]
    TooNew { stored: FormatVersion, current: FormatVersion },
    /// `stored.major != current.major`.
    #[error("major version mismatch: stored {stored}, code {current}")]
    MajorVersionMismatch { stored: FormatVersion, current: FormatVersion },
}

/// Gate a stored format version against the running code's version range,
/// per the decision table in spec §4.4. Returns `Ok(Some(stored))` when an
/// online upgrade should be performed (`stored < current`, same major),
/// `Ok(None)` when the stored version already matches `current`.
pub fn check_compatibility(
    stored: FormatVersion,
    minimum_supported: FormatVersion,
    current: FormatVersion,
) -> Result<Option<FormatVersion>, FormatVersionError> {
    if stored < minimum_supported {
        return Err(FormatVersionError::TooOld { stored, minimum: minimum_supported });
    }
    if stored > current {
        return Err(FormatVersionError::TooNew { stored, current });
    }
    if stored.major != current.major {
        return Err(FormatVersionError::MajorVersionMismatch { stored, current });
    }
    if stored < current {
        Ok(Some(stored))
    } else {
        Ok(None)
    }
}
