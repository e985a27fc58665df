//! Semantic versions as they appear in release tags.
//!
//! Upstream tags are written `vX.Y.Z` (occasionally with a pre-release suffix
//! such as `v3.0.0-rc.0`). Requests arrive in looser shapes: `2.5.0`, `v2.5.0`,
//! or an issue title fragment. [`Version`] is the single normalized form used
//! everywhere past the entry points: always `v<major>.<minor>.<patch>`.
//!
//! - [`Version::parse_strict`] accepts only fully qualified versions and is
//!   used where the caller asked for a specific version.
//! - [`normalize`] coerces the first numeric `X[.Y[.Z]]` run of any string,
//!   filling missing components with zero.
//! - [`TagVersion`] keeps pre-release identifiers and is only used to order
//!   release tags against each other.

use std::cmp::Ordering;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::MirrorError;

/// A normalized `vX.Y.Z` version. Never carries pre-release identifiers or
/// build metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version(semver::Version);

impl Version {
    /// Creates a release version without pre-release identifiers.
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self(semver::Version::new(major, minor, patch))
    }

    /// Parses a fully qualified `X.Y.Z` or `vX.Y.Z` version.
    ///
    /// A pre-release suffix or build metadata must be well formed but is
    /// dropped, so `3.0.0-rc.1` yields `v3.0.0`.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::InvalidVersion`] for anything that is not a
    /// complete semantic version (`"2.5"`, `"latest"`, `"release 2.5.0"`).
    pub fn parse_strict(input: &str) -> Result<Self, MirrorError> {
        let parsed = parse_semver(input).map_err(|e| MirrorError::InvalidVersion {
            input: input.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::new(parsed.major, parsed.minor, parsed.patch))
    }

    /// The version without the `v` prefix, as package registries expect it
    /// (`2.5.0`).
    pub fn bare(&self) -> String {
        self.0.to_string()
    }

    /// Returns the zero version used when no downstream release exists yet.
    pub fn zero() -> Self {
        Self::new(0, 0, 0)
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl FromStr for Version {
    type Err = MirrorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_strict(s)
    }
}

impl TryFrom<String> for Version {
    type Error = MirrorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse_strict(&value)
    }
}

impl From<Version> for String {
    fn from(value: Version) -> Self {
        value.to_string()
    }
}

/// A release tag parsed for ordering.
///
/// Unlike [`Version`] it keeps pre-release identifiers, so `v3.0.0-rc.1`
/// sorts below `v3.0.0`. Build metadata is dropped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TagVersion(semver::Version);

impl TagVersion {
    /// Parses a `X.Y.Z[-pre]` tag with an optional `v` prefix; `None` for
    /// tags that are not semantic versions.
    pub fn parse(tag: &str) -> Option<Self> {
        let mut parsed = parse_semver(tag).ok()?;
        parsed.build = semver::BuildMetadata::EMPTY;
        Some(Self(parsed))
    }

    pub fn is_prerelease(&self) -> bool {
        !self.0.pre.is_empty()
    }

    /// The normalized version this tag mirrors to.
    pub fn release(&self) -> Version {
        Version::new(self.0.major, self.0.minor, self.0.patch)
    }
}

impl From<Version> for TagVersion {
    fn from(version: Version) -> Self {
        Self(version.0)
    }
}

impl std::fmt::Display for TagVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}

fn parse_semver(input: &str) -> Result<semver::Version, semver::Error> {
    let trimmed = input.trim();
    let bare = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);
    semver::Version::parse(bare)
}

/// Coerces an arbitrary string into a `vX.Y.Z` version.
///
/// The first run of digits starts the version; up to two further `.N`
/// components are consumed and anything after them is ignored. Missing
/// components default to zero, so `"2.10"` becomes `v2.10.0` and
/// `"v1.2.3-beta"` becomes `v1.2.3`.
///
/// # Errors
///
/// Returns [`MirrorError::InvalidVersion`] if the string contains no digits or
/// a component overflows.
pub fn normalize(input: &str) -> Result<Version, MirrorError> {
    coerce(input)
        .map(Version)
        .ok_or_else(|| MirrorError::InvalidVersion {
            input: input.to_string(),
            reason: "no version number could be found in the input".to_string(),
        })
}

/// Orders two versions by semver precedence; a `v` prefix never matters
/// because both sides are already normalized.
pub fn compare(a: &Version, b: &Version) -> Ordering {
    a.cmp(b)
}

fn coerce(input: &str) -> Option<semver::Version> {
    let start = input.find(|c: char| c.is_ascii_digit())?;
    let mut rest = &input[start..];
    let mut parts = [0u64; 3];

    for (index, slot) in parts.iter_mut().enumerate() {
        let len = rest.bytes().take_while(u8::is_ascii_digit).count();
        *slot = rest[..len].parse().ok()?;
        rest = &rest[len..];

        if index < 2 {
            match rest.strip_prefix('.') {
                Some(next) if next.starts_with(|c: char| c.is_ascii_digit()) => rest = next,
                _ => break,
            }
        }
    }

    Some(semver::Version::new(parts[0], parts[1], parts[2]))
}
