//! Newtype domain identifiers.
//!
//! Every GitHub-assigned integer the mirror handles is represented as a
//! distinct newtype so a [`ReleaseId`] can never be passed where an
//! [`IssueNumber`] is expected, even though both are `u64` under the hood.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for u64-wrapped newtypes (GitHub-assigned integers).
// Generates: struct (Copy), new(), as_u64(), Display.
// ---------------------------------------------------------------------------
macro_rules! u64_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Creates a new identifier from a raw integer.
            pub fn new(value: u64) -> Self {
                Self(value)
            }

            /// Returns the underlying integer value.
            pub fn as_u64(self) -> u64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

u64_id! {
    /// Identifies a release object within one repository.
    ReleaseId
}

u64_id! {
    /// Identifies an asset attached to a release.
    AssetId
}

u64_id! {
    /// The number of a GitHub issue (as shown in `#42`).
    IssueNumber
}

// ---------------------------------------------------------------------------
// Repository identity
// ---------------------------------------------------------------------------

/// Identifies a GitHub repository as an `owner/name` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryId {
    owner: String,
    name: String,
}

impl RepositoryId {
    /// Creates a repository identifier, returning `None` if either part is
    /// empty or contains a `/`.
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Option<Self> {
        let owner = owner.into();
        let name = name.into();
        let valid = |s: &str| !s.is_empty() && !s.contains('/') && s.trim() == s;
        if valid(&owner) && valid(&name) {
            Some(Self { owner, name })
        } else {
            None
        }
    }

    /// The repository whose releases are mirrored unless configured
    /// otherwise.
    pub fn plotly_js() -> Self {
        Self {
            owner: "plotly".to_string(),
            name: "plotly.js".to_string(),
        }
    }

    /// Parses the `owner/name` slug form.
    pub fn parse(slug: &str) -> Option<Self> {
        let (owner, name) = slug.split_once('/')?;
        Self::new(owner, name)
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Display for RepositoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

// ---------------------------------------------------------------------------
// Run identity (internally generated)
// ---------------------------------------------------------------------------

/// Identifies a single invocation of the mirror.
///
/// Generated fresh for every CLI invocation and recorded on the root span so
/// all activity from one run can be correlated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl RunId {
    /// Generates a new random run identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repository_id_parses_slug() {
        let id = RepositoryId::parse("plotly/plotly.js").unwrap();
        assert_eq!(id.owner(), "plotly");
        assert_eq!(id.name(), "plotly.js");
        assert_eq!(id.to_string(), "plotly/plotly.js");
    }

    #[test]
    fn repository_id_rejects_malformed_slugs() {
        assert!(RepositoryId::parse("plotly").is_none());
        assert!(RepositoryId::parse("/plotly.js").is_none());
        assert!(RepositoryId::parse("a/b/c").is_none());
        assert!(RepositoryId::new("owner", "").is_none());
    }

    #[test]
    fn default_upstream_matches_its_slug() {
        assert_eq!(
            Some(RepositoryId::plotly_js()),
            RepositoryId::parse("plotly/plotly.js")
        );
    }

    #[test]
    fn run_ids_are_unique() {
        assert_ne!(RunId::new_random(), RunId::new_random());
    }
}
