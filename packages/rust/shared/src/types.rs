//! Core domain types for relaybuild compile cycles.

use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

/// Configuration fragments are always submitted under this name.
pub const CONFIG_FRAGMENT_NAME: &str = "tsconfig.json";

// ---------------------------------------------------------------------------
// AttemptId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one compile cycle (time-sortable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttemptId(pub Uuid);

impl AttemptId {
    /// Generate a new time-sortable attempt identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for AttemptId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AttemptId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Fragment / Program
// ---------------------------------------------------------------------------

/// One named unit of source, configuration, or compiled text.
///
/// Compiled artifacts returned by the build service share this shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    /// Stable identifier, never empty in a submitted program.
    pub name: String,
    /// Text content (may be empty).
    #[serde(default)]
    pub content: String,
}

impl Fragment {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// The complete ordered set of fragments submitted for compilation.
///
/// Serialized verbatim as the compile request body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub files: Vec<Fragment>,
}

impl Program {
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// File names in program order.
    pub fn names(&self) -> Vec<&str> {
        self.files.iter().map(|f| f.name.as_str()).collect()
    }
}

// ---------------------------------------------------------------------------
// FragmentSource
// ---------------------------------------------------------------------------

/// Which marker category a discovered element belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FragmentKind {
    Source,
    Config,
}

/// A named chunk of source text, either already materialized or still remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FragmentSource {
    /// Content was available synchronously in the host document.
    Inline {
        kind: FragmentKind,
        name: String,
        content: String,
    },
    /// Content lives at `location` and must be fetched.
    Remote {
        kind: FragmentKind,
        name: String,
        location: Url,
    },
}

impl FragmentSource {
    pub fn name(&self) -> &str {
        match self {
            Self::Inline { name, .. } | Self::Remote { name, .. } => name,
        }
    }

    pub fn kind(&self) -> FragmentKind {
        match self {
            Self::Inline { kind, .. } | Self::Remote { kind, .. } => *kind,
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote { .. })
    }

    /// The remote location, if any.
    pub fn location(&self) -> Option<&Url> {
        match self {
            Self::Remote { location, .. } => Some(location),
            Self::Inline { .. } => None,
        }
    }
}
