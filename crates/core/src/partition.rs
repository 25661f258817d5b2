//! Cache partition roles and generation-scoped naming.
//!
//! A partition name is `{prefix}-{role}-{generation}`. Bumping the generation
//! yields a fresh set of names, and activation deletes everything that is not
//! in the current generation's keep-set.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The role a partition plays for the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheRole {
    /// Precached application shell and same-origin assets.
    Shell,
    /// Cross-origin responses cached network-first.
    Runtime,
    /// Web font stylesheets and files.
    Fonts,
    /// Images and external media thumbnails (bounded).
    Media,
}

impl CacheRole {
    pub const ALL: [CacheRole; 4] = [CacheRole::Shell, CacheRole::Runtime, CacheRole::Fonts, CacheRole::Media];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Shell => "shell",
            Self::Runtime => "runtime",
            Self::Fonts => "fonts",
            Self::Media => "media",
        }
    }
}

impl fmt::Display for CacheRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Partition names for one cache generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionNames {
    prefix: String,
    generation: String,
}

impl PartitionNames {
    pub fn new(prefix: impl Into<String>, generation: impl Into<String>) -> Self {
        Self { prefix: prefix.into(), generation: generation.into() }
    }

    pub fn generation(&self) -> &str {
        &self.generation
    }

    /// Name of the partition holding `role` for this generation.
    pub fn name(&self, role: CacheRole) -> String {
        format!("{}-{}-{}", self.prefix, role.as_str(), self.generation)
    }

    /// Every partition name that survives activation.
    pub fn keep_set(&self) -> BTreeSet<String> {
        CacheRole::ALL.iter().map(|role| self.name(*role)).collect()
    }
}
