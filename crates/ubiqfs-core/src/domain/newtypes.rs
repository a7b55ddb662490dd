//! Domain newtypes with validation
//!
//! This module provides strongly-typed wrappers for domain identifiers and values.
//! Each newtype ensures data validity at construction time.

use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;

// ============================================================================
// Query identity
// ============================================================================

/// Identity of one live index query
///
/// Platform notifications carry the id of the query that produced them, so
/// an observer can tell its own notifications apart from those of other
/// queries that share the same signal names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryId(Uuid);

impl QueryId {
    /// Create a new random QueryId
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for QueryId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for QueryId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Container identifier
// ============================================================================

/// Identifier of a cloud container, e.g. `iCloud.com.example.notes`
///
/// Must be non-empty and free of whitespace and path separators.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContainerId(String);

impl ContainerId {
    /// Create a new ContainerId
    ///
    /// # Errors
    /// Returns `DomainError::InvalidContainerId` for empty identifiers or
    /// identifiers containing whitespace or `/`
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();
        if id.is_empty() {
            return Err(DomainError::InvalidContainerId(
                "container identifier cannot be empty".to_string(),
            ));
        }
        if id.chars().any(|c| c.is_whitespace() || c == '/') {
            return Err(DomainError::InvalidContainerId(id));
        }
        Ok(Self(id))
    }

    /// Get the identifier as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ContainerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ContainerId {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<ContainerId> for String {
    fn from(id: ContainerId) -> Self {
        id.0
    }
}

// ============================================================================
// Path types
// ============================================================================

/// A validated, normalized absolute path
///
/// SyncPath ensures the path is:
/// - Absolute (starts with /)
/// - Normalized (no . or .. components)
/// - Within a root when validated against one
///
/// Indexed items use it as their identity: two items with the same
/// `SyncPath` are the same item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "PathBuf", into = "PathBuf")]
pub struct SyncPath(PathBuf);

impl SyncPath {
    /// Create a new SyncPath, validating it is absolute
    ///
    /// # Errors
    /// Returns `DomainError::InvalidPath` if the path is not absolute
    pub fn new(path: PathBuf) -> Result<Self, DomainError> {
        if !path.is_absolute() {
            return Err(DomainError::InvalidPath(format!(
                "Path must be absolute: {}",
                path.display()
            )));
        }

        // fs::canonicalize() is not an option: the path may not exist locally yet
        let normalized = Self::normalize_path(&path)?;
        Ok(Self(normalized))
    }

    /// Get the inner path
    #[must_use]
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    fn normalize_path(path: &Path) -> Result<PathBuf, DomainError> {
        use std::path::Component;

        let mut normalized = PathBuf::new();

        for component in path.components() {
            match component {
                Component::Prefix(p) => normalized.push(p.as_os_str()),
                Component::RootDir => normalized.push("/"),
                Component::CurDir => {}
                Component::ParentDir => {
                    if !normalized.pop() {
                        return Err(DomainError::InvalidPath(
                            "Path escapes root via ..".to_string(),
                        ));
                    }
                }
                Component::Normal(c) => normalized.push(c),
            }
        }

        Ok(normalized)
    }
}

impl Display for SyncPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl TryFrom<PathBuf> for SyncPath {
    type Error = DomainError;

    fn try_from(path: PathBuf) -> Result<Self, Self::Error> {
        Self::new(path)
    }
}

impl From<SyncPath> for PathBuf {
    fn from(sync_path: SyncPath) -> Self {
        sync_path.0
    }
}

impl AsRef<Path> for SyncPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}
