//! Snapshot and bookmark identities plus the filters applied when listing them.

use crate::error::{ZpullError, ZpullResult};
use crate::path::DatasetPath;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionType {
    Snapshot,
    Bookmark,
}

impl VersionType {
    /// Delimiter between dataset and version name (`@` or `#`).
    pub fn delimiter(self) -> char {
        match self {
            VersionType::Snapshot => '@',
            VersionType::Bookmark => '#',
        }
    }

    pub fn from_delimiter(ch: char) -> Option<Self> {
        match ch {
            '@' => Some(VersionType::Snapshot),
            '#' => Some(VersionType::Bookmark),
            _ => None,
        }
    }
}

impl fmt::Display for VersionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            VersionType::Snapshot => "snapshot",
            VersionType::Bookmark => "bookmark",
        })
    }
}

/// A snapshot or bookmark of one filesystem, as reported by `zfs list -p`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilesystemVersion {
    pub version_type: VersionType,
    /// Name after the `@` / `#` delimiter.
    pub name: String,
    pub guid: u64,
    pub createtxg: u64,
    /// Creation time in seconds since the Unix epoch.
    pub creation: u64,
}

impl FilesystemVersion {
    /// `fs@name` or `fs#name`.
    pub fn to_abs_path(&self, fs: &DatasetPath) -> String {
        format!("{}{}{}", fs, self.version_type.delimiter(), self.name)
    }

    /// `@name` or `#name`.
    pub fn relative_name(&self) -> String {
        format!("{}{}", self.version_type.delimiter(), self.name)
    }
}

impl PartialOrd for FilesystemVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FilesystemVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.createtxg
            .cmp(&other.createtxg)
            .then_with(|| self.version_type.delimiter().cmp(&other.version_type.delimiter()))
            .then_with(|| self.name.cmp(&other.name))
            .then_with(|| self.guid.cmp(&other.guid))
    }
}

/// Decides which versions of a filesystem participate in replication.
pub trait VersionFilter: Send + Sync {
    fn filter(&self, version: &FilesystemVersion) -> ZpullResult<bool>;
}

/// Accepts every snapshot and bookmark.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllVersions;

impl VersionFilter for AllVersions {
    fn filter(&self, _version: &FilesystemVersion) -> ZpullResult<bool> {
        Ok(true)
    }
}

/// Accepts snapshots and drops bookmarks.
#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotsOnly;

impl VersionFilter for SnapshotsOnly {
    fn filter(&self, version: &FilesystemVersion) -> ZpullResult<bool> {
        Ok(version.version_type == VersionType::Snapshot)
    }
}

/// Accepts versions whose name starts with a prefix, optionally limited to snapshots.
#[derive(Debug, Clone)]
pub struct PrefixVersionFilter {
    prefix: String,
    include_bookmarks: bool,
}

impl PrefixVersionFilter {
    pub fn new(prefix: impl Into<String>, include_bookmarks: bool) -> ZpullResult<Self> {
        let prefix = prefix.into();
        if prefix.is_empty() {
            return Err(ZpullError::InvalidConfig(
                "version filter prefix must not be empty".into(),
            ));
        }
        if prefix.contains(['@', '#', '/']) {
            return Err(ZpullError::InvalidConfig(format!(
                "version filter prefix {prefix:?} must not contain '@', '#' or '/'"
            )));
        }
        Ok(Self {
            prefix,
            include_bookmarks,
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl VersionFilter for PrefixVersionFilter {
    fn filter(&self, version: &FilesystemVersion) -> ZpullResult<bool> {
        if version.version_type == VersionType::Bookmark && !self.include_bookmarks {
            return Ok(false);
        }
        Ok(version.name.starts_with(&self.prefix))
    }
}
