//! Validated ZFS dataset names.
//!
//! A `DatasetPath` is the component list of a name such as `tank/data/home`.
//! Prefix checks compare whole components, so `tank/da` is not a prefix of
//! `tank/data`.

use crate::error::{PathError, ZpullError, ZpullResult};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Characters that never appear in a dataset component.
pub const FORBIDDEN_CHARS: &str = "@#|\t <>*";

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DatasetPath {
    comps: Vec<String>,
}

impl DatasetPath {
    /// The empty path (zero components).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a slash separated dataset name. The empty string yields the empty path.
    pub fn parse(s: &str) -> ZpullResult<Self> {
        if s.is_empty() {
            return Ok(Self::empty());
        }
        if let Some(ch) = s.chars().find(|ch| FORBIDDEN_CHARS.contains(*ch)) {
            return Err(invalid(s, PathError::ForbiddenCharacter(ch)));
        }
        if s.ends_with('/') {
            return Err(invalid(s, PathError::TrailingSlash));
        }
        let comps: Vec<String> = s.split('/').map(str::to_string).collect();
        if comps.iter().any(String::is_empty) {
            return Err(invalid(s, PathError::EmptyComponent));
        }
        Ok(Self { comps })
    }

    pub fn components(&self) -> &[String] {
        &self.comps
    }

    pub fn len(&self) -> usize {
        self.comps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comps.is_empty()
    }

    /// Append all components of `other`.
    pub fn extend(&mut self, other: &DatasetPath) {
        self.comps.extend(other.comps.iter().cloned());
    }

    pub fn has_prefix(&self, prefix: &DatasetPath) -> bool {
        prefix.comps.len() <= self.comps.len()
            && prefix
                .comps
                .iter()
                .zip(&self.comps)
                .all(|(want, have)| want == have)
    }

    /// Strip `prefix`; leaves the path untouched when it is not a prefix.
    ///
    /// Use [`has_prefix`](Self::has_prefix) first to tell "no match" apart
    /// from "trimmed to empty".
    pub fn trim_prefix(&mut self, prefix: &DatasetPath) {
        if !self.has_prefix(prefix) {
            return;
        }
        self.comps.drain(..prefix.comps.len());
    }

    /// Drop the first `n` components, clamped to the path length.
    pub fn trim_leading_components(&mut self, n: usize) {
        let n = n.min(self.comps.len());
        self.comps.drain(..n);
    }
}

fn invalid(path: &str, reason: PathError) -> ZpullError {
    ZpullError::InvalidPath {
        path: path.to_string(),
        reason,
    }
}

impl fmt::Display for DatasetPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.comps.join("/"))
    }
}

impl FromStr for DatasetPath {
    type Err = ZpullError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for DatasetPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.comps.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for DatasetPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let comps = Vec::<String>::deserialize(deserializer)?;
        for comp in &comps {
            if comp.is_empty() {
                return Err(D::Error::custom(PathError::EmptyComponent));
            }
            if let Some(ch) = comp.chars().find(|ch| *ch == '/' || FORBIDDEN_CHARS.contains(*ch)) {
                return Err(D::Error::custom(PathError::ForbiddenCharacter(ch)));
            }
        }
        Ok(Self { comps })
    }
}
