//! Property maps exchanged with `zfs get` / `zfs set`.

use crate::error::{ZpullError, ZpullResult};
use std::collections::BTreeMap;

/// Property name to value. Names never contain `=`, the `zfs set` delimiter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertySet {
    props: BTreeMap<String, String>,
}

impl PropertySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a property.
    ///
    /// # Errors
    /// Returns `ZpullError::InvalidProperty` when `name` contains `=` or is empty.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> ZpullResult<()> {
        let name = name.into();
        if name.is_empty() || name.contains('=') {
            return Err(ZpullError::InvalidProperty(name));
        }
        self.props.insert(name, value.into());
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.props.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.props.len()
    }

    pub fn is_empty(&self) -> bool {
        self.props.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.props.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// `name=value` tokens in name order.
    pub fn to_assignments(&self) -> Vec<String> {
        self.iter().map(|(k, v)| format!("{k}={v}")).collect()
    }
}
