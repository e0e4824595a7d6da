//! Replication protocol spoken between the planner and either side of a
//! replication relationship.

use crate::error::ZpullResult;
use crate::provider::ReceiveSink;
use crate::version::FilesystemVersion;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Read;

/// Value `zfs get` reports for `receive_resume_token` when there is none.
pub const NO_RESUME_TOKEN: &str = "-";

/// Map the "no token" sentinel to the empty string; real tokens pass through.
pub fn normalize_resume_token(token: &str) -> &str {
    if token == NO_RESUME_TOKEN {
        ""
    } else {
        token
    }
}

/// Which direction an endpoint serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointKind {
    /// Receive-only: pulls into the local tree.
    Pull,
    /// Send-capable: exposes local filesystems to a remote puller.
    Push,
}

/// Filesystem as advertised by an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filesystem {
    pub path: String,
    /// Empty when the filesystem has no partially received state.
    pub resume_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendRequest {
    pub filesystem: String,
    pub from: FilesystemVersion,
    /// `None` requests a full send of `from`.
    #[serde(default)]
    pub to: Option<FilesystemVersion>,
    #[serde(default)]
    pub resume_token: String,
}

pub struct SendResponse {
    pub stream: Box<dyn Read + Send>,
}

impl fmt::Debug for SendResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SendResponse").finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveRequest {
    pub filesystem: String,
    /// Non-empty when continuing an interrupted transfer.
    #[serde(default)]
    pub resume_token: String,
}

/// Capability interface the replication planner drives.
pub trait ReplicationEndpoint: Send + Sync {
    fn kind(&self) -> EndpointKind;

    fn list_filesystems(&self) -> ZpullResult<Vec<Filesystem>>;

    fn list_filesystem_versions(&self, fs: &str) -> ZpullResult<Vec<FilesystemVersion>>;

    fn send(&self, request: &SendRequest) -> ZpullResult<SendResponse>;

    fn receive(&self, request: &ReceiveRequest) -> ZpullResult<ReceiveSink>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_token_is_empty() {
        assert_eq!(normalize_resume_token(NO_RESUME_TOKEN), "");
        assert_eq!(normalize_resume_token(""), "");
        assert_eq!(normalize_resume_token("1-e604ea4bf-e0"), "1-e604ea4bf-e0");
    }
}
