//! Error taxonomy shared by every zpull crate.

use std::io;
use std::process::ExitStatus;
use thiserror::Error;

/// Reason a string was rejected as a dataset path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error(
        "contains forbidden character {0:?} (any of '{}')",
        crate::path::FORBIDDEN_CHARS.escape_debug()
    )]
    ForbiddenCharacter(char),

    #[error("must not end with a '/'")]
    TrailingSlash,

    #[error("must not contain empty components")]
    EmptyComponent,
}

/// Abnormal completion of a `zfs` subprocess.
///
/// Stderr is kept verbatim; nothing in zpull parses it.
#[derive(Debug, Clone, Error)]
#[error("zfs exited with error: {status}{}", stderr_suffix(.stderr))]
pub struct ZfsError {
    pub stderr: Vec<u8>,
    pub status: ExitStatus,
}

impl ZfsError {
    pub fn new(stderr: Vec<u8>, status: ExitStatus) -> Self {
        Self { stderr, status }
    }

    pub fn stderr(&self) -> &[u8] {
        &self.stderr
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }
}

fn stderr_suffix(stderr: &[u8]) -> String {
    let trimmed = String::from_utf8_lossy(stderr);
    let trimmed = trimmed.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {trimmed}")
    }
}

#[derive(Debug, Error)]
pub enum ZpullError {
    #[error("invalid dataset path {path:?}: {reason}")]
    InvalidPath { path: String, reason: PathError },

    #[error("invalid property name {0:?}: '=' is the delimiter between property name and value")]
    InvalidProperty(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to start {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to wait for {binary}: {source}")]
    Wait {
        binary: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Zfs(#[from] ZfsError),

    #[error("unexpected zfs output: {0}")]
    UnexpectedOutput(String),

    #[error("filesystem {0} is filtered by the replication policy")]
    Filtered(String),

    #[error(
        "receive-side resume token does not match send-side resume token for {filesystem} \
         (local {local:?}, requested {requested:?})"
    )]
    ResumeTokenMismatch {
        filesystem: String,
        local: String,
        requested: String,
    },

    #[error("{0}")]
    Unsupported(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    TomlSer(#[from] toml::ser::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl ZpullError {
    /// True when the error is a policy rejection rather than an operational failure.
    pub fn is_filtered(&self) -> bool {
        matches!(self, ZpullError::Filtered(_))
    }

    /// Captured `zfs` failure, if this error came from a nonzero exit.
    pub fn as_zfs(&self) -> Option<&ZfsError> {
        match self {
            ZpullError::Zfs(err) => Some(err),
            _ => None,
        }
    }
}

pub type ZpullResult<T> = Result<T, ZpullError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;

    #[test]
    fn zfs_error_display_includes_trimmed_stderr() {
        let err = ZfsError::new(
            b"cannot open 'tank/missing': dataset does not exist\n".to_vec(),
            ExitStatus::from_raw(1 << 8),
        );
        let rendered = err.to_string();
        assert!(rendered.starts_with("zfs exited with error:"));
        assert!(rendered.ends_with("dataset does not exist"));
    }

    #[test]
    fn zfs_error_without_stderr_shows_status_only() {
        let err = ZfsError::new(b" \n".to_vec(), ExitStatus::from_raw(2 << 8));
        let rendered = err.to_string();
        assert!(rendered.starts_with("zfs exited with error:"));
        assert!(!rendered.contains(": :"));
        assert!(!rendered.ends_with(':'));
        assert!(!rendered.ends_with(": "));
    }

    #[test]
    fn path_error_messages() {
        assert_eq!(
            PathError::TrailingSlash.to_string(),
            "must not end with a '/'"
        );
        assert!(PathError::ForbiddenCharacter('@')
            .to_string()
            .starts_with("contains forbidden character '@'"));
        let err = ZpullError::InvalidPath {
            path: "a//b".into(),
            reason: PathError::EmptyComponent,
        };
        assert_eq!(
            err.to_string(),
            "invalid dataset path \"a//b\": must not contain empty components"
        );
    }

    #[test]
    fn filtered_is_distinguishable() {
        assert!(ZpullError::Filtered("tank/data".into()).is_filtered());
        assert!(!ZpullError::Cancelled.is_filtered());
    }
}
