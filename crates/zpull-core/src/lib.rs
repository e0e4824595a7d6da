#![forbid(unsafe_code)]

//! Core building blocks for zpull replication.
//!
//! Dataset paths, policy and backend contracts, and the pull-side endpoint
//! live here so the system crate (`zpull-zfs`) only has to deal with the
//! `zfs` command line.

pub mod cancel;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod filter;
pub mod logging;
pub mod metrics;
pub mod path;
pub mod property;
pub mod provider;
pub mod puller;
pub mod version;

pub use cancel::{CancelGuard, CancelToken};
pub use config::{ConfigFormat, InitialReplPolicy, PullCfg, ZfsCfg, ZpullConfig};
pub use endpoint::{
    EndpointKind, Filesystem, ReceiveRequest, ReplicationEndpoint, SendRequest, SendResponse,
};
pub use error::{PathError, ZfsError, ZpullError, ZpullResult};
pub use filter::{AcceptAll, DatasetFilter, DatasetMapping};
pub use metrics::{CommandMetrics, DurationRecorder, DurationStats, NoopMetrics, Operation};
pub use path::DatasetPath;
pub use property::PropertySet;
pub use provider::{ListRow, ReceiveSink, ReceiveStream, RowStream, ZfsBackend};
pub use puller::Puller;
pub use version::{
    AllVersions, FilesystemVersion, PrefixVersionFilter, SnapshotsOnly, VersionFilter, VersionType,
};
