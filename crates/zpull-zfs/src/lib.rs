#![forbid(unsafe_code)]

//! Host ZFS integration.
//!
//! `system` implements `ZfsBackend` with the `zfs` CLI. `command` owns process
//! lifecycle; `list`, `stream`, `property`, `snapshot`, `transfer` and
//! `version` speak the individual subcommands.

mod command;
mod list;
mod property;
mod snapshot;
mod stream;
mod system;
mod transfer;
mod version;

pub use command::ZfsCommand;
pub use snapshot::{bookmark_name, snapshot_name};
pub use system::SystemZfs;
pub use transfer::{RecvWriter, SendStream};
