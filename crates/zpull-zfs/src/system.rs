//! `ZfsBackend` implementation that shells out to the host `zfs` binary.

use crate::command::ZfsCommand;
use crate::stream;
use std::sync::Arc;
use zpull_core::cancel::CancelToken;
use zpull_core::config::ZpullConfig;
use zpull_core::error::ZpullResult;
use zpull_core::metrics::{CommandMetrics, NoopMetrics};
use zpull_core::path::DatasetPath;
use zpull_core::provider::{ReceiveSink, RowStream, ZfsBackend};
use zpull_core::version::{FilesystemVersion, VersionFilter};

/// Host ZFS access. Cheap to clone; every call spawns its own `zfs` process.
#[derive(Clone)]
pub struct SystemZfs {
    command: ZfsCommand,
    metrics: Arc<dyn CommandMetrics>,
}

impl SystemZfs {
    pub fn new(command: ZfsCommand) -> Self {
        Self {
            command,
            metrics: Arc::new(NoopMetrics),
        }
    }

    pub fn from_config(config: &ZpullConfig) -> Self {
        let command = ZfsCommand::from_config(config);
        log::debug!("using zfs binary {}", command.binary().display());
        Self::new(command)
    }

    /// Sink for snapshot and bookmark durations.
    pub fn with_metrics(mut self, metrics: Arc<dyn CommandMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn command(&self) -> &ZfsCommand {
        &self.command
    }

    pub(crate) fn metrics(&self) -> &dyn CommandMetrics {
        self.metrics.as_ref()
    }

    /// Stream `zfs list -H -p -o <properties> [args]` rows until end of output,
    /// the first error, or cancellation.
    pub fn list_stream(
        &self,
        cancel: &CancelToken,
        properties: &[&str],
        args: &[&str],
    ) -> RowStream {
        stream::list_stream(&self.command, cancel, properties, args)
    }
}

impl std::fmt::Debug for SystemZfs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemZfs")
            .field("command", &self.command)
            .finish_non_exhaustive()
    }
}

impl ZfsBackend for SystemZfs {
    fn list_stream(&self, cancel: &CancelToken, properties: &[&str], args: &[&str]) -> RowStream {
        SystemZfs::list_stream(self, cancel, properties, args)
    }

    fn list_filesystem_versions(
        &self,
        fs: &DatasetPath,
        filter: &dyn VersionFilter,
    ) -> ZpullResult<Vec<FilesystemVersion>> {
        SystemZfs::list_filesystem_versions(self, fs, filter)
    }

    fn receive_resume_token(&self, fs: &DatasetPath) -> ZpullResult<String> {
        SystemZfs::receive_resume_token(self, fs)
    }

    fn receive_writer(&self, fs: &DatasetPath, args: &[String]) -> ZpullResult<ReceiveSink> {
        let writer = SystemZfs::receive_writer(self, fs, args)?;
        Ok(Box::new(writer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zpull_core::config::ConfigFormat;

    #[test]
    fn from_config_threads_zfs_section() {
        let cfg = ZpullConfig::from_str_as(
            "[zfs]\nbinary_path = \"/opt/zfs/bin/zfs\"\ncommand_timeout_secs = 5\n",
            ConfigFormat::Toml,
        )
        .unwrap();
        if std::env::var_os(zpull_core::config::ZFS_BINARY_ENV).is_some() {
            return;
        }
        let zfs = SystemZfs::from_config(&cfg);
        assert_eq!(zfs.command().binary(), std::path::Path::new("/opt/zfs/bin/zfs"));
        assert_eq!(zfs.command().timeout(), Some(std::time::Duration::from_secs(5)));
    }
}
