//! Configuration model and helpers used by zpull endpoints.

use crate::error::{ZpullError, ZpullResult};
use crate::version::{AllVersions, PrefixVersionFilter, SnapshotsOnly, VersionFilter};
use log::debug;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/zpull.toml";
pub const ZFS_BINARY_ENV: &str = "ZPULL_ZFS_BINARY";
pub(crate) const KNOWN_ZFS_PATHS: &[&str] = &[
    "/usr/sbin/zfs",
    "/sbin/zfs",
    "/bin/zfs",
    "/usr/local/sbin/zfs",
];

pub(crate) fn detect_binary_path(candidates: &[&str]) -> Option<String> {
    candidates
        .iter()
        .map(Path::new)
        .find(|path| path.exists())
        .map(|path| path.to_string_lossy().into_owned())
}

pub fn detect_zfs_binary_path() -> Option<String> {
    detect_binary_path(KNOWN_ZFS_PATHS)
}

/// How the `zfs` CLI is invoked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZfsCfg {
    #[serde(default)]
    pub binary_path: Option<String>,

    /// Upper bound for synchronous commands; unset means wait indefinitely.
    #[serde(default)]
    pub command_timeout_secs: Option<u64>,

    #[serde(default = "default_stderr_limit")]
    pub stderr_limit_bytes: usize,

    #[serde(default = "default_max_line")]
    pub max_line_bytes: usize,
}

fn default_stderr_limit() -> usize {
    64 * 1024
}

fn default_max_line() -> usize {
    64 * 1024
}

impl Default for ZfsCfg {
    fn default() -> Self {
        Self {
            binary_path: None,
            command_timeout_secs: None,
            stderr_limit_bytes: default_stderr_limit(),
            max_line_bytes: default_max_line(),
        }
    }
}

/// Which versions to transfer when a filesystem is replicated for the first time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitialReplPolicy {
    #[default]
    MostRecent,
    All,
}

/// Pull endpoint knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullCfg {
    #[serde(default)]
    pub initial_policy: InitialReplPolicy,

    /// Only versions whose name starts with this prefix are replicated.
    #[serde(default)]
    pub snapshot_prefix: Option<String>,

    #[serde(default = "default_true")]
    pub include_bookmarks: bool,

    /// Receive with `-s` so interrupted transfers leave a resume token.
    #[serde(default = "default_true")]
    pub resumable: bool,
}

fn default_true() -> bool {
    true
}

impl Default for PullCfg {
    fn default() -> Self {
        Self {
            initial_policy: InitialReplPolicy::default(),
            snapshot_prefix: None,
            include_bookmarks: true,
            resumable: true,
        }
    }
}

/// Tracks whether we parsed TOML or YAML so writes preserve format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfigFormat {
    #[default]
    Toml,
    Yaml,
}

/// Top-level configuration snapshot loaded from disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ZpullConfig {
    #[serde(default)]
    pub zfs: ZfsCfg,

    #[serde(default)]
    pub pull: PullCfg,

    #[serde(skip)]
    pub path: PathBuf,

    #[serde(skip)]
    pub format: ConfigFormat,
}

impl ZpullConfig {
    pub fn default_path() -> &'static Path {
        Path::new(DEFAULT_CONFIG_PATH)
    }

    /// Read a config file from disk, detect format, and validate basics.
    pub fn load<P: AsRef<Path>>(path: P) -> ZpullResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let format = format_for(path);
        let mut cfg = Self::from_str_as(&contents, format)?;
        cfg.path = path.to_path_buf();

        let issues = cfg.validate();
        if !issues.is_empty() {
            return Err(ZpullError::InvalidConfig(issues.join("; ")));
        }
        debug!("loaded zpull config from {}", path.display());
        Ok(cfg)
    }

    pub fn from_str_as(contents: &str, format: ConfigFormat) -> ZpullResult<Self> {
        let mut cfg = match format {
            ConfigFormat::Toml => toml::from_str::<Self>(contents)?,
            ConfigFormat::Yaml => serde_yaml::from_str::<Self>(contents)?,
        };
        cfg.format = format;
        Ok(cfg)
    }

    /// Perform a validation pass and return human-readable issues.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if let Some(binary) = &self.zfs.binary_path {
            if binary.trim().is_empty() {
                issues.push("zfs.binary_path must not be empty when set".to_string());
            }
        }
        if self.zfs.command_timeout_secs == Some(0) {
            issues.push("zfs.command_timeout_secs must be greater than 0".to_string());
        }
        if self.zfs.stderr_limit_bytes == 0 {
            issues.push("zfs.stderr_limit_bytes must be greater than 0".to_string());
        }
        if self.zfs.max_line_bytes == 0 {
            issues.push("zfs.max_line_bytes must be greater than 0".to_string());
        }
        if let Some(prefix) = &self.pull.snapshot_prefix {
            if let Err(err) = PrefixVersionFilter::new(prefix.clone(), true) {
                issues.push(format!("pull.snapshot_prefix: {err}"));
            }
        }

        issues
    }

    /// Resolve the `zfs` binary: environment override, configured path,
    /// well-known locations, then `zfs` from `PATH`.
    pub fn zfs_binary(&self) -> PathBuf {
        if let Ok(override_path) = env::var(ZFS_BINARY_ENV) {
            if !override_path.is_empty() {
                return PathBuf::from(override_path);
            }
        }
        if let Some(binary) = &self.zfs.binary_path {
            return PathBuf::from(binary);
        }
        detect_zfs_binary_path()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("zfs"))
    }

    pub fn command_timeout(&self) -> Option<Duration> {
        self.zfs.command_timeout_secs.map(Duration::from_secs)
    }

    /// Version filter described by `[pull]`.
    pub fn version_filter(&self) -> ZpullResult<Arc<dyn VersionFilter>> {
        match (&self.pull.snapshot_prefix, self.pull.include_bookmarks) {
            (Some(prefix), include_bookmarks) => Ok(Arc::new(PrefixVersionFilter::new(
                prefix.clone(),
                include_bookmarks,
            )?)),
            (None, true) => Ok(Arc::new(AllVersions)),
            (None, false) => Ok(Arc::new(SnapshotsOnly)),
        }
    }

    /// Extra `zfs recv` flags described by `[pull]`.
    pub fn receive_args(&self) -> Vec<String> {
        if self.pull.resumable {
            vec!["-s".to_string()]
        } else {
            Vec::new()
        }
    }

    /// Persist the configuration back to its original on-disk format.
    pub fn save(&self) -> ZpullResult<()> {
        let payload = match self.format {
            ConfigFormat::Toml => toml::to_string_pretty(self)?,
            ConfigFormat::Yaml => serde_yaml::to_string(self)?,
        };
        fs::write(&self.path, payload)?;
        Ok(())
    }
}

fn format_for(path: &Path) -> ConfigFormat {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
            ConfigFormat::Yaml
        }
        _ => ConfigFormat::Toml,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    struct EnvGuard {
        key: &'static str,
        prev: Option<String>,
    }

    impl EnvGuard {
        fn set(key: &'static str, value: impl Into<String>) -> Self {
            let prev = env::var(key).ok();
            env::set_var(key, value.into());
            Self { key, prev }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            if let Some(prev) = &self.prev {
                env::set_var(self.key, prev);
            } else {
                env::remove_var(self.key);
            }
        }
    }

    #[test]
    fn defaults_apply_to_empty_document() {
        let cfg = ZpullConfig::from_str_as("", ConfigFormat::Toml).unwrap();
        assert_eq!(cfg.pull.initial_policy, InitialReplPolicy::MostRecent);
        assert!(cfg.pull.resumable);
        assert_eq!(cfg.zfs.stderr_limit_bytes, 64 * 1024);
        assert_eq!(cfg.receive_args(), ["-s"]);
        assert!(cfg.command_timeout().is_none());
        assert!(cfg.validate().is_empty());
    }

    #[test]
    fn loads_toml_and_yaml() {
        let dir = tempdir().unwrap();

        let toml_path = dir.path().join("zpull.toml");
        fs::write(
            &toml_path,
            concat!(
                "[zfs]\n",
                "binary_path = \"/opt/zfs/bin/zfs\"\n",
                "command_timeout_secs = 30\n",
                "\n",
                "[pull]\n",
                "initial_policy = \"all\"\n",
                "snapshot_prefix = \"zpull_\"\n",
                "resumable = false\n",
            ),
        )
        .unwrap();
        let cfg = ZpullConfig::load(&toml_path).unwrap();
        assert_eq!(cfg.format, ConfigFormat::Toml);
        assert_eq!(cfg.pull.initial_policy, InitialReplPolicy::All);
        assert_eq!(cfg.command_timeout(), Some(Duration::from_secs(30)));
        assert!(cfg.receive_args().is_empty());

        let yaml_path = dir.path().join("zpull.yaml");
        fs::write(
            &yaml_path,
            "pull:\n  initial_policy: most_recent\n  include_bookmarks: false\n",
        )
        .unwrap();
        let cfg = ZpullConfig::load(&yaml_path).unwrap();
        assert_eq!(cfg.format, ConfigFormat::Yaml);
        assert!(!cfg.pull.include_bookmarks);
    }

    #[test]
    fn bookmarks_can_be_excluded_without_prefix() {
        use crate::version::{FilesystemVersion, VersionType};

        let version = |version_type| FilesystemVersion {
            version_type,
            name: "manual".to_string(),
            guid: 1,
            createtxg: 1,
            creation: 1_700_000_000,
        };

        let cfg =
            ZpullConfig::from_str_as("[pull]\ninclude_bookmarks = false\n", ConfigFormat::Toml)
                .unwrap();
        let filter = cfg.version_filter().unwrap();
        assert!(filter.filter(&version(VersionType::Snapshot)).unwrap());
        assert!(!filter.filter(&version(VersionType::Bookmark)).unwrap());

        let cfg = ZpullConfig::from_str_as("", ConfigFormat::Toml).unwrap();
        let filter = cfg.version_filter().unwrap();
        assert!(filter.filter(&version(VersionType::Bookmark)).unwrap());
    }

    #[test]
    fn load_rejects_invalid_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("zpull.toml");
        fs::write(
            &path,
            "[zfs]\nstderr_limit_bytes = 0\n\n[pull]\nsnapshot_prefix = \"a@b\"\n",
        )
        .unwrap();
        let err = ZpullConfig::load(&path).expect_err("invalid config must fail");
        let message = err.to_string();
        assert!(message.contains("stderr_limit_bytes"), "{message}");
        assert!(message.contains("snapshot_prefix"), "{message}");
    }

    #[test]
    fn save_preserves_format() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("zpull.yml");
        fs::write(&path, "zfs:\n  binary_path: /sbin/zfs\n").unwrap();
        let mut cfg = ZpullConfig::load(&path).unwrap();
        cfg.pull.initial_policy = InitialReplPolicy::All;
        cfg.save().unwrap();

        let reloaded = ZpullConfig::load(&path).unwrap();
        assert_eq!(reloaded.format, ConfigFormat::Yaml);
        assert_eq!(reloaded.pull.initial_policy, InitialReplPolicy::All);
        assert_eq!(reloaded.zfs.binary_path.as_deref(), Some("/sbin/zfs"));
    }

    #[test]
    fn binary_resolution_prefers_env_then_config() {
        let mut cfg = ZpullConfig::default();
        cfg.zfs.binary_path = Some("/opt/zfs/bin/zfs".into());

        let guard = EnvGuard::set(ZFS_BINARY_ENV, "/tmp/fake-zfs");
        assert_eq!(cfg.zfs_binary(), PathBuf::from("/tmp/fake-zfs"));
        drop(guard);

        if env::var(ZFS_BINARY_ENV).is_err() {
            assert_eq!(cfg.zfs_binary(), PathBuf::from("/opt/zfs/bin/zfs"));
        }
    }
}
