//! Receive-only replication endpoint.
//!
//! The puller is the local side of a pull relationship: the planner lists
//! what the local tree already holds, then opens receives into it. Every
//! call asks the mapping for its inverted filter again, so a policy change
//! takes effect on the next call.

use crate::cancel::CancelToken;
use crate::config::{InitialReplPolicy, ZpullConfig};
use crate::endpoint::{
    normalize_resume_token, EndpointKind, Filesystem, ReceiveRequest, ReplicationEndpoint,
    SendRequest, SendResponse,
};
use crate::error::{ZpullError, ZpullResult};
use crate::filter::DatasetMapping;
use crate::path::DatasetPath;
use crate::provider::{ReceiveSink, ZfsBackend};
use crate::version::{AllVersions, FilesystemVersion, VersionFilter};
use log::{debug, info};
use std::sync::Arc;

const LIST_PROPERTIES: [&str; 2] = ["name", "receive_resume_token"];

pub struct Puller<B> {
    backend: B,
    remote: Arc<dyn ReplicationEndpoint>,
    mapping: Arc<dyn DatasetMapping>,
    initial_policy: InitialReplPolicy,
    version_filter: Arc<dyn VersionFilter>,
    receive_args: Vec<String>,
}

impl<B> Puller<B>
where
    B: ZfsBackend,
{
    pub fn new(
        backend: B,
        remote: Arc<dyn ReplicationEndpoint>,
        mapping: Arc<dyn DatasetMapping>,
    ) -> Self {
        Self {
            backend,
            remote,
            mapping,
            initial_policy: InitialReplPolicy::default(),
            version_filter: Arc::new(AllVersions),
            receive_args: Vec::new(),
        }
    }

    /// Build a puller with the policy, version filter and receive flags from `[pull]`.
    pub fn from_config(
        config: &ZpullConfig,
        backend: B,
        remote: Arc<dyn ReplicationEndpoint>,
        mapping: Arc<dyn DatasetMapping>,
    ) -> ZpullResult<Self> {
        Ok(Self::new(backend, remote, mapping)
            .with_initial_policy(config.pull.initial_policy)
            .with_version_filter(config.version_filter()?)
            .with_receive_args(config.receive_args()))
    }

    pub fn with_initial_policy(mut self, policy: InitialReplPolicy) -> Self {
        self.initial_policy = policy;
        self
    }

    pub fn with_version_filter(mut self, filter: Arc<dyn VersionFilter>) -> Self {
        self.version_filter = filter;
        self
    }

    pub fn with_receive_args(mut self, args: Vec<String>) -> Self {
        self.receive_args = args;
        self
    }

    pub fn initial_policy(&self) -> InitialReplPolicy {
        self.initial_policy
    }

    /// The peer this puller receives from.
    pub fn remote(&self) -> &Arc<dyn ReplicationEndpoint> {
        &self.remote
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Parse `fs` and reject it with `Filtered` unless the inverted filter passes it.
    fn admit(&self, fs: &str) -> ZpullResult<DatasetPath> {
        let path = DatasetPath::parse(fs)?;
        let filter = self.mapping.inverted_filter()?;
        if !filter.filter(&path)? {
            debug!("puller: {fs} rejected by inverted filter");
            return Err(ZpullError::Filtered(fs.to_string()));
        }
        Ok(path)
    }
}

impl<B> ReplicationEndpoint for Puller<B>
where
    B: ZfsBackend,
{
    fn kind(&self) -> EndpointKind {
        EndpointKind::Pull
    }

    fn list_filesystems(&self) -> ZpullResult<Vec<Filesystem>> {
        let filter = self.mapping.inverted_filter()?;
        let cancel = CancelToken::new();
        let _stop = cancel.drop_guard();

        let mut filesystems = Vec::new();
        for row in self.backend.list_stream(&cancel, &LIST_PROPERTIES, &[]) {
            let fields = row?;
            let [name, token] = fields.as_slice() else {
                return Err(ZpullError::UnexpectedOutput(format!(
                    "expected {} fields per filesystem, got {}",
                    LIST_PROPERTIES.len(),
                    fields.len()
                )));
            };
            let path = DatasetPath::parse(name)?;
            if !filter.filter(&path)? {
                debug!("puller: omitting {name}, rejected by inverted filter");
                continue;
            }
            filesystems.push(Filesystem {
                path: name.clone(),
                resume_token: normalize_resume_token(token).to_string(),
            });
        }
        Ok(filesystems)
    }

    fn list_filesystem_versions(&self, fs: &str) -> ZpullResult<Vec<FilesystemVersion>> {
        let path = self.admit(fs)?;
        self.backend
            .list_filesystem_versions(&path, self.version_filter.as_ref())
    }

    fn send(&self, _request: &SendRequest) -> ZpullResult<SendResponse> {
        Err(ZpullError::Unsupported("puller does not send".into()))
    }

    fn receive(&self, request: &ReceiveRequest) -> ZpullResult<ReceiveSink> {
        let path = self.admit(&request.filesystem)?;

        if !request.resume_token.is_empty() {
            let local = self.backend.receive_resume_token(&path)?;
            if local != request.resume_token {
                return Err(ZpullError::ResumeTokenMismatch {
                    filesystem: request.filesystem.clone(),
                    local,
                    requested: request.resume_token.clone(),
                });
            }
            info!("resuming receive into {path}");
        }

        self.backend.receive_writer(&path, &self.receive_args)
    }
}
