//! Execution backend abstraction.
//!
//! Every mode other than in-process hands each run to a [`Backend`] as a
//! [`LaunchRequest`]. Backends may start a container, write the request for a
//! cloud submitter to pick up, or simply record it (see
//! [`super::recording::RecordingBackend`]).

use async_trait::async_trait;
use dr_types::Mode;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::request::LaunchRequest;

/// Errors surfaced by backend submissions.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("no backend configured for mode {mode}")]
    NotConfigured { mode: Mode },
    #[error("missing or invalid credentials: {message}")]
    Credentials { message: String },
    #[error("quota exceeded: {message}")]
    Quota { message: String },
    #[error("network failure: {message}")]
    Network { message: String },
    #[error("run rejected by backend: {reason}")]
    Rejected { reason: String },
    #[error("failed to spawn process: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("backend internal error: {message}")]
    Internal { message: String },
}

/// Result alias for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// Submits runs to one execution environment.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Submit one run. Returns once the backend has accepted it; whether
    /// that means the run finished is backend-specific.
    async fn submit(&self, request: &LaunchRequest) -> BackendResult<()>;
}

/// Backends keyed by the mode they serve.
#[derive(Clone, Default)]
pub struct BackendSet {
    backends: HashMap<Mode, Arc<dyn Backend>>,
}

impl fmt::Debug for BackendSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut entries: Vec<(&str, &str)> = self
            .backends
            .iter()
            .map(|(mode, backend)| (mode.as_str(), backend.name()))
            .collect();
        entries.sort_unstable();
        f.debug_map().entries(entries).finish()
    }
}

impl BackendSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, mode: Mode, backend: Arc<dyn Backend>) -> &mut Self {
        self.backends.insert(mode, backend);
        self
    }

    pub fn with(mut self, mode: Mode, backend: Arc<dyn Backend>) -> Self {
        self.insert(mode, backend);
        self
    }

    pub fn get(&self, mode: Mode) -> Option<Arc<dyn Backend>> {
        self.backends.get(&mode).cloned()
    }

    pub fn contains(&self, mode: Mode) -> bool {
        self.backends.contains_key(&mode)
    }
}
