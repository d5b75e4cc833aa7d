//! Spool backend for cloud modes.
//!
//! Requests are written as JSON under `<root>/<mode>/<sweep_id>/run<N>.json`
//! for an external submitter with provider credentials to pick up. Each file
//! appears atomically.

use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::backend::{Backend, BackendError, BackendResult};
use crate::request::LaunchRequest;

#[derive(Debug, Clone)]
pub struct SpoolBackend {
    root: PathBuf,
}

impl SpoolBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the request for `request.run_index` lands.
    pub fn request_path(&self, request: &LaunchRequest) -> PathBuf {
        self.root
            .join(request.mode.as_str())
            .join(request.sweep_id.to_string())
            .join(format!("run{}.json", request.run_index))
    }
}

async fn atomic_write(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("request");
    let tmp = path.with_file_name(format!(
        ".{name}.tmp.{}.{}",
        std::process::id(),
        Utc::now().timestamp_micros()
    ));
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await
}

#[async_trait]
impl Backend for SpoolBackend {
    fn name(&self) -> &str {
        "spool"
    }

    async fn submit(&self, request: &LaunchRequest) -> BackendResult<()> {
        let bytes = serde_json::to_vec_pretty(request).map_err(|e| BackendError::Internal {
            message: format!("cannot serialize launch request: {e}"),
        })?;
        let path = self.request_path(request);
        atomic_write(&path, &bytes).await?;
        info!(
            sweep_id = %request.sweep_id,
            run = request.run_index,
            path = %path.display(),
            "spooled launch request"
        );
        Ok(())
    }
}
