//! Backend that records requests instead of executing them.
//!
//! Used for dry runs and tests. Failures can be injected per run index to
//! exercise the dispatcher's continue-on-error path.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

use crate::backend::{Backend, BackendError, BackendResult};
use crate::request::LaunchRequest;

#[derive(Debug, Clone, Default)]
pub struct RecordingBackend {
    requests: Arc<Mutex<Vec<LaunchRequest>>>,
    failing: Arc<Mutex<HashSet<usize>>>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the run with this index.
    pub fn fail_run(self, run_index: usize) -> Self {
        self.failing.lock().insert(run_index);
        self
    }

    /// Accepted requests, in submission order.
    pub fn requests(&self) -> Vec<LaunchRequest> {
        self.requests.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Backend for RecordingBackend {
    fn name(&self) -> &str {
        "recording"
    }

    async fn submit(&self, request: &LaunchRequest) -> BackendResult<()> {
        if self.failing.lock().contains(&request.run_index) {
            return Err(BackendError::Rejected {
                reason: format!("run {} rejected by injected failure", request.run_index),
            });
        }
        info!(
            sweep_id = %request.sweep_id,
            run = request.run_index,
            mode = %request.mode,
            log_path = %request.log_path,
            "recorded launch request"
        );
        self.requests.lock().push(request.clone());
        Ok(())
    }
}
