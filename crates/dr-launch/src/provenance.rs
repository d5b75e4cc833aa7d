//! Launch provenance: the metadata sidecar written next to run output and the
//! source-control hook that fills [`GitInfo`] records.

use dr_types::{DrResult, GitInfo, LaunchContext};
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name of the sidecar inside a run's output directory.
pub const SIDECAR_FILE: &str = "launch_context.json";

/// Persists a run's [`LaunchContext`] before the run starts.
pub trait MetadataSink: Send + Sync {
    fn persist(&self, ctx: &LaunchContext, dir: &Path) -> DrResult<()>;
}

/// Writes the context as pretty JSON to `<dir>/launch_context.json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSidecar;

impl MetadataSink for JsonSidecar {
    fn persist(&self, ctx: &LaunchContext, dir: &Path) -> DrResult<()> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(SIDECAR_FILE);
        std::fs::write(&path, serde_json::to_vec_pretty(ctx)?)?;
        debug!(path = %path.display(), "wrote launch context");
        Ok(())
    }
}

/// Reads source-control state of the mounted code directories.
pub trait SourceControl: Send + Sync {
    fn describe(&self, code_dirs: &[PathBuf]) -> Vec<GitInfo>;
}

/// Reports nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSourceControl;

impl SourceControl for NoSourceControl {
    fn describe(&self, _code_dirs: &[PathBuf]) -> Vec<GitInfo> {
        Vec::new()
    }
}

/// Command line of the current process, space-joined.
pub fn script_name() -> String {
    std::env::args().collect::<Vec<_>>().join(" ")
}
