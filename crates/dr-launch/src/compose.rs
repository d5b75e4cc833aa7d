//! Turns declarative mount descriptors into a validated [`MountPlan`].

use dr_types::{DrError, DrResult, Mode, MountPlan, MountSpec};
use std::path::Path;
use tracing::debug;

use crate::config::{CodeDir, DataDir, LauncherConfig, RemoteDir};

/// Mount root for code directories that do not name a mount point.
pub const CODE_MOUNT_ROOT: &str = "/code";

/// `code_dirs` with the launcher's own source root appended when absent.
///
/// Returns a new list; the caller's list is left as it was.
pub fn with_launcher_root(code_dirs: &[CodeDir], root: &Path) -> Vec<CodeDir> {
    let mut dirs = code_dirs.to_vec();
    if !dirs.iter().any(|d| same_dir(&d.local_dir, root)) {
        dirs.push(CodeDir::new(root));
    }
    dirs
}

/// Paths are compared canonically when both exist, literally otherwise.
fn same_dir(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

fn code_mount_point(dir: &CodeDir) -> DrResult<String> {
    if let Some(point) = &dir.mount_point {
        return Ok(point.clone());
    }
    let name = dir
        .local_dir
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| DrError::InvalidMount {
            message: format!(
                "cannot derive a mount point for {}; set one explicitly",
                dir.local_dir.display()
            ),
        })?;
    Ok(format!("{CODE_MOUNT_ROOT}/{name}"))
}

#[derive(Debug, Clone, Copy)]
pub struct MountComposer<'a> {
    config: &'a LauncherConfig,
}

impl<'a> MountComposer<'a> {
    pub fn new(config: &'a LauncherConfig) -> Self {
        Self { config }
    }

    /// The single output mount for `mode`.
    ///
    /// Local and in-process runs write under `<local_log_dir>/<log_path>`;
    /// cloud runs write into the provider's container. A cloud mode without
    /// its config section is unsupported.
    pub fn output_mount(&self, mode: Mode, log_path: &str) -> DrResult<MountSpec> {
        let mount_point = self.config.output_mount_point.clone();
        match mode {
            Mode::InProcess | Mode::Local => Ok(MountSpec::local_output(
                self.config.local_log_dir.join(log_path),
                mount_point,
            )),
            Mode::Azure => {
                let azure = self.config.azure.as_ref().ok_or_else(|| unsupported(mode, "azure"))?;
                Ok(MountSpec::backend_output(
                    dr_types::OutputProvider::Azure,
                    azure.storage_container.clone(),
                    "",
                    mount_point,
                ))
            }
            Mode::Gcp => {
                let gcp = self.config.gcp.as_ref().ok_or_else(|| unsupported(mode, "gcp"))?;
                Ok(MountSpec::backend_output(
                    dr_types::OutputProvider::Gcp,
                    gcp.bucket.clone(),
                    "",
                    mount_point,
                ))
            }
        }
    }

    /// Code mounts first, then local data, then remote data, then output.
    pub fn compose(
        &self,
        code_dirs: &[CodeDir],
        non_code_dirs: &[DataDir],
        remote_dirs: &[RemoteDir],
        log_path: &str,
        mode: Mode,
    ) -> DrResult<MountPlan> {
        let output = self.output_mount(mode, log_path)?;

        let mut mounts = Vec::with_capacity(
            code_dirs.len() + non_code_dirs.len() + remote_dirs.len() + 1,
        );
        for dir in code_dirs {
            mounts.push(MountSpec::code(&dir.local_dir, code_mount_point(dir)?));
        }
        for dir in non_code_dirs {
            mounts.push(MountSpec::data(
                &dir.local_dir,
                dir.mount_point.clone(),
                dir.read_only,
            ));
        }
        for dir in remote_dirs {
            mounts.push(MountSpec::remote(
                dir.remote_uri.clone(),
                dir.mount_point.clone(),
            ));
        }
        mounts.push(output);

        debug!(mode = %mode, mounts = mounts.len(), "composed mount plan");
        MountPlan::new(mounts)
    }
}

fn unsupported(mode: Mode, section: &str) -> DrError {
    DrError::UnsupportedMode {
        mode: mode.to_string(),
        reason: format!("no [{section}] section in the launcher config"),
    }
}
