//! Local Docker backend.

use async_trait::async_trait;
use dr_types::MountSpec;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::backend::{Backend, BackendError, BackendResult};
use crate::request::LaunchRequest;

/// Runs each request with `docker run` on this machine.
#[derive(Debug, Clone)]
pub struct DockerBackend {
    docker_bin: PathBuf,
    /// Block until the container exits. Otherwise the container is started
    /// detached and `submit` returns once Docker accepted it.
    wait: bool,
}

impl Default for DockerBackend {
    fn default() -> Self {
        Self {
            docker_bin: PathBuf::from("docker"),
            wait: true,
        }
    }
}

impl DockerBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_docker_bin(mut self, bin: impl Into<PathBuf>) -> Self {
        self.docker_bin = bin.into();
        self
    }

    pub fn detached(mut self) -> Self {
        self.wait = false;
        self
    }

    /// Arguments after `docker`. Environment values are passed by name only;
    /// [`Backend::submit`] sets them on the child process so encoded blobs
    /// never appear on the command line.
    pub fn run_args(&self, request: &LaunchRequest) -> Vec<String> {
        let mut args: Vec<String> = vec!["run".into(), "--rm".into()];
        if !self.wait {
            args.push("-d".into());
        } else if request.interactive {
            args.push("-i".into());
        }

        let gpus = request.resources.gpu_count();
        if gpus > 0 {
            args.push("--gpus".into());
            args.push(gpus.to_string());
        }

        for mount in request.mounts.mounts() {
            match mount {
                MountSpec::Local {
                    local_path,
                    mount_point,
                    read_only,
                    ..
                } => {
                    let mut volume = format!("{}:{}", local_path.display(), mount_point);
                    if *read_only {
                        volume.push_str(":ro");
                    }
                    args.push("-v".into());
                    args.push(volume);
                }
                other => {
                    warn!(
                        mount_point = other.mount_point(),
                        "skipping non-local mount in local docker mode"
                    );
                }
            }
        }

        for (key, _) in request.env() {
            args.push("-e".into());
            args.push(key.to_string());
        }

        args.push(request.target.docker_image.clone());
        args.extend(request.target.command.iter().cloned());
        args
    }
}

#[async_trait]
impl Backend for DockerBackend {
    fn name(&self) -> &str {
        "docker"
    }

    async fn submit(&self, request: &LaunchRequest) -> BackendResult<()> {
        if let MountSpec::Local { local_path, .. } = request.mounts.output() {
            tokio::fs::create_dir_all(local_path).await?;
        }

        let args = self.run_args(request);
        debug!(docker = %self.docker_bin.display(), args = ?args, "starting container");
        info!(
            sweep_id = %request.sweep_id,
            run = request.run_index,
            image = %request.target.docker_image,
            log_path = %request.log_path,
            "launching local container"
        );

        let status = Command::new(&self.docker_bin)
            .args(&args)
            .envs(request.env())
            .status()
            .await?;

        if !status.success() {
            return Err(BackendError::Rejected {
                reason: format!("docker run for run {} exited with {status}", request.run_index),
            });
        }
        Ok(())
    }
}
