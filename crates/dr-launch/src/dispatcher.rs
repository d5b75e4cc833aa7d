//! Per-run dispatch.
//!
//! The dispatcher walks the expanded configurations in order, one at a time:
//! it names the run, binds a per-run [`LaunchContext`], encodes the
//! arguments, then either runs the method here (in-process) or hands a
//! [`LaunchRequest`] to the mode's backend. A failing run is recorded and the
//! sweep moves on.

use chrono::Local;
use dr_sweep::RunNamer;
use dr_types::{
    DrError, DrResult, LaunchContext, MethodCall, Mode, MountPlan, ResourceSpec, RunConfig,
    RunDispatchError,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::backend::Backend;
use crate::codec::ArgsCodec;
use crate::provenance::MetadataSink;
use crate::registry::MethodRegistry;
use crate::request::{LaunchRequest, LaunchTarget};

/// Everything fixed for the whole sweep.
#[derive(Debug, Clone)]
pub struct DispatchPlan {
    pub sweep_id: Uuid,
    pub mode: Mode,
    pub method: MethodCall,
    /// Sweep log root, already date-prefixed if requested.
    pub log_path: String,
    pub namer: RunNamer,
    /// Context shared by every run; each run gets a copy with its own
    /// output directory.
    pub context: LaunchContext,
    pub mounts: MountPlan,
    pub target: LaunchTarget,
    pub resources: ResourceSpec,
    /// Host directory in-process runs write under.
    pub local_log_dir: PathBuf,
    /// Output mount point inside the execution environment.
    pub output_mount_point: String,
}

/// A run that was submitted (or, in-process, completed).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchedRun {
    pub run_index: usize,
    /// Per-run log path relative to the output root.
    pub run_path: String,
    /// Output directory as seen by the run.
    pub output_directory: String,
    pub config: RunConfig,
}

#[derive(Debug)]
pub struct SweepReport {
    pub sweep_id: Uuid,
    pub mode: Mode,
    pub log_path: String,
    pub dispatched: Vec<DispatchedRun>,
    pub failures: Vec<RunDispatchError>,
}

impl SweepReport {
    pub fn total(&self) -> usize {
        self.dispatched.len() + self.failures.len()
    }

    pub fn failed_indices(&self) -> Vec<usize> {
        self.failures.iter().map(|f| f.run_index).collect()
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct Dispatcher {
    plan: DispatchPlan,
    codec: ArgsCodec,
    registry: Arc<MethodRegistry>,
    sidecar: Arc<dyn MetadataSink>,
    backend: Option<Arc<dyn Backend>>,
}

impl Dispatcher {
    /// Fails with [`DrError::UnsupportedMode`] when a mode other than
    /// in-process has no backend to submit to.
    pub fn new(
        plan: DispatchPlan,
        codec: ArgsCodec,
        registry: Arc<MethodRegistry>,
        sidecar: Arc<dyn MetadataSink>,
        backend: Option<Arc<dyn Backend>>,
    ) -> DrResult<Self> {
        if plan.mode != Mode::InProcess && backend.is_none() {
            return Err(DrError::UnsupportedMode {
                mode: plan.mode.to_string(),
                reason: "no backend configured".to_string(),
            });
        }
        Ok(Self {
            plan,
            codec,
            registry,
            sidecar,
            backend,
        })
    }

    pub fn plan(&self) -> &DispatchPlan {
        &self.plan
    }

    /// Dispatch every configuration, in order, each awaited before the next.
    pub async fn dispatch(&self, configs: impl IntoIterator<Item = RunConfig>) -> SweepReport {
        let mut report = SweepReport {
            sweep_id: self.plan.sweep_id,
            mode: self.plan.mode,
            log_path: self.plan.log_path.clone(),
            dispatched: Vec::new(),
            failures: Vec::new(),
        };

        for (run_index, config) in configs.into_iter().enumerate() {
            match self.dispatch_one(run_index, config).await {
                Ok(run) => {
                    info!(
                        sweep_id = %self.plan.sweep_id,
                        run = run_index,
                        path = %run.run_path,
                        "run dispatched"
                    );
                    report.dispatched.push(run);
                }
                Err(err) => {
                    error!(sweep_id = %self.plan.sweep_id, run = run_index, error = %err, "run failed");
                    report.failures.push(err);
                }
            }
        }

        if report.is_success() {
            info!(
                sweep_id = %report.sweep_id,
                mode = %report.mode,
                runs = report.dispatched.len(),
                "sweep dispatched"
            );
        } else {
            warn!(
                sweep_id = %report.sweep_id,
                mode = %report.mode,
                dispatched = report.dispatched.len(),
                failed = ?report.failed_indices(),
                "sweep dispatched with failures"
            );
        }
        report
    }

    /// Output directory of a run as seen from inside its environment.
    fn output_directory(&self, run_index: usize, run_path: &str, time: chrono::NaiveTime) -> String {
        match self.plan.mode {
            Mode::InProcess => self
                .plan
                .local_log_dir
                .join(run_path)
                .to_string_lossy()
                .into_owned(),
            Mode::Local => self
                .plan
                .namer
                .path_at(&self.plan.output_mount_point, run_index, time),
            Mode::Azure | Mode::Gcp => self.plan.output_mount_point.clone(),
        }
    }

    async fn dispatch_one(
        &self,
        run_index: usize,
        config: RunConfig,
    ) -> Result<DispatchedRun, RunDispatchError> {
        let fail = |cause: DrError| RunDispatchError::new(run_index, cause);

        let time = Local::now().time();
        let run_path = self.plan.namer.path_at(&self.plan.log_path, run_index, time);
        let output_directory = self.output_directory(run_index, &run_path, time);
        let context = self.plan.context.with_output_directory(output_directory.clone());

        let args = self
            .codec
            .encode(&self.plan.method, &context, &config, &self.registry)
            .map_err(fail)?;

        match &self.backend {
            None => {
                // Run exactly what a remote host would decode.
                let decoded = ArgsCodec::decode(&args, &self.registry).map_err(fail)?;
                let registry = Arc::clone(&self.registry);
                let sidecar = Arc::clone(&self.sidecar);
                info!(run = run_index, method = %decoded.method.name, output_dir = %output_directory, "running in process");
                tokio::task::spawn_blocking(move || {
                    sidecar.persist(
                        &decoded.context,
                        Path::new(&decoded.context.output_directory),
                    )?;
                    registry.invoke(&decoded.method, &decoded.context, &decoded.config)
                })
                .await
                .map_err(|e| RunDispatchError::new(run_index, e))?
                .map_err(fail)?;
            }
            Some(backend) => {
                let request = LaunchRequest {
                    sweep_id: self.plan.sweep_id,
                    run_index,
                    mode: self.plan.mode,
                    target: self.plan.target.clone(),
                    log_path: run_path.clone(),
                    args,
                    mounts: self.plan.mounts.clone(),
                    resources: self.plan.resources.clone(),
                    interactive: self.plan.mode == Mode::Local,
                };
                backend
                    .submit(&request)
                    .await
                    .map_err(|e| RunDispatchError::new(run_index, e))?;
            }
        }

        Ok(DispatchedRun {
            run_index,
            run_path,
            output_directory,
            config,
        })
    }
}
