//! Sweep entry point.
//!
//! [`Launcher::sweep_function`] is the one call a user makes: it expands the
//! grid, composes mounts, builds the shared launch context, and dispatches
//! every configuration to the selected mode.

use chrono::Local;
use dr_sweep::{prefix_date, RunNamer, RunNaming, Sweeper, TimeMode};
use dr_types::{
    DefaultParams, DrError, DrResult, LaunchContext, MethodCall, Mode, ResourceSpec, SweepSpec,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::backend::{Backend, BackendSet};
use crate::codec::{ArgsCodec, CodecStrategy};
use crate::compose::{with_launcher_root, MountComposer};
use crate::config::{CodeDir, DataDir, LauncherConfig, RemoteDir};
use crate::dispatcher::{DispatchPlan, Dispatcher, SweepReport};
use crate::docker::DockerBackend;
use crate::provenance::{script_name, JsonSidecar, MetadataSink, NoSourceControl, SourceControl};
use crate::registry::MethodRegistry;
use crate::request::LaunchTarget;
use crate::spool::SpoolBackend;

/// Per-sweep options. Unset overrides fall back to the launcher config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepOptions {
    pub codec: CodecStrategy,
    /// Prefix the log path with the launch date (`24-03-09_exp`).
    pub add_date_to_logname: bool,
    pub naming: RunNaming,
    pub time_mode: TimeMode,
    pub start_run_id: usize,
    pub use_gpu: bool,
    pub num_gpu: u32,
    pub extra_launch_info: Map<String, Value>,

    pub docker_image: Option<String>,
    pub code_dirs: Option<Vec<CodeDir>>,
    pub non_code_dirs: Option<Vec<DataDir>>,
    pub remote_dirs: Option<Vec<RemoteDir>>,
    pub region: Option<String>,
    pub instance_type: Option<String>,
    pub gpu_model: Option<String>,
    pub resource_group: Option<String>,
    pub vm_name: Option<String>,
}

impl Default for SweepOptions {
    fn default() -> Self {
        Self {
            codec: CodecStrategy::default(),
            add_date_to_logname: false,
            naming: RunNaming::default(),
            time_mode: TimeMode::default(),
            start_run_id: 0,
            use_gpu: false,
            num_gpu: 1,
            extra_launch_info: Map::new(),
            docker_image: None,
            code_dirs: None,
            non_code_dirs: None,
            remote_dirs: None,
            region: None,
            instance_type: None,
            gpu_model: None,
            resource_group: None,
            vm_name: None,
        }
    }
}

impl SweepOptions {
    fn namer(&self) -> RunNamer {
        match self.naming {
            RunNaming::Flat => RunNamer::flat(),
            RunNaming::PerRun => RunNamer::per_run(self.start_run_id).with_time_mode(self.time_mode),
        }
    }
}

/// One call to [`Launcher::sweep_function`].
#[derive(Debug, Clone)]
pub struct SweepRequest {
    pub method: MethodCall,
    pub params: SweepSpec,
    pub defaults: DefaultParams,
    pub log_path: String,
    /// Parsed into a [`Mode`]; unknown names abort before anything runs.
    pub mode: String,
    pub options: SweepOptions,
}

impl SweepRequest {
    pub fn new(method: MethodCall, params: SweepSpec, log_path: impl Into<String>, mode: impl Into<String>) -> Self {
        Self {
            method,
            params,
            defaults: DefaultParams::new(),
            log_path: log_path.into(),
            mode: mode.into(),
            options: SweepOptions::default(),
        }
    }

    pub fn with_defaults(mut self, defaults: DefaultParams) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_options(mut self, options: SweepOptions) -> Self {
        self.options = options;
        self
    }
}

pub struct Launcher {
    config: LauncherConfig,
    backends: BackendSet,
    registry: Arc<MethodRegistry>,
    sidecar: Arc<dyn MetadataSink>,
    source_control: Arc<dyn SourceControl>,
}

impl Launcher {
    /// A launcher with no backends; only in-process sweeps work until some
    /// are added.
    pub fn new(config: LauncherConfig) -> Self {
        Self {
            config,
            backends: BackendSet::new(),
            registry: Arc::new(MethodRegistry::with_builtins()),
            sidecar: Arc::new(JsonSidecar),
            source_control: Arc::new(NoSourceControl),
        }
    }

    /// Docker for local mode, plus spool backends for every cloud provider
    /// that has a config section when a spool directory is set.
    pub fn from_config(config: LauncherConfig) -> Self {
        let mut backends = BackendSet::new();
        backends.insert(Mode::Local, Arc::new(DockerBackend::new()));
        if let Some(spool_dir) = &config.spool_dir {
            let spool: Arc<dyn Backend> = Arc::new(SpoolBackend::new(spool_dir));
            if config.azure.is_some() {
                backends.insert(Mode::Azure, Arc::clone(&spool));
            }
            if config.gcp.is_some() {
                backends.insert(Mode::Gcp, spool);
            }
        }
        Self::new(config).with_backends(backends)
    }

    pub fn with_backends(mut self, backends: BackendSet) -> Self {
        self.backends = backends;
        self
    }

    pub fn with_backend(mut self, mode: Mode, backend: Arc<dyn Backend>) -> Self {
        self.backends.insert(mode, backend);
        self
    }

    pub fn with_registry(mut self, registry: MethodRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    pub fn with_sidecar(mut self, sidecar: Arc<dyn MetadataSink>) -> Self {
        self.sidecar = sidecar;
        self
    }

    pub fn with_source_control(mut self, source_control: Arc<dyn SourceControl>) -> Self {
        self.source_control = source_control;
        self
    }

    pub fn config(&self) -> &LauncherConfig {
        &self.config
    }

    pub fn registry(&self) -> &MethodRegistry {
        &self.registry
    }

    /// Expand `request.params` and dispatch every configuration.
    ///
    /// Unknown or unsupported modes, invalid specs, and invalid mounts abort
    /// before the first run. Per-run failures are collected in the report.
    pub async fn sweep_function(&self, request: SweepRequest) -> DrResult<SweepReport> {
        let mode: Mode = request.mode.parse()?;
        let sweeper = Sweeper::new(request.params, request.defaults)?;

        // In-process runs call the method directly unless a backend was
        // registered for them (dry runs).
        let backend = match (mode, self.backends.get(mode)) {
            (_, Some(backend)) => Some(backend),
            (Mode::InProcess, None) => None,
            (_, None) => {
                return Err(DrError::UnsupportedMode {
                    mode: mode.to_string(),
                    reason: "no backend registered for this mode".to_string(),
                })
            }
        };

        let options = request.options;
        let config = &self.config;

        let log_path = if options.add_date_to_logname {
            prefix_date(&request.log_path, Local::now().date_naive())
        } else {
            request.log_path
        };

        let code_dirs = with_launcher_root(
            options.code_dirs.as_deref().unwrap_or(&config.code_dirs),
            &config.launcher_root,
        );
        let mounts = MountComposer::new(config).compose(
            &code_dirs,
            options.non_code_dirs.as_deref().unwrap_or(&config.non_code_dirs),
            options.remote_dirs.as_deref().unwrap_or(&config.remote_dirs),
            &log_path,
            mode,
        )?;

        let code_paths: Vec<PathBuf> = code_dirs.iter().map(|d| d.local_dir.clone()).collect();
        let context = LaunchContext::new(config.output_mount_point.clone())
            .with_gpu(options.use_gpu, options.num_gpu)
            .with_git_infos(self.source_control.describe(&code_paths))
            .with_script_name(script_name())
            .with_extra_launch_info(options.extra_launch_info.clone());

        let resources = self.resources(mode, &options);
        let target = LaunchTarget {
            docker_image: options
                .docker_image
                .clone()
                .unwrap_or_else(|| config.docker_image.clone()),
            command: config.run_command.clone(),
        };

        let sweep_id = Uuid::new_v4();
        info!(
            sweep_id = %sweep_id,
            mode = %mode,
            runs = sweeper.len(),
            log_path = %log_path,
            method = %request.method.name,
            "starting sweep"
        );

        let plan = DispatchPlan {
            sweep_id,
            mode,
            method: request.method,
            log_path,
            namer: options.namer(),
            context,
            mounts,
            target,
            resources,
            local_log_dir: config.local_log_dir.clone(),
            output_mount_point: config.output_mount_point.clone(),
        };
        let codec = ArgsCodec::new(options.codec).with_max_blob_bytes(config.max_blob_bytes);
        let dispatcher = Dispatcher::new(
            plan,
            codec,
            Arc::clone(&self.registry),
            Arc::clone(&self.sidecar),
            backend,
        )?;

        Ok(dispatcher.dispatch(sweeper.iter()).await)
    }

    /// Sweep options layered over the provider section for `mode`.
    fn resources(&self, mode: Mode, options: &SweepOptions) -> ResourceSpec {
        let mut resources = ResourceSpec {
            use_gpu: options.use_gpu,
            num_gpu: options.num_gpu,
            ..ResourceSpec::default()
        };
        match mode {
            Mode::Azure => {
                if let Some(azure) = &self.config.azure {
                    resources.region = Some(azure.region.clone());
                    resources.instance_type = Some(azure.instance_type.clone());
                    resources.gpu_model = Some(azure.gpu_model.clone());
                    resources.resource_group = azure.resource_group.clone();
                    resources.vm_name = azure.vm_name.clone();
                }
            }
            Mode::Gcp => {
                if let Some(gcp) = &self.config.gcp {
                    resources.region = Some(gcp.zone.clone());
                    resources.instance_type = Some(gcp.instance_type.clone());
                    resources.gpu_model = Some(gcp.gpu_model.clone());
                }
            }
            Mode::InProcess | Mode::Local => {}
        }

        let overrides = [
            (&mut resources.region, &options.region),
            (&mut resources.instance_type, &options.instance_type),
            (&mut resources.gpu_model, &options.gpu_model),
            (&mut resources.resource_group, &options.resource_group),
            (&mut resources.vm_name, &options.vm_name),
        ];
        for (slot, value) in overrides {
            if value.is_some() {
                slot.clone_from(value);
            }
        }
        resources
    }
}
