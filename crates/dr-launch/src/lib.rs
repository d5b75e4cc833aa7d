//! # dr-launch
//!
//! Mount composition, argument encoding, and per-backend dispatch for Drover.
//!
//! [`Launcher::sweep_function`] expands a sweep and hands every configuration
//! to the selected [`dr_types::Mode`]: in-process calls go through the
//! [`MethodRegistry`], everything else becomes a [`LaunchRequest`] submitted
//! to a [`Backend`]. [`RemoteRunner`] is the executing side's counterpart.

mod backend;
mod codec;
mod compose;
mod config;
mod dispatcher;
mod docker;
mod launcher;
mod provenance;
mod recording;
mod registry;
mod remote;
mod request;
mod spool;

pub use backend::{Backend, BackendError, BackendResult, BackendSet};
pub use codec::{ArgsCodec, CodecStrategy, CodecVersion, DecodedArgs, EncodedArgs, CODEC_REVISION};
pub use compose::{with_launcher_root, MountComposer, CODE_MOUNT_ROOT};
pub use config::{
    AzureConfig, AzureCredentials, CodeDir, DataDir, GcpConfig, LauncherConfig, RemoteDir,
    CONFIG_PATH_ENV,
};
pub use dispatcher::{DispatchPlan, DispatchedRun, Dispatcher, SweepReport};
pub use docker::DockerBackend;
pub use launcher::{Launcher, SweepOptions, SweepRequest};
pub use provenance::{
    script_name, JsonSidecar, MetadataSink, NoSourceControl, SourceControl, SIDECAR_FILE,
};
pub use recording::RecordingBackend;
pub use registry::{render_command, Method, MethodRegistry, ShellMethod, OUTPUT_DIR_ENV};
pub use remote::{encoded_from_lookup, RemoteRunner};
pub use request::{
    LaunchRequest, LaunchTarget, ARGS_ENV, CODEC_ENV, RUN_INDEX_ENV, SEARCH_PATH_ENV,
};
pub use spool::SpoolBackend;
