//! Provenance record handed to every run.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Source-control state of one mounted code directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitInfo {
    pub directory: String,
    pub commit_hash: String,
    #[serde(default)]
    pub branch_name: Option<String>,
    /// Output of `git diff` at launch time, if the tree was dirty.
    #[serde(default)]
    pub code_diff: Option<String>,
}

/// Immutable metadata describing how a run was launched and where its output
/// goes.
///
/// A sweep builds one context and derives a per-run copy with
/// [`LaunchContext::with_output_directory`]; no run ever observes another
/// run's output path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchContext {
    pub use_gpu: bool,
    pub num_gpu: u32,
    #[serde(default)]
    pub git_infos: Vec<GitInfo>,
    /// Command line of the process that launched the sweep.
    pub script_name: String,
    pub output_directory: String,
    #[serde(default)]
    pub extra_launch_info: Map<String, Value>,
}

impl LaunchContext {
    pub fn new(output_directory: impl Into<String>) -> Self {
        Self {
            use_gpu: false,
            num_gpu: 0,
            git_infos: Vec::new(),
            script_name: String::new(),
            output_directory: output_directory.into(),
            extra_launch_info: Map::new(),
        }
    }

    pub fn with_gpu(mut self, use_gpu: bool, num_gpu: u32) -> Self {
        self.use_gpu = use_gpu;
        self.num_gpu = num_gpu;
        self
    }

    pub fn with_git_infos(mut self, git_infos: Vec<GitInfo>) -> Self {
        self.git_infos = git_infos;
        self
    }

    pub fn with_script_name(mut self, script_name: impl Into<String>) -> Self {
        self.script_name = script_name.into();
        self
    }

    pub fn with_extra_launch_info(mut self, extra: Map<String, Value>) -> Self {
        self.extra_launch_info = extra;
        self
    }

    /// Copy of this context pointing at a different output directory.
    pub fn with_output_directory(&self, output_directory: impl Into<String>) -> Self {
        Self {
            output_directory: output_directory.into(),
            ..self.clone()
        }
    }
}
