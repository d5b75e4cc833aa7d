//! TOML sweep files.
//!
//! ```toml
//! log_path = "hopper-lr"
//! mode = "local"
//!
//! [method]
//! name = "shell"
//! state = { command = "python train.py --lr {lr} --out {output_dir}" }
//!
//! [[params]]
//! name = "lr"
//! values = [0.1, 0.01]
//!
//! [defaults]
//! env = "hopper"
//!
//! [options]
//! naming = "per_run"
//! ```

use anyhow::Context;
use dr_launch::{SweepOptions, SweepRequest};
use dr_types::{DefaultParams, MethodCall, SweepSpec};
use serde::Deserialize;
use std::path::Path;

fn default_mode() -> String {
    "local".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SweepFile {
    pub log_path: String,
    #[serde(default = "default_mode")]
    pub mode: String,
    pub method: MethodCall,
    #[serde(default)]
    pub params: SweepSpec,
    #[serde(default)]
    pub defaults: DefaultParams,
    #[serde(default)]
    pub options: SweepOptions,
}

impl SweepFile {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read sweep file {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("invalid sweep file {}", path.display()))
    }

    /// A sweep request, optionally running under a different mode than the
    /// file names.
    pub fn into_request(self, mode: Option<String>) -> SweepRequest {
        SweepRequest::new(
            self.method,
            self.params,
            self.log_path,
            mode.unwrap_or(self.mode),
        )
        .with_defaults(self.defaults)
        .with_options(self.options)
    }
}
