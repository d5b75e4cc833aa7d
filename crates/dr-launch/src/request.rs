//! Launch requests handed to execution backends.

use dr_types::{Mode, MountPlan, ResourceSpec};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::codec::EncodedArgs;

/// Encoded run arguments.
pub const ARGS_ENV: &str = "DROVER_ARGS";
/// Version tag of [`ARGS_ENV`].
pub const CODEC_ENV: &str = "DROVER_CODEC";
/// Code mount points, `:`-separated, in mount order.
pub const SEARCH_PATH_ENV: &str = "DROVER_SEARCH_PATH";
/// Zero-based index of the run within its sweep.
pub const RUN_INDEX_ENV: &str = "DROVER_RUN_INDEX";

/// What a backend starts: an image and the command run inside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchTarget {
    pub docker_image: String,
    pub command: Vec<String>,
}

/// Everything a backend needs to start one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchRequest {
    /// Sweep this run belongs to.
    pub sweep_id: Uuid,
    pub run_index: usize,
    pub mode: Mode,
    pub target: LaunchTarget,
    /// Per-run log path, relative to the output location.
    pub log_path: String,
    pub args: EncodedArgs,
    pub mounts: MountPlan,
    pub resources: ResourceSpec,
    pub interactive: bool,
}

impl LaunchRequest {
    /// Environment the executing side reads its arguments from.
    pub fn env(&self) -> Vec<(&'static str, String)> {
        vec![
            (ARGS_ENV, self.args.blob.clone()),
            (CODEC_ENV, self.args.version.clone()),
            (SEARCH_PATH_ENV, self.mounts.search_path().join(":")),
            (RUN_INDEX_ENV, self.run_index.to_string()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dr_types::MountSpec;

    #[test]
    fn env_carries_args_and_search_path() {
        let request = LaunchRequest {
            sweep_id: Uuid::new_v4(),
            run_index: 4,
            mode: Mode::Local,
            target: LaunchTarget {
                docker_image: "img".into(),
                command: vec!["drover-run".into()],
            },
            log_path: "exp/run4".into(),
            args: EncodedArgs {
                blob: "e30=".into(),
                version: "value/1".into(),
            },
            mounts: MountPlan::new(vec![
                MountSpec::code("/src/a", "/code/a"),
                MountSpec::data("/data", "/data", true),
                MountSpec::code("/src/b", "/code/b"),
                MountSpec::local_output("/logs/exp", "/output"),
            ])
            .unwrap(),
            resources: ResourceSpec::default(),
            interactive: false,
        };

        let env = request.env();
        assert!(env.contains(&(ARGS_ENV, "e30=".to_string())));
        assert!(env.contains(&(CODEC_ENV, "value/1".to_string())));
        assert!(env.contains(&(SEARCH_PATH_ENV, "/code/a:/code/b".to_string())));
        assert!(env.contains(&(RUN_INDEX_ENV, "4".to_string())));
    }
}
