//! Mount descriptors shared by every backend.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

use crate::errors::{DrError, DrResult};

/// Cloud storage service backing a [`MountSpec::BackendOutput`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputProvider {
    Azure,
    Gcp,
}

/// A source location made visible inside the execution environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MountSpec {
    Local {
        local_path: PathBuf,
        mount_point: String,
        /// Mount point is prepended to the executing side's search path.
        is_code: bool,
        read_only: bool,
        output: bool,
    },
    Remote {
        remote_uri: String,
        mount_point: String,
    },
    /// Provider-native output location (blob container, bucket).
    BackendOutput {
        provider: OutputProvider,
        container: String,
        path: String,
        mount_point: String,
    },
}

impl MountSpec {
    pub fn code(local_path: impl Into<PathBuf>, mount_point: impl Into<String>) -> Self {
        MountSpec::Local {
            local_path: local_path.into(),
            mount_point: mount_point.into(),
            is_code: true,
            read_only: false,
            output: false,
        }
    }

    pub fn data(
        local_path: impl Into<PathBuf>,
        mount_point: impl Into<String>,
        read_only: bool,
    ) -> Self {
        MountSpec::Local {
            local_path: local_path.into(),
            mount_point: mount_point.into(),
            is_code: false,
            read_only,
            output: false,
        }
    }

    pub fn local_output(local_path: impl Into<PathBuf>, mount_point: impl Into<String>) -> Self {
        MountSpec::Local {
            local_path: local_path.into(),
            mount_point: mount_point.into(),
            is_code: false,
            read_only: false,
            output: true,
        }
    }

    pub fn remote(remote_uri: impl Into<String>, mount_point: impl Into<String>) -> Self {
        MountSpec::Remote {
            remote_uri: remote_uri.into(),
            mount_point: mount_point.into(),
        }
    }

    pub fn backend_output(
        provider: OutputProvider,
        container: impl Into<String>,
        path: impl Into<String>,
        mount_point: impl Into<String>,
    ) -> Self {
        MountSpec::BackendOutput {
            provider,
            container: container.into(),
            path: path.into(),
            mount_point: mount_point.into(),
        }
    }

    pub fn mount_point(&self) -> &str {
        match self {
            MountSpec::Local { mount_point, .. }
            | MountSpec::Remote { mount_point, .. }
            | MountSpec::BackendOutput { mount_point, .. } => mount_point,
        }
    }

    pub fn is_output(&self) -> bool {
        match self {
            MountSpec::Local { output, .. } => *output,
            MountSpec::Remote { .. } => false,
            MountSpec::BackendOutput { .. } => true,
        }
    }

    pub fn is_code(&self) -> bool {
        matches!(self, MountSpec::Local { is_code: true, .. })
    }
}

/// `/data/` and `/data` name the same mount point.
fn normalize_mount_point(mount_point: &str) -> &str {
    let trimmed = mount_point.trim_end_matches('/');
    if trimmed.is_empty() {
        "/"
    } else {
        trimmed
    }
}

/// Validated mount set for one launch request.
///
/// Mount points are unique and exactly one mount is the output mount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<MountSpec>", into = "Vec<MountSpec>")]
pub struct MountPlan {
    mounts: Vec<MountSpec>,
    output_index: usize,
}

impl MountPlan {
    pub fn new(mounts: Vec<MountSpec>) -> DrResult<Self> {
        let mut seen = HashSet::new();
        for mount in &mounts {
            let point = normalize_mount_point(mount.mount_point());
            if mount.mount_point().is_empty() {
                return Err(DrError::InvalidMount {
                    message: format!("empty mount point in {mount:?}"),
                });
            }
            if !seen.insert(point.to_string()) {
                return Err(DrError::InvalidMount {
                    message: format!("mount point {point} is used more than once"),
                });
            }
        }

        let outputs: Vec<usize> = mounts
            .iter()
            .enumerate()
            .filter(|(_, m)| m.is_output())
            .map(|(i, _)| i)
            .collect();
        match outputs.as_slice() {
            [only] => Ok(Self {
                output_index: *only,
                mounts,
            }),
            [] => Err(DrError::InvalidMount {
                message: "no output mount designated".to_string(),
            }),
            many => Err(DrError::InvalidMount {
                message: format!("{} output mounts designated, expected one", many.len()),
            }),
        }
    }

    pub fn mounts(&self) -> &[MountSpec] {
        &self.mounts
    }

    pub fn output(&self) -> &MountSpec {
        &self.mounts[self.output_index]
    }

    /// Mount points of code mounts, in mount order.
    pub fn search_path(&self) -> Vec<&str> {
        self.mounts
            .iter()
            .filter(|m| m.is_code())
            .map(|m| m.mount_point())
            .collect()
    }
}

impl TryFrom<Vec<MountSpec>> for MountPlan {
    type Error = DrError;

    fn try_from(mounts: Vec<MountSpec>) -> Result<Self, Self::Error> {
        MountPlan::new(mounts)
    }
}

impl From<MountPlan> for Vec<MountSpec> {
    fn from(plan: MountPlan) -> Self {
        plan.mounts
    }
}
