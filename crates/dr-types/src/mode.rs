use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::DrError;
use crate::mounts::OutputProvider;

/// Execution target for a whole sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Call the method directly inside the launching process.
    InProcess,
    /// Run each configuration in a local Docker container.
    Local,
    Azure,
    Gcp,
}

impl Mode {
    pub const ALL: [Mode; 4] = [Mode::InProcess, Mode::Local, Mode::Azure, Mode::Gcp];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::InProcess => "in_process",
            Mode::Local => "local",
            Mode::Azure => "azure",
            Mode::Gcp => "gcp",
        }
    }

    /// Whether runs leave this machine.
    pub fn is_remote(&self) -> bool {
        matches!(self, Mode::Azure | Mode::Gcp)
    }

    /// Cloud storage that receives the output mount, if any.
    pub fn output_provider(&self) -> Option<OutputProvider> {
        match self {
            Mode::Azure => Some(OutputProvider::Azure),
            Mode::Gcp => Some(OutputProvider::Gcp),
            Mode::InProcess | Mode::Local => None,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = DrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "in_process" | "in-process" => Ok(Mode::InProcess),
            "local" => Ok(Mode::Local),
            "azure" => Ok(Mode::Azure),
            "gcp" => Ok(Mode::Gcp),
            _ => Err(DrError::UnknownMode(s.to_string())),
        }
    }
}
