//! Launcher configuration: default image, default mounts, and per-provider
//! settings.
//!
//! Loaded once before a sweep is expanded and never mutated afterwards.
//! Credentials are never read from the config file; they come from the
//! environment.

use dr_types::{config_error, DrResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "DROVER_CONFIG";

/// A local source tree mounted into the run and added to its search path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeDir {
    pub local_dir: PathBuf,
    /// Defaults to `/code/<basename of local_dir>`.
    #[serde(default)]
    pub mount_point: Option<String>,
}

impl CodeDir {
    pub fn new(local_dir: impl Into<PathBuf>) -> Self {
        Self {
            local_dir: local_dir.into(),
            mount_point: None,
        }
    }

    pub fn at(mut self, mount_point: impl Into<String>) -> Self {
        self.mount_point = Some(mount_point.into());
        self
    }
}

/// A local data directory mounted at a fixed point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataDir {
    pub local_dir: PathBuf,
    pub mount_point: String,
    #[serde(default)]
    pub read_only: bool,
}

/// A directory that already lives on the remote side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteDir {
    pub remote_uri: String,
    pub mount_point: String,
}

/// Service-principal credentials for Azure, read from the environment.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AzureCredentials {
    pub subscription_id: Option<String>,
    pub client_id: Option<String>,
    pub tenant_id: Option<String>,
    pub client_secret: Option<String>,
    pub storage_connection_string: Option<String>,
}

impl AzureCredentials {
    pub fn is_complete(&self) -> bool {
        self.subscription_id.is_some()
            && self.client_id.is_some()
            && self.tenant_id.is_some()
            && self.client_secret.is_some()
            && self.storage_connection_string.is_some()
    }
}

impl fmt::Debug for AzureCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("AzureCredentials")
            .field("subscription_id", &self.subscription_id)
            .field("client_id", &self.client_id)
            .field("tenant_id", &self.tenant_id)
            .field("client_secret", &redact(&self.client_secret))
            .field(
                "storage_connection_string",
                &redact(&self.storage_connection_string),
            )
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AzureConfig {
    pub region: String,
    pub instance_type: String,
    pub gpu_model: String,
    pub resource_group: Option<String>,
    pub vm_name: Option<String>,
    /// Blob container receiving run output.
    pub storage_container: String,
    #[serde(skip)]
    pub credentials: AzureCredentials,
}

impl Default for AzureConfig {
    fn default() -> Self {
        Self {
            region: "eastus".to_string(),
            instance_type: "Standard_DS1_v2".to_string(),
            gpu_model: "nvidia-tesla-t4".to_string(),
            resource_group: None,
            vm_name: None,
            storage_container: String::new(),
            credentials: AzureCredentials::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GcpConfig {
    pub project: String,
    pub zone: String,
    pub instance_type: String,
    pub gpu_model: String,
    /// Storage bucket receiving run output.
    pub bucket: String,
    /// Service-account key file, from `GOOGLE_APPLICATION_CREDENTIALS`.
    #[serde(skip)]
    pub credentials_path: Option<PathBuf>,
}

impl Default for GcpConfig {
    fn default() -> Self {
        Self {
            project: String::new(),
            zone: "us-west1-a".to_string(),
            instance_type: "n1-standard-4".to_string(),
            gpu_model: "nvidia-tesla-t4".to_string(),
            bucket: String::new(),
            credentials_path: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherConfig {
    pub docker_image: String,
    pub code_dirs: Vec<CodeDir>,
    pub non_code_dirs: Vec<DataDir>,
    pub remote_dirs: Vec<RemoteDir>,
    /// Host directory under which local and in-process runs write output.
    pub local_log_dir: PathBuf,
    /// Where the output mount appears inside the execution environment.
    pub output_mount_point: String,
    /// Source root of the launcher itself; always mounted as code.
    pub launcher_root: PathBuf,
    /// Entry point executed inside the container for every run.
    pub run_command: Vec<String>,
    /// Hand-off directory for cloud launch requests.
    pub spool_dir: Option<PathBuf>,
    /// Upper bound on an encoded argument blob.
    pub max_blob_bytes: Option<usize>,
    pub azure: Option<AzureConfig>,
    pub gcp: Option<GcpConfig>,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        let local_log_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("drover")
            .join("logs");

        Self {
            docker_image: "drover/runner:latest".to_string(),
            code_dirs: Vec::new(),
            non_code_dirs: Vec::new(),
            remote_dirs: Vec::new(),
            local_log_dir,
            output_mount_point: "/output".to_string(),
            launcher_root: default_launcher_root(),
            run_command: vec!["drover-run".to_string()],
            spool_dir: None,
            max_blob_bytes: None,
            azure: None,
            gcp: None,
        }
    }
}

/// Workspace root of this checkout, two levels above this crate.
fn default_launcher_root() -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .ancestors()
        .nth(2)
        .unwrap_or(manifest_dir)
        .to_path_buf()
}

impl LauncherConfig {
    pub fn from_toml_str(text: &str) -> DrResult<Self> {
        toml::from_str(text).map_err(|e| config_error!("invalid launcher config: {e}"))
    }

    /// Read a config file and overlay credentials from the environment.
    pub fn load(path: &Path) -> DrResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| config_error!("cannot read {}: {e}", path.display()))?;
        let mut config = Self::from_toml_str(&text)?;
        config.apply_env();
        info!(path = %path.display(), "loaded launcher config");
        Ok(config)
    }

    /// Resolve the config from, in order: `explicit`, `$DROVER_CONFIG`, the
    /// per-user default path, or built-in defaults.
    pub fn discover(explicit: Option<&Path>) -> DrResult<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            return Self::load(Path::new(&path));
        }
        if let Some(path) = Self::default_path().filter(|p| p.is_file()) {
            return Self::load(&path);
        }

        debug!("no launcher config found, using defaults");
        let mut config = Self::default();
        config.apply_env();
        Ok(config)
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("drover").join("config.toml"))
    }

    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Overlay provider credentials. Setting `AZURE_STORAGE_CONTAINER` alone is
    /// enough to enable the Azure section with default settings.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let container = lookup("AZURE_STORAGE_CONTAINER");
        if self.azure.is_none() && container.is_some() {
            self.azure = Some(AzureConfig::default());
        }
        if let Some(azure) = self.azure.as_mut() {
            if let Some(container) = container {
                azure.storage_container = container;
            }
            azure.credentials = AzureCredentials {
                subscription_id: lookup("AZURE_SUBSCRIPTION_ID"),
                client_id: lookup("AZURE_CLIENT_ID"),
                tenant_id: lookup("AZURE_TENANT_ID"),
                client_secret: lookup("AZURE_CLIENT_SECRET"),
                storage_connection_string: lookup("AZURE_STORAGE_CONNECTION_STRING"),
            };
        }

        if let Some(gcp) = self.gcp.as_mut() {
            gcp.credentials_path = lookup("GOOGLE_APPLICATION_CREDENTIALS").map(PathBuf::from);
        }
    }
}
