use serde::{Deserialize, Serialize};

/// Resource shape requested for every run of a sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSpec {
    pub use_gpu: bool,
    /// GPUs per run; only meaningful when `use_gpu` is set.
    pub num_gpu: u32,
    pub instance_type: Option<String>,
    pub gpu_model: Option<String>,
    pub region: Option<String>,
    pub resource_group: Option<String>,
    pub vm_name: Option<String>,
}

impl Default for ResourceSpec {
    fn default() -> Self {
        Self {
            use_gpu: false,
            num_gpu: 1,
            instance_type: None,
            gpu_model: None,
            region: None,
            resource_group: None,
            vm_name: None,
        }
    }
}

impl ResourceSpec {
    /// GPUs actually requested, zero when GPUs are disabled.
    pub fn gpu_count(&self) -> u32 {
        if self.use_gpu {
            self.num_gpu
        } else {
            0
        }
    }
}
