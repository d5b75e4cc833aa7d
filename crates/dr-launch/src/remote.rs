//! Executing-side entry point: decode the arguments a launcher encoded and run
//! the method.

use dr_types::{DrError, DrResult};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::codec::{ArgsCodec, DecodedArgs, EncodedArgs};
use crate::provenance::{JsonSidecar, MetadataSink};
use crate::registry::MethodRegistry;
use crate::request::{ARGS_ENV, CODEC_ENV};

pub struct RemoteRunner {
    registry: MethodRegistry,
    sidecar: Arc<dyn MetadataSink>,
}

impl RemoteRunner {
    pub fn new(registry: MethodRegistry) -> Self {
        Self {
            registry,
            sidecar: Arc::new(JsonSidecar),
        }
    }

    pub fn with_sidecar(mut self, sidecar: Arc<dyn MetadataSink>) -> Self {
        self.sidecar = sidecar;
        self
    }

    /// Decode, write the sidecar into the run's output directory, then invoke.
    pub fn run(&self, encoded: &EncodedArgs) -> DrResult<DecodedArgs> {
        let decoded = ArgsCodec::decode(encoded, &self.registry)?;
        info!(
            method = %decoded.method.name,
            output_dir = %decoded.context.output_directory,
            codec = %encoded.version,
            "running decoded method"
        );
        self.sidecar.persist(
            &decoded.context,
            Path::new(&decoded.context.output_directory),
        )?;
        self.registry
            .invoke(&decoded.method, &decoded.context, &decoded.config)?;
        Ok(decoded)
    }

    /// [`RemoteRunner::run`] with arguments read from the process environment.
    pub fn run_from_env(&self) -> DrResult<DecodedArgs> {
        let encoded = encoded_from_lookup(|key| std::env::var(key).ok())?;
        self.run(&encoded)
    }
}

/// Read `DROVER_ARGS` and `DROVER_CODEC` through `lookup`.
pub fn encoded_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> DrResult<EncodedArgs> {
    let missing = |key: &str| DrError::Decode {
        message: format!("{key} is not set"),
    };
    Ok(EncodedArgs {
        blob: lookup(ARGS_ENV).ok_or_else(|| missing(ARGS_ENV))?,
        version: lookup(CODEC_ENV).ok_or_else(|| missing(CODEC_ENV))?,
    })
}
