//! Cross-process argument encoding.
//!
//! A run's method, launch context, and configuration travel to the executing
//! side as a base64 JSON blob plus a version tag (`value/1`,
//! `reference/1`). The tag is always checked before the blob is touched.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use dr_types::{encode_error, DrError, DrResult, LaunchContext, MethodCall, RunConfig};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::registry::MethodRegistry;

/// Current codec revision for both strategies.
pub const CODEC_REVISION: u32 = 1;

/// How the method travels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodecStrategy {
    /// Method name and state are embedded; the executing side needs nothing
    /// but a method of that name.
    #[default]
    Value,
    /// Only the method name is embedded; the executing side supplies the
    /// registered state. Smaller, but requires identical registrations.
    Reference,
}

impl CodecStrategy {
    fn as_str(&self) -> &'static str {
        match self {
            CodecStrategy::Value => "value",
            CodecStrategy::Reference => "reference",
        }
    }
}

/// Strategy plus codec revision, rendered as `<strategy>/<revision>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecVersion {
    pub strategy: CodecStrategy,
    pub revision: u32,
}

impl CodecVersion {
    pub fn current(strategy: CodecStrategy) -> Self {
        Self {
            strategy,
            revision: CODEC_REVISION,
        }
    }
}

impl fmt::Display for CodecVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.strategy.as_str(), self.revision)
    }
}

impl FromStr for CodecVersion {
    type Err = DrError;

    /// Accepts only tags this build can decode.
    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        let unsupported = || DrError::UnsupportedVersion {
            tag: tag.to_string(),
        };
        let (strategy, revision) = tag.split_once('/').ok_or_else(unsupported)?;
        let strategy = match strategy {
            "value" => CodecStrategy::Value,
            "reference" => CodecStrategy::Reference,
            _ => return Err(unsupported()),
        };
        let revision: u32 = revision.parse().map_err(|_| unsupported())?;
        if revision != CODEC_REVISION {
            return Err(unsupported());
        }
        Ok(Self { strategy, revision })
    }
}

/// Encoded arguments for one run. `version` stays a raw tag so a blob from a
/// newer launcher can still be carried around and rejected cleanly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedArgs {
    pub blob: String,
    pub version: String,
}

/// Everything the executing side needs to run one configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedArgs {
    pub method: MethodCall,
    pub context: LaunchContext,
    pub config: RunConfig,
}

#[derive(Serialize, Deserialize)]
struct Payload<M, C, R> {
    method: M,
    context: C,
    config: R,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ArgsCodec {
    strategy: CodecStrategy,
    max_blob_bytes: Option<usize>,
}

impl ArgsCodec {
    pub fn new(strategy: CodecStrategy) -> Self {
        Self {
            strategy,
            max_blob_bytes: None,
        }
    }

    pub fn with_max_blob_bytes(mut self, limit: Option<usize>) -> Self {
        self.max_blob_bytes = limit;
        self
    }

    pub fn strategy(&self) -> CodecStrategy {
        self.strategy
    }

    /// Encode one run. Reference encoding requires `method` to be exactly what
    /// `registry` resolves its name to, so nothing is silently dropped.
    pub fn encode(
        &self,
        method: &MethodCall,
        context: &LaunchContext,
        config: &RunConfig,
        registry: &MethodRegistry,
    ) -> DrResult<EncodedArgs> {
        let json = match self.strategy {
            CodecStrategy::Value => serde_json::to_vec(&Payload {
                method,
                context,
                config,
            })?,
            CodecStrategy::Reference => {
                let registered = registry.resolve(&method.name)?;
                if registered.state != method.state {
                    return Err(encode_error!(
                        "method `{}` carries state that differs from its registration; \
                         use value encoding",
                        method.name
                    ));
                }
                serde_json::to_vec(&Payload {
                    method: method.name.as_str(),
                    context,
                    config,
                })?
            }
        };

        let blob = STANDARD.encode(json);
        if let Some(limit) = self.max_blob_bytes {
            if blob.len() > limit {
                return Err(encode_error!(
                    "encoded arguments are {} bytes, limit is {limit}",
                    blob.len()
                ));
            }
        }

        Ok(EncodedArgs {
            blob,
            version: CodecVersion::current(self.strategy).to_string(),
        })
    }

    /// Decode arguments produced by any supported strategy.
    pub fn decode(encoded: &EncodedArgs, registry: &MethodRegistry) -> DrResult<DecodedArgs> {
        let version: CodecVersion = encoded.version.parse()?;
        let bytes = STANDARD
            .decode(encoded.blob.as_bytes())
            .map_err(|e| DrError::Decode {
                message: format!("blob is not valid base64: {e}"),
            })?;
        let malformed = |e: serde_json::Error| DrError::Decode {
            message: format!("malformed {version} payload: {e}"),
        };

        match version.strategy {
            CodecStrategy::Value => {
                let payload: Payload<MethodCall, LaunchContext, RunConfig> =
                    serde_json::from_slice(&bytes).map_err(malformed)?;
                Ok(DecodedArgs {
                    method: payload.method,
                    context: payload.context,
                    config: payload.config,
                })
            }
            CodecStrategy::Reference => {
                let payload: Payload<String, LaunchContext, RunConfig> =
                    serde_json::from_slice(&bytes).map_err(malformed)?;
                Ok(DecodedArgs {
                    method: registry.resolve(&payload.method)?,
                    context: payload.context,
                    config: payload.config,
                })
            }
        }
    }
}
