use thiserror::Error;

/// Main error type for Drover
#[derive(Error, Debug)]
pub enum DrError {
    #[error("Invalid sweep spec for '{key}': {message}")]
    InvalidSpec { key: String, message: String },

    #[error("Unsupported mode '{mode}': {reason}")]
    UnsupportedMode { mode: String, reason: String },

    #[error("Unknown mode: {0}")]
    UnknownMode(String),

    #[error("Unsupported codec version: {tag}")]
    UnsupportedVersion { tag: String },

    #[error("Unknown method: {name}")]
    UnknownMethod { name: String },

    #[error("Invalid mount: {message}")]
    InvalidMount { message: String },

    #[error("Encode error: {message}")]
    Encode { message: String },

    #[error("Decode error: {message}")]
    Decode { message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Method error: {0}")]
    Method(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A single run of a sweep that could not be dispatched.
///
/// These never abort a sweep: the dispatcher records them and moves on to the
/// next configuration.
#[derive(Error, Debug)]
#[error("run {run_index} failed to dispatch: {cause}")]
pub struct RunDispatchError {
    pub run_index: usize,
    #[source]
    pub cause: Box<dyn std::error::Error + Send + Sync>,
}

impl RunDispatchError {
    pub fn new(run_index: usize, cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self {
            run_index,
            cause: cause.into(),
        }
    }
}

/// Result type alias for Drover operations
pub type DrResult<T> = Result<T, DrError>;

/// Macro for creating sweep spec errors
#[macro_export]
macro_rules! invalid_spec {
    ($key:expr, $($arg:tt)*) => {
        $crate::DrError::InvalidSpec {
            key: ($key).to_string(),
            message: format!($($arg)*),
        }
    };
}

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::DrError::Config(format!($($arg)*))
    };
}

/// Macro for creating encode errors
#[macro_export]
macro_rules! encode_error {
    ($($arg:tt)*) => {
        $crate::DrError::Encode { message: format!($($arg)*) }
    };
}
