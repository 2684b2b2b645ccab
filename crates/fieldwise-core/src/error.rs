use thiserror::Error;

use crate::config::ConfigError;
use crate::extract::{ModelError, ParseError};
use crate::pipeline::PipelineFailure;

/// Crate-level error for hosts that want a single type at the boundary.
/// Internal seams keep their narrower enums.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Model invocation failed: {0}")]
    Model(#[from] ModelError),

    #[error("Response parsing failed: {0}")]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Pipeline(#[from] PipelineFailure),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
