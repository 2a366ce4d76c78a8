use thiserror::Error;

use crate::runner::ds::error::JErrorType;

use super::SandboxId;

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("The current environment does not support \"vm sandbox\", please use the \"snapshot sandbox\" instead.")]
    Unsupported,
    #[error("capability module '{module}' failed: {source}")]
    Module {
        module: String,
        #[source]
        source: JErrorType,
    },
    #[error("recovering capability module '{module}' failed: {source}")]
    Teardown {
        module: String,
        #[source]
        source: JErrorType,
    },
    #[error(transparent)]
    Script(#[from] JErrorType),
    #[error("sandbox {0} is closed")]
    Closed(SandboxId),
    #[error("effect reversal failed: {0}")]
    Effect(String),
}

impl SandboxError {
    /// The guest-level error behind a script failure.
    pub fn script_error(&self) -> Option<&JErrorType> {
        match self {
            SandboxError::Script(e) => Some(e),
            _ => None,
        }
    }
}
