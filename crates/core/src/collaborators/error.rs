use thiserror::Error;

use crate::process::ProcessError;

#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error(transparent)]
    Process(#[from] ProcessError),

    /// The tool ran but exited non-zero.
    #[error("{tool} exited with {code:?}: {stderr}")]
    Failed {
        tool: String,
        code: Option<i32>,
        stderr: String,
    },

    /// The tool's output could not be understood.
    #[error("{tool} produced invalid output: {message}")]
    InvalidOutput { tool: String, message: String },
}

impl CollaboratorError {
    pub fn invalid_output(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidOutput {
            tool: tool.into(),
            message: message.into(),
        }
    }
}
