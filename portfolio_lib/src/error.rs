use thiserror::Error;

/// Errors raised while turning construct inputs into a template.
#[derive(Error, Debug)]
pub enum SynthError {
    /// A construct received input it cannot turn into resources.
    #[error("Invalid input for '{module}': {message}")]
    InvalidInput { module: String, message: String },

    /// A resource failed its own validation.
    #[error("Validation failed on resource '{resource}'\n{message}")]
    Validation { resource: String, message: String },

    #[error("Invalid stack name {name}\n{reason}")]
    InvalidStackName { name: String, reason: String },

    #[error("Invalid resource name {name:?}\n{reason}")]
    InvalidLogicalId { name: String, reason: String },

    /// Two resources or outputs were registered under the same logical id.
    #[error("Duplicate logical id '{0}'")]
    DuplicateLogicalId(String),

    #[error("Failed to serialize template\n{0}")]
    Serialization(#[from] serde_json::Error),
}

impl SynthError {
    pub fn invalid_input(module: &str, message: impl Into<String>) -> Self {
        SynthError::InvalidInput {
            module: module.to_string(),
            message: message.into(),
        }
    }
}
