//! Error types for the stock analyst agents

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AnalystError>;

#[derive(Error, Debug)]
pub enum AnalystError {

    // =============================
    // Startup
    // =============================

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    // =============================
    // Upstream Calls
    // =============================

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Upstream call failed: {0}")]
    UpstreamError(String),

    #[error("Tool error: {0}")]
    ToolError(String),

    #[error("Agent exceeded {0} tool rounds without a final answer")]
    MaxToolRoundsExceeded(usize),

    // =============================
    // Request Errors
    // =============================

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid tool input: {0}")]
    InvalidToolInput(String),

    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),
}

impl AnalystError {
    /// Configuration errors are fatal at startup; everything else is
    /// recoverable and surfaced to the caller.
    pub fn is_configuration(&self) -> bool {
        matches!(self, AnalystError::ConfigurationError(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_classification() {
        assert!(AnalystError::ConfigurationError("GOOGLE_API_KEY".into()).is_configuration());
        assert!(!AnalystError::LlmError("quota".into()).is_configuration());
        assert!(!AnalystError::MaxToolRoundsExceeded(8).is_configuration());
    }

    #[test]
    fn test_error_messages() {
        let err = AnalystError::MaxToolRoundsExceeded(3);
        assert_eq!(
            err.to_string(),
            "Agent exceeded 3 tool rounds without a final answer"
        );
    }
}
