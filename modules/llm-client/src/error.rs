/// Result type alias for LLM operations.
pub type Result<T> = std::result::Result<T, LlmError>;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("LLM API error: {0}")]
    Api(String),

    #[error("Malformed score response: {0}")]
    MalformedScoreResponse(String),

    #[error("Malformed summary response: {0}")]
    MalformedSummaryResponse(String),

    #[error("Unknown LLM provider: {0}")]
    UnknownProvider(String),
}
