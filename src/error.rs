/// Result type alias for analysis operations.
pub type Result<T> = std::result::Result<T, AnalyzerError>;

/// Errors surfaced by the analysis core.
///
/// Configuration errors are fatal at the call that triggers them; input
/// errors reject a single call and leave all persisted state untouched, so
/// the next valid call resumes cleanly.
#[derive(Debug, thiserror::Error)]
pub enum AnalyzerError {
    /// Unsupported resolution or channel grouping.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Per-call input that violates the analysis contract.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}
